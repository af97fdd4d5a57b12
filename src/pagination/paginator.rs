//! Page state held by a pagination session.

use super::{ComponentId, PageAction, PaginationError};
use crate::session::SessionId;

/// Most options a select menu can show at once.
pub const MAX_SELECT_OPTIONS: usize = 25;

/// How navigation controls are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationKind {
    /// First / previous / stop / next / last buttons.
    Buttons,
    /// A page select menu plus a stop button.
    Select,
}

impl PaginationKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Buttons => "button-pagination",
            Self::Select => "select-pagination",
        }
    }
}

/// Result of applying a [`PageAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Moved(usize),
    Stopped,
}

/// Ordered pages and the one currently shown.
#[derive(Debug, Clone)]
pub struct Paginator {
    pages: Vec<String>,
    current: usize,
    kind: PaginationKind,
}

impl Paginator {
    pub fn new(pages: Vec<String>, kind: PaginationKind) -> Result<Self, PaginationError> {
        if pages.is_empty() {
            return Err(PaginationError::Empty);
        }
        Ok(Self {
            pages,
            current: 0,
            kind,
        })
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn total(&self) -> usize {
        self.pages.len()
    }

    pub fn kind(&self) -> PaginationKind {
        self.kind
    }

    /// Apply a navigation action. Previous and next wrap around.
    pub fn navigate(&mut self, action: PageAction) -> Result<Navigation, PaginationError> {
        let last = self.pages.len() - 1;
        self.current = match action {
            PageAction::First => 0,
            PageAction::Last => last,
            PageAction::Previous if self.current == 0 => last,
            PageAction::Previous => self.current - 1,
            PageAction::Next if self.current == last => 0,
            PageAction::Next => self.current + 1,
            PageAction::Jump(index) if index > last => {
                return Err(PaginationError::OutOfRange {
                    index,
                    total: self.pages.len(),
                })
            }
            PageAction::Jump(index) => index,
            PageAction::Stop => return Ok(Navigation::Stopped),
        };
        Ok(Navigation::Moved(self.current))
    }

    /// Renderable snapshot of the current page for `session`.
    pub fn view(&self, session: SessionId) -> PageView {
        let controls = match self.kind {
            PaginationKind::Buttons => [
                PageAction::First,
                PageAction::Previous,
                PageAction::Stop,
                PageAction::Next,
                PageAction::Last,
            ]
            .into_iter()
            .map(|action| ComponentId::new(session, action))
            .collect(),
            PaginationKind::Select => {
                let start = (self.current / MAX_SELECT_OPTIONS) * MAX_SELECT_OPTIONS;
                let end = (start + MAX_SELECT_OPTIONS).min(self.pages.len());
                (start..end)
                    .map(PageAction::Jump)
                    .chain(std::iter::once(PageAction::Stop))
                    .map(|action| ComponentId::new(session, action))
                    .collect()
            }
        };

        PageView {
            session,
            index: self.current,
            total: self.pages.len(),
            content: self.pages[self.current].clone(),
            controls,
        }
    }
}

/// What the sink needs to show one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageView {
    pub session: SessionId,
    pub index: usize,
    pub total: usize,
    pub content: String,
    pub controls: Vec<ComponentId>,
}

impl PageView {
    /// Plain-text rendering, used by text-based sinks.
    pub fn render(&self) -> String {
        let controls: Vec<String> = self.controls.iter().map(ToString::to_string).collect();
        format!(
            "[{}/{}] {}\n{}",
            self.index + 1,
            self.total,
            self.content,
            controls.join(" | ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("page {}", i)).collect()
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(
            Paginator::new(vec![], PaginationKind::Buttons),
            Err(PaginationError::Empty)
        ));
    }

    #[test]
    fn test_navigation_wraps() {
        let mut paginator = Paginator::new(pages(3), PaginationKind::Buttons).unwrap();

        assert_eq!(paginator.navigate(PageAction::Previous).unwrap(), Navigation::Moved(2));
        assert_eq!(paginator.navigate(PageAction::Next).unwrap(), Navigation::Moved(0));
        assert_eq!(paginator.navigate(PageAction::Next).unwrap(), Navigation::Moved(1));
        assert_eq!(paginator.navigate(PageAction::Last).unwrap(), Navigation::Moved(2));
        assert_eq!(paginator.navigate(PageAction::First).unwrap(), Navigation::Moved(0));
    }

    #[test]
    fn test_jump() {
        let mut paginator = Paginator::new(pages(5), PaginationKind::Select).unwrap();
        assert_eq!(paginator.navigate(PageAction::Jump(4)).unwrap(), Navigation::Moved(4));

        let result = paginator.navigate(PageAction::Jump(5));
        assert!(matches!(
            result,
            Err(PaginationError::OutOfRange { index: 5, total: 5 })
        ));
        // Position unchanged after a rejected jump
        assert_eq!(paginator.current(), 4);
    }

    #[test]
    fn test_stop_keeps_position() {
        let mut paginator = Paginator::new(pages(2), PaginationKind::Buttons).unwrap();
        paginator.navigate(PageAction::Next).unwrap();
        assert_eq!(paginator.navigate(PageAction::Stop).unwrap(), Navigation::Stopped);
        assert_eq!(paginator.current(), 1);
    }

    #[test]
    fn test_button_view() {
        let paginator = Paginator::new(pages(3), PaginationKind::Buttons).unwrap();
        let session = SessionId::from_raw(1);
        let view = paginator.view(session);

        assert_eq!(view.content, "page 1");
        assert_eq!(view.controls.len(), 5);
        assert!(view.render().starts_with("[1/3] page 1"));
        assert!(view.render().contains("inst-00000001:next"));
    }

    #[test]
    fn test_select_view_windows_options() {
        let mut paginator = Paginator::new(pages(60), PaginationKind::Select).unwrap();
        paginator.navigate(PageAction::Jump(30)).unwrap();
        let view = paginator.view(SessionId::from_raw(1));

        // 25 jump options for pages 26..=50 plus stop
        assert_eq!(view.controls.len(), MAX_SELECT_OPTIONS + 1);
        assert_eq!(view.controls[0].action, PageAction::Jump(25));
        assert_eq!(view.controls.last().unwrap().action, PageAction::Stop);
    }
}
