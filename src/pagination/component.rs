//! Component identifiers embedded in rendered controls.
//!
//! A control carries `"<session-id>:<action>"`, e.g. `inst-0000002a:next` or
//! `inst-0000002a:jump:3`, so an incoming interaction can be routed back to
//! its session.

use std::fmt;
use std::str::FromStr;

use crate::error::InstanceError;
use crate::session::SessionId;

/// Navigation requested by a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAction {
    First,
    Previous,
    Next,
    Last,
    Stop,
    /// Zero-based page index chosen from a select menu.
    Jump(usize),
}

impl fmt::Display for PageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => f.write_str("first"),
            Self::Previous => f.write_str("prev"),
            Self::Next => f.write_str("next"),
            Self::Last => f.write_str("last"),
            Self::Stop => f.write_str("stop"),
            Self::Jump(index) => write!(f, "jump:{}", index),
        }
    }
}

impl FromStr for PageAction {
    type Err = InstanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(Self::First),
            "prev" => Ok(Self::Previous),
            "next" => Ok(Self::Next),
            "last" => Ok(Self::Last),
            "stop" => Ok(Self::Stop),
            _ => s
                .strip_prefix("jump:")
                .and_then(|index| index.parse().ok())
                .map(Self::Jump)
                .ok_or_else(|| InstanceError::InvalidId(s.into())),
        }
    }
}

/// Identifier of one rendered control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentId {
    pub session: SessionId,
    pub action: PageAction,
}

impl ComponentId {
    pub fn new(session: SessionId, action: PageAction) -> Self {
        Self { session, action }
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.session, self.action)
    }
}

impl FromStr for ComponentId {
    type Err = InstanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (session, action) = s
            .split_once(':')
            .ok_or_else(|| InstanceError::InvalidId(s.into()))?;
        Ok(Self {
            session: session.parse()?,
            action: action.parse()?,
        })
    }
}
