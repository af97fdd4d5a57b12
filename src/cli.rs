//! Command-line interface for the instance-manager demo.
//!
//! Uses lexopt for minimal binary size overhead (~34KB).

use std::ffi::OsString;
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Idle timeout in seconds (overrides config file).
    pub idle_secs: Option<u64>,
    /// Hard timeout in seconds (overrides config file).
    pub hard_secs: Option<u64>,
    /// Number of demo pages.
    pub pages: Option<usize>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('i') | Long("idle-secs") => {
                result.idle_secs = Some(parse_number(&mut parser, "idle-secs")?);
            }
            Short('t') | Long("hard-secs") => {
                result.hard_secs = Some(parse_number(&mut parser, "hard-secs")?);
            }
            Short('n') | Long("pages") => {
                result.pages = Some(parse_number(&mut parser, "pages")?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

fn parse_number<N: std::str::FromStr>(
    parser: &mut lexopt::Parser,
    name: &'static str,
) -> Result<N, ArgsError> {
    use lexopt::ValueExt;

    let value: String = parser.value()?.parse()?;
    value
        .parse()
        .map_err(|_| ArgsError::InvalidValue(name, value))
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"instance-manager {version}
Session lifecycle manager demo: runs a paginated session against an in-memory sink

USAGE:
    instance-manager [OPTIONS]

OPTIONS:
    -c, --config <FILE>       Path to configuration file (JSON)
    -i, --idle-secs <SECS>    Idle timeout in seconds [default: 180]
    -t, --hard-secs <SECS>    Hard timeout in seconds [default: 600]
    -n, --pages <COUNT>       Number of demo pages [default: 5]
    -l, --log-level <LVL>     Log level (error, warn, info, debug, trace)
    -h, --help                Print help
    -V, --version             Print version

ENVIRONMENT VARIABLES:
    INSTANCE_MANAGER_IDLE_SECS  Idle timeout (overrides config)
    INSTANCE_MANAGER_HARD_SECS  Hard timeout (overrides config)
    INSTANCE_MANAGER_LOG_LEVEL  Log level (overrides config)
    RUST_LOG                    Alternative log level setting

EXAMPLES:
    # Short-lived session that expires after 5 idle seconds
    instance-manager -i 5 -t 30

    # Start with config file
    instance-manager -c /etc/instance-manager/config.json
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("instance-manager {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(args: &[&str]) -> Vec<OsString> {
        std::iter::once("instance-manager")
            .chain(args.iter().copied())
            .map(OsString::from)
            .collect()
    }

    #[test]
    fn test_default_args() {
        let result = parse_args_from(args(&[])).unwrap();
        assert!(result.idle_secs.is_none());
        assert!(result.hard_secs.is_none());
        assert!(result.config.is_none());
    }

    #[test]
    fn test_timeouts() {
        let result = parse_args_from(args(&["-i", "5", "-t", "30"])).unwrap();
        assert_eq!(result.idle_secs, Some(5));
        assert_eq!(result.hard_secs, Some(30));
    }

    #[test]
    fn test_long_options() {
        let result =
            parse_args_from(args(&["--idle-secs", "7", "--hard-secs", "9", "--pages", "2"]))
                .unwrap();
        assert_eq!(result.idle_secs, Some(7));
        assert_eq!(result.hard_secs, Some(9));
        assert_eq!(result.pages, Some(2));
    }

    #[test]
    fn test_config_file() {
        let result = parse_args_from(args(&["-c", "/etc/config.json"])).unwrap();
        assert_eq!(result.config, Some(PathBuf::from("/etc/config.json")));
    }

    #[test]
    fn test_help_flag() {
        let result = parse_args_from(args(&["-h"])).unwrap();
        assert!(result.help);

        let result = parse_args_from(args(&["--help"])).unwrap();
        assert!(result.help);
    }

    #[test]
    fn test_version_flag() {
        let result = parse_args_from(args(&["-V"])).unwrap();
        assert!(result.version);
    }

    #[test]
    fn test_log_level() {
        let result = parse_args_from(args(&["-l", "debug"])).unwrap();
        assert_eq!(result.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_invalid_number() {
        let result = parse_args_from(args(&["-i", "soon"]));
        assert!(matches!(result, Err(ArgsError::InvalidValue("idle-secs", _))));
    }

    #[test]
    fn test_unexpected_positional() {
        let result = parse_args_from(args(&["stray"]));
        assert!(matches!(result, Err(ArgsError::UnexpectedArgument(_))));
    }
}
