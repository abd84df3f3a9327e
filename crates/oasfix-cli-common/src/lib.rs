use bpaf::Bpaf;

/// Global options applied to all commands
#[derive(Debug, Clone, Bpaf)]
#[bpaf(generate(cli_global_options))]
#[allow(clippy::upper_case_acronyms)]
pub struct CLIGlobalOptions {
    /// Set the formatting mode for diagnostics: "off" prints plain text,
    /// "force" uses ANSI colors even if the terminal looks incompatible
    #[bpaf(long("colors"), argument("off|force"))]
    pub colors: Option<ColorsArg>,

    /// Print a summary of every repair made, not only the total.
    #[bpaf(short('v'), long("verbose"), switch, fallback(false))]
    pub verbose: bool,

    /// The level of logging. In order, from the most verbose to the least verbose:
    /// debug, info, warn, error. `OASFIX_LOG` takes precedence when set.
    #[bpaf(
        long("log-level"),
        argument("none|debug|info|warn|error"),
        fallback(LogLevel::Warn),
        display_fallback
    )]
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorsArg {
    Off,
    Force,
}

impl core::str::FromStr for ColorsArg {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(Self::Off),
            "force" => Ok(Self::Force),
            _ => Err(format!("expected 'off' or 'force', got '{s}'")),
        }
    }
}

impl CLIGlobalOptions {
    /// Whether diagnostics and logs should use ANSI colors, given whether
    /// stderr is a terminal.
    pub fn use_color(&self, stderr_is_terminal: bool) -> bool {
        match self.colors {
            Some(ColorsArg::Off) => false,
            Some(ColorsArg::Force) => true,
            None => stderr_is_terminal,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    None,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    const ALL: [LogLevel; 5] = [
        LogLevel::None,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// `tracing` filter directive for this level.
    pub fn directive(self) -> &'static str {
        match self {
            Self::None => "off",
            other => other.as_str(),
        }
    }
}

impl core::str::FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| {
                format!("expected 'none', 'debug', 'info', 'warn', or 'error', got '{s}'")
            })
    }
}

impl core::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bpaf::Parser;

    fn opts() -> bpaf::OptionParser<CLIGlobalOptions> {
        cli_global_options().to_options()
    }

    #[test]
    fn defaults() {
        let parsed = opts().run_inner(&[]).unwrap();
        assert!(!parsed.verbose);
        assert_eq!(parsed.log_level, LogLevel::Warn);
        assert!(parsed.colors.is_none());
    }

    #[test]
    fn verbose_short() {
        let parsed = opts().run_inner(&["-v"]).unwrap();
        assert!(parsed.verbose);
    }

    #[test]
    fn log_levels() {
        for (arg, level) in [
            ("none", LogLevel::None),
            ("debug", LogLevel::Debug),
            ("info", LogLevel::Info),
            ("error", LogLevel::Error),
        ] {
            let parsed = opts().run_inner(&["--log-level", arg][..]).unwrap();
            assert_eq!(parsed.log_level, level);
        }
    }

    #[test]
    fn log_level_invalid() {
        assert!(opts().run_inner(&["--log-level", "trace"]).is_err());
    }

    #[test]
    fn none_turns_logging_off() {
        assert_eq!(LogLevel::None.directive(), "off");
        assert_eq!(LogLevel::default().directive(), "warn");
    }

    #[test]
    fn color_follows_terminal_unless_forced() {
        let auto = opts().run_inner(&[]).unwrap();
        assert!(auto.use_color(true));
        assert!(!auto.use_color(false));
        let off = opts().run_inner(&["--colors", "off"]).unwrap();
        assert!(!off.use_color(true));
        let force = opts().run_inner(&["--colors", "force"]).unwrap();
        assert!(force.use_color(false));
    }

    #[test]
    fn colors() {
        let parsed = opts().run_inner(&["--colors", "off"]).unwrap();
        assert_eq!(parsed.colors, Some(ColorsArg::Off));
        assert!(opts().run_inner(&["--colors", "auto"]).is_err());
    }

    #[test]
    fn combined_flags() {
        let parsed = opts()
            .run_inner(&["-v", "--log-level", "debug", "--colors", "force"])
            .unwrap();
        assert!(parsed.verbose);
        assert_eq!(parsed.log_level, LogLevel::Debug);
        assert_eq!(parsed.colors, Some(ColorsArg::Force));
    }
}
