//! Command keywords recognised by the dispatcher.

/// Every command the server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `*IDN?`
    Identify,
    /// `*RST`
    Reset,
    /// `SYST:ERR?`
    ErrorQuery,
    /// `GPIO:LIST?`
    List,
    /// `GPIO:SETUP <pin>,<in|out>`
    Setup,
    /// `GPIO:WRITE <pin>,<value>`
    Write,
    /// `GPIO:READ? <pin>`
    Read,
    /// `GPIO:TOGGLE <pin>`
    Toggle,
    /// `GPIO:STATUS?`
    Status,
}

impl Command {
    const ALL: [Self; 9] = [
        Self::Identify,
        Self::Reset,
        Self::ErrorQuery,
        Self::List,
        Self::Setup,
        Self::Write,
        Self::Read,
        Self::Toggle,
        Self::Status,
    ];

    /// Looks up a keyword, ignoring ASCII case.
    #[must_use]
    pub fn parse(keyword: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|command| command.keyword().eq_ignore_ascii_case(keyword))
    }

    /// Canonical spelling of the keyword.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Identify => "*IDN?",
            Self::Reset => "*RST",
            Self::ErrorQuery => "SYST:ERR?",
            Self::List => "GPIO:LIST?",
            Self::Setup => "GPIO:SETUP",
            Self::Write => "GPIO:WRITE",
            Self::Read => "GPIO:READ?",
            Self::Toggle => "GPIO:TOGGLE",
            Self::Status => "GPIO:STATUS?",
        }
    }

    /// Usage string quoted back when parameters are malformed.
    #[must_use]
    pub const fn usage(self) -> &'static str {
        match self {
            Self::Setup => "GPIO:SETUP <pin>,<direction>",
            Self::Write => "GPIO:WRITE <pin>,<value>",
            Self::Read => "GPIO:READ? <pin>",
            Self::Toggle => "GPIO:TOGGLE <pin>",
            other => other.keyword(),
        }
    }

    /// Whether a successful run clears the last-error register.
    ///
    /// Identification and listing never touch the registry and leave the
    /// register as it was.
    #[must_use]
    pub const fn records_success(self) -> bool {
        !matches!(self, Self::Identify | Self::List | Self::ErrorQuery)
    }
}

/// A command line split into its keyword and optional parameter text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandLine<'a> {
    /// Text before the first space.
    pub keyword: &'a str,
    /// Text after the first space, if any.
    pub params: Option<&'a str>,
}

impl<'a> CommandLine<'a> {
    /// Splits a trimmed line on its first space.
    #[must_use]
    pub fn split(line: &'a str) -> Self {
        let line = line.trim();
        match line.split_once(' ') {
            Some((keyword, params)) => Self {
                keyword,
                params: Some(params),
            },
            None => Self {
                keyword: line,
                params: None,
            },
        }
    }
}
