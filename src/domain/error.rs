//! Domain error types.

/// A command parse error with the byte offset of the offending token.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }

    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let column = input
            .get(..self.position)
            .map_or(self.position, |prefix| prefix.chars().count());
        let caret = " ".repeat(column) + "^";
        format!("{input}\n{caret}\n{err}", err = self)
    }
}

/// Decoding failures for persisted event records.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EventRecordError {
    #[error("empty event record")]
    Empty,

    #[error("malformed field '{0}' (expected CODE=VALUE)")]
    MalformedField(String),

    #[error("unknown field code '{0}'")]
    UnknownCode(String),

    #[error("invalid value for field {code}: '{value}'")]
    InvalidValue { code: String, value: String },
}

/// Top-level error type for stalker.
#[derive(Debug, thiserror::Error)]
pub enum StalkerError {
    #[error(transparent)]
    CmdParse(#[from] ParseError),

    #[error("invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("unknown portfolio '{name}'")]
    UnknownPortfolio { name: String },

    #[error("portfolio '{name}' already exists")]
    DuplicatePortfolio { name: String },

    #[error("portfolio '{portfolio}' does not follow {sref}")]
    NotFollowed { portfolio: String, sref: String },

    #[error("{sref} is still referenced by {what} in portfolio '{portfolio}'")]
    StillReferenced {
        portfolio: String,
        sref: String,
        what: String,
    },

    #[error("duplicate {kind} '{id}'")]
    Duplicate { kind: &'static str, id: String },

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("cannot sell {requested} units, only {remaining} remaining for {purchase_id}")]
    OverSell {
        purchase_id: String,
        requested: f64,
        remaining: f64,
    },

    #[error("invalid command: {reason}")]
    Invalid { reason: String },

    #[error("replay failed at line {line} ('{command}'): {source}")]
    Replay {
        line: usize,
        command: String,
        source: Box<StalkerError>,
    },

    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    EventRecord(#[from] EventRecordError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StalkerError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        StalkerError::Invalid {
            reason: reason.into(),
        }
    }

    /// True for the errors a single command can be rejected with.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StalkerError::InvalidValue { .. }
                | StalkerError::UnknownPortfolio { .. }
                | StalkerError::DuplicatePortfolio { .. }
                | StalkerError::NotFollowed { .. }
                | StalkerError::StillReferenced { .. }
                | StalkerError::Duplicate { .. }
                | StalkerError::NotFound { .. }
                | StalkerError::OverSell { .. }
                | StalkerError::Invalid { .. }
        )
    }
}

impl From<&StalkerError> for std::process::ExitCode {
    fn from(err: &StalkerError) -> Self {
        let code: u8 = match err {
            StalkerError::Io(_) | StalkerError::Storage { .. } => 1,
            StalkerError::ConfigParse { .. }
            | StalkerError::ConfigMissing { .. }
            | StalkerError::ConfigInvalid { .. } => 2,
            StalkerError::CmdParse(_) => 3,
            StalkerError::InvalidValue { .. }
            | StalkerError::UnknownPortfolio { .. }
            | StalkerError::DuplicatePortfolio { .. }
            | StalkerError::NotFollowed { .. }
            | StalkerError::StillReferenced { .. }
            | StalkerError::Duplicate { .. }
            | StalkerError::NotFound { .. }
            | StalkerError::OverSell { .. }
            | StalkerError::Invalid { .. } => 4,
            StalkerError::Replay { .. } => 5,
            StalkerError::EventRecord(_) => 6,
        };
        std::process::ExitCode::from(code)
    }
}
