use thiserror::Error;

/// Classifies audit errors for programmatic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed IP/mask, wrong token count, unknown keyword
    Parse,
    /// Named object or group absent, ambiguous, or part of a reference cycle
    Resolution,
    /// Inline service without a pending protocol, wrong operand count
    Grammar,
    /// Protocol id that capacity analysis cannot handle
    Protocol,
    /// Next-hop with no covering route, IP with no containing interface
    Routing,
    /// Unreadable input file
    Io,
    /// Replay worker failed outside of flow processing
    Pipeline,
}

/// Audit error types
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Parse error at line {line}: {message}")]
    ParseAtLine { line: usize, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Resolution error: {0}")]
    Resolution(String),

    #[error("Grammar error: {0}")]
    Grammar(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Routing error: {0}")]
    Routing(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuditError {
    /// Error category, independent of the message text.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuditError::ParseAtLine { .. } | AuditError::Parse(_) => ErrorKind::Parse,
            AuditError::Resolution(_) => ErrorKind::Resolution,
            AuditError::Grammar(_) => ErrorKind::Grammar,
            AuditError::Protocol(_) => ErrorKind::Protocol,
            AuditError::Routing(_) => ErrorKind::Routing,
            AuditError::Pipeline(_) => ErrorKind::Pipeline,
            AuditError::Io(_) => ErrorKind::Io,
        }
    }

    /// Attach the offending input line to a parse error.
    pub(crate) fn at_line(self, line: usize) -> Self {
        match self {
            AuditError::Parse(message) => AuditError::ParseAtLine { line, message },
            other => other,
        }
    }

    /// Append the text being processed to the message.
    pub(crate) fn context(self, text: &str) -> Self {
        let text = text.trim();
        match self {
            AuditError::Parse(m) => AuditError::Parse(format!("{} in '{}'", m, text)),
            AuditError::Resolution(m) => AuditError::Resolution(format!("{} in '{}'", m, text)),
            AuditError::Grammar(m) => AuditError::Grammar(format!("{} in '{}'", m, text)),
            AuditError::Protocol(m) => AuditError::Protocol(format!("{} in '{}'", m, text)),
            AuditError::Routing(m) => AuditError::Routing(format!("{} in '{}'", m, text)),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;
