use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DictError>;

#[derive(Error, Debug)]
pub enum DictError {
    #[error("malformed dictionary schema: {0}")]
    MalformedSchema(String),

    #[error("source not found: {0}")]
    SourceNotFound(String),

    #[error("authentication rejected: {0}")]
    Authentication(String),

    #[error("network error: {0}")]
    Network(String),

    /// `cause` is the kind of the load failure that left the cache empty
    #[error("dictionary cache not initialized: {message}")]
    CacheUninitialized {
        message: String,
        cause: Option<ErrorKind>,
    },

    #[error("archive error: {0}")]
    Archive(String),

    #[error("repository error: {0}")]
    Repository(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable label for an error, used in logs and status reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedSchema,
    SourceNotFound,
    Authentication,
    Network,
    CacheUninitialized,
    Archive,
    Repository,
    Config,
    Unsupported,
    Io,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MalformedSchema => "malformed_schema",
            Self::SourceNotFound => "source_not_found",
            Self::Authentication => "authentication",
            Self::Network => "network",
            Self::CacheUninitialized => "cache_uninitialized",
            Self::Archive => "archive",
            Self::Repository => "repository",
            Self::Config => "config",
            Self::Unsupported => "unsupported",
            Self::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DictError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedSchema(_) => ErrorKind::MalformedSchema,
            Self::SourceNotFound(_) => ErrorKind::SourceNotFound,
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::Network(_) => ErrorKind::Network,
            Self::CacheUninitialized { .. } => ErrorKind::CacheUninitialized,
            Self::Archive(_) => ErrorKind::Archive,
            Self::Repository(_) => ErrorKind::Repository,
            Self::Config(_) => ErrorKind::Config,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

impl DictError {
    /// Wrap a failed first load, keeping the underlying kind.
    pub fn uninitialized_by(err: &DictError) -> Self {
        Self::CacheUninitialized {
            message: format!("first load failed [{}]: {err}", err.kind()),
            cause: Some(err.kind()),
        }
    }

    /// Kind of the failure behind this one, when it wraps another.
    pub fn cause_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::CacheUninitialized { cause, .. } => *cause,
            _ => None,
        }
    }
}

impl From<roxmltree::Error> for DictError {
    fn from(err: roxmltree::Error) -> Self {
        Self::MalformedSchema(err.to_string())
    }
}

impl From<toml::de::Error> for DictError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<zip::result::ZipError> for DictError {
    fn from(err: zip::result::ZipError) -> Self {
        use zip::result::ZipError;
        match err {
            ZipError::FileNotFound => Self::SourceNotFound("entry not present in archive".into()),
            ZipError::Io(io) => Self::Io(io),
            other => Self::Archive(other.to_string()),
        }
    }
}

impl From<git2::Error> for DictError {
    fn from(err: git2::Error) -> Self {
        use git2::{ErrorClass, ErrorCode};

        let message = err.message().to_string();
        if err.code() == ErrorCode::Auth || looks_like_auth_rejection(&message) {
            return Self::Authentication(message);
        }
        if err.code() == ErrorCode::NotFound {
            return Self::SourceNotFound(message);
        }
        match err.class() {
            ErrorClass::Net
            | ErrorClass::Http
            | ErrorClass::Ssh
            | ErrorClass::Ssl
            | ErrorClass::Os
            | ErrorClass::Callback => Self::Network(message),
            _ => Self::Repository(message),
        }
    }
}

// libgit2 reports some HTTP rejections with a generic code; the message is the
// only reliable signal.
fn looks_like_auth_rejection(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("authentication")
        || lower.contains("401")
        || lower.contains("403")
        || lower.contains("credentials")
}
