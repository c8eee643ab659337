use thiserror::Error;

/// Coarse classification callers branch on.
///
/// `Login` failures are user-actionable (wrong credentials, unresolved team).
/// Everything else is `General`: a portal markup change, a server-side state
/// conflict, or an environment problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Login,
    General,
}

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Login failed: {0}")]
    Login(String),

    #[error("{0}")]
    General(String),

    #[error("Couldn't find element '{selector}' after waiting for quite some time ({context})")]
    ElementNotFound {
        selector: String,
        context: String,
        html: String,
    },

    #[error("Browser not found. Please install Chrome, Chromium, Brave, or Edge.")]
    BrowserNotFound,

    #[error("Browser launch failed: {0}")]
    BrowserLaunchFailed(String),

    #[error("CDP connection failed: {0}")]
    CdpConnectionFailed(String),

    #[error("JavaScript execution failed: {0}")]
    JavaScriptError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PortalError {
    pub fn general(message: impl Into<String>) -> Self {
        PortalError::General(message.into())
    }

    pub fn login(message: impl Into<String>) -> Self {
        PortalError::Login(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PortalError::Login(_) => ErrorKind::Login,
            _ => ErrorKind::General,
        }
    }

    pub fn is_login(&self) -> bool {
        self.kind() == ErrorKind::Login
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;
