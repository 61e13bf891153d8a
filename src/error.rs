use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// The service could not be reached (connection refused, DNS, timeout).
    NotConnected(String),
    /// The session token expired and the refresh budget is spent.
    Token,
    /// The addressed device is offline at the service.
    DeviceNotConnected,
    /// The service rejected the stored credentials.
    Login,
    /// The service rejected the shape or types of a request.
    InvalidRequest(Option<String>),
    /// Well-formed reply that lacks the fields we need. Carries the raw body.
    UnexpectedResponse(String),
    /// Unmapped service error codes and broken client invariants.
    Internal { code: Option<i64>, message: String },
    /// No device with this alias in the registry.
    UnknownDevice(String),
    Config(String),
    Io(std::io::Error),
    Json(serde_json::Error),
    Yaml(serde_yaml::Error),
}

impl Error {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            code: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotConnected(reason) => write!(f, "Not connected to the cloud service: {}", reason),
            Error::Token => write!(f, "Token expired and could not be refreshed"),
            Error::DeviceNotConnected => write!(f, "Device is not connected to the cloud"),
            Error::Login => write!(f, "Login rejected: wrong username or password"),
            Error::InvalidRequest(Some(msg)) => write!(f, "Invalid request: {}", msg),
            Error::InvalidRequest(None) => write!(f, "Invalid request"),
            Error::UnexpectedResponse(raw) => write!(f, "Unexpected response: {}", raw),
            Error::Internal {
                code: Some(code),
                message,
            } => write!(f, "Internal error (code {}): {}", code, message),
            Error::Internal { code: None, message } => write!(f, "Internal error: {}", message),
            Error::UnknownDevice(alias) => write!(f, "Device with alias {} not found", alias),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Json(err) => write!(f, "JSON parsing error: {}", err),
            Error::Yaml(err) => write!(f, "YAML parsing error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::Yaml(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Yaml(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
