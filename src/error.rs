use std::path::PathBuf;

/// Result type alias for the hard-failure stages of the generator
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that stop a generation run.
///
/// Everything recoverable (an unparseable file, an unknown handler, an unresolved
/// payload type) is logged or collected as a generation warning instead.
#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),
    SourceRootMissing(PathBuf),
    ParseError { file: PathBuf, message: String },
    ConfigError { file: PathBuf, message: String },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::SourceRootMissing(path) => {
                write!(f, "source root does not exist: {}", path.display())
            }
            Error::ParseError { file, message } => {
                write!(f, "failed to parse {}: {}", file.display(), message)
            }
            Error::ConfigError { file, message } => {
                write!(f, "invalid config {}: {}", file.display(), message)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigError {
            file: PathBuf::from("<unknown>"),
            message: err.message().to_string(),
        }
    }
}
