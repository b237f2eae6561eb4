use std::fmt;

#[derive(Debug)]
pub enum BenchError {
    Config(String),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchError::Config(msg) => write!(f, "invalid configuration: {msg}"),
            BenchError::Io(e) => write!(f, "io error: {e}"),
            BenchError::Json(e) => write!(f, "json error: {e}"),
        }
    }
}

impl std::error::Error for BenchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BenchError::Config(_) => None,
            BenchError::Io(e) => Some(e),
            BenchError::Json(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for BenchError {
    fn from(e: std::io::Error) -> Self {
        BenchError::Io(e)
    }
}

impl From<serde_json::Error> for BenchError {
    fn from(e: serde_json::Error) -> Self {
        BenchError::Json(e)
    }
}
