use std::fmt;

use serde::Serialize;

/// Error taxonomy shared by every frontend component.
///
/// Expected failures (bad tokens, bad expressions, IO trouble) travel as
/// [`Error`] values; invariant violations panic instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrC {
    None,
    InvalidArg,
    FileIo,
    Internal,
    NotFound,
    BadToken,
    Native,
    Conversion,
    Overflow,
    NotImplemented,
    BadExpr,
    BadEntity,
}

impl ErrC {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::InvalidArg => "invalid argument",
            Self::FileIo => "file I/O",
            Self::Internal => "internal",
            Self::NotFound => "not found",
            Self::BadToken => "bad token",
            Self::Native => "native",
            Self::Conversion => "conversion",
            Self::Overflow => "overflow",
            Self::NotImplemented => "not implemented",
            Self::BadExpr => "bad expression",
            Self::BadEntity => "bad entity",
        }
    }
}

/// An error with an optional human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Error {
    pub code: ErrC,
    pub msg: Option<String>,
}

impl Error {
    pub fn new(code: ErrC) -> Self {
        Self { code, msg: None }
    }

    pub fn msg(code: ErrC, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: Some(msg.into()),
        }
    }

    /// The message if present, the error-code description otherwise.
    pub fn message(&self) -> &str {
        self.msg.as_deref().unwrap_or_else(|| self.code.as_str())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.msg {
            Some(m) => write!(f, "{m}"),
            None => write!(f, "{}", self.code.as_str()),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::msg(ErrC::FileIo, e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_message_when_present() {
        let e = Error::msg(ErrC::BadToken, "Unexpected token.");
        assert_eq!(e.to_string(), "Unexpected token.");
    }

    #[test]
    fn display_falls_back_to_code() {
        let e = Error::new(ErrC::NotImplemented);
        assert_eq!(e.to_string(), "not implemented");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e: Error = io.into();
        assert_eq!(e.code, ErrC::FileIo);
    }
}
