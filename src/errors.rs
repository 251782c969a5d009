use std::fmt;

/// Engine-wide error type.
///
/// `DuplicateKey`, `TableFull` and `Parse` are recoverable: the shell
/// prints them and keeps reading input. `Io` and `Corrupt` are fatal:
/// the shell prints a single diagnostic line and exits.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Corrupt(String),
    DuplicateKey,
    TableFull,
    Parse(String),
}

impl Error {
    /// Fatal errors abort the process; recoverable ones don't.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Corrupt(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "{e}"),
            Error::Corrupt(msg) => write!(f, "{msg}"),
            Error::DuplicateKey => write!(f, "Error: Duplicate Key."),
            Error::TableFull => write!(f, "Error: Table full."),
            Error::Parse(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Build an `Error::Corrupt` from a format string, the way the storage
/// layer reports structural impossibilities (out-of-bounds page index,
/// non-page-aligned file length, an unloaded slot at flush time).
macro_rules! err {
    (Corrupt, $($arg:tt)*) => {
        $crate::errors::Error::Corrupt(format!($($arg)*))
    };
}

pub(crate) use err;
