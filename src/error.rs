//! Error types for ferrorma

use std::fmt;

use thiserror::Error;

/// Result type for MPI operations
pub type Result<T> = std::result::Result<T, Error>;

/// MPI error classes.
///
/// The numeric codes follow the MPICH numbering so that values reported by
/// [`ErrorClass::code()`] line up with what MPICH-based tooling prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorClass {
    /// No error (`MPI_SUCCESS`)
    Success = 0,
    /// Invalid communicator (`MPI_ERR_COMM`)
    Comm = 5,
    /// Invalid rank (`MPI_ERR_RANK`)
    Rank = 6,
    /// Invalid group (`MPI_ERR_GROUP`)
    Group = 8,
    /// Invalid argument (`MPI_ERR_ARG`)
    Arg = 12,
    /// Unknown error (`MPI_ERR_UNKNOWN`)
    Unknown = 13,
    /// Known error not in this list (`MPI_ERR_OTHER`)
    Other = 15,
    /// Internal error (`MPI_ERR_INTERN`)
    Intern = 16,
    /// Invalid info object (`MPI_ERR_INFO`)
    Info = 28,
    /// Memory exhausted (`MPI_ERR_NO_MEM`)
    NoMem = 34,
    /// Unsupported operation (`MPI_ERR_UNSUPPORTED_OPERATION`)
    UnsupportedOperation = 44,
    /// Invalid window (`MPI_ERR_WIN`)
    Win = 45,
    /// Invalid attribute key (`MPI_ERR_KEYVAL`)
    Keyval = 48,
    /// Invalid displacement unit (`MPI_ERR_DISP`)
    Disp = 52,
}

impl ErrorClass {
    /// Numeric error code of this class.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Look up the class for a numeric error code.
    ///
    /// Returns `None` for codes this runtime never reports.
    pub fn from_code(code: i32) -> Option<Self> {
        let class = match code {
            0 => ErrorClass::Success,
            5 => ErrorClass::Comm,
            6 => ErrorClass::Rank,
            8 => ErrorClass::Group,
            12 => ErrorClass::Arg,
            13 => ErrorClass::Unknown,
            15 => ErrorClass::Other,
            16 => ErrorClass::Intern,
            28 => ErrorClass::Info,
            34 => ErrorClass::NoMem,
            44 => ErrorClass::UnsupportedOperation,
            45 => ErrorClass::Win,
            48 => ErrorClass::Keyval,
            52 => ErrorClass::Disp,
            _ => return None,
        };
        Some(class)
    }

    /// The `MPI_*` name of this class.
    pub fn name(self) -> &'static str {
        match self {
            ErrorClass::Success => "MPI_SUCCESS",
            ErrorClass::Comm => "MPI_ERR_COMM",
            ErrorClass::Rank => "MPI_ERR_RANK",
            ErrorClass::Group => "MPI_ERR_GROUP",
            ErrorClass::Arg => "MPI_ERR_ARG",
            ErrorClass::Unknown => "MPI_ERR_UNKNOWN",
            ErrorClass::Other => "MPI_ERR_OTHER",
            ErrorClass::Intern => "MPI_ERR_INTERN",
            ErrorClass::Info => "MPI_ERR_INFO",
            ErrorClass::NoMem => "MPI_ERR_NO_MEM",
            ErrorClass::UnsupportedOperation => "MPI_ERR_UNSUPPORTED_OPERATION",
            ErrorClass::Win => "MPI_ERR_WIN",
            ErrorClass::Keyval => "MPI_ERR_KEYVAL",
            ErrorClass::Disp => "MPI_ERR_DISP",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error types for MPI operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Operation on the null window or on a window that was already freed
    #[error("Invalid window: {0}")]
    InvalidWindow(&'static str),

    /// Invalid rank specified
    #[error("Invalid rank: {0}")]
    InvalidRank(i32),

    /// Invalid communicator handle
    #[error("Invalid communicator")]
    InvalidCommunicator,

    /// Invalid or freed group
    #[error("Invalid group: {0}")]
    InvalidGroup(&'static str),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid info object or hint
    #[error("Invalid info: {0}")]
    InvalidInfo(String),

    /// Invalid displacement unit
    #[error("Invalid displacement unit: {0}")]
    InvalidDispUnit(i32),

    /// Attribute key that is not known to the runtime.
    ///
    /// Implementations disagree on the class they report for this failure, so
    /// the reported class is carried alongside the key.
    #[error("Unknown attribute key {keyval} (reported as {reported})")]
    UnknownKey {
        /// The offending key
        keyval: i32,
        /// Class reported for the failure by the active vendor profile
        reported: ErrorClass,
    },

    /// Operation not supported (e.g., naming or null-base windows disabled)
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Failure that fits no more specific class
    #[error("MPI error: {0}")]
    Other(String),

    /// Error raised through an error handler with an explicit class
    #[error("MPI error ({0})")]
    Class(ErrorClass),

    /// The universe was aborted by a fatal error
    #[error("Aborted by rank {rank}: {reason}")]
    Aborted {
        /// Rank that triggered the abort
        rank: i32,
        /// Message of the fatal error
        reason: String,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The MPI error class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::InvalidWindow(_) => ErrorClass::Win,
            Error::InvalidRank(_) => ErrorClass::Rank,
            Error::InvalidCommunicator => ErrorClass::Comm,
            Error::InvalidGroup(_) => ErrorClass::Group,
            Error::InvalidArgument(_) => ErrorClass::Arg,
            Error::InvalidInfo(_) => ErrorClass::Info,
            Error::InvalidDispUnit(_) => ErrorClass::Disp,
            Error::UnknownKey { reported, .. } => *reported,
            Error::NotSupported(_) => ErrorClass::UnsupportedOperation,
            Error::Other(_) => ErrorClass::Other,
            Error::Class(class) => *class,
            Error::Aborted { .. } => ErrorClass::Other,
            Error::Internal(_) => ErrorClass::Intern,
        }
    }

    /// Numeric error code of this error's class.
    pub fn code(&self) -> i32 {
        self.class().code()
    }

    /// Whether this error reports an unknown attribute key, whatever class the
    /// vendor profile chose for it.
    pub fn is_unknown_key(&self) -> bool {
        matches!(self, Error::UnknownKey { .. })
    }

    /// Whether this error reports a missing optional feature.
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Error::NotSupported(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_codes_round_trip() {
        for class in [
            ErrorClass::Arg,
            ErrorClass::Win,
            ErrorClass::Keyval,
            ErrorClass::Other,
            ErrorClass::Disp,
        ] {
            assert_eq!(ErrorClass::from_code(class.code()), Some(class));
        }
        assert_eq!(ErrorClass::from_code(9999), None);
    }

    #[test]
    fn variant_classes() {
        assert_eq!(Error::InvalidWindow("null").class(), ErrorClass::Win);
        assert_eq!(
            Error::InvalidArgument("x".into()).class(),
            ErrorClass::Arg
        );
        assert_eq!(
            Error::NotSupported("naming".into()).class(),
            ErrorClass::UnsupportedOperation
        );
        assert_eq!(Error::Other("negative size".into()).code(), 15);
    }

    #[test]
    fn unknown_key_reports_vendor_class() {
        let mpich = Error::UnknownKey {
            keyval: -1,
            reported: ErrorClass::Keyval,
        };
        let ompi = Error::UnknownKey {
            keyval: -1,
            reported: ErrorClass::Other,
        };
        assert!(mpich.is_unknown_key());
        assert!(ompi.is_unknown_key());
        assert_eq!(mpich.class(), ErrorClass::Keyval);
        assert_eq!(ompi.class(), ErrorClass::Other);
        assert!(!Error::Other("x".into()).is_unknown_key());
    }

    #[test]
    fn display_messages() {
        let msg = format!("{}", Error::InvalidWindow("MPI_WIN_NULL"));
        assert!(msg.contains("MPI_WIN_NULL"), "got: {msg}");
        assert_eq!(format!("{}", ErrorClass::Keyval), "MPI_ERR_KEYVAL");
    }
}
