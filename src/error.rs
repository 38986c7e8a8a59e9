use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse classification of an [`Error`], stable across message changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Internal,
    InvalidOperation,
    InvalidArgument,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A defect in the calling system, e.g. a composite that ran out of child slots.
    #[error("internal error: {0}")]
    Internal(String),
    /// The operation is not meaningful for this object.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Internal(_) => ErrorKind::Internal,
            Error::InvalidOperation(_) => ErrorKind::InvalidOperation,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }

    /// The error every geometry setter returns unless the concrete kind overrides it.
    pub(crate) fn not_supported() -> Self {
        Error::InvalidOperation("operation not supported for this geometry".into())
    }
}
