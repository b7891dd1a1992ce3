use crate::db::{
    job::JobSpecError, range::KeyRangeError, registry::RegistryError, store::StoreError,
};
use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Every domain error converts into this type at the public boundary; the
/// typed domain error is kept in `detail` so callers can match on it.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    /// The variant (if present) must correspond to `origin`.
    pub detail: Option<ErrorDetail>,
}

impl InternalError {
    /// Construct an InternalError without structured detail.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Construct an InternalError carrying one structured detail payload.
    pub(crate) fn with_detail(
        class: ErrorClass,
        origin: ErrorOrigin,
        message: impl Into<String>,
        detail: ErrorDetail,
    ) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: Some(detail),
        }
    }

    /// Construct a serialize-origin internal error.
    pub(crate) fn serialize_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Serialize, message.into())
    }

    /// Construct a reader-origin corruption error (malformed serialized reader).
    pub(crate) fn reader_corruption(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Corruption, ErrorOrigin::Reader, message.into())
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }

    /// Borrow the range detail, if this error came from key-range handling.
    #[must_use]
    pub const fn as_key_range_error(&self) -> Option<&KeyRangeError> {
        match &self.detail {
            Some(ErrorDetail::Range(err)) => Some(err),
            _ => None,
        }
    }

    /// Borrow the registry detail, if this error came from name resolution.
    #[must_use]
    pub const fn as_registry_error(&self) -> Option<&RegistryError> {
        match &self.detail {
            Some(ErrorDetail::Registry(err)) => Some(err),
            _ => None,
        }
    }

    /// Borrow the store detail, if this error came from a store adapter.
    #[must_use]
    pub const fn as_store_error(&self) -> Option<&StoreError> {
        match &self.detail {
            Some(ErrorDetail::Store(err)) => Some(err),
            _ => None,
        }
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`InternalError`].
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Range(KeyRangeError),

    #[error("{0}")]
    Registry(RegistryError),

    #[error("{0}")]
    Store(StoreError),

    #[error("{0}")]
    Job(JobSpecError),
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Corruption,
    NotFound,
    Internal,
    Unsupported,
    InvariantViolation,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Corruption => "corruption",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
            Self::Unsupported => "unsupported",
            Self::InvariantViolation => "invariant_violation",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Config,
    Range,
    Reader,
    Registry,
    Serialize,
    Store,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Config => "config",
            Self::Range => "range",
            Self::Reader => "reader",
            Self::Registry => "registry",
            Self::Serialize => "serialize",
            Self::Store => "store",
        };
        write!(f, "{label}")
    }
}
