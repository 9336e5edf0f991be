//! Hadron error abstractions.

use thiserror::Error;

use crate::plan::PhysicalPlanType;

// Error messages.
pub const ERR_ITER_FAILURE: &str = "error returned during key/value iteration from database";
pub const ERR_DB_FLUSH: &str = "error flushing database state";

/// Application error variants.
#[derive(Debug, Error)]
pub enum AppError {
    /// The plan's type tag is not recognized by the entry point which received it.
    ///
    /// This covers both tags which are not part of the closed set at all (version skew, a
    /// corrupted log) and known tags handed to the wrong entry point, e.g. a mutation plan given
    /// to the query path.
    #[error("unknown physical plan type: {0}")]
    UnknownPhysicalPlanType(UnknownPlanType),
    /// A plan could not be decoded from its encoded form.
    #[error("error decoding physical plan: {0}")]
    MalformedPlan(String),
    /// The server has hit an internal error, but will remain online.
    #[error("internal server error")]
    Ise(#[from] anyhow::Error),
}

/// The offending tag of an `UnknownPhysicalPlanType` error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnknownPlanType {
    /// A raw tag which is not part of the closed plan set.
    Raw(i32),
    /// A known tag which was given to an entry point which does not handle it.
    Mismatched(PhysicalPlanType),
}

impl std::fmt::Display for UnknownPlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw(tag) => write!(f, "{}", tag),
            Self::Mismatched(plan_type) => write!(f, "{:?}", plan_type),
        }
    }
}

impl AppError {
    /// Build an error for a raw tag outside of the closed plan set.
    pub fn unknown_tag(tag: i32) -> Self {
        AppError::UnknownPhysicalPlanType(UnknownPlanType::Raw(tag))
    }

    /// Build an error for a known plan type given to the wrong entry point.
    pub fn mismatched(plan_type: PhysicalPlanType) -> Self {
        AppError::UnknownPhysicalPlanType(UnknownPlanType::Mismatched(plan_type))
    }
}

/// The error type used to indicate that a system shutdown is required.
#[derive(Debug, thiserror::Error)]
#[error("fatal error: {0}")]
pub struct ShutdownError(#[from] pub anyhow::Error);

/// A result type where the error is a `ShutdownError`.
pub type ShutdownResult<T> = ::std::result::Result<T, ShutdownError>;

/// A result type where the error is an `AppError`.
pub type AppResult<T> = ::std::result::Result<T, AppError>;
