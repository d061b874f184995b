//! Search-criteria validation and query composition.
//!
//! # Responsibility
//! - Translate named search criteria into one composed server query.
//! - Reject malformed criteria before anything touches the wire.
//!
//! # Invariants
//! - Every recognized criterion contributes exactly one filter clause.
//! - Composed queries keep their structured filter list alongside the
//!   rendered text, so backends are free to evaluate either form.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod criteria;
mod like;

pub use criteria::{ComposedQuery, Criteria, CriterionValue, Filter, QueryParam};
pub use like::like_match;

pub type QueryResult<T> = Result<T, QueryError>;

/// Criteria validation error; construction aborts on the first failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// No criterion produced a bindable parameter.
    EmptyCriteria,
    /// Criterion name is not one of the recognized search keys.
    UnknownCriterion(String),
    /// Criterion value has the wrong shape for its name.
    InvalidCriterion {
        name: String,
        expected: &'static str,
    },
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCriteria => write!(f, "no criteria to query"),
            Self::UnknownCriterion(name) => write!(f, "unknown query criterion: {name}"),
            Self::InvalidCriterion { name, expected } => {
                write!(f, "invalid value for `{name}`: expected {expected}")
            }
        }
    }
}

impl Error for QueryError {}
