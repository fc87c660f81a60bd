use thiserror::Error;

/// A value that cannot be placed in its slot of a Prisme record.
///
/// Values are never truncated: a 10Q line with a cut off amount or key would
/// be accepted by the receiver with the wrong meaning.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("value {value:?} for field {field} is wider than {width} characters")]
    Overflow {
        field: &'static str,
        value: String,
        width: usize,
    },
    #[error("value {value:?} for field {field} is malformed: {reason}")]
    Malformed {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("field {field} is required")]
    Missing { field: &'static str },
    #[error("field {field} requires field {other}")]
    Requires {
        field: &'static str,
        other: &'static str,
    },
    #[error("field {field} cannot be combined with field {other}")]
    Excludes {
        field: &'static str,
        other: &'static str,
    },
}

impl FieldError {
    /// Name of the offending field, as named in the record format.
    pub fn field(&self) -> &'static str {
        use FieldError::*;
        match self {
            Overflow { field, .. }
            | Malformed { field, .. }
            | Missing { field }
            | Requires { field, .. }
            | Excludes { field, .. } => field,
        }
    }
}
