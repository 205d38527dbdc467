//! Receipt schema validation.
//!
//! Validation is a short-circuiting pipeline: an ordered, fixed list of pure
//! checks runs against the candidate JSON value and the first failing check
//! determines the reported reason. Invalid input is an expected outcome and is
//! reported through [`ValidateResult`], never through a panic.
//!
//! ```
//! use receipt_points::validation::{ValidateResult, validate_receipt};
//!
//! let result = validate_receipt(&serde_json::json!({ "retailer": "Target" }));
//! assert_eq!(
//!     result,
//!     ValidateResult::invalid("property 'purchaseDate' is wrong or missing")
//! );
//! ```

pub mod input_guards;
pub mod schema;

pub use input_guards::{
    days_in_month, is_array, is_date_string, is_leap_year, is_non_empty_string, is_object,
    is_price_string, is_time_string,
};
pub use schema::{ITEM_PIPELINE, RECEIPT_PIPELINE, validate_item, validate_receipt};

use serde_json::Value;
use thiserror::Error;

/// Reason a value failed schema validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct SchemaError {
    reason: String,
}

impl SchemaError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Prefix the reason with the location of the nested value that failed.
    pub fn nested_in(self, location: impl std::fmt::Display) -> Self {
        Self {
            reason: format!("{location}: {}", self.reason),
        }
    }
}

/// Outcome of running a validation pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidateResult {
    Valid,
    Invalid(SchemaError),
}

impl ValidateResult {
    pub fn invalid(reason: impl Into<String>) -> Self {
        ValidateResult::Invalid(SchemaError::new(reason))
    }

    /// `Valid` when `ok` holds, otherwise `Invalid` with the given reason.
    pub fn check(ok: bool, reason: impl FnOnce() -> String) -> Self {
        if ok {
            ValidateResult::Valid
        } else {
            ValidateResult::Invalid(SchemaError::new(reason()))
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidateResult::Valid)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ValidateResult::Valid => None,
            ValidateResult::Invalid(error) => Some(error.reason()),
        }
    }

    pub fn into_result(self) -> Result<(), SchemaError> {
        match self {
            ValidateResult::Valid => Ok(()),
            ValidateResult::Invalid(error) => Err(error),
        }
    }
}

/// A single pipeline stage.
pub type Check = fn(&Value) -> ValidateResult;

/// Run `pipeline` in order against `input`, stopping at the first failure.
pub fn run_pipeline(pipeline: &[Check], input: &Value) -> ValidateResult {
    pipeline
        .iter()
        .map(|check| check(input))
        .find(|result| !result.is_valid())
        .unwrap_or(ValidateResult::Valid)
}
