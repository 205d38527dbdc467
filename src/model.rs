use crate::validation::{SchemaError, validate_receipt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ReceiptError {
    /// The input does not satisfy the receipt schema
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// The input passed validation but did not decode into [`Receipt`]
    #[error("validated receipt failed to decode: {0}")]
    Decode(#[source] serde_json::Error),
}

/// One line entry of a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub short_description: String,
    pub price: String,
}

/// A purchase receipt as submitted by clients.
///
/// Construct from untrusted input with [`Receipt::from_json`]; the points
/// calculation assumes the schema has already been checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub retailer: String,
    pub purchase_date: String,
    pub purchase_time: String,
    pub total: String,
    pub items: Vec<Item>,
}

impl Receipt {
    /// Validate `value` against the receipt schema and convert it.
    pub fn from_json(value: Value) -> Result<Self, ReceiptError> {
        validate_receipt(&value).into_result()?;
        serde_json::from_value(value).map_err(|error| {
            // The schema admits exactly what the struct accepts, so this is
            // a drift between validator and model.
            tracing::error!(%error, "validated receipt failed to deserialize");
            debug_assert!(false, "validated receipt failed to deserialize: {error}");
            ReceiptError::Decode(error)
        })
    }
}

/// Identifier a stored receipt is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptId(Uuid);

impl ReceiptId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ReceiptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ReceiptId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessReceiptResponse {
    pub id: ReceiptId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsResponse {
    pub points: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target() -> Value {
        json!({
            "retailer": "Target",
            "purchaseDate": "2022-01-01",
            "purchaseTime": "13:01",
            "total": "6.49",
            "items": [{ "shortDescription": "Mountain Dew 12PK", "price": "6.49" }]
        })
    }

    #[test]
    fn from_json_accepts_valid_receipt() {
        let receipt = Receipt::from_json(target()).expect("valid receipt");
        assert_eq!(receipt.retailer, "Target");
        assert_eq!(receipt.items[0].short_description, "Mountain Dew 12PK");
    }

    #[test]
    fn from_json_reports_schema_reason() {
        let mut value = target();
        value["total"] = json!(6.49);
        let error = Receipt::from_json(value).expect_err("invalid total");
        assert_matches::assert_matches!(
            error,
            ReceiptError::Schema(ref schema)
                if schema.reason() == "property 'total' is wrong or missing"
        );
        assert_eq!(error.to_string(), "property 'total' is wrong or missing");
    }

    #[test]
    fn receipt_serializes_with_camel_case_keys() {
        let receipt = Receipt::from_json(target()).expect("valid receipt");
        let value = serde_json::to_value(&receipt).expect("serialize");
        assert_eq!(value["purchaseDate"], "2022-01-01");
        assert_eq!(value["items"][0]["shortDescription"], "Mountain Dew 12PK");
    }

    #[test]
    fn receipt_id_round_trips_through_text() {
        let id = ReceiptId::generate();
        let parsed: ReceiptId = id.to_string().parse().expect("parse id");
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<ReceiptId>().is_err());
    }

    #[test]
    fn process_response_shape() {
        let id = ReceiptId::generate();
        let body = serde_json::to_value(ProcessReceiptResponse { id }).expect("serialize");
        assert_eq!(body, json!({ "id": id.to_string() }));
    }
}
