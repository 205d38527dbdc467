//! Reward points for a validated receipt.
//!
//! The score is the sum of independent rules. Each rule reads the textual
//! fields of the receipt directly; amounts are handled as integer cents so
//! the result is exact.

use crate::model::{Item, Receipt};
use serde::Serialize;

const ROUND_DOLLAR_POINTS: u64 = 50;
const QUARTER_MULTIPLE_POINTS: u64 = 25;
const POINTS_PER_ITEM_PAIR: u64 = 5;
const ODD_DAY_POINTS: u64 = 6;
const AFTERNOON_POINTS: u64 = 10;
/// Exclusive `HHMM` bounds of the afternoon window.
const AFTERNOON_WINDOW: (u64, u64) = (1400, 1600);
/// `ceil(price * 0.2)` is `ceil(cents / 500)`.
const CENTS_PER_DESCRIPTION_POINT: u64 = 500;

/// Points awarded for `receipt`.
///
/// `receipt` must have passed schema validation; the rules do not re-check
/// formats.
///
/// ```
/// use receipt_points::model::Receipt;
/// use receipt_points::points::compute;
///
/// let receipt = Receipt::from_json(serde_json::json!({
///     "retailer": "Walgreens",
///     "purchaseDate": "2022-01-02",
///     "purchaseTime": "08:13",
///     "total": "2.65",
///     "items": [
///         { "shortDescription": "Pepsi - 12-oz", "price": "1.25" },
///         { "shortDescription": "Dasani", "price": "1.40" }
///     ]
/// }))
/// .unwrap();
/// assert_eq!(compute(&receipt), 15);
/// ```
pub fn compute(receipt: &Receipt) -> u64 {
    PointsBreakdown::for_receipt(receipt).total()
}

/// Contribution of each rule to a receipt's score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PointsBreakdown {
    /// One point per ASCII letter or digit in the retailer name.
    pub retailer_name: u64,
    pub round_dollar: u64,
    pub quarter_multiple: u64,
    pub item_pairs: u64,
    pub item_descriptions: u64,
    pub odd_day: u64,
    pub afternoon: u64,
}

impl PointsBreakdown {
    pub fn for_receipt(receipt: &Receipt) -> Self {
        let cents = total_cents_token(&receipt.total);

        Self {
            retailer_name: retailer_name_points(&receipt.retailer),
            round_dollar: if cents == "00" { ROUND_DOLLAR_POINTS } else { 0 },
            quarter_multiple: if matches!(cents, "00" | "25" | "50" | "75") {
                QUARTER_MULTIPLE_POINTS
            } else {
                0
            },
            item_pairs: POINTS_PER_ITEM_PAIR.saturating_mul((receipt.items.len() / 2) as u64),
            item_descriptions: receipt
                .items
                .iter()
                .map(item_description_points)
                .fold(0, u64::saturating_add),
            odd_day: if purchase_day(&receipt.purchase_date) % 2 == 1 {
                ODD_DAY_POINTS
            } else {
                0
            },
            afternoon: {
                let time = digits_value(&receipt.purchase_time);
                if AFTERNOON_WINDOW.0 < time && time < AFTERNOON_WINDOW.1 {
                    AFTERNOON_POINTS
                } else {
                    0
                }
            },
        }
    }

    pub fn total(&self) -> u64 {
        [
            self.retailer_name,
            self.round_dollar,
            self.quarter_multiple,
            self.item_pairs,
            self.item_descriptions,
            self.odd_day,
            self.afternoon,
        ]
        .into_iter()
        .fold(0, u64::saturating_add)
    }
}

fn retailer_name_points(retailer: &str) -> u64 {
    retailer.chars().filter(char::is_ascii_alphanumeric).count() as u64
}

/// Everything after the last `.` of the total.
fn total_cents_token(total: &str) -> &str {
    total.rsplit('.').next().unwrap_or(total)
}

fn item_description_points(item: &Item) -> u64 {
    // A whitespace-only description trims to length zero and still qualifies.
    if item.short_description.trim().chars().count() % 3 == 0 {
        digits_value(&item.price).div_ceil(CENTS_PER_DESCRIPTION_POINT)
    } else {
        0
    }
}

/// Day of month: the token after the last `-` of `YYYY-MM-DD`.
fn purchase_day(purchase_date: &str) -> u64 {
    digits_value(purchase_date.rsplit('-').next().unwrap_or(purchase_date))
}

/// Integer formed by the ASCII digits of `text`, skipping separators.
///
/// `"12.25"` reads as 1225 cents and `"14:33"` as 1433. Values beyond `u64`
/// saturate.
fn digits_value(text: &str) -> u64 {
    text.bytes()
        .filter(u8::is_ascii_digit)
        .fold(0u64, |acc, digit| {
            acc.saturating_mul(10)
                .saturating_add(u64::from(digit - b'0'))
        })
}
