use super::input_guards::{
    is_array, is_date_string, is_non_empty_string, is_object, is_price_string, is_time_string,
};
use super::{Check, ValidateResult, run_pipeline};
use serde_json::Value;

/// Checks applied to each entry of `items`, in order.
pub const ITEM_PIPELINE: &[Check] = &[check_object, check_short_description, check_price];

/// Checks applied to a whole receipt, in order.
pub const RECEIPT_PIPELINE: &[Check] = &[
    check_object,
    check_retailer,
    check_purchase_date,
    check_purchase_time,
    check_total,
    check_items,
];

pub fn validate_item(input: &Value) -> ValidateResult {
    run_pipeline(ITEM_PIPELINE, input)
}

pub fn validate_receipt(input: &Value) -> ValidateResult {
    run_pipeline(RECEIPT_PIPELINE, input)
}

fn check_object(input: &Value) -> ValidateResult {
    ValidateResult::check(is_object(input), || "not an object".to_string())
}

fn check_property(input: &Value, name: &str, predicate: fn(&Value) -> bool) -> ValidateResult {
    let ok = input.get(name).is_some_and(predicate);
    ValidateResult::check(ok, || format!("property '{name}' is wrong or missing"))
}

fn check_short_description(input: &Value) -> ValidateResult {
    check_property(input, "shortDescription", is_non_empty_string)
}

fn check_price(input: &Value) -> ValidateResult {
    check_property(input, "price", is_price_string)
}

fn check_retailer(input: &Value) -> ValidateResult {
    check_property(input, "retailer", is_non_empty_string)
}

fn check_purchase_date(input: &Value) -> ValidateResult {
    check_property(input, "purchaseDate", is_date_string)
}

fn check_purchase_time(input: &Value) -> ValidateResult {
    check_property(input, "purchaseTime", is_time_string)
}

fn check_total(input: &Value) -> ValidateResult {
    check_property(input, "total", is_price_string)
}

fn check_items(input: &Value) -> ValidateResult {
    let Some(items) = input
        .get("items")
        .filter(|v| is_array(v))
        .and_then(Value::as_array)
    else {
        return ValidateResult::invalid("property 'items': not an array");
    };

    if items.is_empty() {
        return ValidateResult::invalid("property 'items': can not be empty");
    }

    items
        .iter()
        .enumerate()
        .find_map(|(index, item)| match validate_item(item) {
            ValidateResult::Valid => None,
            ValidateResult::Invalid(error) => {
                Some(error.nested_in(format!("property 'items' [{index}]")))
            }
        })
        .map_or(ValidateResult::Valid, ValidateResult::Invalid)
}
