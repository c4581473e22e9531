//! Parsing of free-text classifier replies
//!
//! Each parser returns `None` when the reply cannot be interpreted, which
//! the classifier treats as malformed output.

use crate::state_machine::Route;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?[0-9]+").expect("integer pattern is valid"));

const ENGLISH_NUMBERS: &[(&str, u32)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("dozen", 12),
    ("thirteen", 13),
    ("fourteen", 14),
    ("fifteen", 15),
    ("sixteen", 16),
    ("seventeen", 17),
    ("eighteen", 18),
    ("nineteen", 19),
    ("twenty", 20),
];

// Thai is written without spaces, so these are matched as substrings.
const THAI_NUMBERS: &[(&str, u32)] = &[
    ("หนึ่ง", 1),
    ("สอง", 2),
    ("สาม", 3),
    ("สี่", 4),
    ("ห้า", 5),
    ("หก", 6),
    ("เจ็ด", 7),
    ("แปด", 8),
    ("เก้า", 9),
    ("สิบ", 10),
];

/// Any reply mentioning "order" routes to the order flow
pub fn route(reply: &str) -> Route {
    if reply.to_lowercase().contains("order") {
        Route::Order
    } else {
        Route::Greeting
    }
}

/// Product mentions from a JSON array, possibly surrounded by prose.
///
/// Takes the whole reply when it is an array, otherwise the first
/// well-formed `[...]` substring. Non-string and blank elements are dropped.
pub fn product_list(reply: &str) -> Option<Vec<String>> {
    let trimmed = reply.trim();
    let array = serde_json::from_str::<Vec<Value>>(trimmed)
        .ok()
        .or_else(|| first_embedded_array(trimmed))?;

    Some(
        array
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => {
                    let s = s.trim();
                    (!s.is_empty()).then(|| s.to_string())
                }
                _ => None,
            })
            .collect(),
    )
}

fn first_embedded_array(text: &str) -> Option<Vec<Value>> {
    let opens = text.match_indices('[').map(|(i, _)| i);
    for start in opens {
        let closes = text
            .match_indices(']')
            .map(|(i, _)| i)
            .filter(|&end| end > start);
        for end in closes {
            let Some(candidate) = text.get(start..=end) else {
                continue;
            };
            if let Ok(array) = serde_json::from_str::<Vec<Value>>(candidate) {
                return Some(array);
            }
        }
    }
    None
}

/// "YES" anywhere in the reply means the customer wants to order
pub fn order_intent(reply: &str) -> bool {
    reply.to_uppercase().contains("YES")
}

/// Quantity from digits or a number word; negative numbers count as zero
pub fn quantity(reply: &str) -> Option<u32> {
    let reply: String = reply.chars().map(thai_digit_to_ascii).collect();
    if let Some(m) = INTEGER.find(&reply) {
        let value: i64 = m.as_str().parse().ok()?;
        return Some(u32::try_from(value.max(0)).unwrap_or(u32::MAX));
    }

    let lower = reply.to_lowercase();
    let english = lower
        .split(|c: char| !c.is_alphabetic())
        .find_map(|token| {
            ENGLISH_NUMBERS
                .iter()
                .find(|(word, _)| *word == token)
                .map(|&(_, n)| n)
        });
    if english.is_some() {
        return english;
    }

    THAI_NUMBERS
        .iter()
        .filter_map(|&(word, n)| lower.find(word).map(|pos| (pos, n)))
        .min_by_key(|&(pos, _)| pos)
        .map(|(_, n)| n)
}

// ๐..๙
fn thai_digit_to_ascii(c: char) -> char {
    match c {
        '\u{0E50}'..='\u{0E59}' => char::from_digit(u32::from(c) - 0x0E50, 10).unwrap_or(c),
        _ => c,
    }
}

/// Strict positive integer, used for direct answers to the quantity prompt
pub fn positive_integer(reply: &str) -> Result<u32, QuantityInputError> {
    let value: i64 = reply
        .trim()
        .parse()
        .map_err(|_| QuantityInputError::NotANumber)?;
    if value <= 0 {
        return Err(QuantityInputError::NotPositive);
    }
    u32::try_from(value).map_err(|_| QuantityInputError::NotANumber)
}

/// Why a quantity reply was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QuantityInputError {
    #[error("quantity is not a number")]
    NotANumber,
    #[error("quantity must be positive")]
    NotPositive,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route() {
        assert_eq!(route("order"), Route::Order);
        assert_eq!(route("  ORDER\n"), Route::Order);
        assert_eq!(route("greeting"), Route::Greeting);
        assert_eq!(route("I am not sure"), Route::Greeting);
    }

    #[test]
    fn test_product_list_plain_array() {
        assert_eq!(
            product_list(r#"["apple", "orange"]"#),
            Some(vec!["apple".to_string(), "orange".to_string()])
        );
        assert_eq!(product_list("[]"), Some(vec![]));
    }

    #[test]
    fn test_product_list_embedded_in_prose() {
        let reply = "Sure! Here are the products:\n```json\n[\"milk\", \"bread\"]\n```\nLet me know.";
        assert_eq!(
            product_list(reply),
            Some(vec!["milk".to_string(), "bread".to_string()])
        );
    }

    #[test]
    fn test_product_list_skips_malformed_brackets() {
        let reply = "Note [see below] the answer: [\"grape\"]";
        assert_eq!(product_list(reply), Some(vec!["grape".to_string()]));
    }

    #[test]
    fn test_product_list_drops_non_strings() {
        assert_eq!(
            product_list(r#"["apple", 3, null, "  ", "milk"]"#),
            Some(vec!["apple".to_string(), "milk".to_string()])
        );
    }

    #[test]
    fn test_product_list_without_array_is_malformed() {
        assert_eq!(product_list("I could not find any products."), None);
        assert_eq!(product_list("{\"products\": 1}"), None);
    }

    #[test]
    fn test_order_intent() {
        assert!(order_intent("YES"));
        assert!(order_intent("yes."));
        assert!(!order_intent("NO"));
        assert!(!order_intent(""));
    }

    #[test]
    fn test_quantity_digits() {
        assert_eq!(quantity("3"), Some(3));
        assert_eq!(quantity(" 12 \n"), Some(12));
        assert_eq!(quantity("The quantity is 4."), Some(4));
        assert_eq!(quantity("0"), Some(0));
        assert_eq!(quantity("-2"), Some(0));
    }

    #[test]
    fn test_quantity_words() {
        assert_eq!(quantity("three"), Some(3));
        assert_eq!(quantity("A dozen, please"), Some(12));
        assert_eq!(quantity("สาม"), Some(3));
        assert_eq!(quantity("เอาห้าลูก"), Some(5));
        assert_eq!(quantity("none mentioned"), None);
    }

    #[test]
    fn test_quantity_thai_digits() {
        assert_eq!(quantity("เอา ๓ ลูก"), Some(3));
        assert_eq!(quantity("๑๒"), Some(12));
        // Other scripts' digits are not numbers here; words still apply
        assert_eq!(quantity("٣ three"), Some(3));
    }

    #[test]
    fn test_positive_integer() {
        assert_eq!(positive_integer(" 5 "), Ok(5));
        assert_eq!(positive_integer("abc"), Err(QuantityInputError::NotANumber));
        assert_eq!(positive_integer("0"), Err(QuantityInputError::NotPositive));
        assert_eq!(positive_integer("-1"), Err(QuantityInputError::NotPositive));
        assert_eq!(positive_integer("2.5"), Err(QuantityInputError::NotANumber));
    }
}
