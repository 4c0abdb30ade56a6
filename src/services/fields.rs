//! Request field handling shared by the service inputs.
//!
//! Patch bodies distinguish three states per nullable field: absent (leave
//! unchanged), `null` (clear) and a value. Absent deserializes to `None`,
//! `null` to `Some(None)`.

use serde::{Deserialize, Deserializer};

use super::error::ServiceError;

/// Deserializer for `Option<Option<T>>` patch fields, used with `#[serde(default)]`
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// Trim a required text field; `None` when absent or blank
pub fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Optional text field where an empty string means "no value"
pub fn nullable(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Resolve a nullable patch field: `None` leaves the column alone,
/// `Some(None)` clears it.
pub fn nullable_patch(value: Option<Option<String>>) -> Option<Option<String>> {
    value.map(nullable)
}

/// A non-nullable column in a patch: present values must not be blank
pub fn non_blank_patch(field: &str, value: Option<String>) -> Result<Option<String>, ServiceError> {
    match value {
        None => Ok(None),
        Some(v) => match required(Some(v)) {
            Some(trimmed) => Ok(Some(trimmed)),
            None => Err(ServiceError::missing_fields(format!("{field} cannot be empty."), &[field])),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        tags: Option<Option<String>>,
    }

    #[test]
    fn distinguishes_absent_null_and_value() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let null: Patch = serde_json::from_str(r#"{"tags": null}"#).unwrap();
        let value: Patch = serde_json::from_str(r#"{"tags": "a,b"}"#).unwrap();

        assert_eq!(absent.tags, None);
        assert_eq!(null.tags, Some(None));
        assert_eq!(value.tags, Some(Some("a,b".to_string())));
    }

    #[test]
    fn text_helpers_normalise_blanks() {
        assert_eq!(required(Some("  ada ".to_string())), Some("ada".to_string()));
        assert_eq!(required(Some("   ".to_string())), None);
        assert_eq!(required(None), None);
        assert_eq!(nullable_patch(Some(Some("".to_string()))), Some(None));
        assert_eq!(nullable_patch(Some(Some(" x ".to_string()))), Some(Some("x".to_string())));
        assert_eq!(nullable_patch(None), None);
    }

    #[test]
    fn blank_values_for_required_columns_are_rejected() {
        assert_eq!(non_blank_patch("name", None).unwrap(), None);
        assert_eq!(non_blank_patch("name", Some(" Sales ".into())).unwrap(), Some("Sales".into()));
        assert!(matches!(
            non_blank_patch("name", Some("  ".into())),
            Err(ServiceError::Validation { .. })
        ));
    }
}
