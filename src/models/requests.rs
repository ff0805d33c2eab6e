//! Request DTOs for the admin API
//!
//! Defines the query parameters accepted by the admin endpoints.

use serde::Deserialize;

/// Query string of `DELETE /invalidate/:category`
///
/// # Fields
/// - `pattern`: `*` glob relative to the instance namespace (default `*`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvalidateQuery {
    #[serde(default)]
    pub pattern: Option<String>,
}

impl InvalidateQuery {
    /// The pattern to invalidate; everything when none was given.
    pub fn pattern(&self) -> &str {
        match self.pattern.as_deref() {
            Some(pattern) if !pattern.is_empty() => pattern,
            _ => "*",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidate_query_deserialize() {
        let json = r#"{"pattern": "list:5:*"}"#;
        let query: InvalidateQuery = serde_json::from_str(json).unwrap();
        assert_eq!(query.pattern(), "list:5:*");
    }

    #[test]
    fn test_missing_pattern_means_everything() {
        let query: InvalidateQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.pattern(), "*");

        let query = InvalidateQuery {
            pattern: Some(String::new()),
        };
        assert_eq!(query.pattern(), "*");
    }
}
