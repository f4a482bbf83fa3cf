//! Utility functions for the search sync repository.

use crate::errors::SearchIndexError;

/// Maximum length of an index uid accepted by the index service.
const MAX_INDEX_UID_LEN: usize = 400;

/// Validate an index uid before it is interpolated into a request path.
///
/// Index uids may contain only alphanumeric characters, hyphens and
/// underscores.
///
/// # Example
///
/// ```
/// use search_sync_repository::validate_index_uid;
///
/// assert!(validate_index_uid("articles_new").is_ok());
/// assert!(validate_index_uid("../tasks").is_err());
/// ```
pub fn validate_index_uid(uid: &str) -> Result<(), SearchIndexError> {
    if uid.is_empty() {
        return Err(SearchIndexError::validation("Index uid cannot be empty"));
    }

    if uid.len() > MAX_INDEX_UID_LEN {
        return Err(SearchIndexError::validation(format!(
            "Index uid '{}' is longer than {} characters",
            uid, MAX_INDEX_UID_LEN
        )));
    }

    if !uid
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(SearchIndexError::validation(format!(
            "Index uid '{}' contains invalid characters. Only alphanumeric characters, hyphens and underscores are allowed",
            uid
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_index_uid_valid() {
        for uid in ["articles", "articles_new", "images-v2", "A1"] {
            assert!(validate_index_uid(uid).is_ok(), "{}", uid);
        }
    }

    #[test]
    fn test_validate_index_uid_empty() {
        let result = validate_index_uid("");
        assert!(matches!(
            result.unwrap_err(),
            SearchIndexError::ValidationError(_)
        ));
    }

    #[test]
    fn test_validate_index_uid_invalid_characters() {
        let test_cases = vec![
            ("articles/new", "contains slash"),
            ("articles new", "contains space"),
            ("articles.new", "contains dot"),
            ("articles?x=1", "contains query"),
            ("..", "path traversal"),
            ("articlés", "non-ascii"),
        ];

        for (uid, description) in test_cases {
            let result = validate_index_uid(uid);
            assert!(
                matches!(result, Err(SearchIndexError::ValidationError(_))),
                "Expected ValidationError for uid '{}' ({})",
                uid,
                description
            );
        }
    }

    #[test]
    fn test_validate_index_uid_too_long() {
        let uid = "a".repeat(MAX_INDEX_UID_LEN + 1);
        assert!(validate_index_uid(&uid).is_err());
    }
}
