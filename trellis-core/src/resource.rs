//! Composite resource identifier parsing
//!
//! Upstream resources are referenced by composite identifiers of the form
//! `<collection>/<id>[/<collection>/<id>]*`, e.g. `source-connectors/my-slack`
//! or `models/m1/instances/latest`. The same layout is used for both name-form
//! identifiers (human-assigned, renamable) and permalink-form identifiers
//! (registry-assigned UIDs, immutable).
//!
//! These are pure parsing helpers; no I/O happens here.

use thiserror::Error;

/// Result type alias for locator operations
pub type Result<T> = std::result::Result<T, ResourceError>;

/// Errors produced while parsing composite resource identifiers
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResourceError {
    /// The identifier is not a sequence of `<collection>/<id>` pairs
    #[error("malformed resource identifier: {0:?}")]
    MalformedIdentifier(String),
}

/// Splits an identifier into its trailing `(collection_id, resource_id)` pair.
///
/// For a nested identifier the trailing pair belongs to the innermost
/// resource: `locate("models/m1/instances/latest")` yields
/// `("instances", "latest")`.
///
/// A well-formed identifier is one or more `<collection>/<id>` pairs, so an
/// odd segment count or an empty segment is rejected as malformed.
pub fn locate(identifier: &str) -> Result<(&str, &str)> {
    let segments: Vec<&str> = identifier.split('/').collect();

    if segments.len() < 2 || segments.len() % 2 != 0 || segments.iter().any(|s| s.is_empty()) {
        return Err(ResourceError::MalformedIdentifier(identifier.to_string()));
    }

    Ok((segments[segments.len() - 2], segments[segments.len() - 1]))
}

/// Returns the collection id preceding the identifier's terminal id.
pub fn collection_id(identifier: &str) -> Result<&str> {
    locate(identifier).map(|(collection, _)| collection)
}

/// Returns the identifier's terminal id.
pub fn resource_id(identifier: &str) -> Result<&str> {
    locate(identifier).map(|(_, id)| id)
}

/// Removes the trailing `/collection_id/id` pair, yielding the parent
/// identifier.
///
/// Used to walk from a nested resource to its owner, e.g. from
/// `models/m1/instances/latest` (with pair `instances`/`latest`) to
/// `models/m1`. Fails when the identifier does not end with the given pair
/// or when stripping would leave nothing.
pub fn strip_suffix<'a>(identifier: &'a str, collection_id: &str, id: &str) -> Result<&'a str> {
    let suffix = format!("/{collection_id}/{id}");

    identifier
        .strip_suffix(suffix.as_str())
        .filter(|parent| !parent.is_empty())
        .ok_or_else(|| ResourceError::MalformedIdentifier(identifier.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_simple_identifier() {
        assert_eq!(
            locate("source-connectors/my-slack"),
            Ok(("source-connectors", "my-slack"))
        );
    }

    #[test]
    fn test_locate_nested_identifier() {
        assert_eq!(
            locate("models/m1/instances/latest"),
            Ok(("instances", "latest"))
        );
    }

    #[test]
    fn test_locate_rejects_malformed() {
        for identifier in ["", "my-slack", "a/b/c", "a//b", "/a/b", "a/b/"] {
            assert_eq!(
                locate(identifier),
                Err(ResourceError::MalformedIdentifier(identifier.to_string())),
                "expected {identifier:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_collection_and_resource_id() {
        assert_eq!(collection_id("destination-connectors/my-pg"), Ok("destination-connectors"));
        assert_eq!(resource_id("destination-connectors/my-pg"), Ok("my-pg"));
    }

    #[test]
    fn test_strip_suffix_removes_exactly_the_trailing_pair() {
        assert_eq!(
            strip_suffix("models/m1/instances/latest", "instances", "latest"),
            Ok("models/m1")
        );
    }

    #[test]
    fn test_strip_suffix_rejects_mismatched_pair() {
        assert!(strip_suffix("models/m1/instances/latest", "instances", "v2").is_err());
    }

    #[test]
    fn test_strip_suffix_rejects_when_nothing_remains() {
        assert!(strip_suffix("instances/latest", "instances", "latest").is_err());
    }
}
