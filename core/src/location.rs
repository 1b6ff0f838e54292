#![deny(missing_docs)]

//! # Document Locations
//!
//! Canonical addressing for documents. Every location is held as an absolute
//! `Url` (`file://` for the filesystem, `http(s)://` for remote documents) so
//! that relative pointers can be joined with RFC 3986 semantics and so that
//! the same document is always keyed by the same string.

use crate::error::{LoadError, LoadResult};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Valid YAML mime types.
const YAML_MIMES: [&str; 4] = [
    "text/yaml",
    "text/x-yaml",
    "application/yaml",
    "application/x-yaml",
];

/// Valid YAML extensions.
const YAML_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Absolute, canonical location of a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    url: Url,
}

impl Location {
    /// Parses a user supplied path or URL.
    ///
    /// `http:`/`https:` inputs are remote; anything else is treated as a
    /// filesystem path and made absolute against the current directory.
    pub fn parse(input: &str) -> LoadResult<Self> {
        if is_remote(input) {
            let url = Url::parse(input).map_err(|e| invalid(input, e))?;
            return Ok(Self { url });
        }

        let absolute = std::path::absolute(Path::new(input)).map_err(|e| invalid(input, e))?;
        Self::from_path(&absolute).ok_or_else(|| invalid(input, "not an absolute path"))
    }

    /// Builds a location from an absolute filesystem path.
    pub fn from_path(path: &Path) -> Option<Self> {
        // Re-parsing removes `.` and `..` segments.
        let url = Url::from_file_path(path).ok()?;
        Url::parse(url.as_str()).ok().map(|url| Self { url })
    }

    /// Resolves a pointer's external part relative to this location.
    ///
    /// e.g. `/specs/api.yaml` + `../shared/pet.yaml` -> `/shared/pet.yaml`
    pub fn join(&self, reference: &str) -> LoadResult<Self> {
        if is_remote(reference) {
            return Self::parse(reference);
        }
        let url = self
            .url
            .join(reference)
            .map_err(|e| invalid(reference, e))?;
        Ok(Self { url })
    }

    /// Whether the document is fetched over the network.
    pub fn is_remote(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }

    /// The underlying URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The filesystem path, for `file://` locations.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        if self.is_remote() {
            return None;
        }
        self.url.to_file_path().ok()
    }

    /// The canonical string key used by the registry and in rewritten pointers.
    ///
    /// Absolute path for files, full URL for remote documents.
    pub fn key(&self) -> String {
        match self.to_file_path() {
            Some(path) => path.to_string_lossy().into_owned(),
            None => self.url.to_string(),
        }
    }

    /// Lower-cased extension of the last path segment, if any.
    pub fn extension(&self) -> Option<String> {
        let last = self.url.path_segments()?.next_back()?;
        let (_, ext) = last.rsplit_once('.')?;
        Some(ext.to_ascii_lowercase())
    }

    /// Decides whether a body should be parsed as YAML.
    ///
    /// The content type (parameters stripped) wins when it names a YAML mime
    /// type; otherwise the extension decides.
    pub fn is_yaml(&self, content_type: Option<&str>) -> bool {
        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase());
        if let Some(mime) = mime {
            if YAML_MIMES.contains(&mime.as_str()) {
                return true;
            }
        }
        self.extension()
            .map(|ext| YAML_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http:") || location.starts_with("https:")
}

fn invalid(location: &str, reason: impl fmt::Display) -> LoadError {
    LoadError::InvalidLocation {
        location: location.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_location_is_absolute_and_normalized() {
        let loc = Location::parse("/specs/./v1/../api.yaml").unwrap();
        assert_eq!(loc.key(), "/specs/api.yaml");
        assert!(!loc.is_remote());
    }

    #[test]
    fn test_relative_input_is_made_absolute() {
        let loc = Location::parse("api.yaml").unwrap();
        let expected = std::env::current_dir().unwrap().join("api.yaml");
        assert_eq!(loc.to_file_path().unwrap(), expected);
    }

    #[test]
    fn test_join_relative_to_directory() {
        let base = Location::parse("/specs/v1/api.yaml").unwrap();
        assert_eq!(base.join("pet.yaml").unwrap().key(), "/specs/v1/pet.yaml");
        assert_eq!(
            base.join("../shared/error.json").unwrap().key(),
            "/specs/shared/error.json"
        );
    }

    #[test]
    fn test_join_remote() {
        let base = Location::parse("https://example.com/spec/swagger.yaml").unwrap();
        let joined = base.join("parameters.yaml").unwrap();
        assert!(joined.is_remote());
        assert_eq!(joined.key(), "https://example.com/spec/parameters.yaml");

        let file = Location::parse("/specs/api.yaml").unwrap();
        let remote = file.join("http://example.com/pet.json").unwrap();
        assert_eq!(remote.key(), "http://example.com/pet.json");
    }

    #[test]
    fn test_yaml_detection() {
        let yaml = Location::parse("/specs/api.YML").unwrap();
        assert!(yaml.is_yaml(None));

        let json = Location::parse("https://example.com/spec").unwrap();
        assert!(!json.is_yaml(Some("application/json")));
        assert!(json.is_yaml(Some("application/x-yaml; charset=utf-8")));
    }
}
