//! Gallery manifest: the TOML file naming reference identities and their
//! image sources.
//!
//! ```toml
//! [[reference]]
//! label = "ada"
//! path = "/home/ada/face.jpg"
//!
//! [[reference]]
//! label = "grace"
//! url = "https://example.com/grace.jpg"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use facehud_core::gallery::{ImageSource, ReferenceSpec};

#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub reference: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestEntry {
    pub label: String,
    pub url: Option<String>,
    pub path: Option<PathBuf>,
}

impl ManifestEntry {
    fn into_spec(self) -> Result<ReferenceSpec> {
        let source = match (self.url, self.path) {
            (Some(url), None) => ImageSource::Url(url),
            (None, Some(path)) => ImageSource::Path(path),
            _ => bail!("reference '{}' needs exactly one of url or path", self.label),
        };
        Ok(ReferenceSpec { label: self.label, source })
    }
}

/// Load and validate the manifest, preserving entry order.
pub fn load(path: &Path) -> Result<Vec<ReferenceSpec>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    parse(&raw).with_context(|| format!("invalid manifest {}", path.display()))
}

fn parse(raw: &str) -> Result<Vec<ReferenceSpec>> {
    let manifest: Manifest = toml::from_str(raw)?;
    manifest
        .reference
        .into_iter()
        .map(ManifestEntry::into_spec)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_sources() {
        let specs = parse(
            r#"
            [[reference]]
            label = "ada"
            path = "ada.jpg"

            [[reference]]
            label = "grace"
            url = "https://example.com/grace.jpg"
            "#,
        )
        .unwrap();

        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].label, "ada");
        assert!(matches!(specs[0].source, ImageSource::Path(_)));
        assert!(matches!(specs[1].source, ImageSource::Url(_)));
    }

    #[test]
    fn test_parse_preserves_order() {
        let specs = parse(
            r#"
            [[reference]]
            label = "one"
            path = "1.jpg"

            [[reference]]
            label = "two"
            path = "2.jpg"

            [[reference]]
            label = "three"
            path = "3.jpg"
            "#,
        )
        .unwrap();

        let labels: Vec<_> = specs.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_entry_with_both_sources_rejected() {
        let err = parse(
            r#"
            [[reference]]
            label = "ambiguous"
            path = "a.jpg"
            url = "https://example.com/a.jpg"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn test_entry_with_no_source_rejected() {
        assert!(parse("[[reference]]\nlabel = \"empty\"\n").is_err());
    }

    #[test]
    fn test_empty_manifest_is_valid() {
        assert!(parse("").unwrap().is_empty());
    }
}
