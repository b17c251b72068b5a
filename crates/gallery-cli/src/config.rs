//! CLI configuration file
//!
//! ```toml
//! sas_token = "sv=...&sig=..."        # or GALLERY_SAS_TOKEN
//!
//! [gallery]
//! notice_hide_after_ms = 3000
//!
//! [blob]
//! account = "propertyimages"
//! container = "images"
//!
//! [thumbnail]                       # optional
//! max_side = 256
//! quality = 75
//!
//! [dataverse]
//! base_url = "https://org.crm.dynamics.com"
//! token = "..."                       # or GALLERY_DATAVERSE_TOKEN
//! ```

use anyhow::{Context, Result};
use gallery_azure::{AzureBlobConfig, DataverseConfig};
use crate::host::{DEFAULT_THUMBNAIL_QUALITY, DEFAULT_THUMBNAIL_SIDE};
use gallery_core::GalleryConfig;
use serde::Deserialize;
use std::path::Path;

/// Environment variable overriding `sas_token`
pub(crate) const SAS_TOKEN_ENV: &str = "GALLERY_SAS_TOKEN";
/// Environment variable overriding `dataverse.token`
pub(crate) const DATAVERSE_TOKEN_ENV: &str = "GALLERY_DATAVERSE_TOKEN";

#[derive(Debug, Deserialize)]
pub(crate) struct CliConfig {
    #[serde(default)]
    pub(crate) gallery: GalleryConfig,
    pub(crate) blob: AzureBlobConfig,
    pub(crate) dataverse: DataverseConfig,
    #[serde(default)]
    pub(crate) thumbnail: ThumbnailConfig,
    #[serde(default)]
    pub(crate) sas_token: Option<String>,
}

/// Size and quality of derived thumbnails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct ThumbnailConfig {
    pub(crate) max_side: u32,
    pub(crate) quality: u8,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_side: DEFAULT_THUMBNAIL_SIDE,
            quality: DEFAULT_THUMBNAIL_QUALITY,
        }
    }
}

impl CliConfig {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub(crate) fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Apply environment overrides; `lookup` is `std::env::var` outside tests
    #[must_use]
    pub(crate) fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(token) = lookup(SAS_TOKEN_ENV).filter(|t| !t.trim().is_empty()) {
            self.sas_token = Some(token);
        }
        if let Some(token) = lookup(DATAVERSE_TOKEN_ENV).filter(|t| !t.trim().is_empty()) {
            self.dataverse.token = Some(token);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const MINIMAL: &str = r#"
        [blob]
        account = "acct"
        container = "images"

        [dataverse]
        base_url = "https://org.crm.dynamics.com"
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = CliConfig::parse(MINIMAL).unwrap();
        assert_eq!(config.gallery, GalleryConfig::default());
        assert_eq!(config.blob, AzureBlobConfig::new("acct", "images"));
        assert_eq!(config.dataverse.entity_set, "iqa_propertyimages");
        assert_eq!(config.thumbnail, ThumbnailConfig::default());
        assert_eq!(config.sas_token, None);
    }

    #[test]
    fn test_full_config() {
        let text = r#"
            sas_token = "sv=1&sig=a"

            [gallery]
            notice_hide_after_ms = 500
            image_entity = "new_image"

            [blob]
            account = "acct"
            container = "images"
            endpoint = "http://127.0.0.1:10000"
            block_size = 1024

            [thumbnail]
            max_side = 128

            [dataverse]
            base_url = "https://org.crm.dynamics.com"
            entity = "new_image"
            entity_set = "new_images"
            token = "t"
        "#;
        let config = CliConfig::parse(text).unwrap();
        assert_eq!(config.gallery.notice_hide_after(), Duration::from_millis(500));
        assert_eq!(config.gallery.image_entity, "new_image");
        assert_eq!(config.blob.block_size, 1024);
        assert_eq!(config.thumbnail.max_side, 128);
        assert_eq!(config.thumbnail.quality, DEFAULT_THUMBNAIL_QUALITY);
        assert_eq!(
            config.blob.endpoint().unwrap().as_str(),
            "http://127.0.0.1:10000/"
        );
        assert_eq!(config.dataverse.entity_set, "new_images");
        assert_eq!(config.dataverse.token.as_deref(), Some("t"));
        assert_eq!(config.sas_token.as_deref(), Some("sv=1&sig=a"));
    }

    #[test]
    fn test_missing_blob_section_is_rejected() {
        let text = r#"
            [dataverse]
            base_url = "https://org.crm.dynamics.com"
        "#;
        assert!(CliConfig::parse(text).is_err());
    }

    #[test]
    fn test_env_overrides_tokens() {
        let config = CliConfig::parse(MINIMAL).unwrap().with_env(|key| match key {
            SAS_TOKEN_ENV => Some("sig=env".to_string()),
            DATAVERSE_TOKEN_ENV => Some("bearer".to_string()),
            _ => None,
        });
        assert_eq!(config.sas_token.as_deref(), Some("sig=env"));
        assert_eq!(config.dataverse.token.as_deref(), Some("bearer"));
    }

    #[test]
    fn test_blank_env_keeps_file_value() {
        let text = format!("sas_token = \"sig=file\"\n{MINIMAL}");
        let config = CliConfig::parse(&text)
            .unwrap()
            .with_env(|_| Some("  ".to_string()));
        assert_eq!(config.sas_token.as_deref(), Some("sig=file"));
    }
}
