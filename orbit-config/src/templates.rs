//! ABOUTME: Template store configuration (C3) - library source and match threshold

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateStoreConfig {
    /// Directory of template definition files, loaded and embedded at startup.
    pub library_path: Option<PathBuf>,
    /// Minimum post-boost similarity for a template match.
    pub confidence_threshold: f32,
    pub reindex_on_start: bool,
}

impl Default for TemplateStoreConfig {
    fn default() -> Self {
        Self {
            library_path: None,
            confidence_threshold: 0.75,
            reindex_on_start: true,
        }
    }
}

impl TemplateStoreConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err("templates.confidence_threshold must be in [0, 1]".to_string());
        }
        Ok(())
    }
}
