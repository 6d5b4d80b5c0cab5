//! Announcement templates and their placeholder tokens.

use std::fs;
use std::path::Path;

use crate::config::TemplatesConfig;

use super::{AnnounceError, Result};

pub const ANNOUNCEMENT_DATE: &str = "%ANNOUNCEMENT_DATE%";
pub const RELEASE_DATE: &str = "%RELEASE_DATE%";
pub const SLUG: &str = "%SLUG%";
pub const AFFECTED_VERSIONS: &str = "%AFFECTED_VERSIONS%";
pub const VULNERABILITIES: &str = "%VULNERABILITIES%";
pub const IMPACT: &str = "%IMPACT%";
pub const AUTHOR: &str = "%AUTHOR%";
pub const REPORTS: &str = "%REPORTS%";
pub const DEPENDENCY_UPDATES: &str = "%DEPENDENCY_UPDATES%";
pub const DOWNLOADS: &str = "%DOWNLOADS%";

const PRE_RELEASE: &str = include_str!("../../templates/security-pre-release.md");
const POST_RELEASE: &str = include_str!("../../templates/security-post-release.md");

/// The pair of announcement templates in use.
#[derive(Debug, Clone)]
pub struct Templates {
    pub pre_release: String,
    pub post_release: String,
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            pre_release: PRE_RELEASE.to_string(),
            post_release: POST_RELEASE.to_string(),
        }
    }
}

impl Templates {
    /// Built-in templates, with any configured file taking precedence.
    pub fn load(config: &TemplatesConfig) -> Result<Self> {
        let mut templates = Self::default();
        if let Some(path) = &config.pre_release {
            templates.pre_release = read(path)?;
        }
        if let Some(path) = &config.post_release {
            templates.post_release = read(path)?;
        }
        Ok(templates)
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| AnnounceError::Template {
        path: path.to_path_buf(),
        source,
    })
}

/// Replaces every occurrence of each token with its value.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |doc, (token, value)| doc.replace(token, value))
}
