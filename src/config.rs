//! secrel configuration.
//!
//! Loaded from `~/.secrel/config.toml`. Every key has a default, so a missing
//! file is fine; a present but invalid one is an error.
//!
//! `HackerOne` credentials resolve through a short chain:
//!
//! 1. `SECREL_H1_USERNAME` / `SECREL_H1_TOKEN` env vars
//! 2. `[hackerone]` in the config file

use std::path::PathBuf;
use std::{env, fs, io};

use serde::{Deserialize, Serialize};

use crate::model::Repository;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine home directory")]
    NoHome,

    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid notify repository: {0}")]
    Repository(String),

    #[error(
        "HackerOne credentials required: set SECREL_H1_USERNAME and SECREL_H1_TOKEN, \
         or add `username` and `token` under [hackerone] in ~/.secrel/config.toml"
    )]
    MissingCredentials,
}

/// secrel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub release: ReleaseConfig,
    pub hackerone: HackerOneConfig,
    pub cve: CveConfig,
    pub github: GitHubConfig,
    pub templates: TemplatesConfig,
}

/// Where the release lives and how it is published.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ReleaseConfig {
    /// Owner of the private repository holding the tracking issue and record.
    pub owner: String,
    pub repo: String,

    /// Branch the release record is committed to.
    pub branch: String,

    /// Release record, relative to the working directory.
    pub state_file: PathBuf,

    /// Product name used in announcements and CVE requests.
    pub product: String,

    /// Repositories (`owner/name`) that get a heads-up issue before release.
    pub notify: Vec<String>,

    /// When false, no checkout, commit, or push is performed.
    pub git: bool,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            owner: "nodejs-private".into(),
            repo: "node-private".into(),
            branch: "next-security-release".into(),
            state_file: PathBuf::from("security-release")
                .join("next-security-release")
                .join("vulnerabilities.json"),
            product: "Node.js".into(),
            notify: vec!["nodejs/docker-node".into(), "nodejs/build".into()],
            git: true,
        }
    }
}

impl ReleaseConfig {
    pub fn repository(&self) -> Repository {
        Repository::new(&self.owner, &self.repo)
    }

    pub fn notify_repositories(&self) -> Result<Vec<Repository>, ConfigError> {
        self.notify
            .iter()
            .map(|r| r.parse().map_err(ConfigError::Repository))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HackerOneConfig {
    pub api_url: String,
    pub username: Option<String>,
    pub token: Option<String>,
}

impl Default for HackerOneConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.hackerone.com/v1".into(),
            username: None,
            token: None,
        }
    }
}

impl HackerOneConfig {
    /// Resolves `(username, token)`, environment first.
    pub fn credentials(&self) -> Result<(String, String), ConfigError> {
        let username = from_env("SECREL_H1_USERNAME").or_else(|| non_empty(self.username.as_ref()));
        let token = from_env("SECREL_H1_TOKEN").or_else(|| non_empty(self.token.as_ref()));
        username.zip(token).ok_or(ConfigError::MissingCredentials)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CveConfig {
    /// Reservation endpoint. `{report_id}` is replaced per request.
    pub endpoint: String,
}

impl Default for CveConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.hackerone.com/v1/reports/{report_id}/cve_requests".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct GitHubConfig {
    /// `GH_CONFIG_DIR` handed to `gh`, for running as a dedicated account.
    pub config_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TemplatesConfig {
    pub pre_release: Option<PathBuf>,
    pub post_release: Option<PathBuf>,
}

impl Config {
    /// Load config from `~/.secrel/config.toml`, or defaults if it doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path().ok_or(ConfigError::NoHome)?;
        Self::load_from(path)
    }

    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
    }

    /// The config file path: `~/.secrel/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".secrel").join("config.toml"))
    }
}

fn from_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}
