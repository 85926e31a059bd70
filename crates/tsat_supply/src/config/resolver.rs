//! RPC endpoint configuration, resolved from an ordered list of candidate files.
//!
//! Load order: env `TSAT_SUPPLY_CONFIG`, then `config.json` / `config/config.json`
//! next to the service, then the same two one directory up.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub const CONFIG_PATH_ENV: &str = "TSAT_SUPPLY_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no configuration file found (tried: {})", display_paths(.tried))]
    NotFound { tried: Vec<PathBuf> },
    #[error("malformed configuration {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolved RPC configuration. Read-only for the duration of one computation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Configuration {
    pub rpc_url: String,
    pub fallback_rpc_urls: Vec<String>,
    pub provider: Option<String>,
}

impl Configuration {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            fallback_rpc_urls: Vec::new(),
            provider: None,
        }
    }

    pub fn with_fallbacks<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_rpc_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Primary endpoint followed by fallbacks, in listed order. Blank entries are skipped.
    pub fn endpoints(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.rpc_url.as_str())
            .chain(self.fallback_rpc_urls.iter().map(String::as_str))
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    /// Label echoed into results: explicit provider, else the primary endpoint's host.
    pub fn provider_label(&self) -> String {
        if let Some(p) = self.provider.as_deref().map(str::trim) {
            if !p.is_empty() {
                return p.to_string();
            }
        }
        Url::parse(self.rpc_url.trim())
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    solana: Option<SolanaSection>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolanaSection {
    rpc_url: Option<String>,
    #[serde(default)]
    fallback_rpc_urls: Vec<String>,
    provider: Option<String>,
}

/// Parse a configuration document. Errors carry only the reason; the caller adds the path.
pub fn parse_configuration(content: &str) -> Result<Configuration, String> {
    let file: ConfigFile = serde_json::from_str(content).map_err(|e| format!("json: {}", e))?;
    let solana = file.solana.ok_or("missing `solana` section")?;
    let rpc_url = solana
        .rpc_url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or("missing `solana.rpcUrl`")?;
    let parsed = Url::parse(&rpc_url).map_err(|e| format!("invalid rpcUrl {}: {}", rpc_url, e))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("unsupported rpcUrl scheme: {}", parsed.scheme()));
    }
    Ok(Configuration {
        rpc_url,
        fallback_rpc_urls: solana.fallback_rpc_urls,
        provider: solana.provider,
    })
}

/// Tries candidate paths strictly in priority order; the first valid file wins.
#[derive(Clone, Debug, Default)]
pub struct ConfigResolver {
    candidates: Vec<PathBuf>,
}

impl ConfigResolver {
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    /// Standard candidates relative to the service's own directory.
    pub fn default_candidates(base_dir: &Path) -> Vec<PathBuf> {
        let parent = base_dir.join("..");
        vec![
            base_dir.join("config.json"),
            base_dir.join("config").join("config.json"),
            parent.join("config.json"),
            parent.join("config").join("config.json"),
        ]
    }

    /// Default candidates, preceded by `TSAT_SUPPLY_CONFIG` when set.
    pub fn from_env(base_dir: &Path) -> Self {
        let resolver = Self::new(Self::default_candidates(base_dir));
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => resolver.with_candidate(path.trim()),
            _ => resolver,
        }
    }

    /// Put `path` ahead of every existing candidate.
    pub fn with_candidate(mut self, path: impl Into<PathBuf>) -> Self {
        self.candidates.insert(0, path.into());
        self
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// First candidate that exists and parses. Missing files are skipped. A malformed or
    /// unreadable file does not stop the search: a later valid candidate still wins, and
    /// `Malformed` (for the last bad file) is returned only when no candidate was valid.
    pub fn resolve(&self) -> Result<Configuration, ConfigError> {
        let mut malformed = None;
        for path in &self.candidates {
            let content = match std::fs::read_to_string(path) {
                Ok(c) => c,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable config candidate");
                    malformed = Some(ConfigError::Malformed {
                        path: path.clone(),
                        reason: format!("io: {}", e),
                    });
                    continue;
                }
            };
            match parse_configuration(&content) {
                Ok(config) => {
                    debug!(path = %path.display(), "configuration loaded");
                    return Ok(config);
                }
                Err(reason) => {
                    warn!(path = %path.display(), %reason, "malformed config candidate");
                    malformed = Some(ConfigError::Malformed {
                        path: path.clone(),
                        reason,
                    });
                }
            }
        }
        Err(malformed.unwrap_or_else(|| ConfigError::NotFound {
            tried: self.candidates.clone(),
        }))
    }
}
