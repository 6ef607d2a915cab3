//! `kiln.toml` settings.
//!
//! ```toml
//! [provider]
//! protocol = "ollama"
//! endpoint = "http://localhost:11434"
//! model = "qwen2.5-coder"
//!
//! [generation]
//! max_passes = 10
//!
//! [toolchains.cpp]
//! build = "clang++ -std=c++20 -O2 {src} -o {out}"
//! version_probe = "clang++ --version"
//! ```
//!
//! Every key is optional. Command-line flags win over the file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::LoopLimits;
use crate::error::{Error, Result};
use crate::profile::ProfileRegistry;
use crate::service::{Protocol, ProviderConfig, RetryPolicy};

/// File name looked up in the working directory.
pub const CONFIG_FILE: &str = "kiln.toml";

/// Generation service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderSettings {
    pub protocol: Protocol,
    /// Base URL; defaults per protocol.
    pub endpoint: Option<String>,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            protocol: Protocol::OpenAi,
            endpoint: None,
            model: "gpt-4o-mini".to_string(),
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            timeout_secs: 300,
        }
    }
}

/// Retry bounds, mirroring [`LoopLimits`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationSettings {
    pub max_passes: u32,
    pub fatal_grace_passes: u32,
    pub transport_retries: u32,
    /// Base transport backoff in milliseconds.
    pub backoff_ms: u64,
    pub finalize_retries: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        let limits = LoopLimits::default();
        Self {
            max_passes: limits.max_passes,
            fatal_grace_passes: limits.fatal_grace_passes,
            transport_retries: limits.transport.max_retries,
            backoff_ms: limits.transport.base_delay.as_millis() as u64,
            finalize_retries: limits.finalize_attempts,
        }
    }
}

/// Command overrides for one profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainOverride {
    pub build: Option<String>,
    pub version_probe: Option<String>,
}

/// Contents of a `kiln.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub provider: ProviderSettings,
    pub generation: GenerationSettings,
    pub toolchains: BTreeMap<String, ToolchainOverride>,
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load settings from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&text).map_err(|e| match e {
            Error::Config(message) => Error::Config(format!("{}: {}", path.display(), message)),
            other => other,
        })
    }

    /// Find and load the settings for this invocation.
    ///
    /// An explicit path must exist. Otherwise `./kiln.toml` is tried, then
    /// `<config dir>/kiln/config.toml`; with neither, defaults apply.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let candidates: Vec<PathBuf> = [
            Some(PathBuf::from(CONFIG_FILE)),
            dirs::config_dir().map(|dir| dir.join("kiln").join("config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        for candidate in candidates {
            if candidate.is_file() {
                tracing::debug!("Using configuration {}", candidate.display());
                return Self::load(&candidate);
            }
        }

        tracing::debug!("No configuration file, using defaults");
        Ok(Self::default())
    }

    /// Apply `[toolchains.*]` overrides to `registry`.
    pub fn apply_overrides(&self, registry: &mut ProfileRegistry) -> Result<()> {
        for (id, over) in &self.toolchains {
            registry.apply_override(id, over.build.clone(), over.version_probe.clone())?;
        }
        Ok(())
    }

    /// Loop limits from the `[generation]` section.
    pub fn limits(&self) -> LoopLimits {
        let generation = &self.generation;
        LoopLimits {
            max_passes: generation.max_passes.max(1),
            fatal_grace_passes: generation.fatal_grace_passes.max(1),
            transport: RetryPolicy {
                max_retries: generation.transport_retries,
                base_delay: Duration::from_millis(generation.backoff_ms),
            },
            finalize_attempts: generation.finalize_retries.max(1),
            ..LoopLimits::default()
        }
    }

    /// Connection settings, with the API key read from the environment.
    pub fn provider_config(&self) -> ProviderConfig {
        let provider = &self.provider;
        let api_key = provider
            .api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() && provider.protocol != Protocol::Ollama {
            tracing::debug!("No API key found for {}", provider.protocol.name());
        }

        ProviderConfig {
            protocol: provider.protocol,
            endpoint: provider
                .endpoint
                .clone()
                .unwrap_or_else(|| default_endpoint(provider.protocol).to_string()),
            model: provider.model.clone(),
            api_key,
            timeout: Duration::from_secs(provider.timeout_secs),
        }
    }
}

/// Base URL used when none is configured.
pub fn default_endpoint(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::OpenAi => "https://api.openai.com",
        Protocol::Google => "https://generativelanguage.googleapis.com",
        Protocol::Ollama => "http://localhost:11434",
    }
}
