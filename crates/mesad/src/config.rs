//! Configuration for mesad.
//!
//! Loads settings from a TOML file (MESA_CONFIG, then /etc/mesa/config.toml)
//! or falls back to defaults. Every field has a serde default so partial
//! config files stay valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default config file path
pub const CONFIG_PATH: &str = "/etc/mesa/config.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MesaConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Bind address for the HTTP server
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    format!("0.0.0.0:{}", mesa_common::DEFAULT_PORT)
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Directory for uploaded images and generated speech assets
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/var/lib/mesa/menu.db")
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("/var/lib/mesa/media")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            media_dir: default_media_dir(),
        }
    }
}

/// LLM configuration. The model is an opaque capability reached over the
/// Ollama HTTP API; everything deterministic works without it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Ollama API base URL
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    /// Model used for intent classification and slot extraction
    #[serde(default = "default_model")]
    pub model: String,

    /// Dispatch call timeout in seconds
    #[serde(default = "default_dispatch_timeout")]
    pub dispatch_timeout_secs: u64,

    /// Set false to run with the deterministic NLU only
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_ollama_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_model() -> String {
    "qwen2.5:3b-instruct".to_string()
}

fn default_dispatch_timeout() -> u64 {
    8
}

fn default_enabled() -> bool {
    true
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            model: default_model(),
            dispatch_timeout_secs: default_dispatch_timeout(),
            enabled: default_enabled(),
        }
    }
}

/// Speech collaborator configuration. Both directions shell out to
/// external tools, so the commands are configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Command that reads a WAV file path and prints a transcript
    #[serde(default = "default_transcriber")]
    pub transcriber_cmd: String,

    /// Command invoked as `<cmd> <out.wav> <text>` to synthesize speech
    #[serde(default = "default_synthesizer")]
    pub synthesizer_cmd: String,

    /// Subprocess timeout in seconds
    #[serde(default = "default_speech_timeout")]
    pub timeout_secs: u64,

    /// Set false to skip transcription/synthesis entirely
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_transcriber() -> String {
    "whisper-cli --no-timestamps --output-txt".to_string()
}

fn default_synthesizer() -> String {
    "espeak-ng -w".to_string()
}

fn default_speech_timeout() -> u64 {
    15
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            transcriber_cmd: default_transcriber(),
            synthesizer_cmd: default_synthesizer(),
            timeout_secs: default_speech_timeout(),
            enabled: default_enabled(),
        }
    }
}

impl MesaConfig {
    /// Load config from MESA_CONFIG or the default path, falling back to
    /// defaults when no file exists.
    pub fn load() -> Self {
        let path = std::env::var("MESA_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(CONFIG_PATH));
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Config not loaded from {}: {e:#}. Using defaults.", path.display());
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = MesaConfig::default();
        assert!(config.http.bind.ends_with(&mesa_common::DEFAULT_PORT.to_string()));
        assert!(config.llm.dispatch_timeout_secs > 0);
        assert!(config.speech.timeout_secs > 0);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: MesaConfig = toml::from_str("[llm]\nmodel = \"llama3.2:1b\"\n").unwrap();
        assert_eq!(config.llm.model, "llama3.2:1b");
        assert_eq!(config.llm.base_url, default_ollama_url());
        assert_eq!(config.database.path, default_db_path());
    }
}
