use std::env;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::core::errors::ConfigError;

/// Service configuration, loaded from `config.yml`. A missing file yields
/// working defaults; a malformed file fails startup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub llm: LlmSettings,
    pub loader: LoaderSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Window length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub max_context_chars: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 4,
            max_context_chars: 4000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Any OpenAI-compatible endpoint (llama.cpp server, LM Studio, Groq, ...).
    pub base_url: String,
    pub api_key: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8088".to_string(),
            api_key: None,
            chat_model: "llama-3.3-70b-versatile".to_string(),
            embedding_model: "all-minilm-l6-v2".to_string(),
            temperature: 0.9,
            max_tokens: 500,
            request_timeout_secs: 60,
        }
    }
}

impl LlmSettings {
    /// Explicit config value wins, then the `RESEARCH_LLM_API_KEY` env var.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| env::var("RESEARCH_LLM_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    pub web_timeout_secs: u64,
    /// Optional OCR sidecar used for image files; images are rejected as
    /// unsupported when unset.
    pub ocr_base_url: Option<String>,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            web_timeout_secs: 30,
            ocr_base_url: None,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut settings = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_yaml::from_str::<Settings>(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            tracing::info!(path = %path.display(), "no config file found, using defaults");
            Settings::default()
        };

        settings.clamp_limits();
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunking.validate()
    }

    fn clamp_limits(&mut self) {
        if self.retrieval.top_k == 0 {
            tracing::warn!("retrieval.top_k must be at least 1, clamping to 1");
            self.retrieval.top_k = 1;
        }
        if self.llm.request_timeout_secs == 0 {
            tracing::warn!("llm.request_timeout_secs must be at least 1, clamping to 1");
            self.llm.request_timeout_secs = 1;
        }
        if self.loader.web_timeout_secs == 0 {
            tracing::warn!("loader.web_timeout_secs must be at least 1, clamping to 1");
            self.loader.web_timeout_secs = 1;
        }
    }
}

impl ChunkingSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunking(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::InvalidChunking(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.chunking.chunk_size, 1000);
        assert_eq!(settings.chunking.chunk_overlap, 200);
        assert_eq!(settings.retrieval.top_k, 4);
        assert_eq!(settings.retrieval.max_context_chars, 4000);
        assert_eq!(settings.llm.max_tokens, 500);
        assert!(settings.loader.ocr_base_url.is_none());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() {
        let yaml = "server:\n  port: 9100\nchunking:\n  chunk_size: 400\n";
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.chunking.chunk_size, 400);
        assert_eq!(settings.chunking.chunk_overlap, 200);
        assert_eq!(settings.retrieval.top_k, 4);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("nope.yml")).unwrap();
        assert_eq!(settings.chunking.chunk_size, 1000);
    }

    #[test]
    fn overlap_must_stay_below_chunk_size() {
        let settings = ChunkingSettings {
            chunk_size: 100,
            chunk_overlap: 100,
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidChunking(_))
        ));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let settings = ChunkingSettings {
            chunk_size: 0,
            chunk_overlap: 0,
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidChunking(_))
        ));
    }

    #[test]
    fn zero_top_k_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "retrieval:\n  top_k: 0\n").unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.retrieval.top_k, 1);
    }

    #[test]
    fn malformed_file_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "chunking: [not, a, map\n").unwrap();
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn api_key_prefers_config_over_env() {
        let settings = LlmSettings {
            api_key: Some("from-config".to_string()),
            ..LlmSettings::default()
        };
        assert_eq!(settings.resolve_api_key().as_deref(), Some("from-config"));

        let blank = LlmSettings {
            api_key: Some("   ".to_string()),
            ..LlmSettings::default()
        };
        // Blank config values fall through to the environment.
        let from_env = std::env::var("RESEARCH_LLM_API_KEY").ok();
        assert_eq!(blank.resolve_api_key(), from_env.filter(|k| !k.trim().is_empty()));
    }
}
