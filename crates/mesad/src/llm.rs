//! Ollama client - the opaque language-model capability behind the NLU
//! seam. Reached over HTTP with a bounded timeout; a slow model fails the
//! dispatch call instead of hanging the request.

use mesa_common::error::MesaError;
use std::time::Duration;
use tracing::warn;

pub struct OllamaClient {
    base_url: String,
    model: String,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout_secs,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check whether the backend answers at all.
    pub async fn is_available(&self) -> bool {
        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
        {
            Ok(c) => c,
            Err(_) => return false,
        };
        client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Send a single generate request and return the raw response text.
    pub async fn generate(&self, prompt: &str) -> Result<String, MesaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| MesaError::Upstream(format!("http client: {e}")))?;

        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "format": "json",
        });

        let response = client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MesaError::Timeout(self.timeout_secs)
                } else {
                    MesaError::Upstream(format!("ollama request: {e}"))
                }
            })?;

        if !response.status().is_success() {
            warn!("Ollama request failed: {}", response.status());
            return Err(MesaError::Upstream(format!(
                "ollama status {}",
                response.status()
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| MesaError::Upstream(format!("ollama body: {e}")))?;
        Ok(json
            .get("response")
            .and_then(|r| r.as_str())
            .unwrap_or("")
            .to_string())
    }
}
