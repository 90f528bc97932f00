//! Narration backend over HTTP
//!
//! Talks to a Gemini-style generateContent endpoint. Every failure mode is
//! mapped into [`NarratorError`]; the orchestrator handles the rest, so a
//! dead backend degrades the story rather than the server.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use tandem_core::{Attribute, Genre, NarrationRequest, Narrator, NarratorConfig, NarratorError};

pub struct HttpNarrator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl HttpNarrator {
    /// Build from config. Fails when the configured environment variable is
    /// unset; the key itself is never written to disk.
    pub fn from_config(config: &NarratorConfig) -> Result<Self, NarratorError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| NarratorError::Transport(format!("{} is not set", config.api_key_env)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NarratorError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    async fn generate(&self, prompt: String) -> Result<String, NarratorError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }]
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NarratorError::Timeout
                } else {
                    NarratorError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NarratorError::Transport(format!(
                "backend returned {}",
                status
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| NarratorError::Malformed(e.to_string()))?;

        let text = payload
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| NarratorError::Malformed("no candidate text in response".into()))?;

        debug!(chars = text.chars().count(), "Received narration");
        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl Narrator for HttpNarrator {
    async fn narrate(&self, request: NarrationRequest) -> Result<String, NarratorError> {
        self.generate(build_prompt(&request)).await
    }

    async fn opening_hook(
        &self,
        genre: Genre,
        attribute1: Attribute,
        attribute2: Attribute,
    ) -> Result<String, NarratorError> {
        self.generate(build_opening_prompt(genre, attribute1, attribute2))
            .await
    }
}

/// Stand-in when no API key is configured. Always errs, which makes the
/// orchestrator fall back to its canned lines.
pub struct OfflineNarrator;

#[async_trait]
impl Narrator for OfflineNarrator {
    async fn narrate(&self, _request: NarrationRequest) -> Result<String, NarratorError> {
        Err(NarratorError::Transport(
            "no narration backend configured".into(),
        ))
    }

    async fn opening_hook(
        &self,
        _genre: Genre,
        _attribute1: Attribute,
        _attribute2: Attribute,
    ) -> Result<String, NarratorError> {
        Err(NarratorError::Transport(
            "no narration backend configured".into(),
        ))
    }
}

fn attribute_word(attribute: Attribute) -> &'static str {
    match attribute {
        Attribute::Him => "him",
        Attribute::Her => "her",
        Attribute::Neutral => "them",
    }
}

fn build_prompt(request: &NarrationRequest) -> String {
    let mut prompt = String::new();
    prompt.push_str(request.genre.instructions());
    prompt.push_str(&format!(
        "\n\nThe story has two participants: user1 (refer to as {}) and user2 (refer to as {}).\n",
        attribute_word(request.attribute1),
        attribute_word(request.attribute2),
    ));

    if !request.context.is_empty() {
        prompt.push_str("\nRecent story:\n");
        for line in &request.context {
            prompt.push_str(line);
            prompt.push('\n');
        }
    }

    prompt.push_str(&format!("\nLatest turn:\n{}\n", request.latest));
    prompt.push_str(
        "\nWrite the next narration beat in third person, under 180 characters, \
         reacting to the latest turn. Then, on its own final line, append a JSON \
         object with numeric fields tension_level, sync_score and world_reactivity \
         rating the story so far.",
    );
    prompt
}

fn build_opening_prompt(genre: Genre, attribute1: Attribute, attribute2: Attribute) -> String {
    format!(
        "{}\n\nThe story has two participants: user1 (refer to as {}) and user2 \
         (refer to as {}).\n\nWrite a single opening line, under 180 characters, \
         that drops both of them into the scene and invites user1 to act first. \
         No JSON, no preamble, just the line.",
        genre.instructions(),
        attribute_word(attribute1),
        attribute_word(attribute2),
    )
}
