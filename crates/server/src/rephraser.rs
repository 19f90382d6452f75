use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::{domain::Tone, metrics::measure};
use tracing::debug;

const ENGINE_TIMEOUT: Duration = Duration::from_secs(120);

/// Engine that turns text into a rephrased version in the requested tone.
#[async_trait]
pub trait Rephraser: Send + Sync {
    async fn rephrase(&self, text: &str, tone: Tone) -> Result<String>;
}

/// Stand-in used when no engine credentials are configured.
pub struct UnconfiguredRephraser;

#[async_trait]
impl Rephraser for UnconfiguredRephraser {
    async fn rephrase(&self, _text: &str, _tone: Tone) -> Result<String> {
        Err(anyhow!("API key not configured"))
    }
}

pub fn system_prompt(tone: Tone) -> &'static str {
    match tone {
        Tone::Formal => {
            "You are an expert English writer. Rephrase the user's text into formal, professional, \
             grammatically correct English that sounds natural and polished. Preserve the original \
             meaning and context. Only return the rephrased text, nothing else."
        }
        Tone::Conversational => {
            "You are an expert English writer. Rephrase the user's text into natural, conversational, \
             grammatically correct English that sounds human and friendly. Preserve the original \
             meaning and context. Only return the rephrased text, nothing else."
        }
        Tone::Academic => {
            "You are an expert academic writer. Rephrase the user's text into scholarly, precise, \
             grammatically correct English suitable for academic papers. Preserve the original \
             meaning and context. Only return the rephrased text, nothing else."
        }
        Tone::Creative => {
            "You are a creative writer. Rephrase the user's text into engaging, expressive, \
             grammatically correct English with a creative flair. Preserve the original meaning and \
             context. Only return the rephrased text, nothing else."
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Rephraser backed by an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatCompletionRephraser {
    http: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl ChatCompletionRephraser {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(ENGINE_TIMEOUT)
            .build()
            .context("failed to build rephrasing engine http client")?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl Rephraser for ChatCompletionRephraser {
    async fn rephrase(&self, text: &str, tone: Tone) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt(tone),
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
        };

        debug!(
            model = %self.model,
            %tone,
            chars = measure(text).chars,
            "requesting rephrase from engine"
        );
        let response: ChatCompletionResponse = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| anyhow!("engine returned an empty completion"))
    }
}
