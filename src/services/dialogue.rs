//! Dialogue generation over chat completions

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{DialogueGenerator, DialogueReply, DialogueRequest};
use crate::{Error, Result};

/// Max tokens for a spoken reply
const MAX_TOKENS: u32 = 256;

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// The strict reply shape the model is instructed to produce
#[derive(Deserialize)]
struct TwoPartReply {
    reply: String,
    translation: String,
}

/// Generates practice-conversation replies via the OpenAI chat API
pub struct ChatDialogue {
    client: reqwest::Client,
    api_key: String,
    model: String,
    locale: String,
}

impl ChatDialogue {
    /// Create a dialogue client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, model: String, locale: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for dialogue".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            locale,
        })
    }

    fn system_prompt(&self, topic: &str) -> String {
        let language = language_name(&self.locale);
        format!(
            "You are a friendly conversation partner helping the user practice \
             {language}. The current topic is \"{topic}\". Keep replies short and \
             spoken in register. Always answer with exactly one JSON object of the \
             form {{\"reply\": \"<your reply in {language}>\", \"translation\": \
             \"<English translation of the reply>\"}} and nothing else."
        )
    }
}

#[async_trait]
impl DialogueGenerator for ChatDialogue {
    async fn respond(&self, request: &DialogueRequest) -> Result<DialogueReply> {
        tracing::debug!(text = %request.text, topic = %request.topic, "requesting dialogue reply");

        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: self.system_prompt(&request.topic),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.text.clone(),
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: 0.7,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Dialogue(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat API error");
            return Err(Error::Dialogue(format!("chat API error {status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Dialogue(e.to_string()))?;

        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or_else(|| Error::Dialogue("empty chat response".to_string()))?;

        let reply = parse_two_part(content)?;
        tracing::info!(reply = %reply.reply, "dialogue reply received");
        Ok(reply)
    }
}

/// Parse the model output into the two-part reply shape
///
/// Tolerates a fenced code block around the JSON; anything missing either
/// part is a malformed reply.
fn parse_two_part(content: &str) -> Result<DialogueReply> {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let parsed: TwoPartReply = serde_json::from_str(trimmed)
        .map_err(|e| Error::MalformedReply(format!("{e}: {trimmed}")))?;

    if parsed.reply.trim().is_empty() || parsed.translation.trim().is_empty() {
        return Err(Error::MalformedReply(
            "reply or translation empty".to_string(),
        ));
    }

    Ok(DialogueReply {
        reply: parsed.reply,
        translation: parsed.translation,
    })
}

/// English name for a handful of practice languages; falls back to the code
fn language_name(locale: &str) -> &str {
    match locale.split(['-', '_']).next().unwrap_or(locale) {
        "sv" => "Swedish",
        "da" => "Danish",
        "no" | "nb" | "nn" => "Norwegian",
        "fi" => "Finnish",
        "de" => "German",
        "fr" => "French",
        "es" => "Spanish",
        "it" => "Italian",
        other => other,
    }
}
