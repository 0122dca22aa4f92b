use crate::config::Settings;
use crate::error::ServiceError;
use crate::upload::LogoUpload;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

pub const EXTRACTION_PROMPT: &str = "Can you extract the text or letters from this logo?";

/// Recognizes the text printed in a logo.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, logo: &LogoUpload) -> Result<String, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TextReasoning {
    output: String,
}

/// Talks to an OpenAI-compatible chat completions endpoint.
pub struct OpenAiExtractor {
    agent: ureq::Agent,
    api_key: Option<String>,
    endpoint: String,
    model: String,
}

impl OpenAiExtractor {
    pub fn new(settings: &Settings) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            api_key: settings.openai_api_key.clone(),
            endpoint: format!(
                "{}/chat/completions",
                settings.openai_base_url.trim_end_matches('/')
            ),
            model: settings.openai_model.clone(),
        }
    }

    fn request_body(&self, logo: &LogoUpload) -> Value {
        json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": EXTRACTION_PROMPT },
                    { "type": "image_url", "image_url": { "url": logo.data_uri() } },
                ],
            }],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "text_reasoning",
                    "strict": true,
                    "schema": {
                        "type": "object",
                        "properties": { "output": { "type": "string" } },
                        "required": ["output"],
                        "additionalProperties": false,
                    },
                },
            },
        })
    }
}

#[async_trait]
impl TextExtractor for OpenAiExtractor {
    async fn extract(&self, logo: &LogoUpload) -> Result<String, ServiceError> {
        let api_key = self.api_key.clone().ok_or(ServiceError::NotConfigured)?;
        let agent = self.agent.clone();
        let endpoint = self.endpoint.clone();
        let body = self.request_body(logo);

        info!("Requesting text extraction for {}", logo.file_name);

        // ureq blocks, keep it off the async workers
        let completion = tokio::task::spawn_blocking(move || {
            let mut response = agent
                .post(&endpoint)
                .header("Authorization", format!("Bearer {}", api_key))
                .send_json(&body)?;
            response.body_mut().read_json::<ChatCompletion>()
        })
        .await??;

        read_output(completion)
    }
}

fn read_output(completion: ChatCompletion) -> Result<String, ServiceError> {
    let content = completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| ServiceError::Payload("empty completion".to_string()))?;

    parse_output(&content)
}

/// Pull `output` out of the structured reply.
pub fn parse_output(content: &str) -> Result<String, ServiceError> {
    let reasoning: TextReasoning =
        serde_json::from_str(content).map_err(|e| ServiceError::Payload(e.to_string()))?;

    let text = reasoning.output.trim();
    if text.is_empty() {
        return Err(ServiceError::Payload("no text recognized".to_string()));
    }
    Ok(text.to_string())
}
