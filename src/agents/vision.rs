use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{BackendError, ClassifierError};
use crate::models::ClassifierVerdict;
use crate::traits::ContentClassifier;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

const VALIDATION_PROMPT: &str = r#"Analyse this customer photo of a purchased product and answer with JSON in exactly this shape:
{
  "people": true/false,
  "score": 0-100,
  "decision": "accept"|"reject",
  "feedback": "one short sentence for the customer"
}

Rules:
1. people: true if any person (including children or recognisable body parts such as faces) is visible, otherwise false
2. score: photo quality 0-100 judged on sharpness, exposure, product visibility and composition
3. decision: "reject" if people is true OR score < 70 OR the photo contains inappropriate content, otherwise "accept"
4. feedback: a concrete, friendly hint that names the product type, e.g.
   - "Your sofa is clearly visible, sharp and well lit"
   - "The photo is too dark, try natural daylight"
   - "The product is out of focus, tap to focus on it"
   - "The photo contains people - please remove them from the frame"

Return ONLY the JSON, without any commentary."#;

const MAX_RETRIES: u32 = 2;

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AnswerMessage,
}

#[derive(Debug, Deserialize)]
struct AnswerMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// Vision classifier backed by the OpenAI chat completions API.
pub struct OpenAiClassifier {
    client: Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
}

impl OpenAiClassifier {
    pub fn new(
        api_key: Option<String>,
        model: String,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            model,
            endpoint: CHAT_COMPLETIONS_URL.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn request_body(&self, bytes: &[u8], mime_type: &str) -> ChatRequest {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);

        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: VALIDATION_PROMPT.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:{};base64,{}", mime_type, encoded),
                            detail: "low".to_string(),
                        },
                    },
                ],
            }],
            max_tokens: 300,
            temperature: 0.1,
        }
    }
}

#[async_trait]
impl ContentClassifier for OpenAiClassifier {
    async fn classify(
        &self,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<ClassifierVerdict, ClassifierError> {
        let api_key = self.api_key.as_deref().ok_or(ClassifierError::NotConfigured)?;
        let body = self.request_body(bytes, mime_type);

        let mut retry_count = 0;
        let mut backoff = 1u64;

        loop {
            info!("Requesting image analysis from {} ({} bytes, {})", self.model, bytes.len(), mime_type);

            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            let text = response.text().await.map_err(transport_error)?;

            if status.is_success() {
                let parsed: ChatResponse = serde_json::from_str(&text)
                    .map_err(|e| ClassifierError::MalformedResponse(e.to_string()))?;
                let content = parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .ok_or_else(|| ClassifierError::MalformedResponse("empty answer".to_string()))?;
                return parse_answer(&content);
            }

            let message = serde_json::from_str::<ApiError>(&text)
                .ok()
                .and_then(|e| e.error)
                .and_then(|e| e.message)
                .unwrap_or(text);

            let retryable = status.as_u16() == 429 || status.is_server_error();
            if retryable && retry_count < MAX_RETRIES {
                warn!("Vision API returned {}, retrying in {}s", status, backoff);
                retry_count += 1;
                tokio::time::sleep(Duration::from_secs(backoff)).await;
                backoff *= 2;
                continue;
            }

            return Err(match status.as_u16() {
                401 | 403 => ClassifierError::Unauthorized,
                429 => ClassifierError::RateLimited,
                400 => ClassifierError::BadRequest(message),
                code => ClassifierError::Transport(format!("status {}: {}", code, message)),
            });
        }
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

fn transport_error(e: reqwest::Error) -> ClassifierError {
    if e.is_timeout() {
        ClassifierError::Timeout
    } else {
        ClassifierError::Transport(e.to_string())
    }
}

/// Parses the model's JSON answer, tolerating a surrounding markdown fence.
pub fn parse_answer(content: &str) -> Result<ClassifierVerdict, ClassifierError> {
    let cleaned = strip_code_fence(content.trim());

    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| ClassifierError::MalformedResponse(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| ClassifierError::MalformedResponse("answer is not an object".to_string()))?;

    for field in ["people", "score", "decision", "feedback"] {
        if !object.contains_key(field) {
            return Err(ClassifierError::MalformedResponse(format!(
                "missing field '{}'",
                field
            )));
        }
    }

    Ok(ClassifierVerdict {
        contains_people: truthy(&object["people"]),
        score: numeric(&object["score"]),
        decision: object["decision"].as_str().map(str::to_string),
        feedback: object["feedback"].as_str().map(str::to_string),
    })
}

fn strip_code_fence(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("```") else {
        return content;
    };
    let rest = match rest.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
        _ => rest,
    };
    rest.trim().strip_suffix("```").unwrap_or(rest).trim()
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
        _ => false,
    }
}

fn numeric(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}
