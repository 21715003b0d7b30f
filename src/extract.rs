//! Reply-content extraction through a chat-completion endpoint
//!
//! One POST per call, no retries. A failed call never reaches the
//! caller as an error: depending on the [`ExtractionProfile`] it
//! degrades to a locally built JSON envelope or to
//! [`ExtractionResult::Unavailable`].

use crate::config::ExtractorConfig;
use crate::error::Result;
use crate::message::MailMessage;
use crate::mime::flatten;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Which prompt to send and how to degrade when the call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionProfile {
    /// Latest reply of an ordinary conversation. Falls back locally.
    #[default]
    NormalEmail,
    /// Booking notifications from travel agencies.
    OtaBooking,
    /// Guest messages relayed by a property platform.
    PropertyMessage,
}

impl ExtractionProfile {
    /// Whether a failed call yields a local JSON envelope.
    #[must_use]
    pub const fn falls_back_locally(self) -> bool {
        matches!(self, Self::NormalEmail)
    }

    /// Build the prompt. Field values are embedded as-is.
    #[must_use]
    pub fn prompt(self, request: &ExtractionRequest) -> String {
        let date = request.date_display();
        match self {
            Self::NormalEmail => format!(
                "You are an email parser designed to extract only the most recent reply from an email message that may be in HTML format.\n\
                 \n\
                 Instructions:\n\
                 \x20   - Return only the content written in the latest reply.\n\
                 \x20   - Exclude any quoted text from previous messages (usually indicated by lines like \"On [date], [name] wrote:\" or \"From:\", \"Sent:\", \"Subject:\").\n\
                 \x20   - Remove email headers, disclaimers, signatures, and repetitive greetings.\n\
                 \x20   - If the content is in HTML, convert it to clean plain text, preserving line breaks and paragraph structure.\n\
                 \x20   - If there is no recent reply content, or the message consists only of images, the content is an empty string.\n\
                 \x20   - Return a JSON object of the form {{\"content\": \"...\"}}.\n\
                 \n\
                 From: {}\n\
                 Subject: {}\n\
                 Date: {date}\n\
                 Content:\n\
                 \n\
                 {}\n",
                request.sender, request.subject, request.content
            ),
            Self::OtaBooking => structured_prompt("BookingID or Property ID", request, &date),
            Self::PropertyMessage => structured_prompt("PropertyID", request, &date),
        }
    }
}

impl fmt::Display for ExtractionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NormalEmail => "normal",
            Self::OtaBooking => "booking",
            Self::PropertyMessage => "property",
        })
    }
}

fn structured_prompt(id_field: &str, request: &ExtractionRequest, date: &str) -> String {
    format!(
        "Extract key information from this email into JSON format with the following fields:\n\
         - From\n\
         - To\n\
         - Subject\n\
         - Date\n\
         - {id_field} (if present)\n\
         - Content (Only include the user-written message body. \
         Exclude any system notifications, UI elements, headers, replies, or boilerplate text.)\n\
         \n\
         Email details:\n\
         From: {}\n\
         To: [Extract from email header]\n\
         Subject: {}\n\
         Date: {date}\n\
         Content: {}\n\
         \n\
         Return only a **valid JSON object** with relevant fields properly extracted.",
        request.sender, request.subject, request.content
    )
}

/// The message fields a prompt is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub subject: String,
    pub content: String,
    pub sender: String,
    pub received_date: Option<DateTime<Utc>>,
}

impl ExtractionRequest {
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        content: impl Into<String>,
        sender: impl Into<String>,
        received_date: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            subject: subject.into(),
            content: content.into(),
            sender: sender.into(),
            received_date,
        }
    }

    /// Flatten a fetched message into a request.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::ContentRead`](crate::Error::ContentRead) and
    /// [`Error::NestingTooDeep`](crate::Error::NestingTooDeep) from
    /// flattening the body.
    pub fn from_message(message: &MailMessage) -> Result<Self> {
        Ok(Self {
            subject: message.subject_or_empty().to_string(),
            content: flatten(&message.body)?,
            sender: message
                .sender
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            received_date: message.sent_date,
        })
    }

    fn date_display(&self) -> String {
        self.received_date
            .map_or_else(|| "unknown".to_string(), |d| d.to_rfc2822())
    }
}

/// Outcome of one extraction call. Exactly one variant per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "json", rename_all = "snake_case")]
pub enum ExtractionResult {
    /// Raw text of the first completion choice, not validated as JSON.
    Extracted(String),
    /// Locally built `{"content":"..."}` envelope.
    Fallback(String),
    /// The call failed and the profile has no local fallback.
    Unavailable,
}

impl ExtractionResult {
    /// The JSON text, if any.
    #[must_use]
    pub fn as_json(&self) -> Option<&str> {
        match self {
            Self::Extracted(json) | Self::Fallback(json) => Some(json),
            Self::Unavailable => None,
        }
    }

    #[must_use]
    pub fn into_json(self) -> Option<String> {
        match self {
            Self::Extracted(json) | Self::Fallback(json) => Some(json),
            Self::Unavailable => None,
        }
    }

    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Hand-built fallback envelope.
///
/// `"` becomes `\"`, then each newline becomes the two characters `\n`.
/// Nothing else is escaped.
#[must_use]
pub fn fallback_json(content: &str) -> String {
    let escaped = content.replace('"', "\\\"").replace('\n', "\\n");
    format!("{{\"content\":\"{escaped}\"}}")
}

#[derive(Debug, Error)]
enum CallError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("endpoint returned {0}")]
    Status(StatusCode),

    #[error("malformed response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("response has no choices")]
    NoChoices,

    #[error("first choice has no content")]
    EmptyContent,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    n: u8,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Chat-completion client for one model and credential.
#[derive(Debug, Clone)]
pub struct Extractor {
    client: reqwest::Client,
    config: ExtractorConfig,
}

impl Extractor {
    #[must_use]
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Replace the HTTP client (timeouts, proxies).
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Run one extraction. Never fails; see [`ExtractionResult`].
    pub async fn extract(
        &self,
        profile: ExtractionProfile,
        request: &ExtractionRequest,
    ) -> ExtractionResult {
        let prompt = profile.prompt(request);

        match self.complete(&prompt).await {
            Ok(text) => {
                info!("Extracted content with {} ({} profile)", self.config.model, profile);
                ExtractionResult::Extracted(text)
            }
            Err(e) if profile.falls_back_locally() => {
                warn!("Extraction failed, using local fallback: {}", e);
                ExtractionResult::Fallback(fallback_json(&request.content))
            }
            Err(e) => {
                warn!("Extraction unavailable ({} profile): {}", profile, e);
                ExtractionResult::Unavailable
            }
        }
    }

    /// Shorthand for the [`ExtractionProfile::NormalEmail`] profile.
    pub async fn extract_normal(&self, request: &ExtractionRequest) -> ExtractionResult {
        self.extract(ExtractionProfile::NormalEmail, request).await
    }

    async fn complete(&self, prompt: &str) -> std::result::Result<String, CallError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            n: 1,
        };

        debug!("POST {} (model {})", self.config.endpoint, self.config.model);
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(CallError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(CallError::Status(status));
        }

        let parsed: ChatResponse = response.json().await.map_err(CallError::Decode)?;
        let first = parsed.choices.into_iter().next().ok_or(CallError::NoChoices)?;

        first
            .message
            .and_then(|m| m.content)
            .ok_or(CallError::EmptyContent)
    }
}
