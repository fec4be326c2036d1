//! Image moderation.
//!
//! A [`Moderator`] answers one question about one image: does it contain a
//! spider? [`HttpModerator`] asks a vision model over a messages-style HTTP
//! API and returns the model's raw single-word answer.

use crate::config::LabelerConfig;
use crate::error::{LabelerError, LabelerResult};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// System prompt sent with every classification request.
pub const SYSTEM_PROMPT: &str = "You are being used as a moderation tool for a social network. \
The goal is to protect users from seeing images of spiders, because spiders are unpleasant to look at. \
You will be shown an image, and you will respond with a single word \"yes\" or \"no\" \
indicating whether the image contains a spider.

Example 1:
[User]: Does this image contain a spider? Respond with a single word \"Yes\" or \"No\".
[Assistant]: Yes

Example 2:
[User]: Does this image contain a spider? Respond with a single word \"Yes\" or \"No\".
[Assistant]: No
";

/// User prompt accompanying the image.
pub const USER_PROMPT: &str =
    "Does this image contain a spider? Respond with a single word \"Yes\" or \"No\".";

/// Image types the moderation model accepts.
pub const SUPPORTED_MEDIA_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4;

/// Returns true if the moderation model accepts `mime_type`.
pub fn is_supported_media_type(mime_type: &str) -> bool {
    SUPPORTED_MEDIA_TYPES.contains(&mime_type)
}

/// Canonicalizes a model answer.
///
/// `yes` and `no` in any case, with surrounding whitespace, become `Yes` and
/// `No`. Anything else is returned as received.
pub fn normalize_verdict(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("yes") {
        "Yes".to_string()
    } else if trimmed.eq_ignore_ascii_case("no") {
        "No".to_string()
    } else {
        raw.to_string()
    }
}

/// Classifies images.
#[async_trait]
pub trait Moderator: Send + Sync {
    /// Returns the raw verdict for one image.
    async fn classify(&self, image: &[u8], mime_type: &str) -> LabelerResult<String>;
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock<'a> {
    Image { source: ImageSource<'a> },
    Text { text: &'a str },
}

#[derive(Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'a str,
    data: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl MessagesResponse {
    fn first_text(self) -> Option<String> {
        self.content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
    }
}

/// Moderator backed by a vision model behind an HTTP messages API.
pub struct HttpModerator {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl HttpModerator {
    /// Creates a moderator from configuration.
    ///
    /// # Errors
    ///
    /// Fails if no API key is configured or the HTTP client cannot be built.
    pub fn new(config: &LabelerConfig) -> LabelerResult<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            url: config.moderation_api_url.clone(),
            api_key: config.moderation_api_key.clone().unwrap_or_default(),
            model: config.moderation_model.clone(),
        })
    }

    fn request<'a>(&'a self, image: &[u8], mime_type: &'a str) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: 0.0,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource {
                            kind: "base64",
                            media_type: mime_type,
                            data: STANDARD.encode(image),
                        },
                    },
                    ContentBlock::Text { text: USER_PROMPT },
                ],
            }],
        }
    }
}

#[async_trait]
impl Moderator for HttpModerator {
    async fn classify(&self, image: &[u8], mime_type: &str) -> LabelerResult<String> {
        let body = self.request(image, mime_type);
        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: MessagesResponse = response.json().await?;
        let verdict = parsed
            .first_text()
            .ok_or_else(|| LabelerError::Moderation("response has no text block".into()))?;
        debug!(mime_type, verdict = %verdict, "image classified");
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdicts_normalize() {
        assert_eq!(normalize_verdict("Yes"), "Yes");
        assert_eq!(normalize_verdict("yes"), "Yes");
        assert_eq!(normalize_verdict(" YES\n"), "Yes");
        assert_eq!(normalize_verdict("no"), "No");
        assert_eq!(normalize_verdict("\tNo "), "No");
    }

    #[test]
    fn unknown_verdicts_pass_through() {
        assert_eq!(normalize_verdict("Maybe"), "Maybe");
        assert_eq!(normalize_verdict(" Yes."), " Yes.");
        assert_eq!(normalize_verdict(""), "");
    }

    #[test]
    fn supported_media_types() {
        assert!(is_supported_media_type("image/jpeg"));
        assert!(is_supported_media_type("image/webp"));
        assert!(!is_supported_media_type("image/heic"));
        assert!(!is_supported_media_type("video/mp4"));
    }

    #[test]
    fn moderator_requires_api_key() {
        assert!(matches!(
            HttpModerator::new(&LabelerConfig::default()),
            Err(LabelerError::Config(_))
        ));
    }

    #[test]
    fn request_body_shape() {
        let config = LabelerConfig::new().with_moderation_api_key("k");
        let moderator = HttpModerator::new(&config).unwrap();
        let body = serde_json::to_value(moderator.request(b"abc", "image/png")).unwrap();

        assert_eq!(body["model"], "claude-3-haiku-20240307");
        assert_eq!(body["max_tokens"], 4);
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["system"], SYSTEM_PROMPT);
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["type"], "base64");
        assert_eq!(content[0]["source"]["media_type"], "image/png");
        assert_eq!(content[0]["source"]["data"], "YWJj");
        assert_eq!(content[1]["type"], "text");
        assert_eq!(content[1]["text"], USER_PROMPT);
    }

    #[test]
    fn response_first_text_block() {
        let parsed: MessagesResponse = serde_json::from_str(
            r#"{"id":"msg_1","content":[{"type":"text","text":"No"}],"stop_reason":"max_tokens"}"#,
        )
        .unwrap();
        assert_eq!(parsed.first_text().as_deref(), Some("No"));

        let empty: MessagesResponse = serde_json::from_str(r#"{"content":[]}"#).unwrap();
        assert!(empty.first_text().is_none());
    }
}
