use parley_model::{ErrorKind, ModelFinishReason, ModelRequest};
use serde::{Deserialize, Serialize};

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
    pub error: Option<ApiError>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    pub status: Option<String>,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        if self.code == Some(429)
            || self.status.as_deref() == Some("RESOURCE_EXHAUSTED")
        {
            ErrorKind::RateLimitExceeded
        } else {
            ErrorKind::Other
        }
    }
}

impl Candidate {
    /// Concatenated text of all parts in this candidate.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .flat_map(|content| &content.parts)
            .filter_map(|part| part.text.as_deref())
            .collect()
    }
}

/// Outcome of a finish reason reported by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Finish {
    Done(ModelFinishReason),
    Blocked,
}

pub fn parse_finish_reason(reason: &str) -> Finish {
    match reason {
        "STOP" => Finish::Done(ModelFinishReason::Stop),
        "MAX_TOKENS" => Finish::Done(ModelFinishReason::MaxTokens),
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT"
        | "SPII" | "LANGUAGE" => Finish::Blocked,
        _ => Finish::Done(ModelFinishReason::Other),
    }
}

// -----------------------------------
// Types shared by both the directions
// -----------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(req: &ModelRequest) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_owned()),
            parts: vec![Part {
                text: Some(req.prompt.clone()),
            }],
        }],
        generation_config: GenerationConfig {
            temperature: req.params.temperature,
            top_p: req.params.top_p,
            top_k: req.params.top_k,
            max_output_tokens: req.params.max_output_tokens,
        },
    }
}

#[cfg(test)]
mod tests {
    use parley_model::GenerationParams;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_create_request() {
        let request = ModelRequest {
            prompt: "User: Hello".to_owned(),
            params: GenerationParams {
                temperature: 0.5,
                top_p: 0.75,
                top_k: 40,
                max_output_tokens: 2048,
            },
        };
        let value = serde_json::to_value(create_request(&request)).unwrap();
        assert_eq!(
            value,
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [{ "text": "User: Hello" }]
                }],
                "generationConfig": {
                    "temperature": 0.5,
                    "topP": 0.75,
                    "topK": 40,
                    "maxOutputTokens": 2048
                }
            })
        );
    }

    #[test]
    fn test_parse_chunk() {
        let chunk: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hel"},{"text":"lo"}],"role":"model"},"finishReason":"STOP","index":0}],"modelVersion":"gemini-1.5-flash"}"#,
        )
        .unwrap();
        let candidate = &chunk.candidates[0];
        assert_eq!(candidate.text(), "Hello");
        assert_eq!(
            parse_finish_reason(candidate.finish_reason.as_deref().unwrap()),
            Finish::Done(ModelFinishReason::Stop)
        );
    }

    #[test]
    fn test_parse_error() {
        let chunk: GenerateContentResponse = serde_json::from_str(
            r#"{"error":{"code":429,"message":"quota","status":"RESOURCE_EXHAUSTED"}}"#,
        )
        .unwrap();
        let error = chunk.error.unwrap();
        assert_eq!(error.kind(), ErrorKind::RateLimitExceeded);
        assert_eq!(error.message, "quota");
    }

    #[test]
    fn test_blocked_finish_reason() {
        assert_eq!(parse_finish_reason("SAFETY"), Finish::Blocked);
        assert_eq!(
            parse_finish_reason("MAX_TOKENS"),
            Finish::Done(ModelFinishReason::MaxTokens)
        );
        assert_eq!(
            parse_finish_reason("FINISH_REASON_UNSPECIFIED"),
            Finish::Done(ModelFinishReason::Other)
        );
    }
}
