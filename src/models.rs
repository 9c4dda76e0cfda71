use serde::{Deserialize, Serialize};

// Proxy request format: `{ userPrompt, systemInstruction }`.
// Fields stay loose so a wrong type fails validation instead of deserialization.
#[derive(Deserialize, Default, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    #[serde(default)]
    pub user_prompt: Option<serde_json::Value>,
    #[serde(default)]
    pub system_instruction: Option<serde_json::Value>,
}

impl AskRequest {
    // Anything that isn't a JSON object becomes an empty request
    pub fn from_body(body: &[u8]) -> Self {
        match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(value @ serde_json::Value::Object(_)) => serde_json::from_value(value).unwrap_or_default(),
            _ => Self::default(),
        }
    }

    pub fn prompt(&self) -> Option<&str> {
        self.user_prompt.as_ref().and_then(serde_json::Value::as_str)
    }

    pub fn system(&self) -> Option<&str> {
        self.system_instruction.as_ref().and_then(serde_json::Value::as_str)
    }
}

// Body the client sends to the proxy
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AskPayload<'a> {
    pub user_prompt: &'a str,
    pub system_instruction: &'a str,
}

// Proxy success body
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AnswerBody {
    pub text: String,
}

// Proxy error body
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

// Client's lenient view of a proxy success body
#[derive(Deserialize, Debug, Default)]
pub struct ProxyAnswer {
    #[serde(default)]
    pub text: Option<String>,
}

// Gemini generateContent request format
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest<'a> {
    pub contents: Vec<Content<'a>>,
    pub system_instruction: Content<'a>,
}

impl<'a> GenerateContentRequest<'a> {
    pub fn new(prompt: &'a str, system_instruction: &'a str) -> Self {
        Self {
            contents: vec![Content::text(prompt)],
            system_instruction: Content::text(system_instruction),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct Content<'a> {
    pub parts: Vec<Part<'a>>,
}

impl<'a> Content<'a> {
    fn text(text: &'a str) -> Self {
        Self {
            parts: vec![Part { text }],
        }
    }
}

#[derive(Serialize, Debug)]
pub struct Part<'a> {
    pub text: &'a str,
}

// Gemini generateContent response format, success or error
#[derive(Deserialize, Debug, Default)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub error: Option<ApiErrorDetail>,
}

impl GenerateContentResponse {
    // candidates[0].content.parts[0].text
    pub fn into_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }

    pub fn error_message(self) -> Option<String> {
        self.error?.message
    }
}

#[derive(Deserialize, Debug)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Debug)]
pub struct CandidatePart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
}
