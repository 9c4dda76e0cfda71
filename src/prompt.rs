use serde_json::Value;
use std::path::Path;

use crate::config::ConfigError;

pub const CHALLENGE_LABEL: &str = "✨ Challenge Me";
pub const CHALLENGE_PROMPT: &str = "Generate a challenging interview question for a Machine Learning Engineer with expertise in Python, AWS SageMaker, and Random Forest models. Do not answer it yet.";
pub const CHALLENGE_SYSTEM_INSTRUCTION: &str = "You are a tough technical interviewer.";

pub fn greeting(profile: Option<&Value>) -> String {
    match owner_name(profile) {
        Some(name) => format!(
            "Hi! I'm {name}'s virtual assistant. Ask me about projects, skills, or education!"
        ),
        None => "Hi! I'm the portfolio's virtual assistant. Ask me about projects, skills, or education!".to_string(),
    }
}

/// Default system instruction. The profile is embedded verbatim as JSON.
pub fn system_instruction(profile: Option<&Value>) -> String {
    let name = owner_name(profile).unwrap_or("the portfolio owner");
    let resume = profile.map_or_else(|| "{}".to_string(), Value::to_string);

    format!(
        "You are an AI assistant representing {name}.\n\
         Here is the resume data: {resume}.\n\
         Your goal is to answer questions about {name} professionally and enthusiastically.\n\
         - If asked about skills, mention the specific tech stack from the resume data.\n\
         - If asked about projects, explain them in detail using the provided descriptions.\n\
         - Keep answers concise (under 3 sentences) unless asked for more detail.\n\
         - Format your response nicely using Markdown:\n  \
           - Use **bold** for emphasis.\n  \
           - Use bullet points (* or -) for lists.\n  \
           - Use `code` or ```code blocks``` for technical terms or commands.\n"
    )
}

pub fn load_profile(path: &Path) -> Result<Value, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ProfileRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::ProfileParse {
        path: path.to_path_buf(),
        source,
    })
}

fn owner_name(profile: Option<&Value>) -> Option<&str> {
    profile?
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
}
