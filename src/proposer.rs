//! Mutation proposals from a chat-completion language model.
//!
//! The model sees the whole source file plus the covered line numbers and is
//! asked for [`MUTATIONS_PER_FILE`] single-line substitutions as JSON. Every
//! failure on this path is logged and turns into an empty proposal list so
//! the session can move on to the next file.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::coverage::CoverageInfo;
use crate::error::GenerationError;
use crate::mutants::Mutation;

pub const MUTATIONS_PER_FILE: usize = 3;
pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

const TEMPERATURE: f32 = 0.1;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);
const TYPE_KEYWORDS: &[&str] = &["class", "interface", "enum", "record"];

/// Anything that can turn a prompt into reply text.
pub trait GenerationService {
    fn complete(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// 0-based index of the first line declaring a type.
pub fn find_anchor(source: &str) -> Option<usize> {
    source.lines().position(|line| {
        line.split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
            .any(|word| TYPE_KEYWORDS.contains(&word))
    })
}

pub fn build_prompt(info: &CoverageInfo) -> String {
    let lines = info
        .covered_lines
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You are a mutation testing expert. Generate exactly {count} mutations for the Java code below.
The code is from file {path}.
Only mutate the covered lines (line numbers: [{lines}]).
Do not modify the class structure or method signatures.
Only modify the implementation lines within methods.
Each mutation replaces exactly one whole line.

Original code:
```java
{source}
```

Reply with JSON only, in this format:
{{
    "mutations": [
        {{
            "line_number": <line number>,
            "original_line": "<exact original line from code>",
            "mutated_line": "<modified version of the exact line>",
            "mutation_type": "<description of mutation>"
        }}
    ]
}}
"#,
        count = MUTATIONS_PER_FILE,
        path = info.file_path.display(),
        lines = lines,
        source = info.source_code,
    )
}

#[derive(Debug, Deserialize)]
struct MutationReply {
    mutations: Vec<Mutation>,
}

/// Parse the model's reply. A surrounding markdown code fence is tolerated.
pub fn parse_reply(content: &str) -> Result<Vec<Mutation>, GenerationError> {
    let reply: MutationReply = serde_json::from_str(strip_code_fence(content))?;
    Ok(reply.mutations)
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) on the opening fence line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Keep only proposals that target a covered line.
pub fn retain_covered(info: &CoverageInfo, mutations: Vec<Mutation>) -> Vec<Mutation> {
    mutations
        .into_iter()
        .filter(|m| {
            let covered = info.covered_lines.contains(&m.line_number);
            if !covered {
                warn!(
                    file = %info.file_path.display(),
                    line = m.line_number,
                    "dropping proposal for uncovered line"
                );
            }
            covered
        })
        .collect()
}

/// Ask `service` for mutations of one file. Never fails; problems are logged
/// and yield no mutations.
pub fn propose(service: &dyn GenerationService, info: &CoverageInfo) -> Vec<Mutation> {
    let file = info.file_path.display();

    if find_anchor(&info.source_code).is_none() {
        warn!(file = %file, "could not find class declaration, nothing to mutate");
        return Vec::new();
    }
    if info.covered_lines.is_empty() {
        info!(file = %file, "no covered lines, nothing to mutate");
        return Vec::new();
    }

    info!(file = %file, "requesting mutation proposals");
    let content = match service.complete(&build_prompt(info)) {
        Ok(content) => content,
        Err(e) => {
            warn!(file = %file, error = %e, "mutation request failed");
            return Vec::new();
        }
    };
    debug!(file = %file, reply = %content, "generation reply");

    match parse_reply(&content) {
        Ok(mutations) => {
            let mutations = retain_covered(info, mutations);
            info!(file = %file, count = mutations.len(), "generated mutations");
            mutations
        }
        Err(e) => {
            warn!(file = %file, error = %e, reply = %content, "invalid mutation reply");
            Vec::new()
        }
    }
}

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(api_key: &str, model: &str, api_base: &str) -> Result<Self, GenerationError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_http(http, api_key, model, api_base))
    }

    /// Use a preconfigured HTTP client (proxies, TLS roots, timeouts).
    pub fn with_http(http: reqwest::blocking::Client, api_key: &str, model: &str, api_base: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

impl GenerationService for OpenAiClient {
    fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse = response.json()?;
        reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(GenerationError::EmptyReply)
    }
}
