use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use gigledger_marketplace::verdict::DEFAULT_FEEDBACK;
use gigledger_marketplace::{Verdict, VerificationRequest};

use super::{OracleError, VerificationOracle};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Oracle backed by the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiOracle {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiOracle {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateResponse {
    fn first_text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl VerificationOracle for GeminiOracle {
    async fn verify(&self, request: &VerificationRequest) -> Result<Verdict, OracleError> {
        if self.api_key.is_empty() {
            return Err(OracleError::InvalidConfig("no API key configured".into()));
        }

        let body = json!({
            "contents": [{ "parts": [{ "text": build_prompt(request) }] }],
            "generationConfig": { "temperature": 0.1, "maxOutputTokens": 1024 },
        });

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Status { status: status.as_u16() });
        }

        let parsed: GenerateResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(error = %e, "oracle body is not a generateContent response");
                return Ok(Verdict::unparseable());
            }
        };
        Ok(parse_verdict(&parsed.first_text()))
    }
}

fn build_prompt(request: &VerificationRequest) -> String {
    let mut prompt = String::from(
        "You review work submitted to a job marketplace. Decide whether the submission \
         fulfils the job.\n\n## Job\n",
    );
    prompt.push_str(&request.job_description);
    prompt.push('\n');
    if !request.job_files.is_empty() {
        prompt.push_str("\n## Job files\n");
        prompt.push_str(&request.job_files.join("\n"));
        prompt.push('\n');
    }
    prompt.push_str("\n## Submission\n");
    prompt.push_str(&request.submission_text);
    prompt.push('\n');
    if !request.submission_files.is_empty() {
        prompt.push_str("\n## Submission files\n");
        prompt.push_str(&request.submission_files.join("\n"));
        prompt.push('\n');
    }
    prompt.push_str(
        "\n## Answer\n\
         Reply with a single JSON object and nothing else:\n\
         {\"approved\": bool, \"cheated\": bool, \"feedback\": string}\n\
         - approved: the submission satisfies the job.\n\
         - cheated: only for clearly malicious, irrelevant or harmful content.\n\
         - feedback: two or three sentences explaining the decision.\n",
    );
    prompt
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(default)]
    approved: serde_json::Value,
    #[serde(default)]
    cheated: serde_json::Value,
    #[serde(default)]
    feedback: serde_json::Value,
}

fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
        serde_json::Value::Null => false,
    }
}

/// Extract the outermost `{...}` from model output and read a verdict from it.
///
/// Anything unreadable becomes a neutral, non-approving verdict.
pub fn parse_verdict(text: &str) -> Verdict {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Verdict::unparseable();
    };
    if end < start {
        return Verdict::unparseable();
    }
    let raw: RawVerdict = match serde_json::from_str(&text[start..=end]) {
        Ok(raw) => raw,
        Err(_) => return Verdict::neutral("Verification response parsing failed."),
    };
    let feedback = match &raw.feedback {
        serde_json::Value::String(s) if !s.is_empty() => s.clone(),
        serde_json::Value::Null => DEFAULT_FEEDBACK.to_string(),
        other if truthy(other) => other.to_string(),
        _ => DEFAULT_FEEDBACK.to_string(),
    };
    Verdict { approved: truthy(&raw.approved), cheated: truthy(&raw.cheated), feedback }
}
