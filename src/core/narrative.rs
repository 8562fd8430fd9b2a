use crate::domain::model::{InsightKind, InsightsOutcome, Metrics};
use crate::domain::ports::NarrativeClient;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_range, validate_url, Validate,
};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::LazyLock;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const API_KEY_ENV: &str = "NARRATIVE_API_KEY";

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```").expect("fenced block pattern is valid")
});

/// System instructions sent with each kind of request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstructionProfiles {
    pub analysis: String,
    pub media_plan: String,
    pub recommendations: String,
}

impl Default for InstructionProfiles {
    fn default() -> Self {
        Self {
            analysis: "You are a senior performance marketing analyst. You receive aggregated \
                       campaign metrics (spend, impressions, clicks, purchases, revenue, CTR, \
                       CPC, CPA, ROAS). Null means the export did not contain that metric. \
                       Reply with JSON only: {\"summary\": string, \"strengths\": [string], \
                       \"weaknesses\": [string], \"actions\": [string]}."
                .to_string(),
            media_plan: "You are a media planner. You receive answers about a business \
                         (product, audience, budget, goals). Reply with JSON only: \
                         {\"channels\": [{\"name\": string, \"budgetShare\": number, \
                         \"objective\": string}], \"timeline\": [string], \"kpis\": [string]}."
                .to_string(),
            recommendations: "You are a growth consultant. You receive answers about a business \
                              and optionally its campaign metrics. Reply with JSON only: \
                              {\"recommendations\": [{\"title\": string, \"detail\": string, \
                              \"priority\": \"high\"|\"medium\"|\"low\"}]}."
                .to_string(),
        }
    }
}

impl InstructionProfiles {
    pub fn for_kind(&self, kind: InsightKind) -> &str {
        match kind {
            InsightKind::Analysis => &self.analysis,
            InsightKind::MediaPlan => &self.media_plan,
            InsightKind::Recommendations => &self.recommendations,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    pub profiles: InstructionProfiles,
}

impl Default for NarrativeSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            temperature: 0.7,
            max_tokens: 1500,
            timeout_seconds: 60,
            profiles: InstructionProfiles::default(),
        }
    }
}

impl Validate for NarrativeSettings {
    fn validate(&self) -> Result<()> {
        validate_url("narrative.endpoint", &self.endpoint)?;
        validate_non_empty_string("narrative.model", &self.model)?;
        validate_range("narrative.temperature", self.temperature, 0.0, 2.0)?;
        validate_positive_number("narrative.max_tokens", self.max_tokens, 1)?;
        Ok(())
    }
}

/// OpenAI-compatible `chat/completions` client.
pub struct ChatCompletionsClient {
    client: Client,
    settings: NarrativeSettings,
}

impl ChatCompletionsClient {
    pub fn new(settings: NarrativeSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;
        Ok(Self { client, settings })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.endpoint.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl NarrativeClient for ChatCompletionsClient {
    async fn generate(&self, kind: InsightKind, payload: &Value) -> Result<String> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| EtlError::narrative("Missing API key for narrative backend"))?;

        let body = json!({
            "model": self.settings.model,
            "messages": [
                {"role": "system", "content": self.settings.profiles.for_kind(kind)},
                {"role": "user", "content": serde_json::to_string(payload)?},
            ],
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
        });

        tracing::debug!("Requesting {} insights from {}", kind, self.completions_url());
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EtlError::narrative(format!("API error ({}): {}", status, text)));
        }

        let json: Value = response.json().await?;
        json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| EtlError::narrative("Invalid response format: missing message content"))
    }
}

/// Pick the payload for a request: business answers when the caller has
/// them, otherwise the computed metrics.
pub fn build_payload(kind: InsightKind, metrics: &Metrics, answers: Option<Value>) -> Result<Value> {
    let metrics = serde_json::to_value(metrics)?;
    Ok(match (kind, answers) {
        (InsightKind::Analysis, _) | (_, None) => metrics,
        (InsightKind::Recommendations, Some(answers)) => {
            json!({"answers": answers, "metrics": metrics})
        }
        (InsightKind::MediaPlan, Some(answers)) => answers,
    })
}

/// Ask the backend for insights. Failures are captured in the outcome so the
/// caller can still present the metrics.
pub async fn generate_insights(
    client: Option<&dyn NarrativeClient>,
    kind: InsightKind,
    metrics: &Metrics,
    answers: Option<Value>,
) -> InsightsOutcome {
    let Some(client) = client else {
        tracing::warn!("Insights requested but no narrative backend is configured");
        return InsightsOutcome::Failed {
            kind,
            error: "No narrative backend configured".to_string(),
        };
    };

    let outcome = match build_payload(kind, metrics, answers) {
        Ok(payload) => client.generate(kind, &payload).await,
        Err(e) => Err(e),
    };

    // 產生失敗不影響已計算的指標
    match outcome {
        Ok(raw) => {
            let parsed = extract_json(&raw);
            if parsed.is_none() {
                tracing::warn!("Narrative response for {} is not valid JSON", kind);
            }
            InsightsOutcome::Generated { kind, raw, parsed }
        }
        Err(e) => {
            tracing::warn!("⚠️ Narrative generation failed: {}", e);
            InsightsOutcome::Failed {
                kind,
                error: e.to_string(),
            }
        }
    }
}

/// Best-effort JSON extraction from generated text. Handles bare JSON, code
/// fenced JSON and JSON surrounded by prose; returns `None` otherwise.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    for caps in FENCED_BLOCK.captures_iter(trimmed) {
        if let Ok(value) = serde_json::from_str(caps[1].trim()) {
            return Some(value);
        }
    }

    [('{', '}'), ('[', ']')].into_iter().find_map(|(open, close)| {
        let start = trimmed.find(open)?;
        let end = trimmed.rfind(close)?;
        (end > start)
            .then(|| serde_json::from_str(&trimmed[start..=end]).ok())
            .flatten()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn settings_for(server: &MockServer) -> NarrativeSettings {
        NarrativeSettings {
            endpoint: server.url("/v1"),
            api_key: Some("test-key".to_string()),
            ..NarrativeSettings::default()
        }
    }

    #[test]
    fn test_extract_plain_json() {
        let value = extract_json(r#"{"summary": "ok"}"#).unwrap();
        assert_eq!(value["summary"], "ok");
    }

    #[test]
    fn test_extract_fenced_json() {
        let text = "Here you go:\n```json\n{\"actions\": [\"raise budget\"]}\n```\nGood luck";
        let value = extract_json(text).unwrap();
        assert_eq!(value["actions"][0], "raise budget");
    }

    #[test]
    fn test_extract_json_in_prose() {
        let text = "Sure! {\"summary\": \"ROAS is healthy\"} Let me know.";
        assert_eq!(extract_json(text).unwrap()["summary"], "ROAS is healthy");
    }

    #[test]
    fn test_extract_malformed_json_is_none() {
        assert!(extract_json("```json\n{\"summary\": \n```").is_none());
        assert!(extract_json("no json here").is_none());
    }

    #[test]
    fn test_build_payload_prefers_answers() {
        let metrics = Metrics {
            total_spend: Some(10.0),
            ..Metrics::default()
        };
        let answers = json!({"budget": "5000"});

        let analysis = build_payload(InsightKind::Analysis, &metrics, Some(answers.clone())).unwrap();
        assert_eq!(analysis["totalSpend"], 10.0);

        let plan = build_payload(InsightKind::MediaPlan, &metrics, Some(answers.clone())).unwrap();
        assert_eq!(plan, answers);

        let recs = build_payload(InsightKind::Recommendations, &metrics, Some(answers)).unwrap();
        assert_eq!(recs["answers"]["budget"], "5000");
        assert_eq!(recs["metrics"]["totalSpend"], 10.0);

        let fallback = build_payload(InsightKind::MediaPlan, &metrics, None).unwrap();
        assert_eq!(fallback["totalSpend"], 10.0);
    }

    #[test]
    fn test_settings_validation() {
        assert!(NarrativeSettings::default().validate().is_ok());

        let bad = NarrativeSettings {
            temperature: 3.0,
            ..NarrativeSettings::default()
        };
        assert!(bad.validate().is_err());
    }

    #[tokio::test]
    async fn test_generate_sends_profile_and_reads_content() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer test-key")
                .body_contains("senior performance marketing analyst");
            then.status(200).json_body(json!({
                "choices": [{"message": {"content": "{\"summary\": \"fine\"}"}}]
            }));
        });

        let client = ChatCompletionsClient::new(settings_for(&server)).unwrap();
        let text = client
            .generate(InsightKind::Analysis, &json!({"totalSpend": 150.0}))
            .await
            .unwrap();

        api_mock.assert();
        assert_eq!(text, "{\"summary\": \"fine\"}");
    }

    #[tokio::test]
    async fn test_generate_reports_backend_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(503).body("overloaded");
        });

        let client = ChatCompletionsClient::new(settings_for(&server)).unwrap();
        let err = client
            .generate(InsightKind::MediaPlan, &json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, EtlError::NarrativeError { .. }));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_generate_requires_api_key() {
        let client = ChatCompletionsClient::new(NarrativeSettings::default()).unwrap();
        let err = client
            .generate(InsightKind::Analysis, &json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Missing API key"));
    }
}
