//! Advisory collaborator boundary
//!
//! Free-text prompt plus snapshot context in, either prose or a structured
//! strategy list out. The reply is an explicit sum type; a structurally
//! invalid strategy payload degrades to the Text variant instead of failing.

use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AdvisorConfig;
use crate::errors::AdvisorError;
use crate::types::{AmountSpec, PortfolioSnapshot, SwapStrategy};

/// What the advisory service answered
#[derive(Debug, Clone, PartialEq)]
pub enum AdvisorReply {
    Text(String),
    Strategies(Vec<SwapStrategy>),
}

const STRATEGY_SYSTEM_PROMPT: &str = r#"You are a DeFi portfolio advisor. For trading strategy requests, respond ONLY with a valid JSON object in this exact format:
{
  "strategies": [
    {
      "title": "Strategy title",
      "description": "Why this strategy makes sense",
      "fromToken": "TOKEN_SYMBOL",
      "toToken": "TOKEN_SYMBOL",
      "amount": "percentage or amount",
      "estimatedToAmount": "estimated amount",
      "actionId": "unique-id"
    }
  ]
}
Provide 1-3 realistic trading strategies based on current market conditions. Use token symbols from the user's portfolio."#;

const ANALYSIS_SYSTEM_PROMPT: &str = "You are a DeFi portfolio advisor. For analysis and price prediction requests, provide detailed text responses with specific insights about market conditions, price analysis, and recommendations.";

/// Prompts asking for actionable trades get the structured-output contract
fn is_strategy_prompt(prompt: &str) -> bool {
    let lower = prompt.to_lowercase();
    ["strategy", "trade", "swap", "opportunities"]
        .iter()
        .any(|kw| lower.contains(kw))
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct StrategyEnvelope {
    strategies: Vec<WireStrategy>,
}

#[derive(Debug, Deserialize)]
struct WireStrategy {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "fromToken")]
    from_token: String,
    #[serde(rename = "toToken")]
    to_token: String,
    amount: String,
    #[serde(rename = "estimatedToAmount", default)]
    estimated_to_amount: Option<String>,
    #[serde(rename = "actionId", default)]
    action_id: Option<String>,
}

/// Map a structured reply into strategies; any malformed record voids the
/// whole structured interpretation (the caller falls back to Text)
fn parse_strategies(content: &str) -> Option<Vec<SwapStrategy>> {
    let envelope: StrategyEnvelope = serde_json::from_str(content).ok()?;
    if envelope.strategies.is_empty() {
        return None;
    }

    let mut strategies = Vec::with_capacity(envelope.strategies.len());
    for wire in envelope.strategies {
        let amount = AmountSpec::parse(&wire.amount)?;
        let estimated_to_amount = match &wire.estimated_to_amount {
            Some(raw) => raw.trim().parse::<f64>().ok()?,
            None => 0.0,
        };
        strategies.push(SwapStrategy {
            id: wire
                .action_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            title: wire.title,
            description: wire.description,
            from_symbol: wire.from_token,
            to_symbol: wire.to_token,
            amount,
            estimated_to_amount,
        });
    }
    Some(strategies)
}

/// Chat-completions client for strategy suggestions
pub struct AdvisorClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl AdvisorClient {
    pub fn new(config: &AdvisorConfig, api_key: Option<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key,
        })
    }

    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    /// Ask for a suggestion with the current snapshot as context
    pub async fn suggest(
        &self,
        prompt: &str,
        snapshot: Option<&PortfolioSnapshot>,
    ) -> Result<AdvisorReply, AdvisorError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(AdvisorError::CredentialsMissing)?;

        let structured = is_strategy_prompt(prompt);
        let system = if structured {
            STRATEGY_SYSTEM_PROMPT
        } else {
            ANALYSIS_SYSTEM_PROMPT
        };
        let portfolio = snapshot
            .map(|s| s.context_json().to_string())
            .unwrap_or_else(|| "{}".to_string());

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": format!("Portfolio: {}. Question: {}", portfolio, prompt) }
            ],
            "max_tokens": if structured { 300 } else { 200 },
        });

        let response = self
            .http
            .post(&self.base_url)
            .bearer_auth(api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AdvisorError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AdvisorError::Http(format!(
                "HTTP {}",
                response.status().as_u16()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|_| AdvisorError::Malformed)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(AdvisorError::Malformed)?;

        if structured {
            if let Some(strategies) = parse_strategies(&content) {
                debug!(count = strategies.len(), "Structured strategies received");
                return Ok(AdvisorReply::Strategies(strategies));
            }
            warn!("Strategy reply was not valid JSON, treating as text");
        }

        Ok(AdvisorReply::Text(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str, key: Option<&str>) -> AdvisorClient {
        AdvisorClient::new(
            &AdvisorConfig {
                base_url: base_url.to_string(),
                model: "pplx-70b-online".to_string(),
            },
            key.map(String::from),
        )
        .unwrap()
    }

    fn chat_body(content: &str) -> String {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })
        .to_string()
    }

    #[test]
    fn test_prompt_classification() {
        assert!(is_strategy_prompt("Suggest a trading STRATEGY for me"));
        assert!(is_strategy_prompt("any good swap opportunities?"));
        assert!(!is_strategy_prompt("what will SOL be worth next year?"));
    }

    #[test]
    fn test_parse_strategies_happy_path() {
        let content = r#"{"strategies":[{"title":"Rotate","description":"d","fromToken":"USDT","toToken":"SOL","amount":"50%","estimatedToAmount":"2.1","actionId":"abc"}]}"#;
        let strategies = parse_strategies(content).unwrap();
        assert_eq!(strategies.len(), 1);
        assert_eq!(strategies[0].id, "abc");
        assert_eq!(strategies[0].amount, AmountSpec::Percentage(50.0));
        assert!((strategies[0].estimated_to_amount - 2.1).abs() < 1e-9);
    }

    #[test]
    fn test_parse_strategies_rejects_malformed_records() {
        // Not JSON at all
        assert!(parse_strategies("try rotating into SOL").is_none());
        // Empty list
        assert!(parse_strategies(r#"{"strategies":[]}"#).is_none());
        // Uninterpretable amount voids the structured reading
        let bad_amount = r#"{"strategies":[{"title":"x","description":"","fromToken":"USDT","toToken":"SOL","amount":"half of it"}]}"#;
        assert!(parse_strategies(bad_amount).is_none());
    }

    #[test]
    fn test_parse_strategies_generates_missing_action_id() {
        let content = r#"{"strategies":[{"title":"x","description":"","fromToken":"USDT","toToken":"SOL","amount":"1.5"}]}"#;
        let strategies = parse_strategies(content).unwrap();
        assert!(!strategies[0].id.is_empty());
        assert_eq!(strategies[0].estimated_to_amount, 0.0);
    }

    #[tokio::test]
    async fn test_missing_key_short_circuits() {
        let client = client("http://127.0.0.1:1", None);
        let err = client.suggest("trade ideas", None).await.unwrap_err();
        assert!(matches!(err, AdvisorError::CredentialsMissing));
    }

    #[tokio::test]
    async fn test_structured_reply_parses_into_strategies() {
        let mut server = mockito::Server::new_async().await;
        let inner = r#"{"strategies":[{"title":"Rotate","description":"d","fromToken":"USDT","toToken":"SOL","amount":"25%","estimatedToAmount":"1.0","actionId":"a1"}]}"#;
        server
            .mock("POST", "/")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_body(chat_body(inner))
            .create_async()
            .await;

        let client = client(&server.url(), Some("test-key"));
        let reply = client.suggest("best trade now?", None).await.unwrap();
        match reply {
            AdvisorReply::Strategies(list) => assert_eq!(list[0].id, "a1"),
            other => panic!("expected strategies, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_structured_reply_degrades_to_text() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(chat_body("Consider rotating stables into SOL."))
            .create_async()
            .await;

        let client = client(&server.url(), Some("test-key"));
        let reply = client.suggest("swap suggestions?", None).await.unwrap();
        assert_eq!(
            reply,
            AdvisorReply::Text("Consider rotating stables into SOL.".to_string())
        );
    }

    #[tokio::test]
    async fn test_analysis_prompt_returns_text_unchanged() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(chat_body("SOL looks range-bound."))
            .create_async()
            .await;

        let client = client(&server.url(), Some("test-key"));
        let reply = client.suggest("price outlook for SOL", None).await.unwrap();
        assert_eq!(reply, AdvisorReply::Text("SOL looks range-bound.".to_string()));
    }
}
