//! OpenAI chat-completions client producing the six-section executive brief.

use crate::config::Settings;
use crate::engine::facade::SynthesisFacade;
use crate::engine::http;
use crate::error::{AppError, AppResult, Service};
use crate::model::{truncate_chars, BriefSections};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const SYSTEM_PROMPT: &str = r#"You are a precise business analyst. Return ONLY valid JSON that matches this schema:

{
  "company_overview": "string",
  "products_services": "string",
  "business_model": "string",
  "target_market": "string",
  "key_insights": "string",
  "competitive_positioning": "string"
}

Rules:
- No markdown, no code fences, no explanations.
- No extra keys.
- Each value is plain prose, never nested JSON.
- Each field must contain 2-3 concise paragraphs of professional prose."#;

const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 1800;

pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    char_cap: usize,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Model output. Earlier prompts asked for camelCase keys, so both spellings are accepted.
#[derive(Deserialize)]
struct WireBrief {
    #[serde(alias = "companyOverview")]
    company_overview: String,
    #[serde(alias = "productsServices")]
    products_services: String,
    #[serde(alias = "businessModel")]
    business_model: String,
    #[serde(alias = "targetMarket")]
    target_market: String,
    #[serde(alias = "keyInsights")]
    key_insights: String,
    #[serde(alias = "competitivePositioning")]
    competitive_positioning: String,
}

impl From<WireBrief> for BriefSections {
    fn from(w: WireBrief) -> Self {
        BriefSections {
            company_overview: w.company_overview.trim().to_string(),
            products_services: w.products_services.trim().to_string(),
            business_model: w.business_model.trim().to_string(),
            target_market: w.target_market.trim().to_string(),
            key_insights: w.key_insights.trim().to_string(),
            competitive_positioning: w.competitive_positioning.trim().to_string(),
        }
    }
}

/// Strip a surrounding ``` or ```json fence if the model added one anyway.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    rest.trim_end().trim_end_matches("```").trim()
}

pub(crate) fn parse_brief(raw: &str) -> AppResult<BriefSections> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(AppError::MalformedSynthesis("empty response".into()));
    }
    serde_json::from_str::<WireBrief>(body)
        .map(BriefSections::from)
        .map_err(|e| AppError::MalformedSynthesis(e.to_string()))
}

impl OpenAiClient {
    pub fn new(settings: &Settings) -> AppResult<Self> {
        Ok(Self {
            http: http::build_client(settings, Service::Synthesis)?,
            base_url: settings.openai_base_url.clone(),
            api_key: settings.openai_api_key.clone(),
            model: settings.openai_model.clone(),
            char_cap: settings.synthesis_char_cap,
        })
    }
}

#[async_trait]
impl SynthesisFacade for OpenAiClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn synthesize(&self, content: &str, company_name: &str) -> AppResult<BriefSections> {
        let key = self.api_key.as_deref().ok_or(AppError::Config {
            service: Service::Synthesis,
        })?;
        let trimmed = truncate_chars(content, self.char_cap);
        let user_prompt = format!(
            "Analyze the following website content for \"{company_name}\" and produce the JSON object defined by the system prompt.\n\nWebsite content:\n{trimmed}"
        );
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        debug!(model = %self.model, chars = trimmed.chars().count(), "requesting brief");
        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(Service::Synthesis, e))?;
        let resp = match http::check(Service::Synthesis, resp).await? {
            Ok(r) => r,
            Err((status, message)) => {
                warn!(%status, %message, "synthesis request rejected");
                return Err(AppError::facade(Service::Synthesis, message));
            }
        };
        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| AppError::MalformedSynthesis(e.to_string()))?;
        let raw = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::MalformedSynthesis("no response from model".into()))?;

        let sections = parse_brief(&raw)?;
        info!(company = company_name, "brief generated");
        Ok(sections)
    }
}
