//! Gemini-backed stat oracle.
//!
//! Sends one `generateContent` request per level-up and reads the first
//! JSON object out of the reply text.

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::json;

use super::{extract_proposal, OracleError, StatOracle, StatProposal};
use crate::config::OracleConfig;
use crate::logutil::escape_log;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

pub struct GeminiOracle {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiOracle {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    /// Key from the config file first, then from the configured environment
    /// variable. `None` when neither is set.
    pub fn from_config(config: &OracleConfig) -> Option<Self> {
        let key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(&config.api_key_env).ok())
            .filter(|k| !k.trim().is_empty())?;
        Some(Self::new(config.endpoint.clone(), key))
    }
}

/// Prompt asking for a themed split of `points` across the four stats.
pub fn build_prompt(quest_names: &[String], level: u32, points: u32) -> String {
    let quests = if quest_names.is_empty() {
        "None".to_string()
    } else {
        quest_names.join(", ")
    };
    format!(
        "You are the SYSTEM of a habit-tracking RPG. A hunter has just reached level {level}.\n\
         \n\
         Their daily quests are: {quests}\n\
         \n\
         Distribute {points} stat points across STR (Strength), VIT (Vitality), \
         AGI (Agility) and INT (Intelligence), themed on the quests:\n\
         - exercise such as gym, running or workouts favours STR, VIT and AGI\n\
         - study, reading and learning favour INT\n\
         - sleep and meditation favour VIT\n\
         - speed or dexterity tasks favour AGI\n\
         - general productivity gets a balanced split\n\
         \n\
         Respond with ONLY a JSON object, no markdown and no other text:\n\
         {{\"str\": X, \"vit\": Y, \"agi\": Z, \"int\": W}}\n\
         where X + Y + Z + W = {points} and every value is 0 or greater."
    )
}

#[async_trait]
impl StatOracle for GeminiOracle {
    async fn propose(
        &self,
        quest_names: &[String],
        level: u32,
        points: u32,
    ) -> Result<StatProposal, OracleError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": build_prompt(quest_names, level, points) }] }]
        });
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OracleError::Status(response.status().as_u16()));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(e.to_string()))?;
        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.trim().to_string())
            .ok_or_else(|| OracleError::Malformed("empty candidate list".into()))?;
        debug!("Gemini stat reply: {}", escape_log(&text));
        extract_proposal(&text)
    }
}
