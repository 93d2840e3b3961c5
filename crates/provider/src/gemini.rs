//! Gemini provider
//!
//! Google Generative Language REST API (`generateContent`).

use crate::*;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, trace};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Gemini provider
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    api_base: String,
    default_model: String,
}

impl GeminiProvider {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        let api_base = api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_base,
            default_model: default_model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        let model = if model.is_empty() {
            self.default_model.as_str()
        } else {
            model
        };
        format!("{}/models/{}:generateContent", self.api_base, model)
    }

    fn build_request(&self, params: &GenerateParams) -> serde_json::Value {
        let contents: Vec<serde_json::Value> = params.turns.iter().map(turn_to_content).collect();

        let mut body = json!({ "contents": contents });

        if !params.system_instruction.is_empty() {
            body["systemInstruction"] = json!({
                "parts": [{ "text": &params.system_instruction }]
            });
        }

        if !params.tools.is_empty() {
            let declarations: Vec<serde_json::Value> = params
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": &t.name,
                        "description": &t.description,
                        "parameters": &t.parameters
                    })
                })
                .collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
        }

        body
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<GenerateResponse> {
        let candidate = json["candidates"]
            .get(0)
            .ok_or_else(|| ProviderError::InvalidResponse("no candidates".to_string()))?;

        let mut text_parts = Vec::new();
        let mut function_calls = Vec::new();
        if let Some(parts) = candidate["content"]["parts"].as_array() {
            for part in parts {
                if let Some(text) = part["text"].as_str() {
                    text_parts.push(text.to_string());
                }
                if let Some(call) = part.get("functionCall") {
                    let name = call["name"].as_str().unwrap_or("").to_string();
                    let args = call.get("args").cloned().unwrap_or_else(|| json!({}));
                    function_calls.push(FunctionCall { name, args });
                }
            }
        }

        let text = if text_parts.is_empty() {
            None
        } else {
            Some(text_parts.concat())
        };

        let usage = json["usageMetadata"].as_object().map(|usage| Usage {
            prompt_tokens: usage
                .get("promptTokenCount")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
            response_tokens: usage
                .get("candidatesTokenCount")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
        });

        Ok(GenerateResponse {
            text,
            function_calls,
            usage,
        })
    }
}

fn turn_to_content(turn: &Turn) -> serde_json::Value {
    match turn {
        Turn::User(text) => json!({ "role": "user", "parts": [{ "text": text }] }),
        Turn::Model(ModelTurn::Text(text)) => {
            json!({ "role": "model", "parts": [{ "text": text }] })
        }
        Turn::Model(ModelTurn::Calls(calls)) => {
            let parts: Vec<serde_json::Value> = calls
                .iter()
                .map(|c| json!({ "functionCall": { "name": &c.name, "args": &c.args } }))
                .collect();
            json!({ "role": "model", "parts": parts })
        }
        Turn::ToolResults(results) => {
            let parts: Vec<serde_json::Value> = results
                .iter()
                .map(|r| {
                    json!({
                        "functionResponse": {
                            "name": &r.tool_name,
                            "response": { "result": &r.payload }
                        }
                    })
                })
                .collect();
            json!({ "role": "user", "parts": parts })
        }
    }
}

#[async_trait::async_trait]
impl Provider for GeminiProvider {
    async fn generate(&self, params: GenerateParams) -> Result<GenerateResponse> {
        if !self.is_configured() {
            return Err(ProviderError::NoApiKey);
        }

        let url = self.endpoint(&params.model);
        trace!("posting generateContent to {}", url);
        let body = self.build_request(&params);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            // Error bodies are not always JSON (proxies, gateway pages)
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|json| json["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(text);
            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited(message));
            }
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let json: serde_json::Value = serde_json::from_str(&text)?;
        let response = self.parse_response(json)?;
        debug!(
            "gemini response: {} function calls",
            response.function_calls.len()
        );
        Ok(response)
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}
