use crate::oracle::{Oracle, OracleError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_TEMPERATURE: f64 = 0.2;

/// Everything needed to reach one OpenAI-compatible endpoint.
///
/// Built explicitly (tests, embedding callers) or resolved once from the environment with
/// [`OracleConfig::from_env`]. Nothing below this type reads process state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    pub provider: String,
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    /// Where the model string came from (env vs default).
    pub model_source: String,
    pub temperature: f64,
    /// Optional OpenRouter attribution headers.
    pub site_url: Option<String>,
    pub app_name: Option<String>,
}

impl OracleConfig {
    pub fn new(provider: &str, base_url: &str, api_key: Option<String>, model: &str) -> Self {
        Self {
            provider: provider.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            model_source: "explicit".to_string(),
            temperature: DEFAULT_TEMPERATURE,
            site_url: None,
            app_name: None,
        }
    }

    /// Resolve provider, model and key from env vars, walking the provider order.
    ///
    /// `probe_timeout` bounds the Ollama reachability check.
    pub async fn from_env(probe_timeout: Duration) -> Result<Self, OracleError> {
        let (p, model, model_source) = select_provider(probe_timeout).await?;
        let api_key = p.api_key_env.and_then(env_value);
        let temperature = env_value("TOT24_TEMPERATURE")
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(DEFAULT_TEMPERATURE);
        let (site_url, app_name) = if p.name == "openrouter" {
            (env_value("OPENROUTER_SITE_URL"), env_value("OPENROUTER_APP_NAME"))
        } else {
            (None, None)
        };
        Ok(Self {
            provider: p.name.to_string(),
            base_url: p.base_url,
            api_key,
            model,
            model_source,
            temperature,
            site_url,
            app_name,
        })
    }
}

#[derive(Debug, Clone)]
struct Provider {
    name: &'static str,
    base_url: String,
    api_key_env: Option<&'static str>,
    model_env: &'static str,
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn base_url_from_env(key: &str, default: &str) -> String {
    env_value(key)
        .unwrap_or_else(|| default.to_string())
        .trim_end_matches('/')
        .to_string()
}

fn providers_from_env() -> Vec<Provider> {
    vec![
        Provider {
            name: "ollama",
            base_url: base_url_from_env("OLLAMA_HOST", "http://localhost:11434"),
            api_key_env: None,
            model_env: "OLLAMA_MODEL",
        },
        Provider {
            name: "groq",
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key_env: Some("GROQ_API_KEY"),
            model_env: "GROQ_MODEL",
        },
        Provider {
            name: "gemini",
            base_url: base_url_from_env(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta/openai",
            ),
            api_key_env: Some("GOOGLE_API_KEY"),
            model_env: "GEMINI_MODEL",
        },
        Provider {
            name: "openrouter",
            base_url: base_url_from_env("OPENROUTER_BASE_URL", "https://openrouter.ai/api/v1"),
            api_key_env: Some("OPENROUTER_API_KEY"),
            model_env: "OPENROUTER_MODEL",
        },
        Provider {
            name: "openai",
            base_url: base_url_from_env("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            api_key_env: Some("OPENAI_API_KEY"),
            model_env: "OPENAI_MODEL",
        },
        // Generic OpenAI-compatible gateway.
        Provider {
            name: "gpt",
            base_url: base_url_from_env("GPT_API_URL", "https://api.openai.com/v1"),
            api_key_env: Some("GPT_API_KEY"),
            model_env: "GPT_MODEL",
        },
    ]
}

fn provider_order() -> Vec<String> {
    if let Some(v) = env_value("TOT24_PROVIDER_ORDER") {
        return v
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    vec![
        "ollama".into(),
        "groq".into(),
        "gemini".into(),
        "openai".into(),
        "gpt".into(),
        "openrouter".into(),
    ]
}

fn default_model_from_env(provider_name: &str) -> Option<(String, String)> {
    // Provider-specific override wins.
    let key1 = format!("TOT24_DEFAULT_MODEL_{}", provider_name.to_uppercase());
    for k in [key1.as_str(), "TOT24_DEFAULT_MODEL"] {
        if let Some(v) = env_value(k) {
            return Some((v, k.to_string()));
        }
    }
    None
}

fn hardcoded_default_model(provider_name: &str) -> Option<&'static str> {
    // No default for Ollama; local installs vary.
    match provider_name {
        "openrouter" => Some("openai/gpt-4o-mini"),
        "openai" => Some("gpt-4o-mini"),
        "gpt" => Some("gpt-3.5-turbo"),
        "groq" => Some("llama-3.1-8b-instant"),
        "gemini" => Some("gemini-2.0-flash"),
        _ => None,
    }
}

async fn is_ollama_reachable(base_url: &str, timeout: Duration) -> bool {
    let client = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(c) => c,
        Err(_) => return false,
    };
    let candidates = [
        format!("{base_url}/v1/models"),
        format!("{base_url}/api/tags"),
    ];
    for u in candidates {
        if let Ok(resp) = client.get(u).send().await {
            // 200 OK, 401 unauthorized, 404 not found all indicate "there is something there".
            if matches!(resp.status().as_u16(), 200 | 401 | 404) {
                return true;
            }
        }
    }
    false
}

async fn select_provider(timeout: Duration) -> Result<(Provider, String, String), OracleError> {
    let provs = providers_from_env();
    for name in provider_order() {
        let Some(p) = provs.iter().find(|pp| pp.name == name).cloned() else {
            continue;
        };
        if let Some(k) = p.api_key_env {
            if env_value(k).is_none() {
                continue;
            }
        }
        let (model, model_source) = match env_value(p.model_env) {
            Some(m) => (m, "env".to_string()),
            None => {
                if !crate::env::env_truthy("TOT24_MODEL_DEFAULTS", true) {
                    continue;
                }
                if let Some((m, key)) = default_model_from_env(p.name) {
                    (m, format!("default_env_override({key})"))
                } else if let Some(m) = hardcoded_default_model(p.name) {
                    (m.to_string(), "default_hardcoded".to_string())
                } else {
                    continue;
                }
            }
        };
        if p.name == "ollama" && !is_ollama_reachable(&p.base_url, timeout).await {
            continue;
        }
        return Ok((p, model, model_source));
    }
    Err(OracleError::Config(
        "No usable provider found. Set one of:\n\
- OLLAMA_MODEL (+ optional OLLAMA_HOST)\n\
- GROQ_API_KEY (+ optional GROQ_MODEL)\n\
- GOOGLE_API_KEY (+ optional GEMINI_MODEL, GEMINI_BASE_URL)\n\
- OPENAI_API_KEY (+ optional OPENAI_MODEL, OPENAI_BASE_URL)\n\
- GPT_API_KEY (+ optional GPT_API_URL, GPT_MODEL)\n\
- OPENROUTER_API_KEY (+ optional OPENROUTER_MODEL)\n\
Optionally set:\n\
- TOT24_PROVIDER_ORDER\n\
- TOT24_DEFAULT_MODEL / TOT24_DEFAULT_MODEL_<PROVIDER>\n\
- TOT24_MODEL_DEFAULTS=0 to disable built-in defaults"
            .to_string(),
    ))
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

/// OpenAI-compatible chat completions as an [`Oracle`].
///
/// Invariants:
/// - request path is `POST <base_url>/chat/completions`
/// - one user message per prompt, no system message
/// - `Authorization: Bearer <key>` when a key is configured
/// - OpenRouter adds `HTTP-Referer` and `X-Title` when configured
///
/// The inner `reqwest::Client` is a connection pool and is shared by concurrent calls.
pub struct ChatOracle {
    config: OracleConfig,
    client: reqwest::Client,
}

impl ChatOracle {
    pub fn new(config: OracleConfig, timeout: Duration) -> Result<Self, OracleError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        if let Some(key) = config.api_key.as_deref() {
            let hv = reqwest::header::HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| OracleError::Config(format!("invalid Authorization header: {e}")))?;
            headers.insert(reqwest::header::AUTHORIZATION, hv);
        }
        if let Some(site) = config.site_url.as_deref() {
            if let Ok(hv) = reqwest::header::HeaderValue::from_str(site) {
                headers.insert("HTTP-Referer", hv);
            }
        }
        if let Some(app) = config.app_name.as_deref() {
            if let Ok(hv) = reqwest::header::HeaderValue::from_str(app) {
                headers.insert("X-Title", hv);
            }
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    fn payload(&self, prompt: &str) -> Value {
        serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "temperature": self.config.temperature
        })
    }
}

/// Pull `choices[0].message.content` out of a chat completion body.
fn completion_content(raw: Value) -> Result<String, OracleError> {
    let parsed: ChatCompletionResponse = serde_json::from_value(raw)
        .map_err(|e| OracleError::Response(format!("invalid chat response: {e}")))?;
    let msg = parsed
        .choices
        .first()
        .and_then(|c| c.message.as_object())
        .ok_or_else(|| OracleError::Response("missing choices[0].message".to_string()))?;
    Ok(msg
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string())
}

#[async_trait]
impl Oracle for ChatOracle {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let resp = self
            .client
            .post(url)
            .json(&self.payload(prompt))
            .send()
            .await?;
        let status = resp.status();
        let raw: Value = resp.json().await?;
        if !status.is_success() {
            return Err(OracleError::Status {
                provider: self.config.provider.clone(),
                status: status.as_u16(),
                body: raw.to_string(),
            });
        }
        completion_content(raw)
    }
}
