//! OpenAI 兼容的 chat-completions 客户端

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client as HttpClient, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::{parse_translations, BatchRequest, TranslationClient};
use crate::translation::config::TranslationConfig;
use crate::translation::error::{helpers, TranslationError, TranslationResult};

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// 把非成功的 HTTP 状态映射为错误
///
/// 401/403 为凭据错误，429 为限流，5xx 可重试，其余 4xx 不可重试。
pub fn status_error(status: StatusCode, body: &str) -> TranslationError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|response| response.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            helpers::credential_error(format!("API 拒绝了凭据 ({}): {}", status, message))
        }
        StatusCode::TOO_MANY_REQUESTS => TranslationError::RateLimitExceeded,
        _ => TranslationError::ServiceError {
            status: status.as_u16(),
            message,
        },
    }
}

/// OpenAI 兼容客户端
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
    verify_credentials: bool,
}

impl OpenAiClient {
    pub fn new(config: &TranslationConfig) -> TranslationResult<Self> {
        let http = HttpClient::builder()
            .timeout(config.batch_timeout())
            .user_agent(concat!("office-translator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| helpers::config_error(format!("无法创建 HTTP 客户端: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            verify_credentials: config.verify_credentials,
        })
    }

    fn api_key(&self) -> TranslationResult<&str> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(helpers::credential_error(
                "未设置 API 密钥 (OFFICE_TRANSLATOR_API_KEY 或 OPENAI_API_KEY)",
            )),
        }
    }

    fn headers(&self) -> TranslationResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key()?))
            .map_err(|_| helpers::credential_error("API 密钥包含非法字符"))?;
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }

    async fn check_status(response: reqwest::Response) -> TranslationResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

#[async_trait]
impl TranslationClient for OpenAiClient {
    async fn translate_batch(&self, request: &BatchRequest) -> TranslationResult<HashMap<String, String>> {
        let body = json!({
            "model": request.model,
            "messages": [
                { "role": "system", "content": request.system_prompt() },
                { "role": "user", "content": request.user_message() },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "response_format": { "type": "json_object" },
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let text = response.text().await?;
        let chat: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| TranslationError::MalformedResponse(format!("chat 响应无法解析: {}", e)))?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| TranslationError::MalformedResponse("响应中没有内容".to_string()))?;

        parse_translations(&content, request)
    }

    async fn ensure_credentials(&self) -> TranslationResult<()> {
        let headers = self.headers()?;
        if !self.verify_credentials {
            return Ok(());
        }

        let result = match self
            .http
            .get(format!("{}/models", self.base_url))
            .headers(headers)
            .send()
            .await
        {
            Ok(response) => Self::check_status(response).await.map(|_| ()),
            Err(e) => Err(e.into()),
        };

        match result {
            Err(e @ TranslationError::CredentialError(_)) => Err(e),
            Err(e) => {
                // 验证接口不可用时不阻止任务，批次请求会自行报告错误
                tracing::warn!("无法验证 API 凭据，继续执行: {}", e);
                Ok(())
            }
            Ok(()) => {
                tracing::debug!("API 凭据验证通过");
                Ok(())
            }
        }
    }
}
