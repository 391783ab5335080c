//! 远程翻译客户端
//!
//! 分发器只依赖 [`TranslationClient`]，测试中可以替换为脚本化的实现。

pub mod openai;

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::translation::config::{constants, TargetLanguage, TranslationMode};
use crate::translation::error::{TranslationError, TranslationResult};

pub use openai::OpenAiClient;

/// 附加在系统提示词之后的响应格式约定
pub const RESPONSE_CONTRACT: &str = "Antworte ausschließlich mit einem JSON-Objekt der Form \
{\"translations\": {\"<Schlüssel>\": \"<Übersetzung>\"}} und verwende genau die Schlüssel aus \
\"texts\". Platzhalter wie ⟦PH0⟧ müssen unverändert erhalten bleiben.";

/// 一个批次的翻译请求
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub batch_id: usize,
    pub target_language: TargetLanguage,
    pub mode: TranslationMode,
    pub model: String,
    /// 未渲染的提示词模板
    pub prompt_template: String,
    /// 缓存键 -> 待翻译文本
    pub texts: BTreeMap<String, String>,
}

impl BatchRequest {
    pub fn system_prompt(&self) -> String {
        render_system_prompt(&self.prompt_template, self.target_language)
    }

    /// 用户消息：`{"texts": {...}, "target_language": ..., "instructions": ...}`
    pub fn user_message(&self) -> String {
        json!({
            "texts": self.texts,
            "target_language": self.target_language.code(),
            "instructions": self.mode.instructions(),
        })
        .to_string()
    }
}

/// 渲染系统提示词
///
/// `{target_language}` 替换为语言代码，末尾附加响应格式约定。
pub fn render_system_prompt(template: &str, target_language: TargetLanguage) -> String {
    let rendered = template.replace(constants::TARGET_LANGUAGE_PLACEHOLDER, target_language.code());
    format!("{}\n\n{}", rendered.trim_end(), RESPONSE_CONTRACT)
}

/// 去掉模型有时附带的 Markdown 代码围栏
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    // 跳过语言标记行，例如 ```json
    match inner.split_once('\n') {
        Some((first, rest)) if !first.trim_start().starts_with('{') => rest.trim(),
        _ => inner.trim(),
    }
}

/// 解析模型返回的内容
///
/// 顶层必须是对象，接受 `{"translations": {key: text}}` 或 `{key: text}`。
/// 未发送的键被忽略，已发送但缺失的键不出现在结果中。
pub fn parse_translations(
    content: &str,
    request: &BatchRequest,
) -> TranslationResult<HashMap<String, String>> {
    let value: Value = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| TranslationError::MalformedResponse(format!("批次 {}: {}", request.batch_id, e)))?;

    let Value::Object(mut object) = value else {
        return Err(TranslationError::MalformedResponse(format!(
            "批次 {}: 顶层不是 JSON 对象",
            request.batch_id
        )));
    };

    let map = match object.remove("translations") {
        Some(Value::Object(inner)) => inner,
        Some(_) => {
            return Err(TranslationError::MalformedResponse(format!(
                "批次 {}: translations 不是对象",
                request.batch_id
            )))
        }
        None => object,
    };

    let mut translations = HashMap::with_capacity(map.len());
    for (key, value) in map {
        if !request.texts.contains_key(&key) {
            tracing::debug!("批次 {}: 忽略未请求的键 {}", request.batch_id, key);
            continue;
        }
        match value {
            Value::String(text) => {
                translations.insert(key, text);
            }
            other => tracing::warn!(
                "批次 {}: 键 {} 的译文不是字符串: {}",
                request.batch_id,
                key,
                other
            ),
        }
    }
    Ok(translations)
}

/// 翻译客户端
#[async_trait]
pub trait TranslationClient: Send + Sync {
    /// 翻译一个批次，返回 键 -> 译文
    async fn translate_batch(&self, request: &BatchRequest) -> TranslationResult<HashMap<String, String>>;

    /// 检查凭据，任务在提取前调用
    async fn ensure_credentials(&self) -> TranslationResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(keys: &[&str]) -> BatchRequest {
        BatchRequest {
            batch_id: 1,
            target_language: TargetLanguage::De,
            mode: TranslationMode::Translate,
            model: "gpt-4.1-mini".into(),
            prompt_template: "Übersetze in {target_language}.".into(),
            texts: keys.iter().map(|k| (k.to_string(), format!("text {}", k))).collect(),
        }
    }

    #[test]
    fn test_render_system_prompt() {
        let prompt = request(&[]).system_prompt();
        assert!(prompt.starts_with("Übersetze in de."));
        assert!(prompt.ends_with(RESPONSE_CONTRACT));
        assert!(!prompt.contains(constants::TARGET_LANGUAGE_PLACEHOLDER));
    }

    #[test]
    fn test_user_message_shape() {
        let message: Value = serde_json::from_str(&request(&["k1"]).user_message()).unwrap();
        assert_eq!(message["texts"]["k1"], "text k1");
        assert_eq!(message["target_language"], "de");
        assert_eq!(message["instructions"], constants::BATCH_INSTRUCTIONS);

        let proofread = BatchRequest {
            mode: TranslationMode::Proofread,
            ..request(&["k1"])
        };
        let message: Value = serde_json::from_str(&proofread.user_message()).unwrap();
        assert_eq!(message["instructions"], constants::PROOFREAD_INSTRUCTIONS);
    }

    #[test]
    fn test_parse_both_shapes() {
        let req = request(&["a", "b"]);
        let wrapped = parse_translations(r#"{"translations": {"a": "A", "b": "B"}}"#, &req).unwrap();
        assert_eq!(wrapped.len(), 2);
        let flat = parse_translations(r#"{"a": "A"}"#, &req).unwrap();
        assert_eq!(flat.get("a").map(String::as_str), Some("A"));
        assert!(!flat.contains_key("b"));
    }

    #[test]
    fn test_parse_ignores_unknown_and_non_string() {
        let req = request(&["a", "b"]);
        let parsed = parse_translations(r#"{"a": "A", "b": 3, "zzz": "?"}"#, &req).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed["a"], "A");
    }

    #[test]
    fn test_parse_code_fence() {
        let req = request(&["a"]);
        let parsed = parse_translations("```json\n{\"a\": \"A\"}\n```", &req).unwrap();
        assert_eq!(parsed["a"], "A");
    }

    #[test]
    fn test_parse_malformed() {
        let req = request(&["a"]);
        for content in ["not json", "[1, 2]", r#"{"translations": "x"}"#, "\"a\""] {
            let err = parse_translations(content, &req).unwrap_err();
            assert!(matches!(err, TranslationError::MalformedResponse(_)), "{}", content);
            assert!(err.is_retryable());
        }
    }
}
