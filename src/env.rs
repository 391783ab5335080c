//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量管理。已设置但无效的变量一律报错，
//! 未设置的变量回退到配置文件或默认值。

use std::env;
use std::fmt;
use std::time::Duration;

use crate::translation::config::language::TargetLanguage;
use crate::translation::config::mode::TranslationMode;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    /// 读取原始值，空字符串视为未设置
    fn raw() -> Option<String> {
        env::var(Self::NAME).ok().filter(|value| !value.trim().is_empty())
    }

    fn get() -> EnvResult<T> {
        match Self::raw() {
            Some(value) => Self::parse(&value),
            None => Self::DEFAULT.ok_or_else(|| EnvError {
                variable: Self::NAME.to_string(),
                message: "Required environment variable not set".to_string(),
            }),
        }
    }

    /// 仅在变量被设置时返回值
    fn get_opt() -> EnvResult<Option<T>> {
        Self::raw().map(|value| Self::parse(&value)).transpose()
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "OFFICE_TRANSLATOR_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            match Self::raw() {
                Some(value) => Self::parse(&value),
                None => Ok("info".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.trim().to_lowercase().as_str() {
                level @ ("trace" | "debug" | "info" | "warn" | "error") => Ok(level.to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }

    /// 禁用颜色输出
    pub struct NoColor;
    impl EnvVar<bool> for NoColor {
        const NAME: &'static str = "NO_COLOR";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Disable colored output when set to any value";

        fn get() -> EnvResult<bool> {
            Ok(env::var_os(Self::NAME).map_or(false, |value| !value.is_empty()))
        }

        fn parse(value: &str) -> EnvResult<bool> {
            // NO_COLOR 遵循标准：任何值都表示禁用颜色
            Ok(!value.is_empty())
        }
    }
}

/// 翻译相关环境变量
pub mod translation {
    use super::*;

    /// 目标语言
    pub struct TargetLang;
    impl EnvVar<TargetLanguage> for TargetLang {
        const NAME: &'static str = "OFFICE_TRANSLATOR_TARGET_LANG";
        const DEFAULT: Option<TargetLanguage> = Some(TargetLanguage::De);
        const DESCRIPTION: &'static str = "Target language code (de, fr, zh-CN, ...)";

        fn parse(value: &str) -> EnvResult<TargetLanguage> {
            value.parse().map_err(|message| EnvError {
                variable: Self::NAME.to_string(),
                message,
            })
        }
    }

    /// 处理模式
    pub struct Mode;
    impl EnvVar<TranslationMode> for Mode {
        const NAME: &'static str = "OFFICE_TRANSLATOR_MODE";
        const DEFAULT: Option<TranslationMode> = Some(TranslationMode::Translate);
        const DESCRIPTION: &'static str = "Processing mode: translate or proofread";

        fn parse(value: &str) -> EnvResult<TranslationMode> {
            value.parse().map_err(|message| EnvError {
                variable: Self::NAME.to_string(),
                message,
            })
        }
    }

    /// 模型名称
    pub struct Model;
    impl EnvVar<String> for Model {
        const NAME: &'static str = "OFFICE_TRANSLATOR_MODEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Chat-completion model used for translation";

        fn get() -> EnvResult<String> {
            match Self::raw() {
                Some(value) => Self::parse(&value),
                None => Ok(crate::translation::config::constants::DEFAULT_MODEL.to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }

    /// API 地址
    pub struct ApiUrl;
    impl EnvVar<String> for ApiUrl {
        const NAME: &'static str = "OFFICE_TRANSLATOR_API_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Base URL of the OpenAI-compatible API";

        fn get() -> EnvResult<String> {
            match Self::raw() {
                Some(value) => Self::parse(&value),
                None => Ok(crate::translation::config::constants::DEFAULT_API_BASE_URL.to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            let url = value.trim();
            if url.starts_with("http://") || url.starts_with("https://") {
                Ok(url.trim_end_matches('/').to_string())
            } else {
                Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API URL must start with http:// or https://".to_string(),
                })
            }
        }
    }

    /// API 密钥
    pub struct ApiKey;
    impl EnvVar<String> for ApiKey {
        const NAME: &'static str = "OFFICE_TRANSLATOR_API_KEY";
        const DEFAULT: Option<String> = None; // 无默认值
        const DESCRIPTION: &'static str = "API key (falls back to OPENAI_API_KEY)";

        fn raw() -> Option<String> {
            [Self::NAME, "OPENAI_API_KEY"]
                .iter()
                .filter_map(|name| env::var(name).ok())
                .find(|value| !value.trim().is_empty())
        }

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }

    /// 提示词模板
    pub struct PromptTemplate;
    impl EnvVar<String> for PromptTemplate {
        const NAME: &'static str = "OFFICE_TRANSLATOR_PROMPT_TEMPLATE";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str =
            "System prompt template; {target_language} is replaced with the language code";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.to_string())
        }
    }

    /// 每秒最大请求数
    pub struct MaxRequestsPerSecond;
    impl EnvVar<f64> for MaxRequestsPerSecond {
        const NAME: &'static str = "OFFICE_TRANSLATOR_MAX_REQUESTS_PER_SECOND";
        const DEFAULT: Option<f64> = Some(5.0);
        const DESCRIPTION: &'static str = "Maximum requests per second to the translation API";

        fn parse(value: &str) -> EnvResult<f64> {
            let rate: f64 = value.trim().parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: "Must be a valid number".to_string(),
            })?;

            if rate <= 0.0 {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Rate must be greater than 0".to_string(),
                });
            }

            if rate > 1000.0 {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Rate too high (max 1000 requests/second)".to_string(),
                });
            }

            Ok(rate)
        }
    }

    /// 最大并发请求数
    pub struct MaxConcurrentRequests;
    impl EnvVar<usize> for MaxConcurrentRequests {
        const NAME: &'static str = "OFFICE_TRANSLATOR_MAX_CONCURRENT_REQUESTS";
        const DEFAULT: Option<usize> = Some(10);
        const DESCRIPTION: &'static str = "Maximum concurrent requests to the translation API";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 100)
        }
    }

    /// 批次大小
    pub struct BatchSize;
    impl EnvVar<usize> for BatchSize {
        const NAME: &'static str = "OFFICE_TRANSLATOR_BATCH_SIZE";
        const DEFAULT: Option<usize> = Some(10);
        const DESCRIPTION: &'static str = "Maximum number of texts per request";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 500)
        }
    }

    /// 最大尝试次数
    pub struct MaxRetries;
    impl EnvVar<usize> for MaxRetries {
        const NAME: &'static str = "OFFICE_TRANSLATOR_MAX_RETRIES";
        const DEFAULT: Option<usize> = Some(3);
        const DESCRIPTION: &'static str = "Total attempts per batch, including the first one";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 20)
        }
    }

    /// 批次超时
    pub struct BatchTimeout;
    impl EnvVar<Duration> for BatchTimeout {
        const NAME: &'static str = "OFFICE_TRANSLATOR_BATCH_TIMEOUT";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(60));
        const DESCRIPTION: &'static str = "Per-attempt request timeout in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let seconds = parse_positive_usize(value, Self::NAME, 1, 600)?;
            Ok(Duration::from_secs(seconds as u64))
        }
    }

    /// 启动前校验凭据
    pub struct VerifyCredentials;
    impl EnvVar<bool> for VerifyCredentials {
        const NAME: &'static str = "OFFICE_TRANSLATOR_VERIFY_CREDENTIALS";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Call GET /models before extraction to verify the API key";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }
}

/// 辅助函数
fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

/// 环境变量配置汇总
///
/// 只包含实际设置过的变量，未设置的字段为 `None`。
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub log_level: String,
    pub no_color: bool,

    pub target_lang: Option<TargetLanguage>,
    pub mode: Option<TranslationMode>,
    pub model: Option<String>,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub prompt_template: Option<String>,
    pub max_requests_per_second: Option<f64>,
    pub max_concurrent_requests: Option<usize>,
    pub batch_size: Option<usize>,
    pub max_retries: Option<usize>,
    pub batch_timeout: Option<Duration>,
    pub verify_credentials: Option<bool>,
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> EnvResult<Self> {
        Ok(Self {
            log_level: core::LogLevel::get()?,
            no_color: core::NoColor::get()?,

            target_lang: translation::TargetLang::get_opt()?,
            mode: translation::Mode::get_opt()?,
            model: translation::Model::get_opt()?,
            api_url: translation::ApiUrl::get_opt()?,
            api_key: translation::ApiKey::get_opt()?,
            prompt_template: translation::PromptTemplate::get_opt()?,
            max_requests_per_second: translation::MaxRequestsPerSecond::get_opt()?,
            max_concurrent_requests: translation::MaxConcurrentRequests::get_opt()?,
            batch_size: translation::BatchSize::get_opt()?,
            max_retries: translation::MaxRetries::get_opt()?,
            batch_timeout: translation::BatchTimeout::get_opt()?,
            verify_credentials: translation::VerifyCredentials::get_opt()?,
        })
    }

    /// 打印配置摘要（隐藏敏感信息）
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Environment Configuration Summary:".to_string(),
            format!("  Log Level: {}", self.log_level),
        ];
        if let Some(lang) = self.target_lang {
            lines.push(format!("  Target Language: {}", lang));
        }
        if let Some(mode) = self.mode {
            lines.push(format!("  Mode: {}", mode));
        }
        if let Some(model) = &self.model {
            lines.push(format!("  Model: {}", model));
        }
        if let Some(url) = &self.api_url {
            lines.push(format!("  API URL: {}", url));
        }
        if self.api_key.is_some() {
            lines.push("  API Key: [configured]".to_string());
        }
        lines.join("\n")
    }
}

fn doc_line<T: fmt::Debug>(name: &str, description: &str, default: Option<T>) -> String {
    match default {
        Some(value) => format!("- `{}`: {} (default: {:?})\n", name, description, value),
        None => format!("- `{}`: {}\n", name, description),
    }
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables Documentation\n\n");

    docs.push_str("## Core Configuration\n\n");
    docs.push_str(&doc_line(core::LogLevel::NAME, core::LogLevel::DESCRIPTION, Some("info")));
    docs.push_str(&doc_line(core::NoColor::NAME, core::NoColor::DESCRIPTION, core::NoColor::DEFAULT));

    docs.push_str("\n## Translation Configuration\n\n");
    docs.push_str(&doc_line(
        translation::TargetLang::NAME,
        translation::TargetLang::DESCRIPTION,
        translation::TargetLang::DEFAULT.map(|lang| lang.code()),
    ));
    docs.push_str(&doc_line(
        translation::Mode::NAME,
        translation::Mode::DESCRIPTION,
        translation::Mode::DEFAULT.map(TranslationMode::as_str),
    ));
    docs.push_str(&doc_line(
        translation::Model::NAME,
        translation::Model::DESCRIPTION,
        Some(crate::translation::config::constants::DEFAULT_MODEL),
    ));
    docs.push_str(&doc_line(
        translation::ApiUrl::NAME,
        translation::ApiUrl::DESCRIPTION,
        Some(crate::translation::config::constants::DEFAULT_API_BASE_URL),
    ));
    docs.push_str(&doc_line::<String>(translation::ApiKey::NAME, translation::ApiKey::DESCRIPTION, None));
    docs.push_str(&doc_line::<String>(
        translation::PromptTemplate::NAME,
        translation::PromptTemplate::DESCRIPTION,
        None,
    ));
    docs.push_str(&doc_line(
        translation::BatchSize::NAME,
        translation::BatchSize::DESCRIPTION,
        translation::BatchSize::DEFAULT,
    ));
    docs.push_str(&doc_line(
        translation::MaxRetries::NAME,
        translation::MaxRetries::DESCRIPTION,
        translation::MaxRetries::DEFAULT,
    ));
    docs.push_str(&doc_line(
        translation::BatchTimeout::NAME,
        translation::BatchTimeout::DESCRIPTION,
        translation::BatchTimeout::DEFAULT,
    ));
    docs.push_str(&doc_line(
        translation::MaxConcurrentRequests::NAME,
        translation::MaxConcurrentRequests::DESCRIPTION,
        translation::MaxConcurrentRequests::DEFAULT,
    ));
    docs.push_str(&doc_line(
        translation::MaxRequestsPerSecond::NAME,
        translation::MaxRequestsPerSecond::DESCRIPTION,
        translation::MaxRequestsPerSecond::DEFAULT,
    ));
    docs.push_str(&doc_line(
        translation::VerifyCredentials::NAME,
        translation::VerifyCredentials::DESCRIPTION,
        translation::VerifyCredentials::DEFAULT,
    ));

    docs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(core::LogLevel::parse("DEBUG").unwrap(), "debug");
        assert_eq!(core::LogLevel::parse(" warn ").unwrap(), "warn");
        assert!(core::LogLevel::parse("verbose").is_err());
    }

    #[test]
    fn test_boolean_parsing() {
        assert!(translation::VerifyCredentials::parse("true").unwrap());
        assert!(translation::VerifyCredentials::parse("YES").unwrap());
        assert!(!translation::VerifyCredentials::parse("off").unwrap());
        assert!(translation::VerifyCredentials::parse("maybe").is_err());
    }

    #[test]
    fn test_url_validation() {
        assert_eq!(
            translation::ApiUrl::parse("https://api.example.com/v1/").unwrap(),
            "https://api.example.com/v1"
        );
        assert!(translation::ApiUrl::parse("ftp://example.com").is_err());
        assert!(translation::ApiUrl::parse("not-a-url").is_err());
    }

    #[test]
    fn test_numeric_validation() {
        assert!(translation::MaxRequestsPerSecond::parse("0.5").is_ok());
        assert!(translation::MaxRequestsPerSecond::parse("0").is_err());
        assert!(translation::MaxRequestsPerSecond::parse("2000").is_err());
        assert!(translation::BatchSize::parse("0").is_err());
        assert_eq!(translation::MaxRetries::parse("3").unwrap(), 3);
        assert_eq!(
            translation::BatchTimeout::parse("45").unwrap(),
            Duration::from_secs(45)
        );
    }

    #[test]
    fn test_target_language_parsing() {
        assert_eq!(translation::TargetLang::parse("FR").unwrap(), TargetLanguage::Fr);
        assert_eq!(translation::TargetLang::parse("zh_cn").unwrap(), TargetLanguage::ZhCn);
        let err = translation::TargetLang::parse("klingon").unwrap_err();
        assert_eq!(err.variable, "OFFICE_TRANSLATOR_TARGET_LANG");
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(translation::Mode::parse("proofread").unwrap(), TranslationMode::Proofread);
        let err = translation::Mode::parse("rewrite").unwrap_err();
        assert_eq!(err.variable, "OFFICE_TRANSLATOR_MODE");
    }

    #[test]
    fn test_env_docs_lists_every_variable() {
        let docs = generate_env_docs();
        for name in [
            "OFFICE_TRANSLATOR_LOG_LEVEL",
            "OFFICE_TRANSLATOR_TARGET_LANG",
            "OFFICE_TRANSLATOR_MODE",
            "OFFICE_TRANSLATOR_API_KEY",
            "OFFICE_TRANSLATOR_BATCH_SIZE",
            "OFFICE_TRANSLATOR_MAX_RETRIES",
            "OFFICE_TRANSLATOR_MAX_REQUESTS_PER_SECOND",
        ] {
            assert!(docs.contains(name), "文档缺少 {}", name);
        }
    }
}
