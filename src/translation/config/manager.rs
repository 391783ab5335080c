//! 配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use super::language::{is_known_model, TargetLanguage};
use super::mode::TranslationMode;
use crate::translation::error::{TranslationError, TranslationResult};

/// 翻译配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    // 基础配置
    pub target_lang: TargetLanguage,
    pub mode: TranslationMode,
    pub model: String,
    /// 仍为翻译默认模板时，校对模式改用校对模板
    pub prompt_template: String,
    pub api_base_url: String,
    /// 只从环境或配置读取，永不写出
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    // 批次配置
    pub batch_size: usize,
    pub max_batch_chars: Option<usize>,
    pub batch_timeout_secs: u64,

    // 重试配置
    /// 总尝试次数（含首次）
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub retry_jitter: bool,

    // 性能配置
    pub max_concurrent_requests: usize,
    pub max_requests_per_second: f64,
    pub rate_limit_enabled: bool,

    // 请求参数
    pub temperature: f32,
    pub max_tokens: u32,

    // 功能开关
    pub verify_credentials: bool,
    pub protect_placeholders: bool,
    pub clean_translations: bool,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            target_lang: TargetLanguage::De,
            mode: TranslationMode::Translate,
            model: constants::DEFAULT_MODEL.to_string(),
            prompt_template: constants::DEFAULT_PROMPT_TEMPLATE.to_string(),
            api_base_url: constants::DEFAULT_API_BASE_URL.to_string(),
            api_key: None,

            batch_size: constants::DEFAULT_BATCH_SIZE,
            max_batch_chars: None,
            batch_timeout_secs: constants::DEFAULT_BATCH_TIMEOUT.as_secs(),

            max_retries: constants::DEFAULT_MAX_ATTEMPTS,
            retry_base_delay_ms: constants::DEFAULT_RETRY_BASE_DELAY.as_millis() as u64,
            retry_max_delay_ms: constants::DEFAULT_RETRY_MAX_DELAY.as_millis() as u64,
            retry_jitter: true,

            max_concurrent_requests: constants::DEFAULT_MAX_CONCURRENT_REQUESTS,
            max_requests_per_second: constants::DEFAULT_MAX_REQUESTS_PER_SECOND,
            rate_limit_enabled: true,

            temperature: constants::DEFAULT_TEMPERATURE,
            max_tokens: constants::DEFAULT_MAX_TOKENS,

            verify_credentials: true,
            protect_placeholders: true,
            clean_translations: true,
        }
    }
}

impl TranslationConfig {
    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.batch_size == 0 {
            return Err(TranslationError::ConfigError("批次大小不能为0".to_string()));
        }

        if self.max_batch_chars == Some(0) {
            return Err(TranslationError::ConfigError("批次字符上限不能为0".to_string()));
        }

        if self.max_retries == 0 {
            return Err(TranslationError::ConfigError("尝试次数至少为1".to_string()));
        }

        if self.max_concurrent_requests == 0 {
            return Err(TranslationError::ConfigError("最大并发数不能为0".to_string()));
        }

        if !(self.max_requests_per_second >= constants::MIN_REQUESTS_PER_SECOND) {
            return Err(TranslationError::ConfigError(format!(
                "请求速率不能低于每秒 {} 次",
                constants::MIN_REQUESTS_PER_SECOND
            )));
        }

        if self.batch_timeout_secs == 0 {
            return Err(TranslationError::ConfigError("批次超时不能为0".to_string()));
        }

        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(TranslationError::ConfigError(
                "重试基础延迟不能大于最大延迟".to_string(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(TranslationError::ConfigError("模型名称不能为空".to_string()));
        }

        if self.prompt_template.trim().is_empty() {
            return Err(TranslationError::ConfigError("提示词模板不能为空".to_string()));
        }

        let url = url::Url::parse(&self.api_base_url).map_err(|e| {
            TranslationError::ConfigError(format!("API 地址无效 '{}': {}", self.api_base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TranslationError::ConfigError(format!(
                "API 地址必须使用 http 或 https: {}",
                self.api_base_url
            )));
        }

        if !is_known_model(&self.model) {
            tracing::warn!("未知模型 '{}'，仍将尝试使用", self.model);
        }

        Ok(())
    }

    /// 实际使用的提示词模板
    ///
    /// 显式配置的模板优先；未改动的默认模板按模式替换。
    pub fn prompt(&self) -> &str {
        if self.prompt_template == constants::DEFAULT_PROMPT_TEMPLATE {
            self.mode.default_prompt_template()
        } else {
            &self.prompt_template
        }
    }

    /// 应用环境变量覆盖
    ///
    /// 已设置但无效的变量返回配置错误。
    pub fn apply_env_overrides(&mut self) -> TranslationResult<()> {
        use crate::env::{translation, EnvVar};

        if let Some(target_lang) = translation::TargetLang::get_opt()? {
            self.target_lang = target_lang;
        }

        if let Some(mode) = translation::Mode::get_opt()? {
            self.mode = mode;
        }

        if let Some(model) = translation::Model::get_opt()? {
            self.model = model;
        }

        if let Some(api_url) = translation::ApiUrl::get_opt()? {
            tracing::info!("环境变量覆盖 API 地址: {}", api_url);
            self.api_base_url = api_url;
        }

        if let Some(api_key) = translation::ApiKey::get_opt()? {
            self.api_key = Some(api_key);
        }

        if let Some(template) = translation::PromptTemplate::get_opt()? {
            self.prompt_template = template;
        }

        if let Some(rate) = translation::MaxRequestsPerSecond::get_opt()? {
            self.max_requests_per_second = rate;
        }

        if let Some(max_concurrent) = translation::MaxConcurrentRequests::get_opt()? {
            self.max_concurrent_requests = max_concurrent;
        }

        if let Some(batch_size) = translation::BatchSize::get_opt()? {
            self.batch_size = batch_size;
        }

        if let Some(max_retries) = translation::MaxRetries::get_opt()? {
            self.max_retries = max_retries;
        }

        if let Some(batch_timeout) = translation::BatchTimeout::get_opt()? {
            self.batch_timeout_secs = batch_timeout.as_secs();
        }

        if let Some(verify) = translation::VerifyCredentials::get_opt()? {
            self.verify_credentials = verify;
        }

        Ok(())
    }

    /// 转换为Duration类型
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }
}

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: TranslationConfig,
}

impl ConfigManager {
    /// 创建新的配置管理器
    ///
    /// 依次加载 .env 文件、第一个存在的配置文件、环境变量覆盖，最后验证。
    pub fn new() -> TranslationResult<Self> {
        Self::load_dotenv();
        let config = Self::load_config()?;
        Self::finish(config)
    }

    /// 使用显式指定的配置文件
    pub fn from_file<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        Self::load_dotenv();
        let config = Self::load_from_file(path.as_ref())?;
        Self::finish(config)
    }

    fn finish(mut config: TranslationConfig) -> TranslationResult<Self> {
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(Self { config })
    }

    /// 获取配置
    pub fn get_config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn into_config(self) -> TranslationConfig {
        self.config
    }

    /// 查找配置文件
    fn load_config() -> TranslationResult<TranslationConfig> {
        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            let candidate = Path::new(expanded_path.as_ref());
            if candidate.exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(candidate);
            }
        }

        tracing::debug!("未找到配置文件，使用默认配置");
        Ok(TranslationConfig::default())
    }

    /// 从指定文件加载配置
    fn load_from_file(path: &Path) -> TranslationResult<TranslationConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TranslationError::ConfigError(format!("读取配置文件 {} 失败: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            serde_json::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析JSON配置失败: {}", e)))
        } else {
            toml::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析TOML配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        for env_file in constants::DOTENV_FILES {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config<P: AsRef<Path>>(path: P) -> TranslationResult<()> {
        let config = TranslationConfig::default();
        let content = toml::to_string_pretty(&config)?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| TranslationError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}
