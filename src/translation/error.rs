//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制。
//!
//! 只有 `DocumentFormatError`、`CredentialError`、`ConfigError` 和 `Cancelled`
//! 会让任务失败；批次错误和回写错误只会让部分文本保持原文。

use std::fmt;

use thiserror::Error;

use crate::env::EnvError;

/// 翻译错误类型
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// 文档无法打开或解析
    #[error("文档格式错误: {0}")]
    DocumentFormatError(String),

    /// API 凭据缺失或无效
    #[error("凭据错误: {0}")]
    CredentialError(String),

    /// 批次在重试耗尽后仍然失败
    #[error("批次 {batch_id} 在 {attempts} 次尝试后失败: {message}")]
    TranslationBatchError {
        batch_id: usize,
        attempts: usize,
        message: String,
    },

    /// 单个文本单元回写失败
    #[error("回写 {unit_id} 失败: {message}")]
    SpliceError { unit_id: String, message: String },

    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 网络错误
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// 速率限制错误
    #[error("请求速率过快，已达到限制")]
    RateLimitExceeded,

    /// 超时错误
    #[error("操作超时: {0}")]
    TimeoutError(String),

    /// 远程服务返回错误状态
    #[error("翻译服务错误 (HTTP {status}): {message}")]
    ServiceError { status: u16, message: String },

    /// 响应不是约定的 JSON 结构
    #[error("响应格式错误: {0}")]
    MalformedResponse(String),

    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 并发错误
    #[error("并发操作错误: {0}")]
    ConcurrencyError(String),

    /// 任务被用户取消
    #[error("任务已取消")]
    Cancelled,

    /// IO 错误
    #[error("IO错误: {0}")]
    IoError(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::NetworkError(_) => true,
            TranslationError::TimeoutError(_) => true,
            TranslationError::RateLimitExceeded => true,
            TranslationError::MalformedResponse(_) => true,
            TranslationError::ServiceError { status, .. } => *status >= 500,
            TranslationError::ConcurrencyError(_) => true,
            TranslationError::DocumentFormatError(_) => false,
            TranslationError::CredentialError(_) => false,
            TranslationError::TranslationBatchError { .. } => false,
            TranslationError::SpliceError { .. } => false,
            TranslationError::ConfigError(_) => false,
            TranslationError::InvalidInput(_) => false,
            TranslationError::SerializationError(_) => false,
            TranslationError::Cancelled => false,
            TranslationError::IoError(_) => false,
            TranslationError::InternalError(_) => false,
        }
    }

    /// 是否应让整个任务失败
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TranslationError::DocumentFormatError(_)
                | TranslationError::CredentialError(_)
                | TranslationError::ConfigError(_)
                | TranslationError::Cancelled
                | TranslationError::InternalError(_)
        )
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::DocumentFormatError(_) => ErrorSeverity::Critical,
            TranslationError::CredentialError(_) => ErrorSeverity::Critical,
            TranslationError::TranslationBatchError { .. } => ErrorSeverity::Error,
            TranslationError::SpliceError { .. } => ErrorSeverity::Warning,
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::NetworkError(_) => ErrorSeverity::Warning,
            TranslationError::RateLimitExceeded => ErrorSeverity::Warning,
            TranslationError::TimeoutError(_) => ErrorSeverity::Warning,
            TranslationError::ServiceError { .. } => ErrorSeverity::Error,
            TranslationError::MalformedResponse(_) => ErrorSeverity::Warning,
            TranslationError::InvalidInput(_) => ErrorSeverity::Info,
            TranslationError::SerializationError(_) => ErrorSeverity::Error,
            TranslationError::ConcurrencyError(_) => ErrorSeverity::Warning,
            TranslationError::Cancelled => ErrorSeverity::Info,
            TranslationError::IoError(_) => ErrorSeverity::Error,
            TranslationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::DocumentFormatError(_) => ErrorCategory::Document,
            TranslationError::CredentialError(_) => ErrorCategory::Credential,
            TranslationError::TranslationBatchError { .. } => ErrorCategory::Batch,
            TranslationError::SpliceError { .. } => ErrorCategory::Splice,
            TranslationError::ConfigError(_) => ErrorCategory::Configuration,
            TranslationError::NetworkError(_) => ErrorCategory::Network,
            TranslationError::RateLimitExceeded => ErrorCategory::RateLimit,
            TranslationError::TimeoutError(_) => ErrorCategory::Timeout,
            TranslationError::ServiceError { .. } => ErrorCategory::Service,
            TranslationError::MalformedResponse(_) => ErrorCategory::Parsing,
            TranslationError::InvalidInput(_) => ErrorCategory::Input,
            TranslationError::SerializationError(_) => ErrorCategory::Serialization,
            TranslationError::ConcurrencyError(_) => ErrorCategory::Concurrency,
            TranslationError::Cancelled => ErrorCategory::Cancellation,
            TranslationError::IoError(_) => ErrorCategory::Io,
            TranslationError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(mut self, context: T) -> Self {
        let append = |msg: &mut String| *msg = format!("{} (上下文: {})", msg, context);

        match &mut self {
            TranslationError::DocumentFormatError(msg)
            | TranslationError::CredentialError(msg)
            | TranslationError::ConfigError(msg)
            | TranslationError::NetworkError(msg)
            | TranslationError::TimeoutError(msg)
            | TranslationError::MalformedResponse(msg)
            | TranslationError::InvalidInput(msg)
            | TranslationError::SerializationError(msg)
            | TranslationError::ConcurrencyError(msg)
            | TranslationError::IoError(msg)
            | TranslationError::InternalError(msg) => append(msg),
            TranslationError::TranslationBatchError { message, .. }
            | TranslationError::SpliceError { message, .. }
            | TranslationError::ServiceError { message, .. } => append(message),
            TranslationError::RateLimitExceeded | TranslationError::Cancelled => {}
        }

        self
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ErrorCategory {
    Document,
    Credential,
    Batch,
    Splice,
    Configuration,
    Network,
    RateLimit,
    Timeout,
    Service,
    Parsing,
    Input,
    Serialization,
    Concurrency,
    Cancellation,
    Io,
    Internal,
}

impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::IoError(error.to_string())
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ConfigError(format!("TOML解析错误: {}", error))
    }
}

impl From<toml::ser::Error> for TranslationError {
    fn from(error: toml::ser::Error) -> Self {
        TranslationError::SerializationError(format!("TOML序列化错误: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        TranslationError::TimeoutError(format!("异步操作超时: {}", error))
    }
}

impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::TimeoutError(error.to_string())
        } else if error.is_decode() {
            TranslationError::MalformedResponse(error.to_string())
        } else if let Some(status) = error.status() {
            TranslationError::ServiceError {
                status: status.as_u16(),
                message: error.to_string(),
            }
        } else {
            TranslationError::NetworkError(error.to_string())
        }
    }
}

impl From<zip::result::ZipError> for TranslationError {
    fn from(error: zip::result::ZipError) -> Self {
        TranslationError::DocumentFormatError(format!("ZIP包错误: {}", error))
    }
}

impl From<quick_xml::Error> for TranslationError {
    fn from(error: quick_xml::Error) -> Self {
        TranslationError::DocumentFormatError(format!("XML错误: {}", error))
    }
}

impl From<csv::Error> for TranslationError {
    fn from(error: csv::Error) -> Self {
        TranslationError::DocumentFormatError(format!("CSV错误: {}", error))
    }
}

impl From<EnvError> for TranslationError {
    fn from(error: EnvError) -> Self {
        TranslationError::ConfigError(error.to_string())
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误统计信息
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ErrorStats {
    pub total_errors: usize,
    pub by_category: std::collections::HashMap<ErrorCategory, usize>,
    pub by_severity: std::collections::HashMap<ErrorSeverity, usize>,
    pub retryable_errors: usize,
    pub critical_errors: usize,
}

impl ErrorStats {
    /// 记录错误
    pub fn record_error(&mut self, error: &TranslationError) {
        self.total_errors += 1;

        let category = error.category();
        *self.by_category.entry(category).or_insert(0) += 1;

        let severity = error.severity();
        *self.by_severity.entry(severity).or_insert(0) += 1;

        if error.is_retryable() {
            self.retryable_errors += 1;
        }

        if severity == ErrorSeverity::Critical {
            self.critical_errors += 1;
        }
    }

    /// 合并另一份统计
    pub fn merge(&mut self, other: &ErrorStats) {
        self.total_errors += other.total_errors;
        for (category, count) in &other.by_category {
            *self.by_category.entry(*category).or_insert(0) += count;
        }
        for (severity, count) in &other.by_severity {
            *self.by_severity.entry(*severity).or_insert(0) += count;
        }
        self.retryable_errors += other.retryable_errors;
        self.critical_errors += other.critical_errors;
    }

    /// 获取错误率
    pub fn error_rate(&self, total_operations: usize) -> f64 {
        if total_operations == 0 {
            0.0
        } else {
            self.total_errors as f64 / total_operations as f64
        }
    }
}

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误
    pub fn log_error(error: &TranslationError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("翻译信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
            ErrorSeverity::Error => tracing::error!("翻译错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("翻译严重错误: {}", error),
        }
    }

    /// 创建文档格式错误
    pub fn document_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::DocumentFormatError(msg.to_string())
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::ConfigError(msg.to_string())
    }

    /// 创建凭据错误
    pub fn credential_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::CredentialError(msg.to_string())
    }

    /// 创建回写错误
    pub fn splice_error<T: fmt::Display>(unit_id: &str, msg: T) -> TranslationError {
        TranslationError::SpliceError {
            unit_id: unit_id.to_string(),
            message: msg.to_string(),
        }
    }

    /// 创建内部错误
    pub fn internal_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::InternalError(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(TranslationError::NetworkError("reset".into()).is_retryable());
        assert!(TranslationError::TimeoutError("60s".into()).is_retryable());
        assert!(TranslationError::MalformedResponse("not json".into()).is_retryable());
        assert!(TranslationError::RateLimitExceeded.is_retryable());
        assert!(TranslationError::ServiceError { status: 503, message: "busy".into() }.is_retryable());
        assert!(!TranslationError::ServiceError { status: 400, message: "bad".into() }.is_retryable());
        assert!(!TranslationError::CredentialError("401".into()).is_retryable());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(TranslationError::DocumentFormatError("zip".into()).is_fatal());
        assert!(TranslationError::CredentialError("missing".into()).is_fatal());
        assert!(TranslationError::Cancelled.is_fatal());
        assert!(!TranslationError::TranslationBatchError {
            batch_id: 1,
            attempts: 3,
            message: "timeout".into()
        }
        .is_fatal());
        assert!(!TranslationError::SpliceError {
            unit_id: "para_0".into(),
            message: "gone".into()
        }
        .is_fatal());
    }

    #[test]
    fn test_with_context_keeps_variant() {
        let error = TranslationError::ServiceError { status: 502, message: "bad gateway".into() }
            .with_context("batch 3");
        match error {
            TranslationError::ServiceError { status, message } => {
                assert_eq!(status, 502);
                assert!(message.contains("batch 3"));
            }
            other => panic!("unexpected variant: {:?}", other),
        }
        assert!(matches!(
            TranslationError::Cancelled.with_context("ignored"),
            TranslationError::Cancelled
        ));
    }

    #[test]
    fn test_error_stats_merge() {
        let mut first = ErrorStats::default();
        first.record_error(&TranslationError::NetworkError("a".into()));
        let mut second = ErrorStats::default();
        second.record_error(&TranslationError::NetworkError("b".into()));
        second.record_error(&TranslationError::CredentialError("c".into()));

        first.merge(&second);
        assert_eq!(first.total_errors, 3);
        assert_eq!(first.by_category.get(&ErrorCategory::Network), Some(&2));
        assert_eq!(first.retryable_errors, 2);
        assert_eq!(first.critical_errors, 1);
        assert_eq!(first.error_rate(6), 0.5);
    }
}
