//! 翻译模块
//!
//! - **core**: 任务状态机和翻译服务
//! - **pipeline**: 提取、过滤、分批和写回
//! - **processor**: 并发批次分发
//! - **client**: 远程翻译客户端
//! - **storage**: 任务级翻译缓存
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use office_translator::document::{CsvOptions, DocumentKind};
//! use office_translator::translation::{TranslationConfig, TranslationService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = TranslationConfig::default();
//! config.apply_env_overrides()?;
//! let service = TranslationService::new(config)?;
//!
//! let input = std::fs::read("slides.pptx")?;
//! let mut job = service.new_job("slides.pptx", DocumentKind::PowerPoint);
//! let output = service.run_job(&mut job, &input, &CsvOptions::default()).await?;
//! std::fs::write("slides_de.pptx", output)?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod pipeline;
pub mod processor;
pub mod retry;
pub mod storage;

// ============================================================================
// 常用类型导出
// ============================================================================

pub use client::{BatchRequest, OpenAiClient, TranslationClient};
pub use config::{ConfigManager, TargetLanguage, TranslationConfig, TranslationMode};
pub use core::{JobContext, JobReport, JobState, StopFlag, TranslationService};
pub use error::{TranslationError, TranslationResult};
pub use pipeline::{Extractor, Splicer, TextUnit};
pub use processor::{BatchDispatcher, DispatchReport, DispatcherConfig, JobSettings};
pub use retry::RetryPolicy;
pub use storage::{CacheKey, TranslationCache};
