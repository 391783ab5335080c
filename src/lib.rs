//! # Office Translator
//!
//! 用大语言模型批量翻译 Office 文档（DOCX、PPTX、XLSX）和 CSV 问卷，
//! 输出保留原有结构和格式的新文件。
//!
//! ## 模块组织
//!
//! - `document` - 文档格式：读取文本位置、写回译文、序列化
//! - `translation` - 翻译管道、缓存、批次分发和任务状态机
//! - `env` - 环境变量

pub mod document;
pub mod env;
pub mod translation;

pub use document::{Document, DocumentKind};
pub use translation::{JobState, TranslationConfig, TranslationService};
