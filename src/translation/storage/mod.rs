//! 存储模块
//!
//! 提供任务级翻译缓存。

pub mod cache;

pub use cache::{normalize_text, CacheEntry, CacheKey, CacheStats, TranslationCache};
