//! 翻译缓存模块
//!
//! 以内容哈希为键的任务级翻译缓存。键由规范化文本、模型和提示词模板共同决定，
//! 同一文本在一次任务中只会被发送一次。

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{OnceLock, PoisonError, RwLock};
use std::time::Instant;

use unicode_normalization::UnicodeNormalization;

use crate::translation::config::TargetLanguage;

// ============================================================================
// 文本规范化与键派生
// ============================================================================

/// 字段分隔符，避免 ("ab","c") 与 ("a","bc") 得到同一个键
const FIELD_SEPARATOR: &[u8] = &[0x1f];

/// 规范化文本：去除首尾空白并转换为 NFC
///
/// 提取器、缓存查找和结果写回都必须经过这个函数。
pub fn normalize_text(text: &str) -> String {
    text.trim().nfc().collect()
}

/// 缓存键
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// 从已规范化的文本派生键
    ///
    /// # 参数
    /// * `normalized_text` - 经 [`normalize_text`] 处理过的文本
    /// * `model` - 模型名称
    /// * `prompt_template` - 未替换占位符的提示词模板
    pub fn derive(normalized_text: &str, model: &str, prompt_template: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        for field in [normalized_text, model, prompt_template] {
            hasher.update(field.as_bytes());
            hasher.update(FIELD_SEPARATOR);
        }
        CacheKey(format!("trans:{}", hasher.finalize().to_hex()))
    }

    /// 规范化后派生键
    pub fn for_text(text: &str, model: &str, prompt_template: &str) -> Self {
        Self::derive(&normalize_text(text), model, prompt_template)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// 核心类型
// ============================================================================

/// 缓存条目
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub translated_text: String,
    pub created_at: Instant,
}

/// 缓存统计信息
#[derive(Debug, Default, Clone, Copy, PartialEq, serde::Serialize)]
pub struct CacheStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_entries: usize,
}

impl CacheStats {
    /// 计算缓存命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_requests as f64
        }
    }
}

/// 翻译缓存
///
/// 任务上下文与分发任务通过 `Arc` 共享同一实例。各批次的键集合互不相交，
/// 写锁只用于串行化映射本身的修改。
///
/// 键中不含目标语言，缓存在第一次使用时绑定语言，之后只服务同一语言。
#[derive(Debug, Default)]
pub struct TranslationCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    language: OnceLock<TargetLanguage>,
    total_requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

// ============================================================================
// 实现
// ============================================================================

impl TranslationCache {
    /// 创建空缓存
    pub fn new() -> Self {
        Self::default()
    }

    /// 绑定目标语言
    ///
    /// 未绑定时绑定到 `language`；已绑定到其他语言时返回该语言。
    pub fn bind_language(&self, language: TargetLanguage) -> Result<(), TargetLanguage> {
        let bound = *self.language.get_or_init(|| language);
        if bound == language {
            Ok(())
        } else {
            Err(bound)
        }
    }

    pub fn language(&self) -> Option<TargetLanguage> {
        self.language.get().copied()
    }

    /// 按原文查找译文
    ///
    /// 先规范化再派生键，命中与未命中都会计入统计。
    pub fn lookup(&self, text: &str, model: &str, prompt_template: &str) -> Option<String> {
        self.get(&CacheKey::for_text(text, model, prompt_template))
    }

    /// 按键读取，计入统计
    pub fn get(&self, key: &CacheKey) -> Option<String> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let found = self.peek(key);
        if found.is_some() {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// 按键读取，不计入统计
    pub fn peek(&self, key: &CacheKey) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).map(|entry| entry.translated_text.clone())
    }

    /// 写入译文
    pub fn store(&self, key: CacheKey, translated_text: String) {
        let entry = CacheEntry {
            translated_text,
            created_at: Instant::now(),
        };
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key, entry);
    }

    /// 检查是否包含指定键
    pub fn contains(&self, key: &CacheKey) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(key)
    }

    /// 获取缓存大小
    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 获取统计信息
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            total_entries: self.len(),
        }
    }
}
