//! 缓存系统集成测试
//!
//! 测试缓存键的规范化和并发写入

use std::sync::Arc;

use office_translator::translation::storage::{normalize_text, CacheKey, TranslationCache};

mod common {
    #![allow(dead_code)]
    include!("common/mod.rs");
}

const MODEL: &str = "gpt-4.1-mini";
const PROMPT: &str = "Übersetze in {target_language}.";

/// 组合字符和首尾空白不影响缓存键
#[test]
fn test_equivalent_texts_share_key() {
    let composed = CacheKey::for_text("Café", MODEL, PROMPT);
    let decomposed = CacheKey::for_text("  Cafe\u{301}\n", MODEL, PROMPT);
    assert_eq!(composed, decomposed);
    assert_eq!(normalize_text("  Cafe\u{301}\n"), "Café");
}

#[test]
fn test_key_depends_on_model_and_prompt() {
    let base = CacheKey::for_text("Hello", MODEL, PROMPT);
    assert_ne!(base, CacheKey::for_text("Hello", "gpt-4o", PROMPT));
    assert_ne!(base, CacheKey::for_text("Hello", MODEL, "Translate."));
    assert_ne!(base, CacheKey::for_text("Hello!", MODEL, PROMPT));
    assert_eq!(base, CacheKey::for_text("Hello", MODEL, PROMPT));
}

#[test]
fn test_lookup_and_stats() {
    let cache = TranslationCache::new();
    let key = CacheKey::for_text("Hello", MODEL, PROMPT);

    assert!(cache.get(&key).is_none());
    cache.store(key.clone(), "Hallo".to_string());
    assert_eq!(cache.get(&key).as_deref(), Some("Hallo"));
    assert_eq!(cache.lookup(" Hello ", MODEL, PROMPT).as_deref(), Some("Hallo"));
    assert_eq!(cache.peek(&key).as_deref(), Some("Hallo"));

    let stats = cache.stats();
    assert_eq!(stats.total_requests, 3, "peek 不计入统计");
    assert_eq!(stats.cache_hits, 2);
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.total_entries, 1);
}

#[test]
fn test_store_overwrites() {
    let cache = TranslationCache::new();
    let key = CacheKey::for_text("Hello", MODEL, PROMPT);
    cache.store(key.clone(), "Hallo".to_string());
    cache.store(key.clone(), "Servus".to_string());
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.peek(&key).as_deref(), Some("Servus"));
}

/// 多个批次任务同时写入同一个缓存
#[tokio::test]
async fn test_concurrent_stores() {
    let cache = Arc::new(TranslationCache::new());

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let key = CacheKey::for_text(&format!("text {}", i), MODEL, PROMPT);
                cache.store(key, format!("Text {}", i));
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(cache.len(), 32);
    assert_eq!(cache.lookup("text 7", MODEL, PROMPT).as_deref(), Some("Text 7"));
}
