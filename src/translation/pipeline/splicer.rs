//! 译文写回
//!
//! 用与提取阶段相同的提取器重新遍历文档，按原文重新计算缓存键并写入译文。
//! 缓存中没有的位置保持原文，写入失败的位置记录后跳过。

use serde::Serialize;

use crate::document::Document;
use crate::translation::error::{helpers, TranslationError};
use crate::translation::pipeline::extractor::Extractor;
use crate::translation::storage::{CacheKey, TranslationCache};

/// 写回结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpliceReport {
    /// 写入译文的位置数
    pub written: usize,
    /// 缓存中没有译文、保持原文的位置数
    pub untouched: usize,
    /// 写入失败的位置
    pub errors: Vec<String>,
}

impl SpliceReport {
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// 写回器
pub struct Splicer<'a> {
    extractor: &'a Extractor,
    cache: &'a TranslationCache,
    model: &'a str,
    prompt_template: &'a str,
}

/// 把原文的首尾空白补回译文
fn restore_padding(raw: &str, translated: &str) -> String {
    if raw.trim().is_empty() {
        return translated.to_string();
    }
    let leading = &raw[..raw.len() - raw.trim_start().len()];
    let trailing = &raw[raw.trim_end().len()..];
    format!("{}{}{}", leading, translated, trailing)
}

impl<'a> Splicer<'a> {
    /// # 参数
    /// * `model` / `prompt_template` - 必须与生成缓存时相同，否则键对不上
    pub fn new(
        extractor: &'a Extractor,
        cache: &'a TranslationCache,
        model: &'a str,
        prompt_template: &'a str,
    ) -> Self {
        Self {
            extractor,
            cache,
            model,
            prompt_template,
        }
    }

    /// 将缓存中的译文写入文档
    pub fn splice(&self, document: &mut dyn Document) -> SpliceReport {
        let units: Vec<_> = self.extractor.extract(&*document).collect();
        let mut report = SpliceReport::default();

        for unit in units {
            let key = CacheKey::derive(&unit.text, self.model, self.prompt_template);
            let Some(translated) = self.cache.peek(&key) else {
                report.untouched += 1;
                continue;
            };

            let text = restore_padding(&unit.raw, &translated);
            match document.write_text(&unit.location, &text) {
                Ok(()) => report.written += 1,
                Err(error) => {
                    let error = match error {
                        splice @ TranslationError::SpliceError { .. } => splice,
                        other => helpers::splice_error(&unit.id, other),
                    };
                    helpers::log_error(&error);
                    report.errors.push(error.to_string());
                }
            }
        }

        tracing::debug!(
            "写回完成: 写入 {}, 保持原文 {}, 失败 {}",
            report.written,
            report.untouched,
            report.error_count()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{CsvDocument, CsvOptions};

    const MODEL: &str = "gpt-4.1-mini";
    const PROMPT: &str = "prompt";

    #[test]
    fn test_splice_writes_only_cached_units() {
        let mut doc =
            CsvDocument::open(b"q\n Hello \n42\nThank you\n", &CsvOptions::default()).unwrap();
        let cache = TranslationCache::new();
        cache.store(CacheKey::for_text("Hello", MODEL, PROMPT), "Hallo".into());

        let extractor = Extractor::new();
        let report = Splicer::new(&extractor, &cache, MODEL, PROMPT).splice(&mut doc);
        assert_eq!(report.written, 1);
        assert_eq!(report.untouched, 1);
        assert!(report.errors.is_empty());

        let output = String::from_utf8(doc.to_bytes().unwrap()).unwrap();
        assert_eq!(output, "q\n Hallo \n42\nThank you\n");
        assert_eq!(cache.stats().total_requests, 0, "写回不计入缓存统计");
    }

    #[test]
    fn test_restore_padding() {
        assert_eq!(restore_padding(" world", "Welt"), " Welt");
        assert_eq!(restore_padding("Hi\n", "Hallo"), "Hallo\n");
        assert_eq!(restore_padding("Hi", "Hallo"), "Hallo");
    }
}
