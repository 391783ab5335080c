//! 文本提取器
//!
//! 从 [`Document`] 中按文档顺序产出需要翻译的 [`TextUnit`]。提取是纯读取操作，
//! 对同一文档重复调用得到相同的序列，写回阶段依赖这一点重新定位文本。

use crate::document::{Document, RawText, TextLocation};
use crate::translation::pipeline::filters::{FilterStats, TextFilter};
use crate::translation::storage::normalize_text;

/// 待翻译的文本单元
#[derive(Debug, Clone, PartialEq)]
pub struct TextUnit {
    /// 位置标识，例如 `sheet_0_cell_B3`
    pub id: String,
    /// 规范化后的文本
    pub text: String,
    pub location: TextLocation,
    /// 文档中的原始文本，写回时用于恢复首尾空白
    pub raw: String,
}

impl TextUnit {
    fn from_raw(raw: RawText, text: String) -> Self {
        Self {
            id: raw.location.id(),
            text,
            location: raw.location,
            raw: raw.text,
        }
    }
}

/// 文本提取器
#[derive(Debug, Default)]
pub struct Extractor {
    filter: TextFilter,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 惰性提取
    pub fn extract<'a>(&'a self, document: &'a dyn Document) -> impl Iterator<Item = TextUnit> + 'a {
        document.text_units().filter_map(move |raw| {
            let text = normalize_text(&raw.text);
            self.filter
                .should_translate(&text)
                .then(|| TextUnit::from_raw(raw, text))
        })
    }

    /// 提取并统计过滤原因
    pub fn extract_with_stats(&self, document: &dyn Document) -> (Vec<TextUnit>, FilterStats) {
        let mut stats = FilterStats::default();
        let mut units = Vec::new();

        for raw in document.text_units() {
            let text = normalize_text(&raw.text);
            let analysis = self.filter.analyze_text(&text);
            stats.record_filter(&analysis);
            if analysis.should_translate {
                units.push(TextUnit::from_raw(raw, text));
            }
        }

        tracing::debug!(
            "提取完成: {} 个位置, {} 个需要翻译",
            stats.total_texts,
            units.len()
        );
        (units, stats)
    }
}
