//! 文本过滤器模块
//!
//! 判断提取出的文本是否需要发送翻译。被过滤的文本原样保留在文档中。

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::translation::config::constants;
use crate::translation::pipeline::placeholder;

/// 问卷工具中的固定控制词，保持原样
const CONTROL_WORDS: &[&str] = &[
    "result:",
    "kommentar",
    "general remarks",
    "allgemeine bemerkungen",
    "screenout",
    "quotafull",
    "&#10148",
];

/// 过滤原因
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, serde::Serialize)]
pub enum FilterReason {
    Empty,
    Numeric,
    TooShort,
    NoAlphabetic,
    PlaceholderOnly,
    MarkupOnly,
    ControlCode,
    ControlWord,
    BrandCode,
}

/// 文本分析结果
#[derive(Debug, Clone, PartialEq)]
pub struct TextAnalysis {
    pub should_translate: bool,
    pub reason: Option<FilterReason>,
    pub char_count: usize,
}

/// 文本过滤器
#[derive(Debug, Default)]
pub struct TextFilter {
    brand_regex: OnceLock<Option<Regex>>,
}

impl TextFilter {
    /// 创建新的文本过滤器
    pub fn new() -> Self {
        Self::default()
    }

    /// 判断文本是否需要翻译
    pub fn should_translate(&self, text: &str) -> bool {
        self.filter_reason(text).is_none()
    }

    /// 高级文本分析
    pub fn analyze_text(&self, text: &str) -> TextAnalysis {
        let reason = self.filter_reason(text);
        TextAnalysis {
            should_translate: reason.is_none(),
            reason,
            char_count: text.trim().chars().count(),
        }
    }

    /// 批量过滤文本
    pub fn filter_texts(&self, texts: Vec<String>) -> Vec<String> {
        texts
            .into_iter()
            .filter(|text| self.should_translate(text))
            .collect()
    }

    /// 返回拒绝原因，`None` 表示需要翻译
    fn filter_reason(&self, text: &str) -> Option<FilterReason> {
        let trimmed = text.trim();

        if trimmed.is_empty() {
            return Some(FilterReason::Empty);
        }

        // 能完整解析为数字的文本（含小数、科学计数法）
        if trimmed.parse::<f64>().is_ok() {
            return Some(FilterReason::Numeric);
        }

        if placeholder::is_placeholder_only(trimmed) {
            return Some(FilterReason::PlaceholderOnly);
        }

        if trimmed.starts_with('<') && trimmed.ends_with('>') {
            return Some(FilterReason::MarkupOnly);
        }

        if trimmed.starts_with("ZC:") {
            return Some(FilterReason::ControlCode);
        }

        let lowered = trimmed.to_lowercase();
        if CONTROL_WORDS.contains(&lowered.as_str()) {
            return Some(FilterReason::ControlWord);
        }

        if self.is_brand_code(trimmed) {
            return Some(FilterReason::BrandCode);
        }

        if trimmed.chars().count() < constants::MIN_TEXT_LENGTH {
            return Some(FilterReason::TooShort);
        }

        if !trimmed.chars().any(char::is_alphabetic) {
            return Some(FilterReason::NoAlphabetic);
        }

        None
    }

    /// 品牌编号，例如 `Brand 12`
    fn is_brand_code(&self, text: &str) -> bool {
        self.brand_regex
            .get_or_init(|| Regex::new(r"^Brand\s+\d+$").ok())
            .as_ref()
            .map_or(false, |regex| regex.is_match(text))
    }
}

/// 文本过滤统计
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct FilterStats {
    pub total_texts: usize,
    pub translatable_texts: usize,
    pub filtered_out: usize,
    pub by_reason: HashMap<FilterReason, usize>,
}

impl FilterStats {
    /// 记录过滤结果
    pub fn record_filter(&mut self, analysis: &TextAnalysis) {
        self.total_texts += 1;

        if analysis.should_translate {
            self.translatable_texts += 1;
        } else {
            self.filtered_out += 1;
            if let Some(reason) = analysis.reason {
                *self.by_reason.entry(reason).or_insert(0) += 1;
            }
        }
    }

    /// 获取可翻译率
    pub fn translatability_rate(&self) -> f32 {
        if self.total_texts == 0 {
            0.0
        } else {
            self.translatable_texts as f32 / self.total_texts as f32
        }
    }
}
