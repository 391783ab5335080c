//! 处理模式：翻译或校对

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::constants;

/// 处理模式
///
/// 校对模式下模型只修正语言错误，无需修改的文本以 [`constants::UNCHANGED_MARKER`] 回复，
/// 原文保持不变。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationMode {
    #[default]
    Translate,
    Proofread,
}

impl TranslationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TranslationMode::Translate => "translate",
            TranslationMode::Proofread => "proofread",
        }
    }

    /// 该模式的内置提示词模板
    pub fn default_prompt_template(self) -> &'static str {
        match self {
            TranslationMode::Translate => constants::DEFAULT_PROMPT_TEMPLATE,
            TranslationMode::Proofread => constants::PROOFREAD_PROMPT_TEMPLATE,
        }
    }

    /// 随每个批次发送的说明
    pub fn instructions(self) -> &'static str {
        match self {
            TranslationMode::Translate => constants::BATCH_INSTRUCTIONS,
            TranslationMode::Proofread => constants::PROOFREAD_INSTRUCTIONS,
        }
    }

    /// 回复是否表示“保留原文”
    pub fn keeps_original(self, response: &str) -> bool {
        self == TranslationMode::Proofread && response.trim() == constants::UNCHANGED_MARKER
    }
}

impl fmt::Display for TranslationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TranslationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "translate" | "translation" => Ok(TranslationMode::Translate),
            "proofread" | "proofreading" | "lektorat" | "korrektur" => Ok(TranslationMode::Proofread),
            other => Err(format!("未知处理模式 '{}'，可选 translate 或 proofread", other)),
        }
    }
}
