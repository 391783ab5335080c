//! 问卷占位符保护
//!
//! `!%...%!` 和 `{!%...%!}` 形式的占位符在发送前被替换为 `⟦PHn⟧` 标记，
//! 译文返回后再还原。丢失任何标记的译文视为无效。

use std::sync::OnceLock;

use regex::Regex;

static PLACEHOLDER_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

fn placeholder_regex() -> Option<&'static Regex> {
    PLACEHOLDER_REGEX
        .get_or_init(|| Regex::new(r"\{!%.*?%!\}|!%.*?%!").ok())
        .as_ref()
}

/// 屏蔽后的文本及被替换的原始占位符
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedText {
    pub text: String,
    pub placeholders: Vec<String>,
}

impl MaskedText {
    /// 文本中是否存在占位符
    pub fn has_placeholders(&self) -> bool {
        !self.placeholders.is_empty()
    }
}

fn marker(index: usize) -> String {
    format!("⟦PH{}⟧", index)
}

/// 将占位符替换为编号标记
pub fn mask(text: &str) -> MaskedText {
    let Some(regex) = placeholder_regex() else {
        return MaskedText {
            text: text.to_string(),
            placeholders: Vec::new(),
        };
    };

    let mut placeholders = Vec::new();
    let masked = regex.replace_all(text, |caps: &regex::Captures<'_>| {
        placeholders.push(caps[0].to_string());
        marker(placeholders.len() - 1)
    });

    MaskedText {
        text: masked.into_owned(),
        placeholders,
    }
}

/// 还原占位符
///
/// 任一标记缺失时返回 `None`，调用方应保留原文。
pub fn unmask(translated: &str, placeholders: &[String]) -> Option<String> {
    let mut restored = translated.to_string();
    for (index, original) in placeholders.iter().enumerate() {
        let tag = marker(index);
        if !restored.contains(&tag) {
            return None;
        }
        restored = restored.replace(&tag, original);
    }
    Some(restored)
}

/// 去掉所有占位符后是否只剩空白
pub fn is_placeholder_only(text: &str) -> bool {
    match placeholder_regex() {
        Some(regex) => regex.is_match(text) && regex.replace_all(text, "").trim().is_empty(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_and_unmask() {
        let masked = mask("Hallo !%name%!, siehe {!%I-progress.txt%!}");
        assert_eq!(masked.text, "Hallo ⟦PH0⟧, siehe ⟦PH1⟧");
        assert_eq!(masked.placeholders, vec!["!%name%!", "{!%I-progress.txt%!}"]);

        let restored = unmask("Hello ⟦PH0⟧, see ⟦PH1⟧", &masked.placeholders).unwrap();
        assert_eq!(restored, "Hello !%name%!, see {!%I-progress.txt%!}");
    }

    #[test]
    fn test_lost_marker_is_rejected() {
        let masked = mask("Wert: !%v%!");
        assert!(masked.has_placeholders());
        assert_eq!(unmask("Value:", &masked.placeholders), None);
    }

    #[test]
    fn test_plain_text_is_untouched() {
        let masked = mask("Thank you");
        assert!(!masked.has_placeholders());
        assert_eq!(masked.text, "Thank you");
        assert_eq!(unmask("Danke", &masked.placeholders).as_deref(), Some("Danke"));
    }

    #[test]
    fn test_placeholder_only() {
        assert!(is_placeholder_only("!%a%! {!%b%!}"));
        assert!(!is_placeholder_only("Frage !%a%!"));
        assert!(!is_placeholder_only("plain"));
    }
}
