//! 译文清理
//!
//! 去除模型输出中的引用标记和原文没有的句末句号。

use std::sync::OnceLock;

use regex::Regex;

static CITATION_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

/// 清理译文
///
/// # 参数
/// * `original` - 发送前的原文
/// * `translated` - 模型返回的译文
pub fn clean_translation(original: &str, translated: &str) -> String {
    let mut cleaned = match CITATION_REGEX
        .get_or_init(|| Regex::new(r"【\d+:\d+†[^】]+】").ok())
        .as_ref()
    {
        Some(regex) => regex.replace_all(translated, "").into_owned(),
        None => translated.to_string(),
    };

    if !original.trim_end().ends_with('.') && cleaned.trim_end().ends_with('.') {
        let kept = cleaned.trim_end().trim_end_matches('.').len();
        cleaned.truncate(kept);
    }

    cleaned
}
