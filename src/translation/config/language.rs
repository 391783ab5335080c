//! 目标语言与模型定义

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! target_languages {
    ($($variant:ident => $code:literal, $english:literal, $german:literal;)+) => {
        /// 支持的目标语言
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum TargetLanguage {
            $($variant,)+
        }

        impl TargetLanguage {
            /// 全部语言，按界面中的顺序排列
            pub const ALL: &'static [TargetLanguage] = &[$(TargetLanguage::$variant,)+];

            /// 语言代码，例如 `de`、`zh-CN`
            pub fn code(self) -> &'static str {
                match self {
                    $(TargetLanguage::$variant => $code,)+
                }
            }

            pub fn english_name(self) -> &'static str {
                match self {
                    $(TargetLanguage::$variant => $english,)+
                }
            }

            pub fn german_name(self) -> &'static str {
                match self {
                    $(TargetLanguage::$variant => $german,)+
                }
            }
        }
    };
}

target_languages! {
    De => "de", "German", "Deutsch";
    Es => "es", "Spanish", "Spanisch";
    Fr => "fr", "French", "Französisch";
    En => "en", "English", "Englisch";
    It => "it", "Italian", "Italienisch";
    Pt => "pt", "Portuguese", "Portugiesisch";
    ZhCn => "zh-CN", "Chinese (Simplified)", "Chinesisch (Vereinfacht)";
    ZhTw => "zh-TW", "Chinese (Traditional)", "Chinesisch (Traditionell)";
    Ja => "ja", "Japanese", "Japanisch";
    Ko => "ko", "Korean", "Koreanisch";
    Ru => "ru", "Russian", "Russisch";
    Ar => "ar", "Arabic", "Arabisch";
    Hi => "hi", "Hindi", "Hindi";
    Nl => "nl", "Dutch", "Niederländisch";
    Sv => "sv", "Swedish", "Schwedisch";
    No => "no", "Norwegian", "Norwegisch";
    Da => "da", "Danish", "Dänisch";
    Fi => "fi", "Finnish", "Finnisch";
    Pl => "pl", "Polish", "Polnisch";
    Cs => "cs", "Czech", "Tschechisch";
    Hu => "hu", "Hungarian", "Ungarisch";
    Ro => "ro", "Romanian", "Rumänisch";
    Bg => "bg", "Bulgarian", "Bulgarisch";
    Hr => "hr", "Croatian", "Kroatisch";
    Sr => "sr", "Serbian", "Serbisch";
    Sk => "sk", "Slovak", "Slowakisch";
    Sl => "sl", "Slovenian", "Slowenisch";
    Et => "et", "Estonian", "Estnisch";
    Lv => "lv", "Latvian", "Lettisch";
    Lt => "lt", "Lithuanian", "Litauisch";
    El => "el", "Greek", "Griechisch";
    Tr => "tr", "Turkish", "Türkisch";
    He => "he", "Hebrew", "Hebräisch";
    Th => "th", "Thai", "Thai";
    Vi => "vi", "Vietnamese", "Vietnamesisch";
    Id => "id", "Indonesian", "Indonesisch";
    Ms => "ms", "Malay", "Malaiisch";
    Fil => "fil", "Filipino", "Filipino";
    Uk => "uk", "Ukrainian", "Ukrainisch";
}

impl Default for TargetLanguage {
    fn default() -> Self {
        TargetLanguage::De
    }
}

impl fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for TargetLanguage {
    type Err = String;

    /// 大小写不敏感，`_` 与 `-` 等价
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().replace('_', "-");
        TargetLanguage::ALL
            .iter()
            .copied()
            .find(|lang| lang.code().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| format!("不支持的目标语言 '{}'", value.trim()))
    }
}

impl TryFrom<String> for TargetLanguage {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TargetLanguage> for String {
    fn from(lang: TargetLanguage) -> Self {
        lang.code().to_string()
    }
}

/// 已知可用的模型
pub const KNOWN_MODELS: &[&str] = &["gpt-5-mini", "gpt-4.1-mini", "gpt-4o"];

/// 检查模型是否在已知列表中
pub fn is_known_model(model: &str) -> bool {
    KNOWN_MODELS.contains(&model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_table_is_complete() {
        assert_eq!(TargetLanguage::ALL.len(), 39);
        let mut codes: Vec<_> = TargetLanguage::ALL.iter().map(|l| l.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 39, "语言代码不应重复");
    }

    #[test]
    fn test_parse_variants() {
        assert_eq!("de".parse::<TargetLanguage>().unwrap(), TargetLanguage::De);
        assert_eq!("ZH-tw".parse::<TargetLanguage>().unwrap(), TargetLanguage::ZhTw);
        assert_eq!("zh_CN".parse::<TargetLanguage>().unwrap(), TargetLanguage::ZhCn);
        assert_eq!(" fil ".parse::<TargetLanguage>().unwrap(), TargetLanguage::Fil);
        assert!("xx".parse::<TargetLanguage>().is_err());
        assert!("".parse::<TargetLanguage>().is_err());
    }

    #[test]
    fn test_serde_uses_code() {
        let json = serde_json::to_string(&TargetLanguage::ZhCn).unwrap();
        assert_eq!(json, "\"zh-CN\"");
        let lang: TargetLanguage = serde_json::from_str("\"fr\"").unwrap();
        assert_eq!(lang, TargetLanguage::Fr);
        assert!(serde_json::from_str::<TargetLanguage>("\"klingon\"").is_err());
    }

    #[test]
    fn test_known_models() {
        assert!(is_known_model("gpt-4.1-mini"));
        assert!(!is_known_model("gpt-2"));
    }
}
