//! 翻译配置管理模块
//!
//! 提供配置管理，支持环境变量、配置文件和默认值

pub mod language;
pub mod manager;
pub mod mode;

// 重新导出主要类型
pub use language::{is_known_model, TargetLanguage, KNOWN_MODELS};
pub use manager::{ConfigManager, TranslationConfig};
pub use mode::TranslationMode;

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 批次处理相关
    pub const DEFAULT_BATCH_SIZE: usize = 10;
    pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
    pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
    pub const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_secs(8);
    pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(60);

    // 文本过滤相关
    pub const MIN_TEXT_LENGTH: usize = 2;

    // 默认API设置
    pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
    pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
    pub const DEFAULT_MAX_REQUESTS_PER_SECOND: f64 = 5.0;
    pub const MIN_REQUESTS_PER_SECOND: f64 = 0.001;
    pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 10;
    pub const DEFAULT_TEMPERATURE: f32 = 0.2;
    pub const DEFAULT_MAX_TOKENS: u32 = 4096;

    /// 提示词中的语言占位符
    pub const TARGET_LANGUAGE_PLACEHOLDER: &str = "{target_language}";

    /// 默认系统提示词（德语批量翻译说明）
    pub const DEFAULT_PROMPT_TEMPLATE: &str = "Du bist ein hilfreicher Assistent, der Texte in {target_language} übersetzt.
Behalte die ursprüngliche Bedeutung so genau wie möglich bei.
Passe den Ton der Übersetzung so an, dass er für professionelle Dokumente in der Zielsprache ({target_language}) angemessen ist.
Der übersetzte Text sollte ungefähr die gleiche Zeichenlänge wie der ursprüngliche Text haben (innerhalb einer 5%-Marge).
Übersetze keine E-Mails, Telefonnummern oder andere nicht-textuelle Inhalte.
Verwende korrekte Umlaute und Sonderzeichen für die Zielsprache.";

    /// 校对模式的系统提示词（德语 Lektorat 说明）
    pub const PROOFREAD_PROMPT_TEMPLATE: &str = "Du bist ein professioneller Lektor für Texte in {target_language}.
Bitte überprüfe und korrigiere jeden Text mit Fokus auf:
1. Grammatik und Syntax
2. Rechtschreibung nach den aktuellen Regeln der Sprache
3. Zeichensetzung
4. Verbesserung der Formulierungen unter Beibehaltung der ursprünglichen Bedeutung
Wichtig: Bewahre alle Formatierungen, Zeilenumbrüche und Tabellentrenner ' | '.
Korrigiere ausschließlich die oben genannten sprachlichen Aspekte.
Falls ein Text keine Korrektur benötigt, antworte für diesen Schlüssel mit '-'.";

    /// 随请求发送的批量说明
    pub const BATCH_INSTRUCTIONS: &str =
        "Translate each text, maintaining original meaning and formatting. Use correct umlauts and special characters.";

    /// 校对模式的批量说明
    pub const PROOFREAD_INSTRUCTIONS: &str =
        "Correct each text, preserving meaning, formatting and line breaks. Answer '-' for texts that need no correction.";

    /// 校对模式下表示“保留原文”的回复
    pub const UNCHANGED_MARKER: &str = "-";

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "office-translator.toml",
        "office-translator.json",
        ".office-translator.toml",
        "~/.config/office-translator/config.toml",
        "/etc/office-translator/config.toml",
    ];

    // .env 文件（按优先级）
    pub const DOTENV_FILES: &[&str] = &[".env.local", ".env.development", ".env.production", ".env"];
}

/// 便利函数
pub fn config_file_exists() -> bool {
    constants::CONFIG_PATHS
        .iter()
        .any(|path| std::path::Path::new(shellexpand::tilde(path).as_ref()).exists())
}
