//! 命令行入口

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use tempfile::NamedTempFile;
use tracing_subscriber::EnvFilter;

use office_translator::document::{CsvOptions, DocumentKind};
use office_translator::env::{self, EnvVar};
use office_translator::translation::config::{config_file_exists, ConfigManager};
use office_translator::translation::error::{TranslationError, TranslationResult};
use office_translator::translation::{
    JobState, StopFlag, TargetLanguage, TranslationConfig, TranslationMode, TranslationService,
};

/// Translate Office documents and CSV questionnaires with an LLM API
#[derive(Parser, Debug)]
#[command(name = "office-translator", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a .docx, .pptx, .xlsx or .csv file
    Translate(TranslateArgs),

    /// List supported target languages
    Languages,

    /// Write an example configuration file
    InitConfig {
        /// Destination [default: office-translator.toml]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print documentation for all environment variables
    EnvDocs,
}

#[derive(clap::Args, Debug)]
struct TranslateArgs {
    /// Input document
    input: PathBuf,

    /// Output file [default: <stem>_<lang>.<ext> next to the input]
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Target language code, e.g. de, fr, zh-CN
    #[arg(short = 'l', long = "lang", value_name = "LANG", value_parser = parse_language)]
    target_lang: Option<TargetLanguage>,

    /// Processing mode: translate or proofread
    #[arg(long, value_name = "MODE", value_parser = parse_mode)]
    mode: Option<TranslationMode>,

    /// Model name
    #[arg(short, long, value_name = "MODEL")]
    model: Option<String>,

    /// Read the system prompt template from a file
    #[arg(long, value_name = "PATH")]
    prompt_file: Option<PathBuf>,

    /// Maximum texts per request
    #[arg(long, value_name = "N")]
    batch_size: Option<usize>,

    /// Total attempts per batch
    #[arg(long, value_name = "N")]
    max_retries: Option<usize>,

    /// Configuration file (TOML or JSON)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write the job report as JSON
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// CSV: header of the column holding the source text
    #[arg(long, value_name = "HEADER", requires = "target_column")]
    source_column: Option<String>,

    /// CSV: header of the column receiving the translation
    #[arg(long, value_name = "HEADER", requires = "source_column")]
    target_column: Option<String>,

    /// CSV: field delimiter [default: detected]
    #[arg(long, value_name = "CHAR", value_parser = parse_delimiter)]
    delimiter: Option<u8>,
}

fn parse_language(value: &str) -> Result<TargetLanguage, String> {
    TargetLanguage::from_str(value)
}

fn parse_mode(value: &str) -> Result<TranslationMode, String> {
    TranslationMode::from_str(value)
}

fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "\\t" | "tab" => Ok(b'\t'),
        _ => match value.as_bytes() {
            [byte] if byte.is_ascii() => Ok(*byte),
            _ => Err(format!("分隔符必须是单个 ASCII 字符: '{}'", value)),
        },
    }
}

// ============================================================================
// 日志
// ============================================================================

fn init_logging() {
    // RUST_LOG 优先，其次是 OFFICE_TRANSLATOR_LOG_LEVEL
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = env::core::LogLevel::get().unwrap_or_else(|_| "info".to_string());
        EnvFilter::new(level)
    });
    let no_color = env::core::NoColor::get().unwrap_or(false);
    let ansi = atty::is(atty::Stream::Stderr) && !no_color;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_writer(std::io::stderr)
        .try_init();
}

// ============================================================================
// translate
// ============================================================================

fn load_config(args: &TranslateArgs) -> TranslationResult<TranslationConfig> {
    let manager = match &args.config {
        Some(path) => ConfigManager::from_file(path)?,
        None => ConfigManager::new()?,
    };
    let mut config = manager.into_config();

    if let Some(lang) = args.target_lang {
        config.target_lang = lang;
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(path) = &args.prompt_file {
        config.prompt_template = std::fs::read_to_string(path).map_err(|e| {
            TranslationError::ConfigError(format!("读取提示词文件 {} 失败: {}", path.display(), e))
        })?;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(max_retries) = args.max_retries {
        config.max_retries = max_retries;
    }

    config.validate()?;
    Ok(config)
}

/// `<stem>_<lang>.<ext>`，与输入文件放在同一目录
fn default_output_path(input: &Path, lang: TargetLanguage, kind: DocumentKind) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}_{}.{}", stem, lang.code(), kind.extension()))
}

/// 先写临时文件再重命名，失败时不会留下半个输出文件
fn write_atomically(path: &Path, bytes: &[u8]) -> TranslationResult<()> {
    use std::io::Write;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.persist(path).map_err(|e| TranslationError::IoError(e.to_string()))?;
    Ok(())
}

async fn translate(args: TranslateArgs) -> TranslationResult<bool> {
    match env::EnvConfig::from_env() {
        Ok(env_config) => tracing::debug!("{}", env_config.summary()),
        Err(e) => tracing::warn!("环境变量无效: {}", e),
    }
    let config = load_config(&args)?;
    let kind = DocumentKind::from_path(&args.input)?;
    let input = std::fs::read(&args.input).map_err(|e| {
        TranslationError::IoError(format!("读取 {} 失败: {}", args.input.display(), e))
    })?;

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input, config.target_lang, kind));
    let csv_options = CsvOptions {
        delimiter: args.delimiter,
        source_column: args.source_column.clone(),
        target_column: args.target_column.clone(),
    };

    let service = TranslationService::new(config)?;
    let file_name = args
        .input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let stop = StopFlag::new();
    let mut job = service.new_job(file_name, kind).with_stop_flag(stop.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("收到中断信号，正在停止任务");
            stop.raise();
        }
    });

    let result = service.run_job(&mut job, &input, &csv_options).await;

    if let Ok(bytes) = &result {
        write_atomically(&output_path, bytes)?;
        tracing::info!("已写入 {}", output_path.display());
    }

    if let Some(report_path) = &args.report {
        write_atomically(report_path, job.report().to_json()?.as_bytes())?;
    }

    let report = job.report();
    match &result {
        Ok(_) => println!(
            "{}: {} -> {} ({} 个文本已翻译, {} 个保持原文, {} 个批次失败)",
            job.state(),
            args.input.display(),
            output_path.display(),
            report.translated_units,
            report.untranslated_units,
            report.failed_batches
        ),
        Err(error) => eprintln!("{}: {}", job.state(), error),
    }

    Ok(job.state() == JobState::Done)
}

// ============================================================================
// 其他子命令
// ============================================================================

fn list_languages() {
    for lang in TargetLanguage::ALL {
        println!("{:<6} {:<24} {}", lang.code(), lang.english_name(), lang.german_name());
    }
}

fn init_config(path: Option<PathBuf>, force: bool) -> TranslationResult<()> {
    if path.is_none() && config_file_exists() {
        tracing::info!("已存在配置文件，新文件将覆盖默认搜索路径中优先级较低的配置");
    }

    let path = path.unwrap_or_else(|| PathBuf::from("office-translator.toml"));
    if path.exists() && !force {
        return Err(TranslationError::ConfigError(format!(
            "{} 已存在，使用 --force 覆盖",
            path.display()
        )));
    }

    ConfigManager::generate_example_config(&path)?;
    println!("已生成示例配置: {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Translate(args) => translate(args).await,
        Commands::Languages => {
            list_languages();
            Ok(true)
        }
        Commands::InitConfig { path, force } => init_config(path, force).map(|_| true),
        Commands::EnvDocs => {
            print!("{}", env::generate_env_docs());
            Ok(true)
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("错误: {}", error);
            ExitCode::FAILURE
        }
    }
}
