//! 任务上下文
//!
//! 每个任务拥有独立的上下文对象：状态机、缓存、停止标志和报告。
//! 没有任何跨任务共享的全局状态。

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::document::DocumentKind;
use crate::translation::config::{TargetLanguage, TranslationMode};
use crate::translation::error::{helpers, ErrorStats, TranslationError, TranslationResult};
use crate::translation::storage::TranslationCache;

// ============================================================================
// 状态机
// ============================================================================

/// 任务状态
///
/// `PENDING -> EXTRACTING -> TRANSLATING -> SPLICING -> DONE`，
/// 任何非终止状态都可以转到 `FAILED`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Extracting,
    Translating,
    Splicing,
    Done,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    /// 状态转换表
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Pending, Extracting)
            | (Extracting, Translating)
            | (Translating, Splicing)
            | (Splicing, Done) => true,
            (current, Failed) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Pending => "PENDING",
            JobState::Extracting => "EXTRACTING",
            JobState::Translating => "TRANSLATING",
            JobState::Splicing => "SPLICING",
            JobState::Done => "DONE",
            JobState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// 带时间戳的状态变化
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    pub state: JobState,
    pub at: DateTime<Utc>,
}

// ============================================================================
// 停止标志
// ============================================================================

/// 停止标志
///
/// 在阶段之间和批次开始前检查。已经发出的请求不会被中断。
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// 任务报告
// ============================================================================

/// 任务报告
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: String,
    pub file_name: String,
    pub kind: DocumentKind,
    pub target_language: Option<TargetLanguage>,
    pub mode: Option<TranslationMode>,
    pub model: Option<String>,
    pub state: JobState,
    pub error: Option<String>,

    /// 文档中的全部文本位置
    pub total_locations: usize,
    /// 通过过滤、需要翻译的位置
    pub units: usize,
    pub unique_keys: usize,
    pub cache_hits: usize,
    pub batches: usize,
    pub failed_batches: usize,
    pub skipped_batches: usize,
    pub retries: usize,
    /// 返回了译文的键
    pub translated_keys: usize,
    /// 校对时无需修改的键
    pub unchanged_keys: usize,
    /// 写入了译文的位置
    pub translated_units: usize,
    /// 保持原文的位置
    pub untranslated_units: usize,
    pub splice_errors: usize,
    pub errors: ErrorStats,

    pub output_bytes: usize,
    pub output_sha256: Option<String>,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub history: Vec<StateChange>,
}

impl JobReport {
    fn new(job_id: &str, file_name: &str, kind: DocumentKind, started_at: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id.to_string(),
            file_name: file_name.to_string(),
            kind,
            target_language: None,
            mode: None,
            model: None,
            state: JobState::Pending,
            error: None,
            total_locations: 0,
            units: 0,
            unique_keys: 0,
            cache_hits: 0,
            batches: 0,
            failed_batches: 0,
            skipped_batches: 0,
            retries: 0,
            translated_keys: 0,
            unchanged_keys: 0,
            translated_units: 0,
            untranslated_units: 0,
            splice_errors: 0,
            errors: ErrorStats::default(),
            output_bytes: 0,
            output_sha256: None,
            started_at,
            finished_at: None,
            duration_ms: None,
            history: Vec::new(),
        }
    }

    /// 记录输出文件的大小和 SHA-256
    pub fn record_output(&mut self, bytes: &[u8]) {
        let digest = Sha256::digest(bytes);
        self.output_bytes = bytes.len();
        self.output_sha256 = Some(digest.iter().map(|b| format!("{:02x}", b)).collect());
    }

    pub fn to_json(&self) -> TranslationResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ============================================================================
// 任务上下文
// ============================================================================

/// 任务上下文
#[derive(Debug)]
pub struct JobContext {
    id: String,
    file_name: String,
    kind: DocumentKind,
    state: JobState,
    cache: Arc<TranslationCache>,
    stop: StopFlag,
    report: JobReport,
}

fn generate_job_id(now: DateTime<Utc>) -> String {
    format!("job-{}-{:08x}", now.format("%Y%m%d%H%M%S"), rand::random::<u32>())
}

impl JobContext {
    /// 新任务，使用全新的缓存
    pub fn new(file_name: impl Into<String>, kind: DocumentKind) -> Self {
        let now = Utc::now();
        let id = generate_job_id(now);
        let file_name = file_name.into();
        let mut report = JobReport::new(&id, &file_name, kind, now);
        report.history.push(StateChange {
            state: JobState::Pending,
            at: now,
        });

        Self {
            id,
            file_name,
            kind,
            state: JobState::Pending,
            cache: Arc::new(TranslationCache::new()),
            stop: StopFlag::new(),
            report,
        }
    }

    /// 显式传入已有缓存，例如用于幂等性验证
    ///
    /// 缓存键不区分目标语言。缓存在第一个任务开始时绑定该任务的语言，
    /// 之后交给其他目标语言的任务会以配置错误失败，不会返回错误语言的译文。
    pub fn with_cache(mut self, cache: Arc<TranslationCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn history(&self) -> &[StateChange] {
        &self.report.history
    }

    pub fn cache(&self) -> &Arc<TranslationCache> {
        &self.cache
    }

    pub fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }

    pub fn report(&self) -> &JobReport {
        &self.report
    }

    pub(crate) fn report_mut(&mut self) -> &mut JobReport {
        &mut self.report
    }

    /// 状态转换，不在转换表中的转换是内部错误
    pub fn transition(&mut self, next: JobState) -> TranslationResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(helpers::internal_error(format!(
                "任务 {} 不能从 {} 转到 {}",
                self.id, self.state, next
            )));
        }

        let now = Utc::now();
        tracing::info!("任务 {}: {} -> {}", self.id, self.state, next);
        self.state = next;
        self.report.state = next;
        self.report.history.push(StateChange { state: next, at: now });

        if next.is_terminal() {
            self.report.finished_at = Some(now);
            self.report.duration_ms = Some((now - self.report.started_at).num_milliseconds());
        }
        Ok(())
    }

    /// 标记任务失败，已终止的任务保持不变
    pub fn fail(&mut self, error: &TranslationError) {
        if self.state.is_terminal() {
            return;
        }
        tracing::error!("任务 {} 失败: {}", self.id, error);
        self.report.error = Some(error.to_string());
        self.report.errors.record_error(error);
        // 非终止状态一定可以转到 FAILED
        let _ = self.transition(JobState::Failed);
    }

    /// 阶段之间检查停止标志
    pub fn check_cancelled(&self) -> TranslationResult<()> {
        if self.stop.is_raised() {
            return Err(TranslationError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use JobState::*;
        assert!(Pending.can_transition_to(Extracting));
        assert!(Splicing.can_transition_to(Done));
        assert!(Translating.can_transition_to(Failed));
        assert!(Pending.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Translating));
        assert!(!Done.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Pending));
    }

    #[test]
    fn test_context_lifecycle() {
        let mut ctx = JobContext::new("deck.pptx", DocumentKind::PowerPoint);
        assert_eq!(ctx.state(), JobState::Pending);
        assert!(ctx.id().starts_with("job-"));

        for state in [JobState::Extracting, JobState::Translating, JobState::Splicing, JobState::Done] {
            ctx.transition(state).unwrap();
        }
        assert_eq!(ctx.history().len(), 5);
        assert!(ctx.report().finished_at.is_some());
        assert!(ctx.transition(JobState::Extracting).is_err());

        ctx.fail(&TranslationError::Cancelled);
        assert_eq!(ctx.state(), JobState::Done, "终止状态不再变化");
    }

    #[test]
    fn test_cancellation() {
        let stop = StopFlag::new();
        let mut ctx = JobContext::new("a.docx", DocumentKind::Word).with_stop_flag(stop.clone());
        assert!(ctx.check_cancelled().is_ok());

        stop.raise();
        let err = ctx.check_cancelled().unwrap_err();
        ctx.fail(&err);
        assert_eq!(ctx.state(), JobState::Failed);
        assert_eq!(ctx.report().error.as_deref(), Some("任务已取消"));
    }

    #[test]
    fn test_fresh_cache_per_job() {
        let a = JobContext::new("a.csv", DocumentKind::Csv);
        let b = JobContext::new("b.csv", DocumentKind::Csv);
        assert!(!Arc::ptr_eq(a.cache(), b.cache()));

        let shared = Arc::clone(a.cache());
        let c = JobContext::new("c.csv", DocumentKind::Csv).with_cache(Arc::clone(&shared));
        assert!(Arc::ptr_eq(c.cache(), &shared));
    }

    #[test]
    fn test_report_digest() {
        let mut report = JobContext::new("a.csv", DocumentKind::Csv).report().clone();
        report.record_output(b"abc");
        assert_eq!(report.output_bytes, 3);
        assert_eq!(
            report.output_sha256.as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        let json = report.to_json().unwrap();
        assert!(json.contains("\"state\": \"PENDING\""));
    }
}
