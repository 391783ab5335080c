//! 翻译服务
//!
//! 把提取、缓存、批次分发和写回串成一个任务：
//!
//! ```text
//! PENDING -> EXTRACTING -> TRANSLATING -> SPLICING -> DONE
//!    └──────────┴─────────────┴────────────┴──> FAILED
//! ```
//!
//! 只有文档无法解析、凭据无效、配置错误和取消会让任务失败。批次失败只会让
//! 对应文本保持原文。
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use office_translator::document::{CsvOptions, DocumentKind};
//! use office_translator::translation::config::TranslationConfig;
//! use office_translator::translation::core::TranslationService;
//!
//! # async fn run() -> office_translator::translation::error::TranslationResult<()> {
//! let service = TranslationService::new(TranslationConfig::default())?;
//! let input = std::fs::read("survey.csv")?;
//! let mut job = service.new_job("survey.csv", DocumentKind::Csv);
//! let output = service.run_job(&mut job, &input, &CsvOptions::default()).await?;
//! println!("{} -> {} 字节", job.state(), output.len());
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::document::{open_document_with, CsvOptions, Document, DocumentKind};
use crate::translation::client::{OpenAiClient, TranslationClient};
use crate::translation::config::TranslationConfig;
use crate::translation::core::job::{JobContext, JobState};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::{BatchManager, BatchManagerConfig, Extractor, Splicer};
use crate::translation::processor::{BatchDispatcher, JobSettings};
use crate::translation::storage::CacheKey;

/// 翻译服务
///
/// 服务本身不保存任务状态，可以依次或并发运行多个互不影响的任务。
pub struct TranslationService {
    config: TranslationConfig,
    settings: JobSettings,
    client: Arc<dyn TranslationClient>,
    extractor: Extractor,
    batch_config: BatchManagerConfig,
    dispatcher: BatchDispatcher,
    stats: ServiceStats,
}

impl TranslationService {
    /// 使用 OpenAI 兼容客户端创建服务
    ///
    /// # 参数
    ///
    /// * `config` - 翻译配置，创建前会先校验
    pub fn new(config: TranslationConfig) -> TranslationResult<Self> {
        config.validate()?;
        let client = Arc::new(OpenAiClient::new(&config)?);
        Self::with_client(config, client)
    }

    /// 使用指定客户端创建服务
    pub fn with_client(
        config: TranslationConfig,
        client: Arc<dyn TranslationClient>,
    ) -> TranslationResult<Self> {
        config.validate()?;

        tracing::info!(
            "创建翻译服务: 模式 {}, 目标语言 {}, 模型 {}, 批次大小 {}",
            config.mode,
            config.target_lang,
            config.model,
            config.batch_size
        );

        Ok(Self {
            settings: JobSettings::from(&config),
            batch_config: BatchManagerConfig::from(&config),
            dispatcher: BatchDispatcher::new(Arc::clone(&client), &config),
            extractor: Extractor::new(),
            client,
            config,
            stats: ServiceStats::default(),
        })
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn get_stats(&self) -> &ServiceStats {
        &self.stats
    }

    /// 创建新任务，每个任务拥有独立的缓存
    pub fn new_job(&self, file_name: impl Into<String>, kind: DocumentKind) -> JobContext {
        JobContext::new(file_name, kind)
    }

    /// 运行任务，返回翻译后的文件内容
    ///
    /// 失败时任务进入 `FAILED`，错误同时写入任务报告。输入字节从不被修改。
    pub async fn run_job(
        &self,
        ctx: &mut JobContext,
        input: &[u8],
        csv_options: &CsvOptions,
    ) -> TranslationResult<Vec<u8>> {
        let kind = ctx.kind();
        self.run_with(ctx, || open_document_with(kind, input, csv_options))
            .await
    }

    /// 对已经打开的文档运行任务
    ///
    /// 适用于自定义的 [`Document`] 实现，状态流转与 [`run_job`](Self::run_job) 相同。
    pub async fn run_document(
        &self,
        ctx: &mut JobContext,
        document: Box<dyn Document>,
    ) -> TranslationResult<Vec<u8>> {
        self.run_with(ctx, move || Ok(document)).await
    }

    async fn run_with(
        &self,
        ctx: &mut JobContext,
        open: impl FnOnce() -> TranslationResult<Box<dyn Document>>,
    ) -> TranslationResult<Vec<u8>> {
        let start = Instant::now();
        self.stats.inc_jobs_started();
        {
            let report = ctx.report_mut();
            report.target_language = Some(self.settings.target_language);
            report.mode = Some(self.settings.mode);
            report.model = Some(self.settings.model.clone());
        }

        let result = self.execute(ctx, open).await;
        self.stats.add_processing_time(start.elapsed());

        match result {
            Ok(bytes) => {
                self.stats.inc_jobs_completed();
                tracing::info!(
                    "任务 {} 完成: {} 个文本已翻译, {} 个保持原文, 耗时 {:.2}秒",
                    ctx.id(),
                    ctx.report().translated_units,
                    ctx.report().untranslated_units,
                    start.elapsed().as_secs_f64()
                );
                Ok(bytes)
            }
            Err(error) => {
                self.stats.inc_jobs_failed();
                ctx.fail(&error);
                Err(error)
            }
        }
    }

    async fn execute(
        &self,
        ctx: &mut JobContext,
        open: impl FnOnce() -> TranslationResult<Box<dyn Document>>,
    ) -> TranslationResult<Vec<u8>> {
        // PENDING: 先检查缓存语言和凭据，避免白白解析大文件
        ctx.check_cancelled()?;
        ctx.cache()
            .bind_language(self.settings.target_language)
            .map_err(|bound| {
                TranslationError::ConfigError(format!(
                    "缓存已用于目标语言 {}，不能用于 {}",
                    bound, self.settings.target_language
                ))
            })?;
        self.client.ensure_credentials().await?;

        // EXTRACTING
        ctx.check_cancelled()?;
        ctx.transition(JobState::Extracting)?;
        let mut document = open()?;
        let (units, filter_stats) = self.extractor.extract_with_stats(document.as_ref());
        self.stats.add_units_extracted(units.len());

        let cache = Arc::clone(ctx.cache());
        let mut seen = HashSet::new();
        let mut misses = Vec::new();
        let mut hits = 0;
        for unit in &units {
            let key = CacheKey::derive(&unit.text, &self.settings.model, &self.settings.prompt_template);
            if !seen.insert(key.clone()) {
                continue;
            }
            if cache.get(&key).is_some() {
                hits += 1;
            } else {
                misses.push((key, unit.text.clone()));
            }
        }
        self.stats.add_cache_hits(hits);

        {
            let report = ctx.report_mut();
            report.total_locations = filter_stats.total_texts;
            report.units = units.len();
            report.unique_keys = seen.len();
            report.cache_hits = hits;
        }
        tracing::info!(
            "任务 {}: {} 个位置, {} 个待翻译, {} 个不同文本, 缓存命中 {}",
            ctx.id(),
            filter_stats.total_texts,
            units.len(),
            seen.len(),
            hits
        );

        // TRANSLATING
        ctx.check_cancelled()?;
        ctx.transition(JobState::Translating)?;
        let batches = BatchManager::new(self.batch_config.clone()).create_batches(misses);
        self.stats.add_batches_dispatched(batches.len());

        let dispatch = self
            .dispatcher
            .dispatch(batches, &self.settings, Arc::clone(&cache), ctx.stop_flag())
            .await;
        {
            let report = ctx.report_mut();
            report.batches = dispatch.total_batches;
            report.failed_batches = dispatch.failed_batches;
            report.skipped_batches = dispatch.skipped_batches;
            report.retries = dispatch.retries;
            report.translated_keys = dispatch.translated_keys;
            report.unchanged_keys = dispatch.unchanged_keys;
            report.errors.merge(&dispatch.errors);
        }
        // 分发期间收到停止信号时，任务失败而不是写出半成品
        ctx.check_cancelled()?;

        // SPLICING
        ctx.transition(JobState::Splicing)?;
        let splice = Splicer::new(
            &self.extractor,
            &cache,
            &self.settings.model,
            &self.settings.prompt_template,
        )
        .splice(document.as_mut());
        let bytes = document.to_bytes()?;

        {
            let report = ctx.report_mut();
            report.translated_units = splice.written;
            report.untranslated_units = units.len().saturating_sub(splice.written);
            report.splice_errors = splice.error_count();
            report.record_output(&bytes);
        }

        ctx.transition(JobState::Done)?;
        Ok(bytes)
    }
}

// ============================================================================
// 统计
// ============================================================================

/// 服务运行统计，跨任务累计
#[derive(Debug, Default)]
pub struct ServiceStats {
    pub jobs_started: AtomicUsize,
    pub jobs_completed: AtomicUsize,
    pub jobs_failed: AtomicUsize,
    pub units_extracted: AtomicUsize,
    pub cache_hits: AtomicUsize,
    pub batches_dispatched: AtomicUsize,
    /// 微秒
    pub processing_time: AtomicU64,
}

impl ServiceStats {
    pub fn inc_jobs_started(&self) {
        self.jobs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_jobs_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_jobs_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_units_extracted(&self, count: usize) {
        self.units_extracted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_cache_hits(&self, count: usize) {
        self.cache_hits.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_batches_dispatched(&self, count: usize) {
        self.batches_dispatched.fetch_add(count, Ordering::Relaxed);
    }

    /// # 参数
    ///
    /// * `duration` - 本次任务的处理时间
    pub fn add_processing_time(&self, duration: Duration) {
        self.processing_time
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// 获取统计数据快照
    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            jobs_started: self.jobs_started.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            units_extracted: self.units_extracted.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            processing_time: Duration::from_micros(self.processing_time.load(Ordering::Relaxed)),
        }
    }
}

/// 统计数据的不可变快照
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ServiceStatsSnapshot {
    pub jobs_started: usize,
    pub jobs_completed: usize,
    pub jobs_failed: usize,
    pub units_extracted: usize,
    pub cache_hits: usize,
    pub batches_dispatched: usize,
    pub processing_time: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::client::BatchRequest;
    use crate::translation::error::TranslationError;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct EchoClient {
        credentials: Result<(), TranslationError>,
    }

    #[async_trait]
    impl TranslationClient for EchoClient {
        async fn translate_batch(&self, request: &BatchRequest) -> TranslationResult<HashMap<String, String>> {
            Ok(request
                .texts
                .iter()
                .map(|(k, v)| (k.clone(), format!("[{}]", v)))
                .collect())
        }

        async fn ensure_credentials(&self) -> TranslationResult<()> {
            self.credentials.clone()
        }
    }

    fn service(credentials: Result<(), TranslationError>) -> TranslationService {
        let config = TranslationConfig {
            rate_limit_enabled: false,
            ..TranslationConfig::default()
        };
        TranslationService::with_client(config, Arc::new(EchoClient { credentials })).unwrap()
    }

    #[tokio::test]
    async fn test_csv_job_runs_to_done() {
        let service = service(Ok(()));
        let mut job = service.new_job("a.csv", DocumentKind::Csv);
        let output = service
            .run_job(&mut job, b"q\nHello\n42\nHello\n", &CsvOptions::default())
            .await
            .unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "q\n[Hello]\n42\n[Hello]\n");
        assert_eq!(job.state(), JobState::Done);
        let report = job.report();
        assert_eq!(report.units, 2);
        assert_eq!(report.unique_keys, 1);
        assert_eq!(report.translated_units, 2);
        assert!(report.output_sha256.is_some());
        assert_eq!(service.get_stats().snapshot().jobs_completed, 1);
    }

    #[tokio::test]
    async fn test_credential_failure_fails_before_extracting() {
        let service = service(Err(TranslationError::CredentialError("no key".into())));
        let mut job = service.new_job("a.csv", DocumentKind::Csv);
        let err = service
            .run_job(&mut job, b"q\nHello\n", &CsvOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, TranslationError::CredentialError(_)));
        assert_eq!(job.state(), JobState::Failed);
        let states: Vec<_> = job.history().iter().map(|c| c.state).collect();
        assert_eq!(states, vec![JobState::Pending, JobState::Failed]);
    }

    #[tokio::test]
    async fn test_broken_document_fails_job() {
        let service = service(Ok(()));
        let mut job = service.new_job("a.docx", DocumentKind::Word);
        let err = service
            .run_job(&mut job, b"not a zip", &CsvOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, TranslationError::DocumentFormatError(_)));
        assert_eq!(job.state(), JobState::Failed);
        assert_eq!(service.get_stats().snapshot().jobs_failed, 1);
    }
}
