//! 批次分发器
//!
//! 把缓存未命中的批次并发发送给翻译客户端。单个批次带超时和指数退避重试，
//! 重试耗尽后记录错误并放弃该批次，其文本保持原文，任务继续。

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};

use crate::translation::client::{BatchRequest, TranslationClient};
use crate::translation::config::{constants, TargetLanguage, TranslationConfig, TranslationMode};
use crate::translation::core::job::StopFlag;
use crate::translation::core::rate_limiter::RateLimiter;
use crate::translation::error::{helpers, ErrorStats, TranslationError, TranslationResult};
use crate::translation::pipeline::batch::Batch;
use crate::translation::pipeline::placeholder;
use crate::translation::pipeline::postprocess::clean_translation;
use crate::translation::retry::RetryPolicy;
use crate::translation::storage::{normalize_text, CacheKey, TranslationCache};

// ============================================================================
// 配置
// ============================================================================

/// 单个任务的翻译参数，同时也是缓存键的一部分
#[derive(Debug, Clone, PartialEq)]
pub struct JobSettings {
    pub target_language: TargetLanguage,
    pub mode: TranslationMode,
    pub model: String,
    /// 按模式解析后的模板
    pub prompt_template: String,
}

impl From<&TranslationConfig> for JobSettings {
    fn from(config: &TranslationConfig) -> Self {
        Self {
            target_language: config.target_lang,
            mode: config.mode,
            model: config.model.clone(),
            prompt_template: config.prompt().to_string(),
        }
    }
}

/// 分发器配置
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// 同时进行中的请求上限
    pub max_concurrent_requests: usize,
    /// 单次请求超时
    pub batch_timeout: Duration,
    pub retry: RetryPolicy,
    /// 发送前屏蔽问卷占位符
    pub protect_placeholders: bool,
    /// 存入缓存前清理译文
    pub clean_translations: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: constants::DEFAULT_MAX_CONCURRENT_REQUESTS,
            batch_timeout: constants::DEFAULT_BATCH_TIMEOUT,
            retry: RetryPolicy::default(),
            protect_placeholders: true,
            clean_translations: true,
        }
    }
}

impl From<&TranslationConfig> for DispatcherConfig {
    fn from(config: &TranslationConfig) -> Self {
        Self {
            max_concurrent_requests: config.max_concurrent_requests.max(1),
            batch_timeout: config.batch_timeout(),
            retry: RetryPolicy::from(config),
            protect_placeholders: config.protect_placeholders,
            clean_translations: config.clean_translations,
        }
    }
}

// ============================================================================
// 报告
// ============================================================================

/// 一次分发的结果汇总
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub total_batches: usize,
    pub successful_batches: usize,
    pub failed_batches: usize,
    /// 停止标志升起后未发送的批次
    pub skipped_batches: usize,
    /// 写入缓存的键
    pub translated_keys: usize,
    /// 响应缺失、无效或被丢弃的键
    pub missing_keys: usize,
    /// 校对模式下回复 `-` 而保留原文的键
    pub unchanged_keys: usize,
    pub retries: usize,
    pub errors: ErrorStats,
    pub processing_time_ms: u128,
}

impl DispatchReport {
    pub fn success_rate(&self) -> f64 {
        if self.total_batches == 0 {
            return 1.0;
        }
        self.successful_batches as f64 / self.total_batches as f64
    }
}

/// 单个批次的处理结果
enum BatchOutcome {
    Translated {
        stored: usize,
        missing: usize,
        unchanged: usize,
        retries: usize,
    },
    Failed { error: TranslationError, retries: usize },
    Skipped,
}

/// 发送前准备好的一条文本
struct PreparedText {
    key: CacheKey,
    /// 屏蔽占位符后实际发送的文本
    sent: String,
    placeholders: Vec<String>,
}

// ============================================================================
// 分发器
// ============================================================================

/// 批次分发器
pub struct BatchDispatcher {
    client: Arc<dyn TranslationClient>,
    config: DispatcherConfig,
    limiter: Option<Arc<RateLimiter>>,
}

impl BatchDispatcher {
    /// 按翻译配置创建，限流器由配置决定
    pub fn new(client: Arc<dyn TranslationClient>, config: &TranslationConfig) -> Self {
        Self::with_config(
            client,
            DispatcherConfig::from(config),
            RateLimiter::from_config(config),
        )
    }

    pub fn with_config(
        client: Arc<dyn TranslationClient>,
        config: DispatcherConfig,
        limiter: Option<RateLimiter>,
    ) -> Self {
        Self {
            client,
            config,
            limiter: limiter.map(Arc::new),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// 并发分发批次，译文写入 `cache`
    ///
    /// 批次失败不会中断其他批次；停止标志在每个批次取得并发许可前后检查，
    /// 已经发出的请求会正常完成。
    pub async fn dispatch(
        &self,
        batches: Vec<Batch>,
        settings: &JobSettings,
        cache: Arc<TranslationCache>,
        stop: &StopFlag,
    ) -> DispatchReport {
        let start = Instant::now();
        let mut report = DispatchReport {
            total_batches: batches.len(),
            ..DispatchReport::default()
        };

        if batches.is_empty() {
            tracing::info!("没有批次需要分发");
            return report;
        }

        tracing::info!(
            "开始分发 {} 个批次，并发上限 {}",
            batches.len(),
            self.config.max_concurrent_requests
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_requests.max(1)));
        let in_flight = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = batches
            .into_iter()
            .map(|batch| {
                let semaphore = Arc::clone(&semaphore);
                let client = Arc::clone(&self.client);
                let limiter = self.limiter.clone();
                let cache = Arc::clone(&cache);
                let in_flight = Arc::clone(&in_flight);
                let config = self.config.clone();
                let settings = settings.clone();
                let stop = stop.clone();

                async move {
                    if stop.is_raised() {
                        return BatchOutcome::Skipped;
                    }

                    let _permit = match semaphore.acquire().await {
                        Ok(permit) => permit,
                        Err(e) => {
                            return BatchOutcome::Failed {
                                error: TranslationError::ConcurrencyError(format!(
                                    "获取并发许可失败: {}",
                                    e
                                )),
                                retries: 0,
                            }
                        }
                    };

                    if stop.is_raised() {
                        tracing::debug!("批次 {} 因停止标志被跳过", batch.id);
                        return BatchOutcome::Skipped;
                    }

                    let active = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    tracing::debug!("开始处理批次 {}（进行中 {}）", batch.summary(), active);

                    let outcome =
                        Self::process_batch(batch, client, limiter, &config, &settings, &cache).await;

                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    outcome
                }
            })
            .collect();

        for outcome in join_all(tasks).await {
            match outcome {
                BatchOutcome::Translated {
                    stored,
                    missing,
                    unchanged,
                    retries,
                } => {
                    report.successful_batches += 1;
                    report.translated_keys += stored;
                    report.missing_keys += missing;
                    report.unchanged_keys += unchanged;
                    report.retries += retries;
                }
                BatchOutcome::Failed { error, retries } => {
                    report.failed_batches += 1;
                    report.retries += retries;
                    report.errors.record_error(&error);
                }
                BatchOutcome::Skipped => report.skipped_batches += 1,
            }
        }

        report.processing_time_ms = start.elapsed().as_millis();
        tracing::info!(
            "批次分发完成: 成功 {}, 失败 {}, 跳过 {}, 重试 {}, 成功率 {:.1}%",
            report.successful_batches,
            report.failed_batches,
            report.skipped_batches,
            report.retries,
            report.success_rate() * 100.0
        );
        report
    }

    /// 处理单个批次：发送、重试、校验并写入缓存
    async fn process_batch(
        batch: Batch,
        client: Arc<dyn TranslationClient>,
        limiter: Option<Arc<RateLimiter>>,
        config: &DispatcherConfig,
        settings: &JobSettings,
        cache: &TranslationCache,
    ) -> BatchOutcome {
        let prepared: Vec<PreparedText> = batch
            .entries
            .iter()
            .map(|(key, text)| {
                let masked = if config.protect_placeholders {
                    placeholder::mask(text)
                } else {
                    placeholder::MaskedText {
                        text: text.clone(),
                        placeholders: Vec::new(),
                    }
                };
                PreparedText {
                    key: key.clone(),
                    sent: masked.text,
                    placeholders: masked.placeholders,
                }
            })
            .collect();

        let request = BatchRequest {
            batch_id: batch.id,
            target_language: settings.target_language,
            mode: settings.mode,
            model: settings.model.clone(),
            prompt_template: settings.prompt_template.clone(),
            texts: prepared
                .iter()
                .map(|p| (p.key.as_str().to_string(), p.sent.clone()))
                .collect::<BTreeMap<_, _>>(),
        };

        let (result, attempts) =
            Self::send_with_retry(&request, client.as_ref(), limiter.as_deref(), config).await;
        let retries = attempts.saturating_sub(1);

        let translations = match result {
            Ok(translations) => translations,
            Err(last_error) => {
                let error = TranslationError::TranslationBatchError {
                    batch_id: batch.id,
                    attempts,
                    message: last_error.to_string(),
                };
                helpers::log_error(&error);
                return BatchOutcome::Failed { error, retries };
            }
        };

        let (stored, missing, unchanged) =
            Self::store_translations(&prepared, translations, config, settings.mode, cache, batch.id);
        if attempts > 1 {
            tracing::info!("批次 {} 在第 {} 次尝试后成功", batch.id, attempts);
        }
        BatchOutcome::Translated {
            stored,
            missing,
            unchanged,
            retries,
        }
    }

    /// 带超时和重试地发送请求，返回最后的结果和尝试次数
    async fn send_with_retry(
        request: &BatchRequest,
        client: &dyn TranslationClient,
        limiter: Option<&RateLimiter>,
        config: &DispatcherConfig,
    ) -> (TranslationResult<HashMap<String, String>>, usize) {
        let mut attempt = 0;
        loop {
            attempt += 1;
            if let Some(limiter) = limiter {
                limiter.acquire().await;
            }

            let result = match timeout(config.batch_timeout, client.translate_batch(request)).await {
                Ok(result) => result,
                Err(_) => Err(TranslationError::TimeoutError(format!(
                    "批次 {} 请求超时: {:.1}秒",
                    request.batch_id,
                    config.batch_timeout.as_secs_f32()
                ))),
            };

            let error = match result {
                Ok(translations) => return (Ok(translations), attempt),
                Err(e) => e,
            };

            if !config.retry.should_retry(attempt, &error) {
                if !error.is_retryable() {
                    tracing::error!("批次 {} 出现不可重试错误: {}", request.batch_id, error);
                }
                return (Err(error), attempt);
            }

            let delay = config.retry.delay_for(attempt);
            tracing::warn!(
                "批次 {} 第 {} 次尝试失败，{:.1}秒后重试: {}",
                request.batch_id,
                attempt,
                delay.as_secs_f32(),
                error
            );
            sleep(delay).await;
        }
    }

    /// 校验译文并写入缓存，返回（写入数，缺失数，保留原文数）
    fn store_translations(
        prepared: &[PreparedText],
        mut translations: HashMap<String, String>,
        config: &DispatcherConfig,
        mode: TranslationMode,
        cache: &TranslationCache,
        batch_id: usize,
    ) -> (usize, usize, usize) {
        let mut stored = 0;
        let mut missing = 0;
        let mut unchanged = 0;

        for text in prepared {
            let Some(translated) = translations.remove(text.key.as_str()) else {
                tracing::debug!("批次 {}: 响应缺少键 {}", batch_id, text.key);
                missing += 1;
                continue;
            };

            // 不写缓存，拼接阶段保留原文
            if mode.keeps_original(&translated) {
                unchanged += 1;
                continue;
            }

            let translated = if config.clean_translations {
                clean_translation(&text.sent, &translated)
            } else {
                translated
            };

            let Some(restored) = placeholder::unmask(&translated, &text.placeholders) else {
                tracing::warn!("批次 {}: 键 {} 的译文丢失了占位符，保留原文", batch_id, text.key);
                missing += 1;
                continue;
            };

            let normalized = normalize_text(&restored);
            if normalized.is_empty() {
                tracing::debug!("批次 {}: 键 {} 的译文为空", batch_id, text.key);
                missing += 1;
                continue;
            }

            cache.store(text.key.clone(), normalized);
            stored += 1;
        }

        (stored, missing, unchanged)
    }
}
