//! 翻译批次管理器模块
//!
//! 将去重后的未命中列表按文档首次出现顺序切分为批次。
//!
//! ## 切分规则
//!
//! 1. 每个批次最多 `max_batch_size` 个条目
//! 2. 设置了 `max_batch_chars` 时，字符数超限会提前切分（单个超长条目独占一个批次）
//! 3. 同一键只会出现在一个批次中，所有批次的并集正好是未命中集合
//!
//! ## 使用示例
//!
//! ```rust
//! use office_translator::translation::pipeline::batch::{BatchManager, BatchManagerConfig};
//! use office_translator::translation::storage::CacheKey;
//!
//! let manager = BatchManager::new(BatchManagerConfig::default());
//! let misses = vec![(CacheKey::for_text("Hello", "m", "p"), "Hello".to_string())];
//! let batches = manager.create_batches(misses);
//!
//! let stats = manager.get_stats().snapshot();
//! println!("处理了 {} 个项目，生成 {} 个批次", stats.input_items, stats.output_batches);
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::translation::config::{constants, TranslationConfig};
use crate::translation::storage::CacheKey;

/// 翻译批次
///
/// 条目按文档首次出现顺序排列，键两两不同。
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// 批次编号，从 1 开始
    pub id: usize,
    pub entries: Vec<(CacheKey, String)>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 批次中文本的字符总数
    pub fn char_count(&self) -> usize {
        self.entries.iter().map(|(_, text)| text.chars().count()).sum()
    }

    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.entries.iter().map(|(key, _)| key)
    }

    /// 日志用摘要
    pub fn summary(&self) -> String {
        format!("批次 {}: {} 项, {} 字符", self.id, self.len(), self.char_count())
    }
}

/// 批次管理器配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchManagerConfig {
    /// 单个批次的最大条目数
    pub max_batch_size: usize,
    /// 单个批次的最大字符数，`None` 表示不限制
    pub max_batch_chars: Option<usize>,
}

impl From<&TranslationConfig> for BatchManagerConfig {
    fn from(config: &TranslationConfig) -> Self {
        Self {
            max_batch_size: config.batch_size.max(1),
            max_batch_chars: config.max_batch_chars,
        }
    }
}

impl Default for BatchManagerConfig {
    fn default() -> Self {
        Self {
            max_batch_size: constants::DEFAULT_BATCH_SIZE,
            max_batch_chars: None,
        }
    }
}

/// 批次管理器
pub struct BatchManager {
    config: BatchManagerConfig,
    stats: Arc<BatchStats>,
    next_batch_id: AtomicUsize,
}

impl BatchManager {
    /// 创建新的批次管理器实例
    ///
    /// # 参数
    ///
    /// * `config` - 批次管理器配置，`max_batch_size` 为 0 时按 1 处理
    pub fn new(mut config: BatchManagerConfig) -> Self {
        config.max_batch_size = config.max_batch_size.max(1);
        Self {
            config,
            stats: Arc::new(BatchStats::default()),
            next_batch_id: AtomicUsize::new(1),
        }
    }

    pub fn config(&self) -> &BatchManagerConfig {
        &self.config
    }

    /// 切分未命中列表
    ///
    /// 重复出现的键只保留第一次。结果中批次数为 `ceil(N / B)`（未设置字符上限时）。
    pub fn create_batches(&self, misses: Vec<(CacheKey, String)>) -> Vec<Batch> {
        let start_time = Instant::now();

        let mut seen = HashSet::with_capacity(misses.len());
        let unique: Vec<_> = misses
            .into_iter()
            .filter(|(key, _)| seen.insert(key.clone()))
            .collect();
        self.stats.add_input_items(unique.len());

        let mut batches = Vec::new();
        let mut current: Vec<(CacheKey, String)> = Vec::new();
        let mut current_chars = 0;

        for (key, text) in unique {
            let chars = text.chars().count();
            if self.should_start_new_batch(current.len(), current_chars, chars) {
                batches.push(self.finalize_batch(std::mem::take(&mut current)));
                current_chars = 0;
            }
            current_chars += chars;
            current.push((key, text));
        }
        if !current.is_empty() {
            batches.push(self.finalize_batch(current));
        }

        self.stats.add_processing_time(start_time.elapsed());
        tracing::debug!(
            "生成 {} 个批次 (批次大小上限 {})",
            batches.len(),
            self.config.max_batch_size
        );
        batches
    }

    fn should_start_new_batch(&self, current_len: usize, current_chars: usize, next_chars: usize) -> bool {
        if current_len == 0 {
            return false;
        }
        if current_len >= self.config.max_batch_size {
            return true;
        }
        matches!(self.config.max_batch_chars, Some(limit) if current_chars + next_chars > limit)
    }

    fn finalize_batch(&self, entries: Vec<(CacheKey, String)>) -> Batch {
        self.stats.inc_output_batches();
        Batch {
            id: self.next_batch_id.fetch_add(1, Ordering::Relaxed),
            entries,
        }
    }

    /// 获取统计信息
    pub fn get_stats(&self) -> &BatchStats {
        &self.stats
    }
}

impl Default for BatchManager {
    fn default() -> Self {
        Self::new(BatchManagerConfig::default())
    }
}

/// 批次统计信息
///
/// 使用 `Relaxed` 内存序，只用于统计。
#[derive(Debug, Default)]
pub struct BatchStats {
    /// 输入的唯一条目数
    pub input_items: AtomicUsize,
    /// 输出的批次总数
    pub output_batches: AtomicUsize,
    /// 总处理时间（微秒）
    pub processing_time: AtomicU64,
}

impl BatchStats {
    pub fn add_input_items(&self, count: usize) {
        self.input_items.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_output_batches(&self) {
        self.output_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_processing_time(&self, duration: Duration) {
        self.processing_time
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// 计算平均批次大小
    pub fn calculate_average_size(&self) -> f32 {
        let input_items = self.input_items.load(Ordering::Relaxed);
        let output_batches = self.output_batches.load(Ordering::Relaxed);
        if output_batches == 0 {
            0.0
        } else {
            input_items as f32 / output_batches as f32
        }
    }

    pub fn snapshot(&self) -> BatchStatsSnapshot {
        BatchStatsSnapshot {
            input_items: self.input_items.load(Ordering::Relaxed),
            output_batches: self.output_batches.load(Ordering::Relaxed),
            processing_time: Duration::from_micros(self.processing_time.load(Ordering::Relaxed)),
        }
    }
}

/// 批次统计快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BatchStatsSnapshot {
    pub input_items: usize,
    pub output_batches: usize,
    pub processing_time: Duration,
}
