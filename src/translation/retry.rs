//! 批次重试策略

use std::time::Duration;

use rand::Rng;

use crate::translation::config::{constants, TranslationConfig};
use crate::translation::error::TranslationError;

/// 指数退避重试策略
///
/// `max_attempts` 是总尝试次数（含首次）。第 n 次失败后等待
/// `base_delay * 2^(n-1)`，不超过 `max_delay`；开启抖动时实际等待时间在
/// 该值的 50%~100% 之间随机。
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_MAX_ATTEMPTS,
            base_delay: constants::DEFAULT_RETRY_BASE_DELAY,
            max_delay: constants::DEFAULT_RETRY_MAX_DELAY,
            jitter: true,
        }
    }
}

impl From<&TranslationConfig> for RetryPolicy {
    fn from(config: &TranslationConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: config.retry_base_delay(),
            max_delay: config.retry_max_delay(),
            jitter: config.retry_jitter,
        }
    }
}

impl RetryPolicy {
    /// 不等待的策略，测试中使用
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// 第 `attempt` 次（从 1 开始）失败后的等待时间
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31) as u32;
        let delay = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay);

        if self.jitter && !delay.is_zero() {
            delay.mul_f64(rand::thread_rng().gen_range(0.5..=1.0))
        } else {
            delay
        }
    }

    /// 第 `attempt` 次尝试失败后是否继续
    pub fn should_retry(&self, attempt: usize, error: &TranslationError) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }
}
