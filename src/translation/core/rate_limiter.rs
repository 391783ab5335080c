//! 请求速率限制
//!
//! 同一任务的所有批次任务共享一个令牌桶，在每次发起远程请求前等待令牌。

use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota};

use crate::translation::config::TranslationConfig;

/// 令牌桶限流器
pub struct RateLimiter {
    inner: DefaultDirectRateLimiter,
    requests_per_second: f64,
}

impl RateLimiter {
    /// 按每秒请求数创建，速率必须为正数
    ///
    /// 突发容量为每秒请求数向下取整（至少为 1），允许小数速率，例如 0.5 表示每两秒一次。
    pub fn per_second(requests_per_second: f64) -> Option<Self> {
        if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
            return None;
        }

        // 极小的速率对应的周期超出 Duration 范围
        let period = Duration::try_from_secs_f64(1.0 / requests_per_second).ok()?;
        let burst = NonZeroU32::new(requests_per_second.floor().clamp(1.0, u32::MAX as f64) as u32)?;
        let quota = Quota::with_period(period)?.allow_burst(burst);

        Some(Self {
            inner: DefaultDirectRateLimiter::direct(quota),
            requests_per_second,
        })
    }

    /// 按配置创建，关闭限流时返回 `None`
    pub fn from_config(config: &TranslationConfig) -> Option<Self> {
        if !config.rate_limit_enabled {
            return None;
        }
        Self::per_second(config.max_requests_per_second)
    }

    /// 等待一个令牌
    pub async fn acquire(&self) {
        self.inner.until_ready().await;
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("requests_per_second", &self.requests_per_second)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_invalid_rates() {
        assert!(RateLimiter::per_second(0.0).is_none());
        assert!(RateLimiter::per_second(-1.0).is_none());
        assert!(RateLimiter::per_second(f64::NAN).is_none());
        assert!(RateLimiter::per_second(1e-300).is_none());
        assert!(RateLimiter::per_second(f64::MIN_POSITIVE).is_none());
        assert!(RateLimiter::per_second(0.5).is_some());
    }

    #[test]
    fn test_disabled_in_config() {
        let config = TranslationConfig {
            rate_limit_enabled: false,
            ..TranslationConfig::default()
        };
        assert!(RateLimiter::from_config(&config).is_none());
        assert!(RateLimiter::from_config(&TranslationConfig::default()).is_some());
    }

    #[tokio::test]
    async fn test_burst_then_wait() {
        let limiter = RateLimiter::per_second(20.0).unwrap();
        let start = Instant::now();
        for _ in 0..20 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(200), "突发容量内不等待");

        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
