//! 翻译任务核心
//!
//! - `job`: 任务状态机、停止标志和任务报告
//! - `rate_limiter`: 远程请求限流
//! - `service`: 串联各阶段的翻译服务
//!
//! ```text
//! TranslationService (service.rs)
//!     ├── Extractor (pipeline/extractor.rs)
//!     ├── TranslationCache (storage/cache.rs)
//!     ├── BatchManager (pipeline/batch.rs)
//!     ├── BatchDispatcher (processor.rs)
//!     │       └── RateLimiter (rate_limiter.rs)
//!     └── Splicer (pipeline/splicer.rs)
//! ```

pub mod job;
pub mod rate_limiter;
pub mod service;

pub use job::{JobContext, JobReport, JobState, StateChange, StopFlag};
pub use rate_limiter::RateLimiter;
pub use service::{ServiceStats, ServiceStatsSnapshot, TranslationService};
