//! 翻译管道模块
//!
//! 提取、过滤、分批和写回。远程调用在 [`crate::translation::processor`] 中。

pub mod batch;
pub mod extractor;
pub mod filters;
pub mod placeholder;
pub mod postprocess;
pub mod splicer;

// 重新导出主要类型
pub use batch::{Batch, BatchManager, BatchManagerConfig, BatchStats, BatchStatsSnapshot};
pub use extractor::{Extractor, TextUnit};
pub use filters::{FilterReason, FilterStats, TextAnalysis, TextFilter};
pub use splicer::{SpliceReport, Splicer};
