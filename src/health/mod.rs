//! 健康探测模块
//!
//! 提供HTTP探测、结果统计、有界结果缓冲、并发调度和进度报告功能

pub mod checker;
pub mod report;
pub mod reporter;
pub mod resource;
pub mod result;
pub mod scheduler;
pub mod sink;
pub mod stats;

// 重新导出主要类型
pub use checker::{HttpProber, Prober, ProberOptions};
pub use report::FinalReport;
pub use reporter::{ProgressCallback, ProgressLine, ProgressReporter, ReporterHandle};
pub use resource::{generate_resources, Resource};
pub use result::{ProbeOutcome, ProbeResult};
pub use scheduler::{ProbeScheduler, RunSummary};
pub use sink::ResultSink;
pub use stats::{Stats, StatsAggregator};
