//! Batch Vitals - 并发HTTP健康检测运行器
//!
//! 对一批合成资源执行HTTP健康探测：
//! - 固定上限的并发探测
//! - 线程安全的结果统计
//! - 有界、满时丢弃的结果缓冲区
//! - 周期性进度报告和最终报告
//! - 结构化日志记录

pub mod cli;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;

// 重新导出主要类型
pub use config::RunConfig;
pub use error::{ProbeError, RunnerError};
pub use health::{
    FinalReport, HttpProber, ProbeOutcome, ProbeResult, ProbeScheduler, Prober, ProgressReporter,
    Resource, ResultSink, Stats, StatsAggregator,
};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
