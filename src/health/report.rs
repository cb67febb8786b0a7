//! 最终报告
//!
//! 运行结束后基于最后一次统计快照生成，包含总耗时和吞吐量

use crate::health::result::duration_serde;
use crate::health::stats::Stats;
use serde::Serialize;
use std::time::Duration;

/// 运行结束后的汇总报告
#[derive(Debug, Clone, Serialize)]
pub struct FinalReport {
    /// 最终统计快照
    pub stats: Stats,
    /// 总耗时
    #[serde(with = "duration_serde")]
    pub elapsed: Duration,
    /// 成功百分比
    pub success_percent: Option<f64>,
    /// 失败百分比
    pub failure_percent: Option<f64>,
    /// 错误百分比
    pub error_percent: Option<f64>,
    /// 平均耗时（毫秒）
    pub average_latency_ms: Option<f64>,
    /// 吞吐量（次/秒）
    pub throughput: Option<f64>,
    /// 结果缓冲区接收数
    pub sink_accepted: u64,
    /// 结果缓冲区丢弃数
    pub sink_dropped: u64,
    /// 调度器内部故障数
    pub faults: usize,
}

impl FinalReport {
    /// 由统计快照和运行耗时创建报告
    ///
    /// 没有完成任何探测时，百分比和平均耗时为空。
    pub fn new(stats: Stats, elapsed: Duration) -> Self {
        let throughput = if elapsed.is_zero() {
            None
        } else {
            Some(stats.total as f64 / elapsed.as_secs_f64())
        };

        Self {
            success_percent: stats.percentage(stats.success),
            failure_percent: stats.percentage(stats.failures),
            error_percent: stats.percentage(stats.errors),
            average_latency_ms: stats
                .average_latency()
                .map(|latency| latency.as_secs_f64() * 1000.0),
            throughput,
            elapsed,
            stats,
            sink_accepted: 0,
            sink_dropped: 0,
            faults: 0,
        }
    }

    /// 设置结果缓冲区统计
    pub fn with_sink_counts(mut self, accepted: u64, dropped: u64) -> Self {
        self.sink_accepted = accepted;
        self.sink_dropped = dropped;
        self
    }

    /// 设置内部故障数
    pub fn with_faults(mut self, faults: usize) -> Self {
        self.faults = faults;
        self
    }

    /// 转换为JSON字符串
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl std::fmt::Display for FinalReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Final Results ===")?;
        writeln!(f, "Total checked: {}", self.stats.total)?;

        if let (Some(success), Some(failure), Some(error)) = (
            self.success_percent,
            self.failure_percent,
            self.error_percent,
        ) {
            writeln!(f, "Success: {} ({:.2}%)", self.stats.success, success)?;
            writeln!(f, "Failures: {} ({:.2}%)", self.stats.failures, failure)?;
            writeln!(f, "Errors: {} ({:.2}%)", self.stats.errors, error)?;
        }
        if let Some(average) = self.stats.average_latency() {
            writeln!(f, "Average latency: {average:?}")?;
        }

        writeln!(f, "Total time: {:?}", self.elapsed)?;
        if let Some(throughput) = self.throughput {
            writeln!(f, "Throughput: {throughput:.2} checks/second")?;
        }
        write!(
            f,
            "Results buffered: {} (dropped: {})",
            self.sink_accepted, self.sink_dropped
        )?;
        if self.faults > 0 {
            write!(f, "\nInternal faults: {}", self.faults)?;
        }
        Ok(())
    }
}
