//! 探测统计聚合
//!
//! 所有计数器由同一把锁保护，快照不会观察到部分更新的状态

use crate::health::result::{duration_serde, ProbeResult};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// 探测统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// 已完成的探测总数
    pub total: u64,
    /// 成功次数
    pub success: u64,
    /// 失败次数（包含错误）
    pub failures: u64,
    /// 传输层错误次数，是失败的子集
    pub errors: u64,
    /// 累计耗时
    #[serde(with = "duration_serde")]
    pub total_latency: Duration,
}

impl Stats {
    /// 合并一次探测结果
    pub fn record(&mut self, result: &ProbeResult) {
        // 先算出累计耗时，计数器要么全部更新要么都不更新
        let total_latency = self.total_latency.saturating_add(result.latency);
        self.total += 1;
        if result.is_success() {
            self.success += 1;
        } else {
            self.failures += 1;
        }
        if result.probe_error().is_some() {
            self.errors += 1;
        }
        self.total_latency = total_latency;
    }

    /// 平均耗时，没有完成任何探测时返回None
    pub fn average_latency(&self) -> Option<Duration> {
        if self.total == 0 {
            return None;
        }
        let nanos = self.total_latency.as_nanos() / u128::from(self.total);
        // 平均值不超过累计耗时，秒数一定落在 u64 范围内
        let secs = u64::try_from(nanos / 1_000_000_000).unwrap_or(u64::MAX);
        Some(Duration::new(secs, (nanos % 1_000_000_000) as u32))
    }

    /// 计算某个计数占总数的百分比
    pub fn percentage(&self, count: u64) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(count as f64 / self.total as f64 * 100.0)
        }
    }

    /// 成功率（百分比）
    pub fn success_rate(&self) -> Option<f64> {
        self.percentage(self.success)
    }

    /// 校验计数器不变量
    pub fn is_consistent(&self) -> bool {
        self.total == self.success + self.failures && self.errors <= self.failures
    }
}

/// 统计聚合器
///
/// 由所有工作任务共享，`merge` 和 `snapshot` 在同一互斥域内线性化。
#[derive(Debug, Default)]
pub struct StatsAggregator {
    inner: Mutex<Stats>,
}

impl StatsAggregator {
    /// 创建新的统计聚合器
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Stats> {
        // 单个工作任务panic不应导致统计不可用
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 合并一次探测结果
    pub fn merge(&self, result: &ProbeResult) {
        self.lock().record(result);
    }

    /// 获取统计快照
    pub fn snapshot(&self) -> Stats {
        self.lock().clone()
    }
}
