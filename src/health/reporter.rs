//! 进度报告器模块
//!
//! 独立的周期任务，按固定间隔读取统计快照并输出进度行

use crate::error::{ConfigError, Result};
use crate::health::stats::{Stats, StatsAggregator};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// 进度行回调函数类型
pub type ProgressCallback = Arc<dyn Fn(&ProgressLine) + Send + Sync>;

/// 一条进度行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressLine {
    /// 统计快照
    pub stats: Stats,
}

impl ProgressLine {
    /// 由统计快照创建进度行
    pub fn new(stats: Stats) -> Self {
        Self { stats }
    }
}

impl std::fmt::Display for ProgressLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[Progress] Total: {} | Success: {} | Failures: {} | Errors: {}",
            self.stats.total, self.stats.success, self.stats.failures, self.stats.errors
        )?;
        if let Some(average) = self.stats.average_latency() {
            write!(f, " | Avg Latency: {average:?}")?;
        }
        Ok(())
    }
}

/// 进度报告器
pub struct ProgressReporter {
    /// 统计聚合器
    stats: Arc<StatsAggregator>,
    /// 报告间隔
    interval: Duration,
    /// 进度行回调
    callback: ProgressCallback,
}

impl ProgressReporter {
    /// 创建新的进度报告器，默认把进度行打印到标准输出
    ///
    /// # 参数
    /// * `stats` - 统计聚合器
    /// * `interval` - 报告间隔，必须大于0
    ///
    /// # 返回
    /// * `Result<Self>` - 报告器实例
    pub fn new(stats: Arc<StatsAggregator>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(ConfigError::ValidationError("报告间隔必须大于0".to_string()).into());
        }

        Ok(Self {
            stats,
            interval,
            callback: Arc::new(|line: &ProgressLine| println!("{line}")),
        })
    }

    /// 设置进度行回调
    pub fn with_callback(mut self, callback: ProgressCallback) -> Self {
        self.callback = callback;
        self
    }

    /// 启动报告任务
    ///
    /// # 返回
    /// * `ReporterHandle` - 用于停止报告器的句柄
    pub fn start(self) -> ReporterHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        info!("进度报告器已启动，报告间隔: {:?}", self.interval);
        let task = tokio::spawn(self.run(shutdown_rx));
        ReporterHandle { shutdown_tx, task }
    }

    /// 报告循环，返回输出的进度行数
    async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> usize {
        // 第一次报告在一个完整间隔之后
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut emitted = 0usize;

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    debug!("进度报告器收到停止信号");
                    break;
                }
                _ = ticker.tick() => {
                    let snapshot = self.stats.snapshot();
                    // 还没有完成任何探测时不输出
                    if snapshot.total == 0 {
                        continue;
                    }
                    (self.callback)(&ProgressLine::new(snapshot));
                    emitted += 1;
                }
            }
        }

        emitted
    }
}

/// 运行中的报告器句柄
pub struct ReporterHandle {
    /// 停止信号发送器
    shutdown_tx: broadcast::Sender<()>,
    /// 报告任务
    task: JoinHandle<usize>,
}

impl ReporterHandle {
    /// 报告器是否仍在运行
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// 停止报告器并等待任务退出
    ///
    /// 返回后不会再输出任何进度行。
    ///
    /// # 返回
    /// * `usize` - 报告器运行期间输出的进度行数
    pub async fn stop(self) -> usize {
        // 任务已退出时接收端不存在，发送失败可以忽略
        let _ = self.shutdown_tx.send(());

        match self.task.await {
            Ok(emitted) => {
                info!("进度报告器已停止，共输出 {} 条进度", emitted);
                emitted
            }
            Err(e) => {
                error!("进度报告器异常退出: {}", e);
                0
            }
        }
    }
}
