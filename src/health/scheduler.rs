//! 探测调度器模块
//!
//! 在固定并发上限下对整个资源列表执行探测，并将结果汇入统计和结果缓冲区

use crate::error::{ConfigError, ProbeError, Result};
use crate::health::checker::Prober;
use crate::health::resource::Resource;
use crate::health::result::ProbeResult;
use crate::health::sink::ResultSink;
use crate::health::stats::StatsAggregator;
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info};

/// 一次运行的摘要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// 已分发的资源数
    pub dispatched: usize,
    /// 调度器内部故障数
    pub faults: usize,
    /// 运行耗时
    pub elapsed: Duration,
}

/// 探测调度器
pub struct ProbeScheduler {
    /// 探测器
    prober: Arc<dyn Prober>,
    /// 统计聚合器
    stats: Arc<StatsAggregator>,
    /// 结果缓冲区
    sink: Arc<ResultSink>,
    /// 并发控制信号量
    semaphore: Arc<Semaphore>,
    /// 最大并发数
    max_concurrency: usize,
}

impl ProbeScheduler {
    /// 创建新的探测调度器
    ///
    /// # 参数
    /// * `prober` - 探测器
    /// * `stats` - 统计聚合器
    /// * `sink` - 结果缓冲区
    /// * `max_concurrency` - 最大并发数，必须大于0
    ///
    /// # 返回
    /// * `Result<Self>` - 调度器实例，并发数无效时返回配置错误
    pub fn new(
        prober: Arc<dyn Prober>,
        stats: Arc<StatsAggregator>,
        sink: Arc<ResultSink>,
        max_concurrency: usize,
    ) -> Result<Self> {
        if max_concurrency == 0 {
            return Err(ConfigError::ValidationError("最大并发数必须大于0".to_string()).into());
        }
        if max_concurrency > Semaphore::MAX_PERMITS {
            return Err(ConfigError::ValidationError(format!(
                "最大并发数不能超过 {}",
                Semaphore::MAX_PERMITS
            ))
            .into());
        }

        Ok(Self {
            prober,
            stats,
            sink,
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        })
    }

    /// 最大并发数
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// 当前正在执行的探测数
    pub fn in_flight(&self) -> usize {
        self.max_concurrency - self.semaphore.available_permits()
    }

    /// 统计聚合器
    pub fn stats(&self) -> &Arc<StatsAggregator> {
        &self.stats
    }

    /// 结果缓冲区
    pub fn sink(&self) -> &Arc<ResultSink> {
        &self.sink
    }

    /// 探测全部资源
    ///
    /// 按输入顺序分发，每个资源恰好探测一次。只有在所有探测任务都完成
    /// （包括释放并发许可）之后才返回。
    ///
    /// # 参数
    /// * `resources` - 资源列表
    ///
    /// # 返回
    /// * `RunSummary` - 运行摘要
    pub async fn run(&self, resources: Vec<Resource>) -> RunSummary {
        let start_time = Instant::now();
        let dispatched = resources.len();
        let mut faults = 0usize;
        let mut tasks: JoinSet<bool> = JoinSet::new();

        info!(
            "开始探测，资源数量: {}, 最大并发数: {}",
            dispatched, self.max_concurrency
        );

        for resource in resources {
            // 获取并发许可，并发已满时在此等待
            let permit = match Arc::clone(&self.semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("获取并发许可失败: {} - {}", resource.id, e);
                    self.record_fault(resource, e.to_string());
                    faults += 1;
                    continue;
                }
            };

            // 回收已完成的任务，避免句柄随资源数量增长
            while let Some(joined) = tasks.try_join_next() {
                faults += Self::handle_join(joined);
            }

            let prober = Arc::clone(&self.prober);
            let stats = Arc::clone(&self.stats);
            let sink = Arc::clone(&self.sink);

            Self::spawn_unit(&mut tasks, permit, async move {
                Self::execute_unit(prober.as_ref(), &stats, &sink, resource).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            faults += Self::handle_join(joined);
        }

        let elapsed = start_time.elapsed();
        info!(
            "探测完成，资源数量: {}, 内部故障: {}, 耗时: {:?}",
            dispatched, faults, elapsed
        );

        RunSummary {
            dispatched,
            faults,
            elapsed,
        }
    }

    /// 在任务集中启动一个持有并发许可的探测单元
    ///
    /// 许可随任务一起释放，任务panic时同样如此
    fn spawn_unit<F>(tasks: &mut JoinSet<bool>, permit: OwnedSemaphorePermit, unit: F)
    where
        F: Future<Output = bool> + Send + 'static,
    {
        tasks.spawn(async move {
            let _permit = permit;
            unit.await
        });
    }

    /// 执行单个探测单元：探测、合并统计、放入缓冲区
    ///
    /// # 返回
    /// * `bool` - 是否发生内部故障
    async fn execute_unit(
        prober: &dyn Prober,
        stats: &StatsAggregator,
        sink: &ResultSink,
        resource: Resource,
    ) -> bool {
        let started_at = Utc::now();
        let start_time = Instant::now();

        let caught = AssertUnwindSafe(prober.probe(&resource))
            .catch_unwind()
            .await;

        let (result, fault) = match caught {
            Ok(result) => (result, false),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("探测任务内部故障: {} - {}", resource.id, message);
                let result = ProbeResult::error(
                    resource,
                    ProbeError::Internal(message),
                    start_time.elapsed(),
                    started_at,
                );
                (result, true)
            }
        };

        stats.merge(&result);
        if !sink.offer(result) {
            debug!("结果缓冲区已满，结果被丢弃");
        }

        fault
    }

    /// 记录无法分发的资源，保证每个资源都对应一条统计
    fn record_fault(&self, resource: Resource, message: String) {
        let result = ProbeResult::error(
            resource,
            ProbeError::Internal(message),
            Duration::ZERO,
            Utc::now(),
        );
        self.stats.merge(&result);
        self.sink.offer(result);
    }

    /// 处理任务结束状态
    fn handle_join(joined: std::result::Result<bool, JoinError>) -> usize {
        match joined {
            Ok(fault) => usize::from(fault),
            Err(e) => {
                error!("探测任务异常终止: {}", e);
                1
            }
        }
    }
}

/// 提取panic信息
fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
