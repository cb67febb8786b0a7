//! 有界结果缓冲区
//!
//! 缓冲区满时直接丢弃新结果，生产者永远不会被阻塞

use crate::health::result::ProbeResult;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::trace;

/// 默认缓冲容量
pub const DEFAULT_SINK_CAPACITY: usize = 1000;

/// 有界、有损的结果缓冲区
#[derive(Debug)]
pub struct ResultSink {
    /// 发送端，供所有工作任务共享
    sender: mpsc::Sender<ProbeResult>,
    /// 接收端，可被下游消费者取走一次
    receiver: Mutex<Option<mpsc::Receiver<ProbeResult>>>,
    /// 被接收的结果数
    accepted: AtomicU64,
    /// 被丢弃的结果数
    dropped: AtomicU64,
}

impl ResultSink {
    /// 创建指定容量的缓冲区
    ///
    /// # Panics
    /// 容量为0时panic，调用方应先通过配置校验
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
            accepted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// 尝试放入一个结果
    ///
    /// # 返回
    /// * `bool` - 是否被接收，缓冲区已满或消费者已关闭时返回false
    pub fn offer(&self, result: ProbeResult) -> bool {
        match self.sender.try_send(result) {
            Ok(()) => {
                self.accepted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(result)) | Err(TrySendError::Closed(result)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                trace!("结果缓冲区已满，丢弃结果: {}", result.resource.id);
                false
            }
        }
    }

    /// 取走接收端，供并发消费者使用
    ///
    /// 只能成功一次，之后返回None，`drain` 也不再返回任何结果。
    pub fn take_receiver(&self) -> Option<mpsc::Receiver<ProbeResult>> {
        self.receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// 取出当前缓冲的全部结果，按先进先出顺序
    pub fn drain(&self) -> Vec<ProbeResult> {
        let mut guard = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
        let mut drained = Vec::new();
        if let Some(receiver) = guard.as_mut() {
            while let Ok(result) = receiver.try_recv() {
                drained.push(result);
            }
        }
        drained
    }

    /// 当前缓冲的结果数
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// 缓冲区是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 缓冲区容量
    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    /// 累计接收的结果数
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// 累计丢弃的结果数
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for ResultSink {
    fn default() -> Self {
        Self::new(DEFAULT_SINK_CAPACITY)
    }
}
