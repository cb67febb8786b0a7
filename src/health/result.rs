//! 探测结果数据结构
//!
//! 定义单次探测的结果类型和结果分类

use crate::error::ProbeError;
use crate::health::resource::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 判定为成功的状态码范围 `[200, 400)`
pub const SUCCESS_STATUS_RANGE: std::ops::Range<u16> = 200..400;

/// 探测结果分类
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ProbeOutcome {
    /// 收到响应且状态码在成功范围内
    Success { status_code: u16 },
    /// 收到响应但状态码不在成功范围内
    Failure { status_code: u16 },
    /// 未能获得正常的HTTP响应
    Error { error: ProbeError },
}

impl ProbeOutcome {
    /// 根据HTTP状态码分类
    pub fn from_status(status_code: u16) -> Self {
        if SUCCESS_STATUS_RANGE.contains(&status_code) {
            ProbeOutcome::Success { status_code }
        } else {
            ProbeOutcome::Failure { status_code }
        }
    }

    /// 是否成功
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success { .. })
    }

    /// 传输层错误（如果有）
    pub fn error(&self) -> Option<&ProbeError> {
        match self {
            ProbeOutcome::Error { error } => Some(error),
            _ => None,
        }
    }

    /// HTTP状态码（如果收到了响应）
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProbeOutcome::Success { status_code } | ProbeOutcome::Failure { status_code } => {
                Some(*status_code)
            }
            ProbeOutcome::Error { .. } => None,
        }
    }
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeOutcome::Success { status_code } => write!(f, "success (HTTP {status_code})"),
            ProbeOutcome::Failure { status_code } => write!(f, "failure (HTTP {status_code})"),
            ProbeOutcome::Error { error } => write!(f, "error ({error})"),
        }
    }
}

/// 单次探测结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    /// 被探测的资源
    pub resource: Resource,
    /// 结果分类
    #[serde(flatten)]
    pub outcome: ProbeOutcome,
    /// 探测耗时
    #[serde(with = "duration_serde")]
    pub latency: Duration,
    /// 探测开始时间
    pub started_at: DateTime<Utc>,
}

impl ProbeResult {
    /// 创建新的探测结果
    ///
    /// # 参数
    /// * `resource` - 被探测的资源
    /// * `outcome` - 结果分类
    /// * `latency` - 探测耗时
    /// * `started_at` - 探测开始时间
    pub fn new(
        resource: Resource,
        outcome: ProbeOutcome,
        latency: Duration,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            resource,
            outcome,
            latency,
            started_at,
        }
    }

    /// 创建错误结果
    pub fn error(
        resource: Resource,
        error: ProbeError,
        latency: Duration,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self::new(resource, ProbeOutcome::Error { error }, latency, started_at)
    }

    /// 是否成功
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// 传输层错误（如果有）
    pub fn probe_error(&self) -> Option<&ProbeError> {
        self.outcome.error()
    }

    /// 获取耗时（毫秒）
    pub fn latency_ms(&self) -> u64 {
        self.latency.as_millis() as u64
    }

    /// 转换为JSON字符串
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Duration序列化模块
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
