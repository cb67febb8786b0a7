//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Batch Vitals 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum RunnerError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 探测器构建错误（HTTP客户端初始化失败等）
    #[error("探测器初始化失败: {0}")]
    ProberInit(#[from] reqwest::Error),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 单次探测的传输层错误分类
///
/// 这些错误是结果数据的一部分，而不是向调用方传播的失败。
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProbeError {
    /// 超时
    #[error("Request timeout")]
    Timeout,

    /// 连接失败
    #[error("Connection refused: {0}")]
    Connect(String),

    /// DNS解析失败
    #[error("DNS resolution failed: {0}")]
    Dns(String),

    /// TLS握手或证书错误
    #[error("SSL/TLS certificate error: {0}")]
    Tls(String),

    /// 请求无法构建（URL无效等）
    #[error("Invalid request: {0}")]
    Request(String),

    /// 协议错误（响应格式不正确等）
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// 调度器内部故障
    #[error("Internal fault: {0}")]
    Internal(String),

    /// 其他传输错误
    #[error("Request failed: {0}")]
    Other(String),
}

impl ProbeError {
    /// 将reqwest错误归类为探测错误
    ///
    /// 只根据 `source()` 链判断连接失败的具体原因，顶层信息里带有请求URL，
    /// 不参与匹配。
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            return ProbeError::Timeout;
        }

        let detail = error_chain(error);

        if error.is_connect() {
            let causes = source_chain(error).to_lowercase();
            Self::classify_connect_failure(&causes, detail)
        } else if error.is_builder() || error.is_request() {
            ProbeError::Request(detail)
        } else if error.is_decode() || error.is_body() {
            ProbeError::Protocol(detail)
        } else {
            ProbeError::Other(detail)
        }
    }

    /// 按底层原因细分连接阶段的失败
    ///
    /// # 参数
    /// * `causes` - 小写的底层错误链文本（不含URL）
    /// * `detail` - 完整错误信息
    fn classify_connect_failure(causes: &str, detail: String) -> Self {
        if causes.contains("dns error") || causes.contains("failed to lookup") {
            ProbeError::Dns(detail)
        } else if causes.contains("certificate")
            || causes.contains("tls")
            || causes.contains("ssl")
            || causes.contains("handshake")
        {
            ProbeError::Tls(detail)
        } else {
            ProbeError::Connect(detail)
        }
    }

    /// 错误类别名称
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::Timeout => "timeout",
            ProbeError::Connect(_) => "connect",
            ProbeError::Dns(_) => "dns",
            ProbeError::Tls(_) => "tls",
            ProbeError::Request(_) => "request",
            ProbeError::Protocol(_) => "protocol",
            ProbeError::Internal(_) => "internal",
            ProbeError::Other(_) => "other",
        }
    }
}

/// 展开错误链，reqwest的顶层信息通常不包含根因
fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// 只展开底层原因，跳过带URL的顶层信息
fn source_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut causes = Vec::new();
    let mut source = error.source();
    while let Some(cause) = source {
        causes.push(cause.to_string());
        source = cause.source();
    }
    causes.join(": ")
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, RunnerError>;
