//! 配置数据结构定义
//!
//! 定义运行配置结构体和验证逻辑

use crate::config::duration::serde_str;
use crate::health::checker::{ProberOptions, DEFAULT_BODY_PREFIX_BYTES};
use crate::health::sink::DEFAULT_SINK_CAPACITY;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 最终报告输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// 文本格式
    #[default]
    Text,
    /// JSON格式
    Json,
}

/// 运行配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// 合成资源数量
    pub count: usize,
    /// 基础URL
    pub base_url: String,
    /// 最大并发探测数
    pub max_concurrency: usize,
    /// 单次探测超时时间
    #[serde(with = "serde_str")]
    pub timeout: Duration,
    /// 进度报告间隔
    #[serde(with = "serde_str")]
    pub report_interval: Duration,
    /// 结果缓冲区容量
    pub sink_capacity: usize,
    /// 读取并丢弃的响应体前缀长度
    pub body_prefix_bytes: usize,
    /// 是否跳过TLS证书校验
    pub accept_invalid_certs: bool,
    /// 自定义User-Agent
    pub user_agent: Option<String>,
    /// 是否以调试级别记录每条缓冲的结果
    pub log_results: bool,
    /// 最终报告输出格式
    pub output_format: ReportFormat,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            base_url: default_base_url(),
            max_concurrency: default_max_concurrency(),
            timeout: Duration::from_secs(5),
            report_interval: Duration::from_secs(5),
            sink_capacity: DEFAULT_SINK_CAPACITY,
            body_prefix_bytes: DEFAULT_BODY_PREFIX_BYTES,
            accept_invalid_certs: true,
            user_agent: None,
            log_results: false,
            output_format: ReportFormat::Text,
        }
    }
}

impl RunConfig {
    /// 生成探测器选项
    pub fn prober_options(&self) -> ProberOptions {
        let defaults = ProberOptions::default();
        ProberOptions {
            timeout: self.timeout,
            body_prefix_bytes: self.body_prefix_bytes,
            accept_invalid_certs: self.accept_invalid_certs,
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }
}

// 默认值函数
fn default_count() -> usize {
    100_000
}
fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_max_concurrency() -> usize {
    1000
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &RunConfig) -> Result<(), String> {
    if config.max_concurrency == 0 {
        return Err("最大并发数必须大于0".to_string());
    }

    if config.report_interval.is_zero() {
        return Err("报告间隔必须大于0".to_string());
    }

    if config.sink_capacity == 0 {
        return Err("结果缓冲区容量必须大于0".to_string());
    }

    // 验证URL格式
    if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
        return Err(format!("基础URL格式无效: {}", config.base_url));
    }
    if reqwest::Url::parse(&config.base_url).is_err() {
        return Err(format!("基础URL无法解析: {}", config.base_url));
    }

    if let Some(ref user_agent) = config.user_agent {
        if user_agent.trim().is_empty() {
            return Err("User-Agent不能为空".to_string());
        }
    }

    Ok(())
}
