//! HTTP探测器实现
//!
//! 对单个资源执行一次有时限的GET请求，所有失败都体现在返回的结果中

use crate::error::{ProbeError, Result};
use crate::health::resource::Resource;
use crate::health::result::{ProbeOutcome, ProbeResult};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONNECTION;
use reqwest::{Client, Response};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

/// 默认读取并丢弃的响应体前缀长度
pub const DEFAULT_BODY_PREFIX_BYTES: usize = 1024;

/// 探测器trait，定义单次探测接口
#[async_trait]
pub trait Prober: Send + Sync {
    /// 对资源执行一次探测
    ///
    /// 该调用不会失败：超时、连接错误等都会被记录在返回的结果里。
    ///
    /// # 参数
    /// * `resource` - 被探测的资源
    ///
    /// # 返回
    /// * `ProbeResult` - 探测结果
    async fn probe(&self, resource: &Resource) -> ProbeResult;
}

/// HTTP探测器选项
#[derive(Debug, Clone)]
pub struct ProberOptions {
    /// 单次探测超时时间
    pub timeout: Duration,
    /// 读取并丢弃的响应体前缀长度
    pub body_prefix_bytes: usize,
    /// 是否跳过TLS证书校验
    pub accept_invalid_certs: bool,
    /// User-Agent请求头
    pub user_agent: String,
}

impl Default for ProberOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            body_prefix_bytes: DEFAULT_BODY_PREFIX_BYTES,
            accept_invalid_certs: true,
            user_agent: format!("{}/{}", crate::APP_NAME, crate::VERSION),
        }
    }
}

/// HTTP探测器实现
pub struct HttpProber {
    /// HTTP客户端
    client: Client,
    /// 单次探测超时时间
    timeout: Duration,
    /// 读取并丢弃的响应体前缀长度
    body_prefix_bytes: usize,
}

impl HttpProber {
    /// 创建新的HTTP探测器
    ///
    /// # 参数
    /// * `options` - 探测器选项
    ///
    /// # 返回
    /// * `Result<Self>` - 探测器实例
    pub fn new(options: ProberOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(options.user_agent)
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            // 每次探测使用独立连接
            .pool_max_idle_per_host(0)
            .build()?;

        Ok(Self {
            client,
            timeout: options.timeout,
            body_prefix_bytes: options.body_prefix_bytes,
        })
    }

    /// 单次探测超时时间
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 发送请求并返回状态码
    async fn perform_request(&self, resource: &Resource) -> std::result::Result<u16, ProbeError> {
        let response = self
            .client
            .get(&resource.destination)
            .header(CONNECTION, "close")
            .send()
            .await
            .map_err(|e| ProbeError::from_reqwest(&e))?;

        let status_code = response.status().as_u16();
        self.discard_body_prefix(response).await;

        Ok(status_code)
    }

    /// 读取并丢弃响应体前缀，读取错误被忽略
    ///
    /// 按块读取，最后一块可能使实际读取量略超过前缀长度。
    async fn discard_body_prefix(&self, mut response: Response) {
        let mut read = 0usize;
        while read < self.body_prefix_bytes {
            match response.chunk().await {
                Ok(Some(chunk)) => read += chunk.len(),
                Ok(None) | Err(_) => break,
            }
        }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, resource: &Resource) -> ProbeResult {
        let started_at = Utc::now();
        let start_time = Instant::now();

        // 执行请求（带超时）
        let outcome = match timeout(self.timeout, self.perform_request(resource)).await {
            Ok(Ok(status_code)) => ProbeOutcome::from_status(status_code),
            Ok(Err(error)) => ProbeOutcome::Error { error },
            Err(_) => ProbeOutcome::Error {
                error: ProbeError::Timeout,
            },
        };

        let latency = start_time.elapsed();
        debug!("探测完成: {} - {} - {:?}", resource.id, outcome, latency);

        ProbeResult::new(resource.clone(), outcome, latency, started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use tokio::net::TcpListener;

    fn prober(timeout: Duration) -> HttpProber {
        HttpProber::new(ProberOptions {
            timeout,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_http_prober_creation() {
        let prober = HttpProber::new(ProberOptions::default());
        assert!(prober.is_ok());
        assert_eq!(prober.unwrap().timeout(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_probe_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .match_header("connection", "close")
            .match_header(
                "user-agent",
                Matcher::Regex(format!("^{}/", crate::APP_NAME)),
            )
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let resource = Resource::new("rsr-1", format!("{}/health", server.url()));
        let result = prober(Duration::from_secs(5)).probe(&resource).await;

        mock.assert_async().await;
        assert!(result.is_success());
        assert_eq!(result.outcome.status_code(), Some(200));
        assert!(result.probe_error().is_none());
        assert_eq!(result.resource, resource);
    }

    #[tokio::test]
    async fn test_probe_redirect_range_is_success() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/health")
            .with_status(304)
            .create_async()
            .await;

        let resource = Resource::new("rsr-1", format!("{}/health", server.url()));
        let result = prober(Duration::from_secs(5)).probe(&resource).await;

        assert!(result.is_success());
        assert_eq!(result.outcome.status_code(), Some(304));
    }

    #[tokio::test]
    async fn test_probe_status_failure_without_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/health")
            .with_status(503)
            .create_async()
            .await;

        let resource = Resource::new("rsr-1", format!("{}/health", server.url()));
        let result = prober(Duration::from_secs(5)).probe(&resource).await;

        assert!(!result.is_success());
        assert_eq!(result.outcome.status_code(), Some(503));
        assert!(result.probe_error().is_none());
    }

    #[tokio::test]
    async fn test_probe_large_body_reads_prefix_only() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(vec![b'x'; 1024 * 1024])
            .create_async()
            .await;

        let resource = Resource::new("rsr-1", format!("{}/health", server.url()));
        let result = prober(Duration::from_secs(5)).probe(&resource).await;

        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_probe_timeout() {
        // 接受连接但从不响应
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hold = tokio::spawn(async move {
            let mut sockets = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                sockets.push(socket);
            }
        });

        let timeout = Duration::from_millis(200);
        let resource = Resource::new("rsr-1", format!("http://{addr}/health"));
        let result = prober(timeout).probe(&resource).await;

        assert!(!result.is_success());
        assert_eq!(result.probe_error(), Some(&ProbeError::Timeout));
        assert!(result.latency >= timeout);
        assert!(result.latency < timeout + Duration::from_secs(1));

        hold.abort();
    }

    #[tokio::test]
    async fn test_probe_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let resource = Resource::new("rsr-1", format!("http://{addr}/health"));
        let result = prober(Duration::from_secs(5)).probe(&resource).await;

        assert!(!result.is_success());
        assert!(matches!(result.probe_error(), Some(ProbeError::Connect(_))));
    }

    #[tokio::test]
    async fn test_connection_refused_ignores_url_text() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let prober = prober(Duration::from_secs(5));
        for path in ["dns/health", "tls-check/health", "ssl/health"] {
            let resource = Resource::new("rsr-1", format!("http://{addr}/{path}"));
            let result = prober.probe(&resource).await;

            assert!(
                matches!(result.probe_error(), Some(ProbeError::Connect(_))),
                "{path}: {:?}",
                result.probe_error()
            );
        }
    }

    #[tokio::test]
    async fn test_probe_invalid_url() {
        let resource = Resource::new("rsr-1", "not a url");
        let result = prober(Duration::from_secs(1)).probe(&resource).await;

        assert!(!result.is_success());
        assert!(matches!(result.probe_error(), Some(ProbeError::Request(_))));
    }
}
