//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::cli::args::{Args, Commands, OutputFormat, RunArgs};
use crate::config::loader::DEFAULT_CONFIG_TEMPLATE;
use crate::config::{
    format_duration, validate_config, ConfigLoader, ReportFormat, RunConfig, TomlConfigLoader,
};
use crate::error::{ConfigError, Result};
use crate::health::{
    generate_resources, FinalReport, HttpProber, ProbeResult, ProbeScheduler, Prober,
    ProberOptions, ProgressCallback, ProgressReporter, Resource, ResultSink, StatsAggregator,
};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 版本命令
pub struct VersionCommand;

#[async_trait]
impl Command for VersionCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Version { format } = &args.command {
            match format {
                OutputFormat::Json => {
                    let version_info = serde_json::json!({
                        "name": crate::APP_NAME,
                        "version": crate::VERSION,
                        "description": crate::APP_DESCRIPTION
                    });
                    println!("{}", serde_json::to_string_pretty(&version_info)?);
                }
                OutputFormat::Text => {
                    println!("{} v{}", crate::APP_NAME, crate::VERSION);
                    println!("{}", crate::APP_DESCRIPTION);
                }
            }
        }
        Ok(())
    }
}

/// 初始化命令
pub struct InitCommand;

#[async_trait]
impl Command for InitCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Init { config_path, force } = &args.command {
            self.create_config_file(config_path, *force).await
        } else {
            Ok(())
        }
    }
}

impl InitCommand {
    /// 创建配置文件
    ///
    /// # 参数
    /// * `config_path` - 目标路径
    /// * `force` - 是否覆盖现有文件
    pub async fn create_config_file(&self, config_path: &Path, force: bool) -> Result<()> {
        if config_path.exists() && !force {
            eprintln!("配置文件已存在: {}", config_path.display());
            eprintln!("使用 --force 参数覆盖现有文件");
            return Ok(());
        }

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tokio::fs::write(config_path, DEFAULT_CONFIG_TEMPLATE).await?;

        println!("配置文件已创建: {}", config_path.display());
        Ok(())
    }
}

/// 验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Validate {
            config_path,
            verbose,
        } = &args.command
        {
            let config_file = config_path
                .clone()
                .unwrap_or_else(|| args.get_config_path());

            self.validate_config_file(&config_file, *verbose).await
        } else {
            Ok(())
        }
    }
}

impl ValidateCommand {
    /// 验证配置文件
    async fn validate_config_file(&self, config_path: &Path, verbose: bool) -> Result<()> {
        println!("验证配置文件: {}", config_path.display());

        let loader = TomlConfigLoader::new(true);
        let config = loader.load_from_file(config_path).await?;

        println!("✓ 配置文件验证通过");
        if verbose {
            println!("  资源数量: {}", config.count);
            println!("  基础URL: {}", config.base_url);
            println!("  最大并发: {}", config.max_concurrency);
            println!("  超时时间: {}", format_duration(config.timeout));
            println!("  报告间隔: {}", format_duration(config.report_interval));
            println!("  缓冲区容量: {}", config.sink_capacity);
            println!("  响应体前缀: {} 字节", config.body_prefix_bytes);
            println!(
                "  跳过证书校验: {}",
                if config.accept_invalid_certs { "是" } else { "否" }
            );
            if let Some(ref user_agent) = config.user_agent {
                println!("  User-Agent: {user_agent}");
            }
            println!(
                "  记录结果: {}",
                if config.log_results { "是" } else { "否" }
            );
        }

        Ok(())
    }
}

/// 单次检测命令
pub struct CheckCommand;

#[async_trait]
impl Command for CheckCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Check {
            url,
            timeout,
            format,
        } = &args.command
        {
            let result = self.perform_check(url, *timeout).await?;
            match format {
                OutputFormat::Json => println!("{}", result.to_json()?),
                OutputFormat::Text => {
                    let status_icon = if result.is_success() { "✓" } else { "✗" };
                    println!(
                        "{} {} - {} - {}ms",
                        status_icon,
                        result.resource.destination,
                        result.outcome,
                        result.latency_ms()
                    );
                }
            }
        }
        Ok(())
    }
}

impl CheckCommand {
    /// 执行单次探测
    pub async fn perform_check(&self, url: &str, timeout: Duration) -> Result<ProbeResult> {
        let prober = HttpProber::new(ProberOptions {
            timeout,
            ..Default::default()
        })?;

        Ok(prober.probe(&Resource::new("check", url)).await)
    }
}

/// 批量运行命令
pub struct RunCommand;

#[async_trait]
impl Command for RunCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Run(run_args) = &args.command {
            let mut config = self.load_config(args).await?;
            Self::apply_overrides(&mut config, run_args);

            let report = Self::run_with_config(&config, None).await?;

            match config.output_format {
                ReportFormat::Json => println!("{}", report.to_json()?),
                ReportFormat::Text => println!("{report}"),
            }
        }
        Ok(())
    }
}

impl RunCommand {
    /// 加载配置：显式指定的文件必须存在，默认路径不存在时使用内置默认值
    async fn load_config(&self, args: &Args) -> Result<RunConfig> {
        let loader = TomlConfigLoader::new(true);
        let config_path = args.get_config_path();

        if args.has_explicit_config() || config_path.exists() {
            loader.load_from_file(&config_path).await
        } else {
            debug!("未找到配置文件，使用默认配置");
            Ok(RunConfig::default())
        }
    }

    /// 用命令行参数覆盖配置
    pub fn apply_overrides(config: &mut RunConfig, run_args: &RunArgs) {
        if let Some(count) = run_args.count {
            config.count = count;
        }
        if let Some(ref base_url) = run_args.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(max_concurrency) = run_args.max_concurrency {
            config.max_concurrency = max_concurrency;
        }
        if let Some(timeout) = run_args.timeout {
            config.timeout = timeout;
        }
        if let Some(report_interval) = run_args.report_interval {
            config.report_interval = report_interval;
        }
        if let Some(sink_capacity) = run_args.sink_capacity {
            config.sink_capacity = sink_capacity;
        }
        if run_args.verify_tls {
            config.accept_invalid_certs = false;
        }
        if run_args.log_results {
            config.log_results = true;
        }
        if let Some(format) = run_args.format {
            config.output_format = format.into();
        }
    }

    /// 按配置执行一次完整运行
    ///
    /// 所有组件在第一次探测之前构建完成，配置错误不会产生任何请求。
    ///
    /// # 参数
    /// * `config` - 运行配置
    /// * `progress` - 自定义进度回调，为空时打印到标准输出
    ///
    /// # 返回
    /// * `Result<FinalReport>` - 最终报告
    pub async fn run_with_config(
        config: &RunConfig,
        progress: Option<ProgressCallback>,
    ) -> Result<FinalReport> {
        validate_config(config).map_err(ConfigError::ValidationError)?;

        let prober: Arc<dyn Prober> = Arc::new(HttpProber::new(config.prober_options())?);
        let stats = Arc::new(StatsAggregator::new());
        let sink = Arc::new(ResultSink::new(config.sink_capacity));
        let scheduler = ProbeScheduler::new(
            prober,
            Arc::clone(&stats),
            Arc::clone(&sink),
            config.max_concurrency,
        )?;
        let mut reporter = ProgressReporter::new(Arc::clone(&stats), config.report_interval)?;
        if let Some(callback) = progress {
            reporter = reporter.with_callback(callback);
        }

        let resources = generate_resources(&config.base_url, config.count);
        info!(
            "开始批量检测: {} 个资源, 目标 {}",
            resources.len(),
            config.base_url
        );

        let (shutdown_tx, _) = broadcast::channel(1);
        let result_logger = if config.log_results {
            spawn_result_logger(&sink, shutdown_tx.subscribe())
        } else {
            None
        };

        let reporter_handle = reporter.start();
        let summary = scheduler.run(resources).await;
        reporter_handle.stop().await;

        if let Some(handle) = result_logger {
            let _ = shutdown_tx.send(());
            match handle.await {
                Ok(logged) => debug!("结果记录任务已退出，共记录 {} 条结果", logged),
                Err(e) => warn!("结果记录任务异常退出: {}", e),
            }
        }

        let report = FinalReport::new(stats.snapshot(), summary.elapsed)
            .with_sink_counts(sink.accepted(), sink.dropped())
            .with_faults(summary.faults);

        info!(
            "批量检测完成: 共 {} 个, 耗时 {:?}",
            report.stats.total, report.elapsed
        );

        Ok(report)
    }
}

/// 启动结果记录任务
///
/// 接管缓冲区的接收端，逐条以调试级别记录结果。收到停止信号后关闭接收端
/// 并记录剩余结果。接收端已被取走时返回 `None`。
fn spawn_result_logger(
    sink: &ResultSink,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Option<JoinHandle<usize>> {
    let mut receiver = sink.take_receiver()?;

    Some(tokio::spawn(async move {
        let mut logged = 0usize;

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                received = receiver.recv() => match received {
                    Some(result) => {
                        log_result(&result);
                        logged += 1;
                    }
                    None => break,
                },
            }
        }

        receiver.close();
        while let Ok(result) = receiver.try_recv() {
            log_result(&result);
            logged += 1;
        }

        logged
    }))
}

fn log_result(result: &ProbeResult) {
    debug!(
        resource_id = %result.resource.id,
        destination = %result.resource.destination,
        outcome = %result.outcome,
        latency_ms = result.latency_ms(),
        "探测结果"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::OutputFormat;

    #[test]
    fn test_apply_overrides() {
        let mut config = RunConfig::default();
        let run_args = RunArgs {
            count: Some(10),
            base_url: Some("http://127.0.0.1:1".to_string()),
            max_concurrency: Some(2),
            timeout: Some(Duration::from_millis(100)),
            report_interval: None,
            sink_capacity: Some(5),
            verify_tls: true,
            log_results: true,
            format: Some(OutputFormat::Json),
        };

        RunCommand::apply_overrides(&mut config, &run_args);

        assert_eq!(config.count, 10);
        assert_eq!(config.base_url, "http://127.0.0.1:1");
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.timeout, Duration::from_millis(100));
        assert_eq!(config.report_interval, Duration::from_secs(5));
        assert_eq!(config.sink_capacity, 5);
        assert!(!config.accept_invalid_certs);
        assert!(config.log_results);
        assert_eq!(config.output_format, ReportFormat::Json);
    }

    #[test]
    fn test_empty_overrides_keep_config() {
        let mut config = RunConfig::default();
        RunCommand::apply_overrides(&mut config, &RunArgs::default());
        assert_eq!(config, RunConfig::default());
    }

    #[tokio::test]
    async fn test_run_with_zero_concurrency_rejected() {
        let config = RunConfig {
            count: 3,
            max_concurrency: 0,
            ..Default::default()
        };

        let result = RunCommand::run_with_config(&config, None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_result_logger_drains_sink() {
        let sink = ResultSink::new(4);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = spawn_result_logger(&sink, shutdown_rx).unwrap();

        for i in 0..3 {
            let resource = Resource::new(format!("rsr-{i}"), "http://localhost/health");
            sink.offer(ProbeResult::new(
                resource,
                crate::health::ProbeOutcome::from_status(200),
                Duration::from_millis(1),
                chrono::Utc::now(),
            ));
        }

        // 等待消费者处理已缓冲的结果
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();

        assert_eq!(handle.await.unwrap(), 3);
        // 接收端只能被取走一次
        assert!(spawn_result_logger(&sink, shutdown_tx.subscribe()).is_none());
    }

    #[tokio::test]
    async fn test_init_creates_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("batch-vitals.toml");

        InitCommand.create_config_file(&path, false).await.unwrap();
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, DEFAULT_CONFIG_TEMPLATE);

        // 已存在且未指定 --force 时不覆盖
        tokio::fs::write(&path, "count = 1\n").await.unwrap();
        InitCommand.create_config_file(&path, false).await.unwrap();
        assert_eq!(
            tokio::fs::read_to_string(&path).await.unwrap(),
            "count = 1\n"
        );

        InitCommand.create_config_file(&path, true).await.unwrap();
        assert_eq!(
            tokio::fs::read_to_string(&path).await.unwrap(),
            DEFAULT_CONFIG_TEMPLATE
        );
    }
}
