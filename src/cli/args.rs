//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use crate::config::{parse_duration, ReportFormat};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Batch Vitals - 并发HTTP健康检测运行器
#[derive(Parser, Debug, Clone)]
#[command(
    name = "batch-vitals",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        help = "配置文件路径",
        env = "BATCH_VITALS_CONFIG"
    )]
    pub config: Option<PathBuf>,

    /// 日志级别
    #[arg(
        short,
        long,
        global = true,
        value_enum,
        default_value = "info",
        help = "日志级别",
        env = "BATCH_VITALS_LOG_LEVEL"
    )]
    pub log_level: LogLevel,

    /// 日志格式
    #[arg(
        long,
        global = true,
        value_enum,
        default_value = "text",
        help = "日志格式",
        env = "BATCH_VITALS_LOG_FORMAT"
    )]
    pub log_format: OutputFormat,

    /// 日志文件路径
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "日志文件路径（默认输出到标准错误）"
    )]
    pub log_file: Option<PathBuf>,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum LogLevel {
    /// 跟踪级别
    Trace,
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// 输出格式枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum OutputFormat {
    /// 文本格式
    Text,
    /// JSON格式
    Json,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => ReportFormat::Text,
            OutputFormat::Json => ReportFormat::Json,
        }
    }
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 对合成资源执行一次完整的并发探测
    Run(RunArgs),

    /// 对单个URL执行一次探测
    Check {
        /// 探测地址
        #[arg(value_name = "URL", help = "探测地址")]
        url: String,

        /// 超时时间
        #[arg(
            short,
            long,
            value_name = "DURATION",
            default_value = "5s",
            value_parser = parse_duration_arg,
            help = "超时时间（如 250ms, 5s, PT5S）"
        )]
        timeout: Duration,

        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },

    /// 初始化配置文件
    Init {
        /// 配置文件路径
        #[arg(
            value_name = "FILE",
            help = "配置文件路径",
            default_value = "batch-vitals.toml"
        )]
        config_path: PathBuf,

        /// 是否覆盖现有文件
        #[arg(short, long, help = "覆盖现有文件")]
        force: bool,
    },

    /// 验证配置文件
    Validate {
        /// 配置文件路径
        #[arg(value_name = "FILE", help = "配置文件路径")]
        config_path: Option<PathBuf>,

        /// 是否显示详细信息
        #[arg(short, long, help = "显示详细信息")]
        verbose: bool,
    },

    /// 显示版本信息
    Version {
        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },
}

/// `run` 子命令参数，未指定的字段沿用配置文件或默认值
#[derive(clap::Args, Debug, Clone, Default, PartialEq)]
pub struct RunArgs {
    /// 合成资源数量
    #[arg(
        short = 'n',
        long,
        value_name = "COUNT",
        help = "合成资源数量",
        env = "BATCH_VITALS_COUNT"
    )]
    pub count: Option<usize>,

    /// 基础URL
    #[arg(
        short,
        long,
        value_name = "URL",
        help = "基础URL，探测地址为 <URL>/health",
        env = "BATCH_VITALS_BASE_URL"
    )]
    pub base_url: Option<String>,

    /// 最大并发探测数
    #[arg(
        short,
        long,
        value_name = "COUNT",
        help = "最大并发探测数",
        env = "BATCH_VITALS_MAX_CONCURRENCY"
    )]
    pub max_concurrency: Option<usize>,

    /// 单次探测超时时间
    #[arg(
        short,
        long,
        value_name = "DURATION",
        value_parser = parse_duration_arg,
        help = "单次探测超时时间（如 250ms, 5s, PT5S）",
        env = "BATCH_VITALS_TIMEOUT"
    )]
    pub timeout: Option<Duration>,

    /// 进度报告间隔
    #[arg(
        short = 'i',
        long,
        value_name = "DURATION",
        value_parser = parse_duration_arg,
        help = "进度报告间隔",
        env = "BATCH_VITALS_REPORT_INTERVAL"
    )]
    pub report_interval: Option<Duration>,

    /// 结果缓冲区容量
    #[arg(
        long,
        value_name = "COUNT",
        help = "结果缓冲区容量",
        env = "BATCH_VITALS_SINK_CAPACITY"
    )]
    pub sink_capacity: Option<usize>,

    /// 是否校验TLS证书
    #[arg(long, help = "校验TLS证书（默认跳过校验）")]
    pub verify_tls: bool,

    /// 是否记录每条缓冲的结果
    #[arg(long, help = "以调试级别记录每条缓冲的结果")]
    pub log_results: bool,

    /// 最终报告输出格式
    #[arg(short, long, value_enum, help = "最终报告输出格式")]
    pub format: Option<OutputFormat>,
}

/// clap 使用的时长解析器
fn parse_duration_arg(value: &str) -> Result<Duration, String> {
    parse_duration(value).map_err(|e| e.to_string())
}

impl Args {
    /// 解析命令行参数
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// 获取配置文件路径
    pub fn get_config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::get_default_config_path)
    }

    /// 是否显式指定了配置文件
    pub fn has_explicit_config(&self) -> bool {
        self.config.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_parse_run_args() {
        let args = Args::try_parse_from([
            "batch-vitals",
            "run",
            "-n",
            "50",
            "--base-url",
            "http://127.0.0.1:9000",
            "--max-concurrency",
            "8",
            "--timeout",
            "250ms",
            "--report-interval",
            "PT1S",
            "--format",
            "json",
        ])
        .unwrap();

        let Commands::Run(run) = args.command else {
            panic!("应解析为 run 子命令");
        };
        assert_eq!(run.count, Some(50));
        assert_eq!(run.base_url.as_deref(), Some("http://127.0.0.1:9000"));
        assert_eq!(run.max_concurrency, Some(8));
        assert_eq!(run.timeout, Some(Duration::from_millis(250)));
        assert_eq!(run.report_interval, Some(Duration::from_secs(1)));
        assert_eq!(run.format, Some(OutputFormat::Json));
        assert!(!run.verify_tls);
    }

    #[test]
    #[serial]
    fn test_invalid_duration_rejected() {
        let result = Args::try_parse_from(["batch-vitals", "run", "--timeout", "soon"]);
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_global_options() {
        let args = Args::try_parse_from([
            "batch-vitals",
            "check",
            "http://localhost:8080/health",
            "--log-level",
            "debug",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(args.log_level, LogLevel::Debug);
        assert_eq!(args.log_format, OutputFormat::Json);
        assert_eq!(log::LevelFilter::from(args.log_level), log::LevelFilter::Debug);
        assert!(matches!(args.command, Commands::Check { .. }));
    }

    #[test]
    fn test_output_format_conversion() {
        assert_eq!(ReportFormat::from(OutputFormat::Json), ReportFormat::Json);
        assert_eq!(ReportFormat::from(OutputFormat::Text), ReportFormat::Text);
    }
}
