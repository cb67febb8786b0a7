//! Batch Vitals 主程序入口
//!
//! 并发HTTP健康检测运行器

use anyhow::{Context, Result};
use batch_vitals::cli::args::{Args, Commands, OutputFormat};
use batch_vitals::cli::commands::{
    CheckCommand, Command, InitCommand, RunCommand, ValidateCommand, VersionCommand,
};
use batch_vitals::logging::{LogConfig, LoggingSystem};
use clap::Parser;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    // 初始化日志系统
    let log_config = LogConfig {
        level: args.log_level.into(),
        file_path: args.log_file.clone(),
        json_format: args.log_format == OutputFormat::Json,
        ..Default::default()
    }
    .with_module_level("hyper", log::LevelFilter::Warn)
    .with_module_level("reqwest", log::LevelFilter::Warn);

    let _logging_system = LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;

    info!("Batch Vitals v{} 启动", batch_vitals::VERSION);

    // 执行命令
    if let Err(e) = execute_command(&args).await {
        error!("命令执行失败: {:#}", e);
        eprintln!("错误: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}

/// 执行CLI命令
async fn execute_command(args: &Args) -> Result<()> {
    let command: Box<dyn Command> = match &args.command {
        Commands::Run(_) => Box::new(RunCommand),
        Commands::Check { .. } => Box::new(CheckCommand),
        Commands::Init { .. } => Box::new(InitCommand),
        Commands::Validate { .. } => Box::new(ValidateCommand),
        Commands::Version { .. } => Box::new(VersionCommand),
    };

    command
        .execute(args)
        .await
        .with_context(|| format!("{} 执行失败", command_name(&args.command)))
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Run(_) => "run",
        Commands::Check { .. } => "check",
        Commands::Init { .. } => "init",
        Commands::Validate { .. } => "validate",
        Commands::Version { .. } => "version",
    }
}
