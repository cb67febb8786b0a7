//! 配置加载器实现
//!
//! 提供TOML配置文件解析、环境变量替换和错误处理功能

use crate::config::types::{validate_config, RunConfig};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 配置加载器trait，定义配置加载接口
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// 从文件加载配置
    ///
    /// # 参数
    /// * `path` - 配置文件路径
    ///
    /// # 返回
    /// * `Result<RunConfig>` - 加载的配置或错误
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<RunConfig>;

    /// 从字符串加载配置
    ///
    /// # 参数
    /// * `content` - 配置文件内容
    ///
    /// # 返回
    /// * `Result<RunConfig>` - 加载的配置或错误
    async fn load_from_string(&self, content: &str) -> Result<RunConfig>;

    /// 验证配置
    fn validate(&self, config: &RunConfig) -> Result<()>;
}

/// TOML配置加载器实现
#[derive(Debug, Clone)]
pub struct TomlConfigLoader {
    /// 是否启用环境变量替换
    enable_env_substitution: bool,
}

impl TomlConfigLoader {
    /// 创建新的TOML配置加载器
    ///
    /// # 参数
    /// * `enable_env_substitution` - 是否启用环境变量替换
    pub fn new(enable_env_substitution: bool) -> Self {
        Self {
            enable_env_substitution,
        }
    }

    /// 替换字符串中的环境变量
    ///
    /// # 参数
    /// * `content` - 要处理的字符串
    ///
    /// # 返回
    /// * `Result<String>` - 替换后的字符串或错误
    fn substitute_env_vars(&self, content: &str) -> Result<String> {
        if !self.enable_env_substitution {
            return Ok(content.to_string());
        }

        // 匹配 ${VAR_NAME} 格式的环境变量
        let env_var_regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| ConfigError::ParseError(format!("正则表达式错误: {e}")))?;

        let mut result = content.to_string();

        for captures in env_var_regex.captures_iter(content) {
            let full_match = &captures[0];
            let var_name = &captures[1];

            match std::env::var(var_name) {
                Ok(value) => {
                    result = result.replace(full_match, &value);
                }
                Err(_) => {
                    return Err(ConfigError::EnvVarError {
                        var: var_name.to_string(),
                    }
                    .into());
                }
            }
        }

        Ok(result)
    }

    /// 解析TOML内容
    fn parse_toml(&self, content: &str) -> Result<RunConfig> {
        // 替换环境变量
        let processed_content = self.substitute_env_vars(content)?;

        let config: RunConfig = toml::from_str(&processed_content)
            .map_err(|e| ConfigError::ParseError(format!("TOML解析失败: {e}")))?;

        Ok(config)
    }
}

impl Default for TomlConfigLoader {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl ConfigLoader for TomlConfigLoader {
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<RunConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            }
            .into());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::ParseError(format!("读取文件失败: {e}")))?;

        let config = self.parse_toml(&content)?;
        self.validate(&config)?;

        info!("成功加载配置文件: {}", path.display());
        debug!("配置内容: {:?}", config);

        Ok(config)
    }

    async fn load_from_string(&self, content: &str) -> Result<RunConfig> {
        let config = self.parse_toml(content)?;
        self.validate(&config)?;

        debug!("成功解析配置字符串");

        Ok(config)
    }

    fn validate(&self, config: &RunConfig) -> Result<()> {
        validate_config(config).map_err(|e| ConfigError::ValidationError(e).into())
    }
}

/// 获取默认配置文件路径
///
/// 优先使用当前目录下的 `batch-vitals.toml`，否则使用用户配置目录下的
/// `batch-vitals/config.toml`。
pub fn get_default_config_path() -> PathBuf {
    let local = PathBuf::from("batch-vitals.toml");
    if local.exists() {
        return local;
    }

    dirs::config_dir()
        .map(|config_dir| config_dir.join(crate::APP_NAME).join("config.toml"))
        .unwrap_or(local)
}

/// 默认配置模板
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# batch-vitals 配置文件
#
# 所有字段均可省略，省略时使用默认值。
# 支持 ${VAR_NAME} 格式的环境变量替换。

# 合成资源数量
count = 100000

# 基础URL，每个资源的探测地址为 <base_url>/health
base_url = "http://localhost:8080"

# 最大并发探测数
max_concurrency = 1000

# 单次探测超时时间（支持 250ms, 5s, 1m, 1m30s, PT5S）
timeout = "5s"

# 进度报告间隔
report_interval = "5s"

# 结果缓冲区容量，缓冲区满时丢弃新结果
sink_capacity = 1000

# 读取并丢弃的响应体前缀长度（字节）
body_prefix_bytes = 1024

# 是否跳过TLS证书校验
accept_invalid_certs = true

# 是否以调试级别记录每条缓冲的结果
log_results = false

# 最终报告输出格式: text / json
output_format = "text"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::io::Write;
    use std::time::Duration;

    const TEST_CONFIG_TOML: &str = r#"
count = 500
base_url = "https://example.com"
max_concurrency = 20
timeout = "250ms"
report_interval = "1m30s"
output_format = "json"
"#;

    #[tokio::test]
    async fn test_toml_parsing() {
        let loader = TomlConfigLoader::new(false);
        let config = loader.load_from_string(TEST_CONFIG_TOML).await.unwrap();

        assert_eq!(config.count, 500);
        assert_eq!(config.base_url, "https://example.com");
        assert_eq!(config.max_concurrency, 20);
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.report_interval, Duration::from_secs(90));
        assert_eq!(config.output_format, crate::config::ReportFormat::Json);
        // 未指定的字段使用默认值
        assert_eq!(config.sink_capacity, 1000);
        assert!(config.accept_invalid_certs);
    }

    #[tokio::test]
    async fn test_default_template_parses() {
        let loader = TomlConfigLoader::new(false);
        let config = loader
            .load_from_string(DEFAULT_CONFIG_TEMPLATE)
            .await
            .unwrap();

        assert_eq!(config, RunConfig::default());
    }

    #[tokio::test]
    async fn test_invalid_duration_rejected() {
        let loader = TomlConfigLoader::new(false);
        let result = loader.load_from_string("timeout = \"soon\"").await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("TOML解析失败"));
    }

    #[tokio::test]
    async fn test_zero_concurrency_rejected() {
        let loader = TomlConfigLoader::new(false);
        let result = loader.load_from_string("max_concurrency = 0").await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("最大并发数"));
    }

    #[tokio::test]
    #[serial]
    async fn test_env_var_substitution() {
        env::set_var("BATCH_VITALS_TEST_BASE_URL", "http://10.0.0.1:9000");

        let loader = TomlConfigLoader::new(true);
        let config = loader
            .load_from_string("base_url = \"${BATCH_VITALS_TEST_BASE_URL}\"")
            .await
            .unwrap();

        assert_eq!(config.base_url, "http://10.0.0.1:9000");

        env::remove_var("BATCH_VITALS_TEST_BASE_URL");
    }

    #[tokio::test]
    #[serial]
    async fn test_env_var_substitution_missing_var() {
        let loader = TomlConfigLoader::new(true);
        let result = loader
            .load_from_string("base_url = \"${BATCH_VITALS_MISSING_VAR}\"")
            .await;

        assert!(result.is_err());
        if let Err(e) = result {
            assert!(e.to_string().contains("BATCH_VITALS_MISSING_VAR"));
        }
    }

    #[test]
    fn test_substitute_env_vars_disabled() {
        let loader = TomlConfigLoader::new(false);
        let content = "test ${VAR} content";
        let result = loader.substitute_env_vars(content).unwrap();
        assert_eq!(result, content);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "count = 7\nmax_concurrency = 3").unwrap();

        let loader = TomlConfigLoader::default();
        let config = loader.load_from_file(file.path()).await.unwrap();

        assert_eq!(config.count, 7);
        assert_eq!(config.max_concurrency, 3);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let loader = TomlConfigLoader::default();
        let result = loader.load_from_file("/nonexistent/batch-vitals.toml").await;

        assert!(matches!(
            result,
            Err(crate::error::RunnerError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_get_default_config_path() {
        let path = get_default_config_path();
        assert!(path.to_string_lossy().contains("batch-vitals"));
    }
}
