//! 探测目标定义
//!
//! 资源在运行开始前生成，运行期间只读

use serde::{Deserialize, Serialize};

/// 被探测的资源
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    /// 资源标识，在一次运行内唯一
    pub id: String,
    /// 探测地址
    pub destination: String,
}

impl Resource {
    /// 创建新的资源
    pub fn new(id: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            destination: destination.into(),
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.id, self.destination)
    }
}

/// 生成合成资源列表
///
/// 每个资源的标识为 `rsr-<序号>`，序号从1开始，地址为 `<base_url>/health`。
///
/// # 参数
/// * `base_url` - 基础URL
/// * `count` - 资源数量
///
/// # 返回
/// * `Vec<Resource>` - 按序号排列的资源列表
pub fn generate_resources(base_url: &str, count: usize) -> Vec<Resource> {
    let destination = format!("{}/health", base_url.trim_end_matches('/'));
    (1..=count)
        .map(|i| Resource::new(format!("rsr-{i}"), destination.clone()))
        .collect()
}
