//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `BAZAAR__*` 覆盖（双下划线表示嵌套，
//! 如 `BAZAAR__ASSISTANT__API_KEY=sk-...`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub assistant: AssistantSection,
    #[serde(default)]
    pub store: StoreSection,
}

/// [app] 段：应用名
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [assistant] 段：推理服务端点、助手 id 与轮询策略
#[derive(Debug, Clone, Deserialize)]
pub struct AssistantSection {
    /// API Key；为空时回退到环境变量 OPENAI_API_KEY
    pub api_key: Option<String>,
    /// 预先配置好的助手 id（asst_...）
    #[serde(default)]
    pub assistant_id: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 轮询间隔（秒）
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// 单次 run 最大轮询次数，超出即请求取消
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
    /// 单次 HTTP 请求超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for AssistantSection {
    fn default() -> Self {
        Self {
            api_key: None,
            assistant_id: String::new(),
            base_url: default_base_url(),
            poll_interval_secs: default_poll_interval_secs(),
            max_polls: default_max_polls(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_poll_interval_secs() -> u64 {
    3
}

fn default_max_polls() -> u32 {
    30
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// [store] 段：数据目录（users.json / listings.json 等所在处）
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// 从 config 目录加载配置，环境变量 BAZAAR__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 BAZAAR__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("BAZAAR")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.assistant.max_polls, 30);
        assert_eq!(cfg.assistant.poll_interval_secs, 3);
        assert_eq!(cfg.store.data_dir, PathBuf::from("data"));
    }
}
