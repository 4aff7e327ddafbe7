//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `BOOKFLOW__*` 覆盖（双下划线表示嵌套，如 `BOOKFLOW__CONTENT__POLICY=latest`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::effect::TriggerPolicy;
use crate::workflows::content::ContentEndpoints;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiSection,
    pub scheduler: SchedulerSection,
    pub content: ContentSection,
    pub log: LogSection,
}

/// [api] 段：后端地址、超时与两个内容资源路径
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 单次请求超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_chapters_path")]
    pub chapters_path: String,
    #[serde(default = "default_blocks_path")]
    pub blocks_path: String,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_chapters_path() -> String {
    "/api/chapters".to_string()
}

fn default_blocks_path() -> String {
    "/api/blocks".to_string()
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            chapters_path: default_chapters_path(),
            blocks_path: default_blocks_path(),
        }
    }
}

impl ApiSection {
    pub fn endpoints(&self) -> ContentEndpoints {
        ContentEndpoints {
            chapters: self.chapters_path.clone(),
            blocks: self.blocks_path.clone(),
        }
    }
}

/// [scheduler] 段
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// 保留的已结束任务条数（任务列表用）
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_history_limit() -> usize {
    64
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
        }
    }
}

/// 水合 Worker 的触发策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentPolicy {
    /// 每个导航 action 一个 Worker
    #[default]
    Every,
    /// 新导航到来时取消旧 Worker
    Latest,
}

impl From<ContentPolicy> for TriggerPolicy {
    fn from(policy: ContentPolicy) -> Self {
        match policy {
            ContentPolicy::Every => TriggerPolicy::EveryMatch,
            ContentPolicy::Latest => TriggerPolicy::LatestOnly,
        }
    }
}

/// [content] 段
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentSection {
    #[serde(default)]
    pub policy: ContentPolicy,
}

/// [log] 段：未设置 RUST_LOG 时使用的过滤表达式
#[derive(Debug, Clone, Deserialize)]
pub struct LogSection {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 BOOKFLOW__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 BOOKFLOW__*（双下划线表示嵌套键）
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
        } else {
            tracing::warn!("Config file {} not found, skipping", path.display());
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("BOOKFLOW")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
