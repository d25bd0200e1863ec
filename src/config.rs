//! 配置加载
//!
//! 配置文件查找优先级：
//! 1. 命令行 `--config` 指定的路径
//! 2. 环境变量 `CWN_CONFIG`
//! 3. `~/.config/ci-webhook-notifier/config.json`
//!
//! 文件不存在时使用默认配置（没有 webhook）；文件格式错误时报错。

use crate::notification::dispatcher::{DEFAULT_MAX_IN_FLIGHT, DEFAULT_MAX_QUEUED};
use crate::notification::webhook::Webhook;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 配置文件路径环境变量
pub const CONFIG_ENV: &str = "CWN_CONFIG";

fn default_max_concurrent() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}

fn default_max_queued() -> usize {
    DEFAULT_MAX_QUEUED
}

/// 通知器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifierConfig {
    /// job 级 webhook 列表；缺省表示未配置
    #[serde(default)]
    pub webhooks: Option<Vec<Webhook>>,
    /// 同时进行的投递上限
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_dispatches: usize,
    /// 排队等待的投递上限，超出后拒绝
    #[serde(default = "default_max_queued")]
    pub max_queued_dispatches: usize,
    /// 只打印不发送
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhooks: None,
            max_concurrent_dispatches: DEFAULT_MAX_IN_FLIGHT,
            max_queued_dispatches: DEFAULT_MAX_QUEUED,
            dry_run: false,
        }
    }
}

impl NotifierConfig {
    /// 默认配置文件路径
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Ok(PathBuf::from(path));
            }
        }

        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow!("Cannot find home directory"))?
            .join(".config/ci-webhook-notifier/config.json"))
    }

    /// 从指定路径加载
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        debug!(
            path = %path.display(),
            webhooks = config.webhooks.as_ref().map(|w| w.len()).unwrap_or(0),
            "Loaded config"
        );
        Ok(config)
    }

    /// 按优先级查找并加载
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::load(&Self::default_path()?),
        }
    }
}
