//! Webhook 配置 - 目标地址、状态过滤开关和宏条件
//!
//! 通知流程中只读，修改只通过配置更新完成。

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 默认超时时间（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// 按构建状态过滤的通知开关（默认全部关闭）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotifyFlags {
    pub start_notification: bool,
    pub notify_success: bool,
    pub notify_aborted: bool,
    pub notify_not_built: bool,
    pub notify_unstable: bool,
    pub notify_failure: bool,
    pub notify_back_to_normal: bool,
    pub notify_repeated_failure: bool,
}

impl NotifyFlags {
    /// 所有开关打开
    pub fn all() -> Self {
        Self {
            start_notification: true,
            notify_success: true,
            notify_aborted: true,
            notify_not_built: true,
            notify_unstable: true,
            notify_failure: true,
            notify_back_to_normal: true,
            notify_repeated_failure: true,
        }
    }
}

/// 宏条件：模板展开后与期望值完全相等才算命中
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Macro {
    pub template: String,
    pub value: String,
}

impl Macro {
    pub fn new(template: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            value: value.into(),
        }
    }
}

/// 单个 webhook 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    /// 目标 URL（可能包含 `${VAR}` 形式的构建变量）
    pub url: String,
    /// 日志中使用的名称
    #[serde(default)]
    pub name: Option<String>,
    /// 超时时间（秒）
    #[serde(default = "default_timeout", rename = "timeout")]
    pub timeout_secs: u64,
    #[serde(flatten)]
    pub flags: NotifyFlags,
    /// 为空时无条件通知
    #[serde(default)]
    pub macros: Vec<Macro>,
}

impl Webhook {
    /// 只有 URL 的 webhook（所有状态开关关闭）
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            flags: NotifyFlags::default(),
            macros: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_flags(mut self, flags: NotifyFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_macro(mut self, template: impl Into<String>, value: impl Into<String>) -> Self {
        self.macros.push(Macro::new(template, value));
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// 日志中的标识
    pub fn identity(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.url)
    }
}

impl std::fmt::Display for Webhook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.identity())
    }
}
