//! 错误类型定义
//!
//! 只有宏求值失败会中断一次通知；其余错误都在本地恢复并写入日志。

use std::io;

/// 通知流程错误
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Macro evaluation failed for template '{template}': {source}")]
    MacroEvaluation {
        template: String,
        #[source]
        source: MacroError,
    },

    #[error("Failed to serialize card: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// 宏展开错误
#[derive(Debug, thiserror::Error)]
pub enum MacroError {
    #[error("Unrecognized macro '{0}'")]
    UnknownToken(String),

    #[error("Malformed template: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// 宿主提供的展开引擎被中断（内置的 `TokenMacroExpander` 不会产生）
    #[error("Macro evaluation interrupted")]
    Interrupted,
}

/// HTTP 投递错误
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("request failed: {0}")]
    Request(String),

    #[error("endpoint responded with HTTP {0}")]
    Status(u16),

    #[error("dispatch queue is full ({0} pending)")]
    Rejected(usize),
}

impl TransportError {
    /// 错误类别（用于日志）
    pub fn category(&self) -> &'static str {
        match self {
            TransportError::Timeout(_) => "timeout",
            TransportError::Request(_) => "request",
            TransportError::Status(_) => "status",
            TransportError::Rejected(_) => "rejected",
        }
    }
}

/// SCM 信息读取错误（culprits / change set）
#[derive(Debug, thiserror::Error)]
pub enum ScmError {
    #[error("change set is not available for this build: {0}")]
    Unavailable(String),

    #[error("incompatible build record: {0}")]
    Incompatible(String),
}
