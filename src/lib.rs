//! CI Webhook Notifier - 根据构建结果生成通知卡片并投递到 webhook

pub mod build;
pub mod config;
pub mod error;
pub mod notification;

pub use build::{BuildContext, BuildKind, BuildRecord, BuildResult, BuildSnapshot};
pub use config::NotifierConfig;
pub use error::{MacroError, NotifyError, ScmError, TransportError};
pub use notification::{
    BuildNotifier, Card, CardAssembler, DispatchBatch, HttpTransport, MessageParameters, SendResult,
    TokenMacroExpander, Webhook, WebhookDispatcher,
};
