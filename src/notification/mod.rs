//! 构建通知 - 状态分类、facts 收集、卡片组装、规则评估和 webhook 投递
//!
//! # 流程
//! 1. `BuildNotifier` 收到构建开始 / 完成 / 自定义消息事件
//! 2. `CardAssembler` 调用状态分类和 `FactsBuilder` 组装卡片
//! 3. `RuleEvaluator` 按 webhook 判断是否需要发送
//! 4. `WebhookDispatcher` 并发投递，单个 webhook 失败不影响其他 webhook
//!
//! # 使用示例
//! ```ignore
//! use ci_webhook_notifier::notification::{BuildNotifier, HttpTransport, TokenMacroExpander, WebhookDispatcher};
//!
//! let dispatcher = WebhookDispatcher::new(HttpTransport::new()?, 8);
//! let notifier = BuildNotifier::new(Some(webhooks), dispatcher, Box::new(TokenMacroExpander::new()));
//! notifier.on_build_completed(&build)?.join().await;
//! ```

pub mod assembler;
pub mod card;
pub mod dispatcher;
pub mod facts;
pub mod macros;
pub mod notifier;
pub mod rules;
pub mod status;
pub mod transport;
pub mod webhook;

pub use assembler::{CardAssembler, MessageParameters};
pub use card::{Card, Fact, PotentialAction, Section};
pub use dispatcher::{DispatchBatch, SendResult, WebhookDispatcher, DEFAULT_MAX_IN_FLIGHT, DEFAULT_MAX_QUEUED};
pub use facts::FactsBuilder;
pub use macros::{MacroExpander, TokenMacroExpander};
pub use notifier::BuildNotifier;
pub use rules::{is_status_matched, RuleEvaluator, TriggerKind};
pub use status::{classify, StatusClassification, ThemeColor};
pub use transport::{HttpTransport, WebhookTransport};
pub use webhook::{Macro, NotifyFlags, Webhook};
