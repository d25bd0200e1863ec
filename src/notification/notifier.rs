//! 构建通知入口 - 构建开始、构建完成和自定义消息三种触发
//!
//! 流程：组装卡片 -> 逐个 webhook 评估规则 -> 全部评估通过后并发投递。
//! 任一宏条件展开失败时整个通知放弃，不会出现部分投递。

use super::assembler::{CardAssembler, MessageParameters};
use super::dispatcher::{DispatchBatch, WebhookDispatcher};
use super::macros::{build_variables, expand_variables, MacroExpander};
use super::rules::{RuleEvaluator, TriggerKind};
use super::card::Card;
use super::status::previous_result;
use super::transport::WebhookTransport;
use super::webhook::Webhook;
use crate::build::{BuildContext, BuildKind};
use crate::error::NotifyError;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 构建通知器
pub struct BuildNotifier<T: WebhookTransport> {
    /// job 级 webhook 配置；`None` 表示未配置
    webhooks: Option<Vec<Webhook>>,
    dispatcher: WebhookDispatcher<T>,
    expander: Box<dyn MacroExpander>,
}

impl<T: WebhookTransport> BuildNotifier<T> {
    pub fn new(
        webhooks: Option<Vec<Webhook>>,
        dispatcher: WebhookDispatcher<T>,
        expander: Box<dyn MacroExpander>,
    ) -> Self {
        Self {
            webhooks,
            dispatcher,
            expander,
        }
    }

    pub fn webhooks(&self) -> Option<&[Webhook]> {
        self.webhooks.as_deref()
    }

    /// 构建开始
    ///
    /// Freestyle 构建只在 pre-build 阶段通知，pipeline 构建只在主阶段通知。
    pub fn on_build_started(
        &self,
        build: &dyn BuildContext,
        is_pre_build: bool,
    ) -> Result<DispatchBatch, NotifyError> {
        let generate = match build.kind() {
            BuildKind::Freestyle => is_pre_build,
            BuildKind::Pipeline => !is_pre_build,
        };
        if !generate {
            info!(job = %build.job_display_name(), build = build.number(), "Build started card not generated.");
            return Ok(DispatchBatch::default());
        }

        let Some(webhooks) = self.webhooks.as_deref() else {
            return Ok(DispatchBatch::default());
        };

        let card = CardAssembler::new(build).started_card();
        let targets = self.select(build, webhooks, TriggerKind::Started)?;
        self.fan_out(build, &card, &targets)
    }

    /// 构建完成
    pub fn on_build_completed(&self, build: &dyn BuildContext) -> Result<DispatchBatch, NotifyError> {
        let Some(webhooks) = self.webhooks.as_deref() else {
            return Ok(DispatchBatch::default());
        };

        let card = CardAssembler::new(build).completed_card();
        let targets = self.select(build, webhooks, TriggerKind::Completed)?;
        self.fan_out(build, &card, &targets)
    }

    /// Pipeline 步骤发送的自定义消息
    ///
    /// 不做状态和宏过滤：所有已配置的 webhook 都会收到；未配置时使用参数中的 URL。
    pub fn on_custom_message(
        &self,
        build: &dyn BuildContext,
        params: &MessageParameters,
    ) -> Result<DispatchBatch, NotifyError> {
        let card = CardAssembler::new(build).custom_card(params);

        let targets: Vec<Webhook> = match self.webhooks.as_deref() {
            Some(webhooks) => webhooks.to_vec(),
            None => match params.webhook_url.as_deref().map(str::trim) {
                Some(url) if !url.is_empty() => vec![Webhook::new(url)],
                _ => {
                    warn!(
                        job = %build.job_display_name(),
                        build = build.number(),
                        "No webhook configured and no webhook URL supplied"
                    );
                    Vec::new()
                }
            },
        };

        let targets: Vec<&Webhook> = targets.iter().collect();
        self.fan_out(build, &card, &targets)
    }

    /// 评估所有 webhook 的规则；宏展开失败时直接返回错误
    fn select<'w>(
        &self,
        build: &dyn BuildContext,
        webhooks: &'w [Webhook],
        kind: TriggerKind,
    ) -> Result<Vec<&'w Webhook>, NotifyError> {
        let evaluator = RuleEvaluator::new(build, self.expander.as_ref());
        let previous = previous_result(build);

        let mut targets = Vec::new();
        for webhook in webhooks {
            let matched = evaluator.should_notify(webhook, kind, previous).map_err(|e| {
                error!(
                    job = %build.job_display_name(),
                    build = build.number(),
                    webhook = %webhook,
                    error = %e,
                    "Notification aborted"
                );
                e
            })?;

            if matched {
                targets.push(webhook);
            } else {
                debug!(webhook = %webhook, ?kind, "Webhook rules not matched");
            }
        }
        Ok(targets)
    }

    /// 序列化一次卡片，逐个提交投递
    fn fan_out(
        &self,
        build: &dyn BuildContext,
        card: &Card,
        targets: &[&Webhook],
    ) -> Result<DispatchBatch, NotifyError> {
        let mut batch = DispatchBatch::default();
        if targets.is_empty() {
            return Ok(batch);
        }

        let payload: Arc<str> = Arc::from(card.to_json()?);
        let vars = build_variables(build);

        for webhook in targets {
            let url = expand_variables(&webhook.url, &vars);
            self.dispatcher.submit(&mut batch, webhook, url, payload.clone());
        }

        info!(
            job = %build.job_display_name(),
            build = build.number(),
            summary = %card.summary,
            webhooks = batch.len(),
            "Notification submitted"
        );
        Ok(batch)
    }
}
