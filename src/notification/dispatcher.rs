//! 通知分发器 - 并发投递到多个 webhook，失败只影响对应的 webhook

use super::transport::WebhookTransport;
use super::webhook::Webhook;
use crate::error::TransportError;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// 默认同时进行的投递数量上限
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;
/// 默认排队等待的投递数量上限
pub const DEFAULT_MAX_QUEUED: usize = 64;

/// 发送结果
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    /// 发送成功
    Sent,
    /// 跳过（dry-run）
    Skipped(String),
    /// 发送失败
    Failed(String),
}

enum Pending {
    Running(JoinHandle<SendResult>),
    Finished(SendResult),
}

/// 一次通知提交的所有投递
///
/// 可以等待全部完成，也可以直接丢弃（投递在后台继续）。
#[derive(Default)]
pub struct DispatchBatch {
    entries: Vec<(String, Pending)>,
}

impl DispatchBatch {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 已提交的 webhook 标识
    pub fn webhooks(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// 等待所有投递完成
    pub async fn join(self) -> Vec<(String, SendResult)> {
        let mut results = Vec::with_capacity(self.entries.len());
        for (name, pending) in self.entries {
            let result = match pending {
                Pending::Finished(result) => result,
                Pending::Running(handle) => match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        error!(webhook = %name, error = %e, "Dispatch task aborted");
                        SendResult::Failed(e.to_string())
                    }
                },
            };
            results.push((name, result));
        }
        results
    }
}

/// 通知分发器
///
/// 最多 `max_in_flight` 个投递同时进行，其余在后台排队等待许可；
/// 排队数量超过 `max_queued` 时拒绝并记录日志。
pub struct WebhookDispatcher<T: WebhookTransport> {
    transport: Arc<T>,
    /// 正在投递的许可
    permits: Arc<Semaphore>,
    /// 已接收（投递中 + 排队中）的名额
    slots: Arc<Semaphore>,
    max_in_flight: usize,
    max_queued: usize,
    /// 是否为 dry-run 模式
    dry_run: bool,
}

impl<T: WebhookTransport> WebhookDispatcher<T> {
    /// 创建新的分发器，`max_in_flight` 为同时进行的投递上限
    pub fn new(transport: T, max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            transport: Arc::new(transport),
            permits: Arc::new(Semaphore::new(max_in_flight)),
            slots: Arc::new(Semaphore::new(max_in_flight + DEFAULT_MAX_QUEUED)),
            max_in_flight,
            max_queued: DEFAULT_MAX_QUEUED,
            dry_run: false,
        }
    }

    /// 设置排队上限
    pub fn with_max_queued(mut self, max_queued: usize) -> Self {
        self.max_queued = max_queued;
        self.slots = Arc::new(Semaphore::new(self.max_in_flight + max_queued));
        self
    }

    /// 设置 dry-run 模式
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// 提交一次投递（不等待完成）
    ///
    /// 必须在 tokio runtime 中调用。投递许可用完时在后台排队，排队也满时拒绝。
    pub fn submit(&self, batch: &mut DispatchBatch, webhook: &Webhook, url: String, payload: Arc<str>) {
        let name = webhook.identity().to_string();

        if self.dry_run {
            info!(webhook = %name, url = %url, payload = %payload, "[DRY-RUN] Would notify webhook");
            batch
                .entries
                .push((name, Pending::Finished(SendResult::Skipped("dry-run".to_string()))));
            return;
        }

        let slot = match self.slots.clone().try_acquire_owned() {
            Ok(slot) => slot,
            Err(_) => {
                let e = TransportError::Rejected(self.max_queued);
                warn!(
                    webhook = %name,
                    category = e.category(),
                    error = %e,
                    "Failed to notify webhook"
                );
                batch
                    .entries
                    .push((name, Pending::Finished(SendResult::Failed(e.to_string()))));
                return;
            }
        };

        let transport = self.transport.clone();
        let permits = self.permits.clone();
        let timeout_secs = webhook.timeout_secs;
        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            let _slot = slot;
            let permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!(webhook = %task_name, error = %e, "Dispatch pool closed");
                    return SendResult::Failed(e.to_string());
                }
            };
            deliver(transport.as_ref(), &task_name, &url, &payload, timeout_secs, permit).await
        });

        batch.entries.push((name, Pending::Running(handle)));
    }
}

/// 单次投递，超时和错误都在这里转换为 `SendResult`
async fn deliver<T: WebhookTransport>(
    transport: &T,
    name: &str,
    url: &str,
    payload: &str,
    timeout_secs: u64,
    _permit: OwnedSemaphorePermit,
) -> SendResult {
    let timeout = std::time::Duration::from_secs(timeout_secs);
    let outcome = match tokio::time::timeout(timeout, transport.post(url, payload.to_string(), timeout)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(timeout_secs)),
    };

    match outcome {
        Ok(()) => {
            info!(webhook = %name, "Webhook notified");
            SendResult::Sent
        }
        Err(e) => {
            error!(
                webhook = %name,
                category = e.category(),
                error = %e,
                "Failed to notify webhook"
            );
            SendResult::Failed(e.to_string())
        }
    }
}
