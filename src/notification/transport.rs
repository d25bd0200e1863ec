//! HTTP 投递 - 把序列化后的卡片 POST 到 webhook

use crate::error::TransportError;
use reqwest::Client;
use std::future::Future;
use std::time::Duration;

/// 投递能力（测试中可替换为 mock）
pub trait WebhookTransport: Send + Sync + 'static {
    /// 在 `timeout` 内把 `body` 发送到 `url`
    fn post(&self, url: &str, body: String, timeout: Duration)
        -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// 基于 reqwest 的实现（共享连接池）
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!("ci-webhook-notifier/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl WebhookTransport for HttpTransport {
    async fn post(&self, url: &str, body: String, timeout: Duration) -> Result<(), TransportError> {
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(timeout.as_secs())
                } else {
                    TransportError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Status(status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_transport_builds() {
        assert!(HttpTransport::new().is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_request_error() {
        let transport = HttpTransport::new().unwrap();
        let err = transport
            .post("http://127.0.0.1:9/hook", "{}".to_string(), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Request(_) | TransportError::Timeout(_)));
    }
}
