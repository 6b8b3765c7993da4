//! Global in-flight limit over a provider.

use async_trait::async_trait;
use repolens_core::error::ProviderError;
use repolens_core::provider::*;
use repolens_core::Provider;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::trace;

pub const DEFAULT_MAX_IN_FLIGHT: usize = 10;

/// Wraps a provider so at most `max_in_flight` calls run at once.
///
/// One semaphore covers chat, streaming and embedding calls. A stream holds
/// its permit until the last chunk is forwarded.
pub struct ThrottledProvider {
    inner: Arc<dyn Provider>,
    permits: Arc<Semaphore>,
}

impl ThrottledProvider {
    pub fn new(inner: Arc<dyn Provider>, max_in_flight: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    async fn acquire(&self) -> Result<tokio::sync::OwnedSemaphorePermit, ProviderError> {
        trace!(available = self.permits.available_permits(), "Waiting for provider permit");
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ProviderError::NotConfigured("provider throttle closed".into()))
    }
}

#[async_trait]
impl Provider for ThrottledProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let _permit = self.acquire().await?;
        self.inner.complete(request).await
    }

    async fn stream(&self, request: ProviderRequest) -> Result<StreamReceiver, ProviderError> {
        let permit = self.acquire().await?;
        let mut upstream = self.inner.stream(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(64);
        tokio::spawn(async move {
            let _permit = permit;
            while let Some(item) = upstream.recv().await {
                if tx.send(item).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        let _permit = self.acquire().await?;
        self.inner.embed(request).await
    }
}
