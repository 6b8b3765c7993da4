//! The embedding collaborator.

use crate::error::ProviderError;
use async_trait::async_trait;

/// Converts one text into a fixed-length vector.
///
/// Implementations own truncation, timeouts and retry; callers batch and
/// fan out requests themselves.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError>;
}
