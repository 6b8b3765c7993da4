//! LLM provider implementations for RepoLens.
//!
//! All backends implement `repolens_core::Provider`. [`build_from_config`] builds
//! the configured one, wrapped in a [`ThrottledProvider`]; [`ProviderEmbedder`]
//! adapts it to the `Embedder` trait.

pub mod embedder;
pub mod factory;
pub mod openai_compat;
pub mod throttle;

pub use embedder::ProviderEmbedder;
pub use factory::{build_embedder, build_from_config};
pub use openai_compat::OpenAiCompatProvider;
pub use throttle::ThrottledProvider;
