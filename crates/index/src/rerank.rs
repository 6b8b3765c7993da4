//! Optional LLM re-rank pass over retrieved candidates.

use repolens_core::error::StructuredOutputError;
use repolens_core::{Message, Provider, ProviderRequest, RetrievedContext, parse_structured};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

const PREVIEW_CHARS: usize = 500;
const RERANK_MAX_TOKENS: u32 = 512;
const DEFAULT_THRESHOLD: usize = 5;

/// Task label used when the caller has no analysis goal.
pub const GENERAL_TASK: &str = "code search";

/// Why a model-proposed ordering was rejected.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum OrderingError {
    #[error("index {index} out of range for {len} candidates")]
    OutOfRange { index: usize, len: usize },

    #[error("index {0} listed more than once")]
    Duplicate(usize),
}

/// Asks a chat model to order candidates by relevance.
///
/// Any failure (provider error, unparseable reply, invalid indices) returns
/// the candidates in the order they arrived.
pub struct LlmReranker {
    provider: Arc<dyn Provider>,
    model: String,
    threshold: usize,
}

impl LlmReranker {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Re-rank only when more than `threshold` candidates are present.
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn applies_to(&self, candidates: usize) -> bool {
        candidates > self.threshold
    }

    /// Order `candidates` for `query`. `task` names what the context is
    /// for (an analysis goal such as `debug`, or [`GENERAL_TASK`]).
    pub async fn rerank(
        &self,
        query: &str,
        task: &str,
        candidates: Vec<RetrievedContext>,
    ) -> Vec<RetrievedContext> {
        if !self.applies_to(candidates.len()) {
            return candidates;
        }

        let request = ProviderRequest::new(
            self.model.clone(),
            vec![Message::user(build_prompt(query, task, &candidates))],
        )
        .with_sampling(0.0, RERANK_MAX_TOKENS);

        let reply = match self.provider.complete(request).await {
            Ok(response) => response.message.content,
            Err(e) => {
                warn!(error = %e, "Re-rank call failed, keeping similarity order");
                return candidates;
            }
        };

        let order: Vec<usize> = match parse_structured(&reply) {
            Ok(order) => order,
            Err(StructuredOutputError::Empty) => {
                warn!("Re-rank reply was empty, keeping similarity order");
                return candidates;
            }
            Err(e) => {
                warn!(error = %e, "Re-rank reply unparseable, keeping similarity order");
                return candidates;
            }
        };

        match apply_ordering(candidates.clone(), &order) {
            Ok(reordered) => {
                debug!(?order, "Applied re-rank ordering");
                reordered
            }
            Err(e) => {
                warn!(error = %e, "Re-rank ordering invalid, keeping similarity order");
                candidates
            }
        }
    }
}

fn build_prompt(query: &str, task: &str, candidates: &[RetrievedContext]) -> String {
    let listing: Vec<String> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let preview: String = c.content.chars().take(PREVIEW_CHARS).collect();
            format!("[{i}] {}\n{preview}", c.metadata.file_path)
        })
        .collect();

    format!(
        "You are ranking context for a {task} task.\n\
         Rank these code snippets by relevance to the query: \"{query}\"\n\n{}\n\n\
         Return ONLY a JSON array of the 0-based snippet indices, most relevant first. \
         Example: [2, 0, 1]",
        listing.join("\n\n")
    )
}

/// Reorder by `order`. Unlisted candidates follow in their original order.
pub fn apply_ordering(
    candidates: Vec<RetrievedContext>,
    order: &[usize],
) -> Result<Vec<RetrievedContext>, OrderingError> {
    let len = candidates.len();
    let mut seen = HashSet::with_capacity(order.len());
    for &index in order {
        if index >= len {
            return Err(OrderingError::OutOfRange { index, len });
        }
        if !seen.insert(index) {
            return Err(OrderingError::Duplicate(index));
        }
    }

    let mut slots: Vec<Option<RetrievedContext>> = candidates.into_iter().map(Some).collect();
    let mut reordered: Vec<RetrievedContext> =
        order.iter().filter_map(|&i| slots[i].take()).collect();
    reordered.extend(slots.into_iter().flatten());
    Ok(reordered)
}
