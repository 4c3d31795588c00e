//! 1:N identification
//!
//! Probes are compared against every stored finger template, identity by
//! identity, probe by probe, chunk by chunk. The first comparison scoring
//! strictly above the threshold ends the search: this is first-match, not
//! best-match.

use crate::capability::{Scanner, TEMPLATE_SIZE};
use crate::error::FlowError;
use crate::models::{IdentificationOutcome, Identity};
use crate::services::template_repository::TemplateRepository;
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct IdentificationMatcher {
    scanner: Arc<dyn Scanner>,
    repository: Arc<dyn TemplateRepository>,
    threshold: i32,
}

impl IdentificationMatcher {
    pub fn new(
        scanner: Arc<dyn Scanner>,
        repository: Arc<dyn TemplateRepository>,
        threshold: i32,
    ) -> Self {
        Self {
            scanner,
            repository,
            threshold,
        }
    }

    /// Search the repository for the first stored template matching a probe
    ///
    /// Fails with [`FlowError::RemoteStoreUnavailable`] when the repository
    /// cannot be read; an empty repository is a normal `NotFound`.
    pub async fn identify(&self, probes: &[Vec<u8>]) -> Result<IdentificationOutcome, FlowError> {
        let identities = self.repository.fetch_all().await.map_err(|e| {
            warn!(error = %e, "Template repository unavailable");
            FlowError::RemoteStoreUnavailable(e.to_string())
        })?;

        info!(
            probes = probes.len(),
            identities = identities.len(),
            threshold = self.threshold,
            "Starting 1:N identification"
        );

        let mut comparisons = 0usize;
        for identity in &identities {
            let Some(encoded) = identity.combined_template_base64.as_deref() else {
                debug!(id_number = %identity.id_number, "Identity has no template, skipped");
                continue;
            };
            let stored = match general_purpose::STANDARD.decode(encoded) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(id_number = %identity.id_number, error = %e, "Undecodable template, skipped");
                    continue;
                }
            };

            let chunks = stored.chunks_exact(TEMPLATE_SIZE);
            if !chunks.remainder().is_empty() {
                warn!(
                    id_number = %identity.id_number,
                    offset = stored.len() - chunks.remainder().len(),
                    trailing = chunks.remainder().len(),
                    "Incomplete stored template chunk skipped"
                );
            }

            for probe in probes {
                for chunk in stored.chunks_exact(TEMPLATE_SIZE) {
                    comparisons += 1;
                    let score = self.scanner.compare_templates(probe, chunk);
                    if score > self.threshold {
                        info!(
                            name = %identity.name,
                            id_number = %identity.id_number,
                            score,
                            comparisons,
                            "Identification match"
                        );
                        return Ok(IdentificationOutcome::Found {
                            identity: Identity {
                                name: identity.name.clone(),
                                id_number: identity.id_number.clone(),
                            },
                            score,
                            comparisons,
                        });
                    }
                }
            }
        }

        info!(comparisons, "No identification match");
        Ok(IdentificationOutcome::NotFound { comparisons })
    }
}
