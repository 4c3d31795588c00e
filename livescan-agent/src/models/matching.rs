//! Verification and identification results

use serde::Serialize;

/// Enrolled person as returned by the template repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub name: String,
    pub id_number: String,
}

/// Outcome of one 1:N identification run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentificationOutcome {
    /// First comparison above the identification threshold
    Found {
        identity: Identity,
        score: i32,
        comparisons: usize,
    },
    /// Every stored template compared, none above the threshold
    NotFound { comparisons: usize },
}

/// Result of a 1:1 verification or a 1:N identification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub success: bool,
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MatchResult {
    /// Verification score against a threshold (`score >= threshold` matches)
    pub fn verification(score: i32, threshold: i32) -> Self {
        let matched = score >= threshold;
        Self {
            success: true,
            matched,
            score: Some(score),
            identity: None,
            message: Some(if matched {
                "Fingerprints match".to_string()
            } else {
                "Fingerprints do not match".to_string()
            }),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            matched: false,
            score: None,
            identity: None,
            message: Some(message.into()),
        }
    }
}

impl From<IdentificationOutcome> for MatchResult {
    fn from(outcome: IdentificationOutcome) -> Self {
        match outcome {
            IdentificationOutcome::Found {
                identity, score, ..
            } => Self {
                success: true,
                matched: true,
                score: Some(score),
                message: Some(format!("Identified {}", identity.name)),
                identity: Some(identity),
            },
            IdentificationOutcome::NotFound { .. } => Self {
                success: true,
                matched: false,
                score: None,
                identity: None,
                message: Some("No matching fingerprint found".to_string()),
            },
        }
    }
}
