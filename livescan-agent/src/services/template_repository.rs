//! Remote template repository client
//!
//! The repository is an HTTP service owned by the enrollment back office.
//! The agent performs exactly one bulk read per identification:
//!
//! `GET {base_url}/get-all-templates` →
//! `{"success": true, "data": [{"name", "id_number", "combined_template_base64"}]}`

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("livescan-agent/", env!("CARGO_PKG_VERSION"));

/// Repository read errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Repository returned HTTP {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Repository reported failure")]
    Rejected,

    #[error("Repository response has no data")]
    MissingData,
}

/// One enrolled person as stored remotely
#[derive(Debug, Clone, Deserialize)]
pub struct EnrolledIdentity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id_number: String,
    /// Concatenated 1024-byte templates, base64
    #[serde(default)]
    pub combined_template_base64: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TemplatesResponse {
    #[serde(default)]
    success: bool,
    data: Option<Vec<EnrolledIdentity>>,
}

/// Bulk read access to enrolled templates
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<EnrolledIdentity>, RepositoryError>;
}

/// [`TemplateRepository`] backed by the repository's HTTP API
pub struct HttpTemplateRepository {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpTemplateRepository {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RepositoryError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| RepositoryError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/get-all-templates", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TemplateRepository for HttpTemplateRepository {
    async fn fetch_all(&self) -> Result<Vec<EnrolledIdentity>, RepositoryError> {
        tracing::debug!(endpoint = %self.endpoint, "Fetching enrolled templates");

        let response = self
            .http_client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| RepositoryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RepositoryError::Status(status.as_u16()));
        }

        let body: TemplatesResponse = response
            .json()
            .await
            .map_err(|e| RepositoryError::Parse(e.to_string()))?;

        if !body.success {
            return Err(RepositoryError::Rejected);
        }
        let identities = body.data.ok_or(RepositoryError::MissingData)?;

        tracing::info!(identities = identities.len(), "Enrolled templates fetched");
        Ok(identities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_url() {
        let repo =
            HttpTemplateRepository::new("http://localhost:3000/api/", Duration::from_secs(5))
                .unwrap();
        assert_eq!(repo.endpoint(), "http://localhost:3000/api/get-all-templates");
    }

    #[test]
    fn test_response_without_template_field() {
        let body: TemplatesResponse = serde_json::from_str(
            r#"{"success": true, "data": [{"name": "Budi", "id_number": "7301"}]}"#,
        )
        .unwrap();
        let data = body.data.unwrap();
        assert_eq!(data[0].id_number, "7301");
        assert!(data[0].combined_template_base64.is_none());
    }
}
