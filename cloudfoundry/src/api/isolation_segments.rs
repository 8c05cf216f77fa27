//! Isolation segment API implementation

use serde::{Deserialize, Serialize};

use super::client::Client;
use super::common::{ListOptions, Metadata, MetadataRequest, ToManyRelationship};
use super::error::ApiError;

#[derive(Debug, Clone, Deserialize)]
pub struct IsolationSegment {
    pub guid: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Default, Serialize)]
pub struct IsolationSegmentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "MetadataRequest::is_empty")]
    pub metadata: MetadataRequest,
}

pub struct IsolationSegmentsApi<'a> {
    client: &'a Client,
}

impl<'a> IsolationSegmentsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /v3/isolation_segments
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<IsolationSegment>, ApiError> {
        self.client.list_all("/v3/isolation_segments", options).await
    }

    /// GET /v3/isolation_segments/{guid}
    pub async fn get(&self, guid: &str) -> Result<IsolationSegment, ApiError> {
        self.client
            .get(&format!("/v3/isolation_segments/{}", guid))
            .await
    }

    /// POST /v3/isolation_segments
    pub async fn create(&self, request: &IsolationSegmentRequest) -> Result<IsolationSegment, ApiError> {
        self.client.post("/v3/isolation_segments", request).await
    }

    /// PATCH /v3/isolation_segments/{guid}
    pub async fn update(
        &self,
        guid: &str,
        request: &IsolationSegmentRequest,
    ) -> Result<IsolationSegment, ApiError> {
        self.client
            .patch(&format!("/v3/isolation_segments/{}", guid), request)
            .await
    }

    /// DELETE /v3/isolation_segments/{guid}
    pub async fn delete(&self, guid: &str) -> Result<(), ApiError> {
        self.client
            .delete_and_wait(&format!("/v3/isolation_segments/{}", guid))
            .await
    }

    /// GET /v3/isolation_segments/{guid}/relationships/organizations
    pub async fn entitled_organizations(&self, guid: &str) -> Result<Vec<String>, ApiError> {
        let relationship: ToManyRelationship = self
            .client
            .get(&format!(
                "/v3/isolation_segments/{}/relationships/organizations",
                guid
            ))
            .await?;
        Ok(relationship.guids())
    }

    /// POST /v3/isolation_segments/{guid}/relationships/organizations
    pub async fn entitle_organizations(
        &self,
        guid: &str,
        org_guids: &[String],
    ) -> Result<Vec<String>, ApiError> {
        let relationship: ToManyRelationship = self
            .client
            .post(
                &format!(
                    "/v3/isolation_segments/{}/relationships/organizations",
                    guid
                ),
                &ToManyRelationship::new(org_guids.iter().cloned()),
            )
            .await?;
        Ok(relationship.guids())
    }

    /// DELETE /v3/isolation_segments/{guid}/relationships/organizations/{org}
    pub async fn revoke_organization(&self, guid: &str, org_guid: &str) -> Result<(), ApiError> {
        self.client
            .delete(&format!(
                "/v3/isolation_segments/{}/relationships/organizations/{}",
                guid, org_guid
            ))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use crate::api::test_helpers::create_test_client;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn entitle_then_revoke() {
        let mut server = Server::new_async().await;
        let entitle = server
            .mock("POST", "/v3/isolation_segments/iso-1/relationships/organizations")
            .match_body(Matcher::Json(serde_json::json!({"data": [{"guid": "org-1"}]})))
            .with_body(r#"{"data":[{"guid":"org-1"}],"links":{}}"#)
            .create_async()
            .await;
        let revoke = server
            .mock(
                "DELETE",
                "/v3/isolation_segments/iso-1/relationships/organizations/org-2",
            )
            .with_status(204)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let api = client.isolation_segments();
        let orgs = api
            .entitle_organizations("iso-1", &["org-1".to_string()])
            .await
            .unwrap();
        assert_eq!(orgs, vec!["org-1"]);
        api.revoke_organization("iso-1", "org-2").await.unwrap();

        entitle.assert_async().await;
        revoke.assert_async().await;
    }
}
