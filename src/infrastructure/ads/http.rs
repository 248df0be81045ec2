use crate::domain::ports::ads_platform::{AdsPlatform, ApplyReceipt, ChangeRequest, PlatformError};
use crate::domain::values::metrics::from_micros;
use crate::domain::values::targeting::{MatchType, Placement};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// Sponsored Products client speaking the v3 JSON API.
pub struct HttpAdsPlatform {
    client: Client,
    base_url: String,
    client_id: String,
    access_token: String,
    timeout_secs: u64,
}

impl HttpAdsPlatform {
    pub fn new(base_url: String, client_id: String, access_token: String, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .user_agent("adpilot/0.1")
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id,
            access_token,
            timeout_secs,
        }
    }

    async fn send(&self, profile_id: &str, method: reqwest::Method, path: &str, body: Value) -> Result<Value, PlatformError> {
        let resp = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(&self.access_token)
            .header("Amazon-Advertising-API-ClientId", &self.client_id)
            .header("Amazon-Advertising-API-Scope", profile_id)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PlatformError::Timeout(self.timeout_secs)
                } else {
                    PlatformError::Transient(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PlatformError::from_status(status.as_u16(), body));
        }
        resp.json()
            .await
            .map_err(|e| PlatformError::Permanent(format!("unreadable response: {e}")))
    }
}

fn match_type_code(m: MatchType) -> &'static str {
    match m {
        MatchType::Exact => "EXACT",
        MatchType::Phrase => "PHRASE",
        MatchType::Broad => "BROAD",
        MatchType::NegativeExact => "NEGATIVE_EXACT",
        MatchType::NegativePhrase => "NEGATIVE_PHRASE",
    }
}

fn placement_code(p: Placement) -> &'static str {
    match p {
        Placement::TopOfSearch => "PLACEMENT_TOP",
        Placement::ProductPages => "PLACEMENT_PRODUCT_PAGE",
        Placement::RestOfSearch => "PLACEMENT_REST_OF_SEARCH",
    }
}

/// Multi-status bodies report per-item errors with a 207; the first item is ours.
fn read_multi_status(resource: &str, id_field: &str, body: &Value) -> Result<ApplyReceipt, PlatformError> {
    let section = &body[resource];
    if let Some(err) = section["error"].as_array().and_then(|e| e.first()) {
        let reason = err["errors"][0]["errorType"]
            .as_str()
            .or_else(|| err["errors"][0]["errorValue"]["message"].as_str())
            .unwrap_or("rejected");
        return Err(PlatformError::Validation(format!("{resource}: {reason}")));
    }
    let created = section["success"][0][id_field].as_str().map(String::from);
    Ok(ApplyReceipt {
        created_entity_id: created,
    })
}

#[async_trait]
impl AdsPlatform for HttpAdsPlatform {
    fn name(&self) -> &str {
        "amazon-ads"
    }

    async fn apply(&self, profile_id: &str, change: &ChangeRequest) -> Result<ApplyReceipt, PlatformError> {
        use reqwest::Method;

        let (method, path, resource, id_field, body) = match change {
            ChangeRequest::PauseCampaign { campaign_id } => (
                Method::PUT,
                "/sp/campaigns",
                "campaigns",
                "campaignId",
                json!({"campaigns": [{"campaignId": campaign_id, "state": "PAUSED"}]}),
            ),
            ChangeRequest::EnableCampaign { campaign_id } => (
                Method::PUT,
                "/sp/campaigns",
                "campaigns",
                "campaignId",
                json!({"campaigns": [{"campaignId": campaign_id, "state": "ENABLED"}]}),
            ),
            ChangeRequest::CreateKeyword { campaign_id, ad_group_id, keyword_text, match_type, bid_micros } => (
                Method::POST,
                "/sp/keywords",
                "keywords",
                "keywordId",
                json!({"keywords": [{
                    "campaignId": campaign_id,
                    "adGroupId": ad_group_id,
                    "keywordText": keyword_text,
                    "matchType": match_type_code(*match_type),
                    "bid": from_micros(*bid_micros),
                    "state": "ENABLED",
                }]}),
            ),
            ChangeRequest::ArchiveKeyword { keyword_id } => (
                Method::POST,
                "/sp/keywords/delete",
                "keywords",
                "keywordId",
                json!({"keywordIdFilter": {"include": [keyword_id]}}),
            ),
            ChangeRequest::CreateNegativeKeyword { campaign_id, ad_group_id: Some(ad_group_id), keyword_text, match_type } => (
                Method::POST,
                "/sp/negativeKeywords",
                "negativeKeywords",
                "negativeKeywordId",
                json!({"negativeKeywords": [{
                    "campaignId": campaign_id,
                    "adGroupId": ad_group_id,
                    "keywordText": keyword_text,
                    "matchType": match_type_code(*match_type),
                    "state": "ENABLED",
                }]}),
            ),
            ChangeRequest::CreateNegativeKeyword { campaign_id, ad_group_id: None, keyword_text, match_type } => (
                Method::POST,
                "/sp/campaignNegativeKeywords",
                "campaignNegativeKeywords",
                "campaignNegativeKeywordId",
                json!({"campaignNegativeKeywords": [{
                    "campaignId": campaign_id,
                    "keywordText": keyword_text,
                    "matchType": match_type_code(*match_type),
                    "state": "ENABLED",
                }]}),
            ),
            ChangeRequest::ArchiveNegativeKeyword { ad_group_id: Some(_), negative_keyword_id, .. } => (
                Method::POST,
                "/sp/negativeKeywords/delete",
                "negativeKeywords",
                "negativeKeywordId",
                json!({"negativeKeywordIdFilter": {"include": [negative_keyword_id]}}),
            ),
            ChangeRequest::ArchiveNegativeKeyword { ad_group_id: None, negative_keyword_id, .. } => (
                Method::POST,
                "/sp/campaignNegativeKeywords/delete",
                "campaignNegativeKeywords",
                "campaignNegativeKeywordId",
                json!({"campaignNegativeKeywordIdFilter": {"include": [negative_keyword_id]}}),
            ),
            ChangeRequest::SetKeywordBid { keyword_id, bid_micros } => (
                Method::PUT,
                "/sp/keywords",
                "keywords",
                "keywordId",
                json!({"keywords": [{"keywordId": keyword_id, "bid": from_micros(*bid_micros)}]}),
            ),
            ChangeRequest::SetTargetBid { target_id, bid_micros } => (
                Method::PUT,
                "/sp/targets",
                "targetingClauses",
                "targetId",
                json!({"targetingClauses": [{"targetId": target_id, "bid": from_micros(*bid_micros)}]}),
            ),
            ChangeRequest::SetPlacementAdjust { campaign_id, placement, percentage } => (
                Method::PUT,
                "/sp/campaigns",
                "campaigns",
                "campaignId",
                json!({"campaigns": [{
                    "campaignId": campaign_id,
                    "dynamicBidding": {"placementBidding": [{
                        "placement": placement_code(*placement),
                        "percentage": percentage,
                    }]},
                }]}),
            ),
            ChangeRequest::SetCampaignBudget { campaign_id, budget_micros } => (
                Method::PUT,
                "/sp/campaigns",
                "campaigns",
                "campaignId",
                json!({"campaigns": [{
                    "campaignId": campaign_id,
                    "budget": {"budget": from_micros(*budget_micros), "budgetType": "DAILY"},
                }]}),
            ),
        };

        tracing::debug!(op = change.op(), path, "calling ads API");
        let response = self.send(profile_id, method, path, body).await?;
        let mut receipt = read_multi_status(resource, id_field, &response)?;
        // Only creations hand back an id worth keeping for revert.
        if !matches!(
            change,
            ChangeRequest::CreateKeyword { .. } | ChangeRequest::CreateNegativeKeyword { .. }
        ) {
            receipt.created_entity_id = None;
        }
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_status_success_returns_created_id() {
        let body = json!({"keywords": {"success": [{"index": 0, "keywordId": "kw-77"}], "error": []}});
        let receipt = read_multi_status("keywords", "keywordId", &body).unwrap();
        assert_eq!(receipt.created_entity_id.as_deref(), Some("kw-77"));
    }

    #[test]
    fn test_multi_status_item_error_is_validation() {
        let body = json!({"keywords": {"success": [], "error": [{"index": 0, "errors": [{"errorType": "duplicateValueError"}]}]}});
        let err = read_multi_status("keywords", "keywordId", &body).unwrap_err();
        assert_eq!(err, PlatformError::Validation("keywords: duplicateValueError".into()));
    }
}
