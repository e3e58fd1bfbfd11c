//! Advertisement Handlers

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::actor::{ActorContext, Capability};
use crate::error::ApiError;
use crate::models::{AdStatus, NewAdvertisement};
use crate::services::AdService;

use super::{require, respond, AjaxResponse};

/// Advertisement handler
pub struct AdsHandler {
    ads: Arc<AdService>,
}

impl AdsHandler {
    pub fn new(ads: Arc<AdService>) -> Self {
        Self { ads }
    }

    pub async fn create(&self, ad: NewAdvertisement, actor: &ActorContext) -> AjaxResponse {
        respond(self.try_create(ad, actor).await)
    }

    pub async fn list(&self, actor: &ActorContext) -> AjaxResponse {
        respond(self.try_list(actor).await)
    }

    pub async fn set_status(&self, id: u64, status: AdStatus, actor: &ActorContext) -> AjaxResponse {
        respond(self.try_set_status(id, status, actor).await)
    }

    pub async fn delete(&self, id: u64, actor: &ActorContext) -> AjaxResponse {
        respond(self.try_delete(id, actor).await)
    }

    /// Ads for a front-end placement; public
    pub async fn placement(&self, placement: &str) -> AjaxResponse {
        respond(self.try_placement(placement).await)
    }

    async fn try_create(&self, ad: NewAdvertisement, actor: &ActorContext) -> Result<AjaxResponse, ApiError> {
        require(actor, Capability::ManageOptions)?;
        let ad = self.ads.create(ad).await?;
        Ok(AjaxResponse::with_data("Advertisement created", json!(ad)))
    }

    async fn try_list(&self, actor: &ActorContext) -> Result<AjaxResponse, ApiError> {
        require(actor, Capability::ManageOptions)?;
        let ads = self.ads.list().await?;
        Ok(AjaxResponse::with_data(format!("{} advertisements", ads.len()), json!(ads)))
    }

    async fn try_set_status(&self, id: u64, status: AdStatus, actor: &ActorContext) -> Result<AjaxResponse, ApiError> {
        require(actor, Capability::ManageOptions)?;
        let ad = self.ads.set_status(id, status).await?;
        Ok(AjaxResponse::with_data("Advertisement updated", json!(ad)))
    }

    async fn try_delete(&self, id: u64, actor: &ActorContext) -> Result<AjaxResponse, ApiError> {
        require(actor, Capability::ManageOptions)?;
        self.ads.delete(id).await?;
        Ok(AjaxResponse::ok("Advertisement deleted"))
    }

    async fn try_placement(&self, placement: &str) -> Result<AjaxResponse, ApiError> {
        let ads = self.ads.active_for(placement, Utc::now()).await?;
        let items: Vec<_> = ads
            .iter()
            .map(|ad| json!({ "id": ad.id, "title": ad.title, "content": ad.content }))
            .collect();
        Ok(AjaxResponse::with_data(format!("{} advertisements", items.len()), json!(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::SettingsStore;
    use crate::store::{MemoryAdStore, MemoryOptionStore};

    fn handler() -> AdsHandler {
        let settings = Arc::new(SettingsStore::new(Arc::new(MemoryOptionStore::new())));
        AdsHandler::new(Arc::new(AdService::new(Arc::new(MemoryAdStore::new()), settings)))
    }

    fn ad() -> NewAdvertisement {
        serde_json::from_value(json!({
            "title": "Festival",
            "content": "<a href=\"/tickets\">Tickets</a>",
            "placement": "after_player",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_admin_only_management() {
        let handler = handler();
        assert!(!handler.create(ad(), &ActorContext::anonymous()).await.success);
        assert!(handler.create(ad(), &ActorContext::system()).await.success);

        let placed = handler.placement("after_player").await;
        assert_eq!(placed.data.unwrap().as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let handler = handler();
        let response = handler.delete(9, &ActorContext::system()).await;
        assert!(!response.success);
        assert_eq!(response.message, "Advertisement 9 not found");
    }
}
