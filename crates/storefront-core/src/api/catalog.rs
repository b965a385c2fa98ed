//! Catalog endpoints: resources, pagination and reviews.

use serde::Serialize;
use tracing::debug;

use super::client::SessionClient;
use super::ApiError;
use crate::models::{NewReview, Page, Resource, Review};

const RESOURCES_ENDPOINT: &str = "resources";
const REVIEWS_ENDPOINT: &str = "reviews";

/// Number of entries the home page shows as "popular".
pub const DEFAULT_POPULAR_LIMIT: usize = 4;

#[derive(Clone)]
pub struct CatalogApi {
    client: SessionClient,
}

impl CatalogApi {
    pub fn new(client: SessionClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, page: u32) -> Result<Page<Resource>, ApiError> {
        self.client
            .get(&format!("{}?page={}", RESOURCES_ENDPOINT, page.max(1)))
            .await
    }

    /// Highest-rated entries from the first page. Unrated entries count as 0.
    pub async fn popular(&self, limit: usize) -> Result<Vec<Resource>, ApiError> {
        let page = self.list(1).await?;
        Ok(Self::top_rated(page.data, limit))
    }

    fn top_rated(mut resources: Vec<Resource>, limit: usize) -> Vec<Resource> {
        // Stable sort keeps server order among equal ratings
        resources.sort_by(|a, b| b.rating().total_cmp(&a.rating()));
        resources.truncate(limit);
        resources
    }

    pub async fn get(&self, id: i64) -> Result<Resource, ApiError> {
        self.client
            .get(&format!("{}/{}", RESOURCES_ENDPOINT, id))
            .await
    }

    pub async fn create<B: Serialize>(&self, resource: &B) -> Result<Resource, ApiError> {
        self.client.post(RESOURCES_ENDPOINT, resource).await
    }

    pub async fn update<B: Serialize>(&self, id: i64, resource: &B) -> Result<Resource, ApiError> {
        self.client
            .put(&format!("{}/{}", RESOURCES_ENDPOINT, id), resource)
            .await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.client
            .delete(&format!("{}/{}", RESOURCES_ENDPOINT, id))
            .await
    }

    // ===== Reviews =====

    pub async fn create_review(
        &self,
        resource_id: i64,
        review: &NewReview,
    ) -> Result<Review, ApiError> {
        self.client
            .post(
                &format!("{}/{}/{}", RESOURCES_ENDPOINT, resource_id, REVIEWS_ENDPOINT),
                review,
            )
            .await
    }

    pub async fn update_review(&self, review_id: i64, review: &NewReview) -> Result<Review, ApiError> {
        self.client
            .put(&format!("{}/{}", REVIEWS_ENDPOINT, review_id), review)
            .await
    }

    pub async fn delete_review(&self, review_id: i64) -> Result<(), ApiError> {
        self.client
            .delete(&format!("{}/{}", REVIEWS_ENDPOINT, review_id))
            .await
    }
}

/// Accumulates catalog pages for infinite scrolling.
///
/// Loading page 1 replaces whatever was loaded before; later pages append.
#[derive(Debug, Default)]
pub struct ResourceFeed {
    items: Vec<Resource>,
    current_page: u32,
    last_page: u32,
}

impl ResourceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Resource] {
        &self.items
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn last_page(&self) -> u32 {
        self.last_page
    }

    pub fn has_more(&self) -> bool {
        self.current_page == 0 || self.current_page < self.last_page
    }

    pub fn absorb(&mut self, page: Page<Resource>) {
        if page.current_page <= 1 {
            self.items = page.data;
        } else {
            self.items.extend(page.data);
        }
        self.current_page = page.current_page;
        self.last_page = page.last_page;
    }

    /// Reload from the first page.
    pub async fn reload(&mut self, api: &CatalogApi) -> Result<(), ApiError> {
        let page = api.list(1).await?;
        self.absorb(page);
        Ok(())
    }

    /// Fetch the next page, if any. Returns whether a page was loaded.
    pub async fn load_more(&mut self, api: &CatalogApi) -> Result<bool, ApiError> {
        if !self.has_more() {
            return Ok(false);
        }
        let next = self.current_page + 1;
        debug!(page = next, "Loading catalog page");
        let page = api.list(next).await?;
        self.absorb(page);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(id: i64, rating: Option<f64>) -> Resource {
        Resource {
            id,
            name: format!("item {}", id),
            description: None,
            price: None,
            stock: None,
            average_rating: rating,
            reviews: vec![],
            user: None,
        }
    }

    fn page(current: u32, last: u32, ids: &[i64]) -> Page<Resource> {
        Page {
            data: ids.iter().map(|&id| resource(id, None)).collect(),
            current_page: current,
            last_page: last,
        }
    }

    #[test]
    fn test_top_rated_sorts_and_truncates() {
        let list = vec![
            resource(1, Some(3.0)),
            resource(2, None),
            resource(3, Some(4.5)),
            resource(4, Some(1.0)),
            resource(5, Some(4.5)),
        ];
        let ids: Vec<i64> = CatalogApi::top_rated(list, DEFAULT_POPULAR_LIMIT)
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![3, 5, 1, 4]);
    }

    #[test]
    fn test_feed_appends_then_resets() {
        let mut feed = ResourceFeed::new();
        assert!(feed.has_more());

        feed.absorb(page(1, 2, &[1, 2]));
        feed.absorb(page(2, 2, &[3]));
        assert_eq!(feed.items().len(), 3);
        assert!(!feed.has_more());

        feed.absorb(page(1, 3, &[9]));
        assert_eq!(feed.items().len(), 1);
        assert_eq!(feed.items()[0].id, 9);
        assert_eq!(feed.last_page(), 3);
        assert!(feed.has_more());
    }
}
