//! Integration tests for the catalog and account services

mod common;

use std::sync::Arc;

use serde_json::json;
use storefront_core::auth::MemoryCredentialStore;
use storefront_core::models::{NewReview, Registration};
use storefront_core::{AccountApi, ApiError, CatalogApi, ResourceFeed};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;

fn page_body(current: u32, last: u32, ids: &[i64]) -> serde_json::Value {
    let data: Vec<_> = ids
        .iter()
        .map(|id| json!({ "id": id, "name": format!("item {}", id), "price": "10.00" }))
        .collect();
    json!({ "data": data, "current_page": current, "last_page": last })
}

#[tokio::test]
async fn test_list_reads_pagination_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resources"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(2, 3, &[4, 5])))
        .expect(1)
        .mount(&server)
        .await;

    let catalog = CatalogApi::new(client_for(&server, &Arc::new(MemoryCredentialStore::new())));
    let page = catalog.list(2).await.unwrap();

    assert_eq!(page.current_page, 2);
    assert_eq!(page.last_page, 3);
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.data[0].price, Some(10.0));
}

#[tokio::test]
async fn test_list_rejects_incomplete_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;

    let catalog = CatalogApi::new(client_for(&server, &Arc::new(MemoryCredentialStore::new())));
    let result = catalog.list(1).await;
    assert!(matches!(result, Err(ApiError::MalformedResponse(_))));
}

#[tokio::test]
async fn test_get_missing_resource() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resources/42"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not found" })))
        .mount(&server)
        .await;

    let catalog = CatalogApi::new(client_for(&server, &Arc::new(MemoryCredentialStore::new())));
    match catalog.get(42).await {
        Err(ApiError::NotFound(msg)) => assert_eq!(msg, "Not found"),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_popular_picks_top_rated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resources"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "id": 1, "name": "a", "average_rating": "2.5" },
                { "id": 2, "name": "b" },
                { "id": 3, "name": "c", "average_rating": 4.8 },
                { "id": 4, "name": "d", "average_rating": 3 },
                { "id": 5, "name": "e", "average_rating": 1 }
            ],
            "current_page": 1,
            "last_page": 1
        })))
        .mount(&server)
        .await;

    let catalog = CatalogApi::new(client_for(&server, &Arc::new(MemoryCredentialStore::new())));
    let popular = catalog.popular(3).await.unwrap();
    let ids: Vec<i64> = popular.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![3, 4, 1]);
}

#[tokio::test]
async fn test_feed_walks_pages_until_last() {
    let server = MockServer::start().await;
    for (page, ids) in [(1u32, vec![1, 2]), (2, vec![3, 4]), (3, vec![5])] {
        Mock::given(method("GET"))
            .and(path("/resources"))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(page, 3, &ids)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let catalog = CatalogApi::new(client_for(&server, &Arc::new(MemoryCredentialStore::new())));
    let mut feed = ResourceFeed::new();
    feed.reload(&catalog).await.unwrap();
    while feed.load_more(&catalog).await.unwrap() {}

    assert_eq!(feed.items().len(), 5);
    assert_eq!(feed.current_page(), 3);
    assert!(!feed.has_more());
}

#[tokio::test]
async fn test_review_crud_uses_bearer_token() {
    let server = MockServer::start().await;
    let store = store_with("tok1", "ref1");

    Mock::given(method("POST"))
        .and(path("/resources/7/reviews"))
        .and(header("authorization", "Bearer tok1"))
        .and(body_json(json!({ "rating": 5, "comment": "Great" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 11, "rating": 5, "comment": "Great", "user": { "id": 1, "name": "Ana" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/reviews/11"))
        .and(body_json(json!({ "rating": 4 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 11, "rating": 4 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/reviews/11"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let catalog = CatalogApi::new(client_for(&server, &store));

    let created = catalog
        .create_review(7, &NewReview { rating: 5, comment: Some("Great".to_string()) })
        .await
        .unwrap();
    assert_eq!(created.author_display(), "Ana");

    let updated = catalog
        .update_review(11, &NewReview { rating: 4, comment: None })
        .await
        .unwrap();
    assert_eq!(updated.rating, 4);

    catalog.delete_review(11).await.unwrap();
}

#[tokio::test]
async fn test_register_surfaces_validation_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/register"))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(json!({ "message": "The email has already been taken." })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let account = AccountApi::new(client_for(&server, &Arc::new(MemoryCredentialStore::new())));
    let err = account
        .register(&Registration::new("Ana", "a@b.com", "secret1"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "The email has already been taken.");
}

#[tokio::test]
async fn test_me_recovers_through_refresh() {
    let server = MockServer::start().await;
    let store = store_with("tok1", "ref1");

    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer tok1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens("tok2", "ref2")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer tok2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user()))
        .expect(1)
        .mount(&server)
        .await;

    let account = AccountApi::new(client_for(&server, &store));
    let me = account.me().await.unwrap();
    assert_eq!(me.name, "Ana");
    assert_pair_or_empty(&store);
}
