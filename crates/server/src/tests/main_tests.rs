use super::*;
use axum::{
    body::{self, Body},
    http::Request,
};
use server_api::StaticCatalog;
use shared::error::{CARD_ALREADY_STORED, CARD_LIMIT_REACHED, CARD_STORED, INVALID_REQUEST};
use tower::ServiceExt;

async fn test_app() -> (Router, Storage) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let cards = StaticCatalog::new(vec![Card::new("1", "Pikachu", "url")]).expect("catalog");
    let api = ApiContext {
        storage: storage.clone(),
        cards: Arc::new(cards),
    };
    (build_router(Arc::new(AppState { api })), storage)
}

fn store_request(card: &Card) -> Request<Body> {
    Request::post("/store")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(card).expect("json")))
        .expect("request")
}

async fn text_body(response: axum::response::Response) -> String {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let (app, _storage) = test_app().await;
    let request = Request::get("/healthz").body(Body::empty()).expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text_body(response).await, "ok");
}

#[tokio::test]
async fn random_card_route_returns_flat_card() {
    let (app, _storage) = test_app().await;
    let request = Request::get("/random-card")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let card: Card = serde_json::from_str(&text_body(response).await).expect("json");
    assert_eq!(card, Card::new("1", "Pikachu", "url"));
}

#[tokio::test]
async fn store_then_list_round_trips_through_routes() {
    let (app, _storage) = test_app().await;
    let card = Card::new("xy7-54", "Mock Card", "http://example.com/image.png");

    let response = app
        .clone()
        .oneshot(store_request(&card))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text_body(response).await, CARD_STORED);

    let request = Request::get("/stored").body(Body::empty()).expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let stored: Vec<Card> = serde_json::from_str(&text_body(response).await).expect("json");
    assert_eq!(stored, vec![card]);
}

#[tokio::test]
async fn stored_is_an_empty_array_initially() {
    let (app, _storage) = test_app().await;
    let request = Request::get("/stored").body(Body::empty()).expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(text_body(response).await, "[]");
}

#[tokio::test]
async fn duplicate_store_is_a_conflict_with_plain_text_reason() {
    let (app, storage) = test_app().await;
    let card = Card::new("1", "Pikachu", "url");
    app.clone()
        .oneshot(store_request(&card))
        .await
        .expect("first");

    let response = app.oneshot(store_request(&card)).await.expect("second");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(text_body(response).await, CARD_ALREADY_STORED);
    assert_eq!(storage.list_stored_cards().await.expect("list").len(), 1);
}

#[tokio::test]
async fn seventh_store_is_rejected_with_limit_reason() {
    let (app, _storage) = test_app().await;
    for i in 0..6 {
        let response = app
            .clone()
            .oneshot(store_request(&Card::new(i.to_string(), "c", "u")))
            .await
            .expect("store");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(store_request(&Card::new("7", "c", "u")))
        .await
        .expect("overflow");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(text_body(response).await, CARD_LIMIT_REACHED);
}

#[tokio::test]
async fn malformed_body_is_invalid_request() {
    let (app, _storage) = test_app().await;
    let request = Request::post("/store")
        .header("content-type", "application/json")
        .body(Body::from("{\"id\": 5}"))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(text_body(response).await, INVALID_REQUEST);
}

#[tokio::test]
async fn oversized_body_is_refused_before_parsing() {
    let (app, storage) = test_app().await;
    let body = vec![b' '; MAX_BODY_BYTES + 1];
    let request = Request::post("/store")
        .header("content-type", "application/json")
        .header("content-length", body.len().to_string())
        .body(Body::from(body))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(storage.list_stored_cards().await.expect("list").is_empty());
}
