//! HTTP contract of the remote store gateway.
//!
//! Every test starts its own fake remote store on an ephemeral port.

use axum::http::Method;
use serde_json::json;

use basket_sync::{GatewayError, HttpGateway, LocalSession, RemoteStore, SessionOracle};
use basket_sync_core::{LineKey, ProductId, Size, VariantId};
use basket_sync_integration_tests::{FakeRemoteStore, Line, TOKEN, signed_in_session};

fn gateway(store: &FakeRemoteStore, session: &LocalSession) -> HttpGateway {
    HttpGateway::new(&store.config(), session.clone()).expect("Failed to build gateway")
}

fn key(product: &str, variant: &str, size: &str) -> LineKey {
    LineKey::new(
        ProductId::new(product),
        VariantId::new(variant),
        Size::parse(size).expect("valid size"),
    )
}

fn line(product: &str, quantity: u32) -> Line {
    Line {
        product_id: product.to_string(),
        variant_id: format!("{product}-red"),
        size: "M".to_string(),
        quantity,
    }
}

#[tokio::test]
async fn test_counts_derive_from_lists() {
    let store = FakeRemoteStore::start().await;
    {
        let mut state = store.state();
        state.cart = vec![line("p1", 2), line("p2", 3)];
        state.wishlist = vec!["w1".to_string(), "w2".to_string()];
    }
    let gateway = gateway(&store, &signed_in_session());

    assert_eq!(gateway.cart_count().await.expect("cart count"), 5);
    assert_eq!(gateway.wishlist_count().await.expect("wishlist count"), 2);

    let state = store.state();
    assert!(state.requests_to("products/p1").is_empty());
    assert!(state.requests_to("products/p2").is_empty());
    let request = state.requests_to("cart/list").remove(0);
    assert_eq!(request.method, Method::GET);
    assert_eq!(request.authorization, Some(format!("Bearer {TOKEN}")));
}

#[tokio::test]
async fn test_mutation_paths_and_bodies() {
    let store = FakeRemoteStore::start().await;
    store.state().wishlist = vec!["w1".to_string(), "w2".to_string(), "w3".to_string()];
    let gateway = gateway(&store, &signed_in_session());
    let line_key = key("p1", "p1-red", "M");

    gateway.add_cart_item(&line_key, 2).await.expect("add");
    gateway.update_cart_item(&line_key, 5).await.expect("update");
    gateway.remove_cart_item(&line_key).await.expect("remove");
    gateway.clear_cart().await.expect("clear");
    gateway
        .add_wishlist_item(&key("w4", "w4", "Free Size"))
        .await
        .expect("wishlist add");
    gateway
        .remove_wishlist_item(&ProductId::new("w1"))
        .await
        .expect("wishlist remove");
    gateway
        .move_wishlist_item_to_cart(&key("w2", "w2", "Free Size"))
        .await
        .expect("move");
    gateway
        .bulk_move_wishlist_to_cart(&[ProductId::new("w3"), ProductId::new("w4")])
        .await
        .expect("bulk move");

    let state = store.state();
    let expected = [
        (Method::POST, "cart/add", json!({"productId": "p1", "variantId": "p1-red", "size": "M", "quantity": 2})),
        (Method::POST, "cart/update", json!({"productId": "p1", "variantId": "p1-red", "size": "M", "quantity": 5})),
        (Method::POST, "cart/remove", json!({"productId": "p1", "variantId": "p1-red", "size": "M"})),
        (Method::POST, "cart/clear", json!(null)),
        (Method::POST, "wishlist/add", json!({"productId": "w4"})),
        (Method::DELETE, "wishlist/remove/w1", json!(null)),
        (Method::POST, "wishlist/move-to-cart", json!({"productId": "w2"})),
        (Method::POST, "wishlist/bulk-move-to-cart", json!({"productIds": ["w3", "w4"]})),
    ];
    assert_eq!(state.requests.len(), expected.len());
    for (request, (method, path, body)) in state.requests.iter().zip(expected) {
        assert_eq!(request.method, method, "{path}");
        assert_eq!(request.path, path);
        assert_eq!(request.body, body, "{path}");
    }
    assert!(state.wishlist.is_empty());
    assert_eq!(state.cart_count(), 3);
}

#[tokio::test]
async fn test_revoked_token_signs_out() {
    let store = FakeRemoteStore::start().await;
    store.state().revoked = true;
    let session = signed_in_session();
    let gateway = gateway(&store, &session);

    let err = gateway.cart_count().await.expect_err("revoked token");
    assert!(matches!(err, GatewayError::Unauthorized));
    assert!(err.is_session_ended());
    assert!(!session.is_authenticated());

    let requests = store.state().requests.len();
    assert!(matches!(
        gateway.wishlist_count().await,
        Err(GatewayError::NoSession)
    ));
    assert_eq!(store.state().requests.len(), requests);
}

#[tokio::test]
async fn test_rate_limit_reports_retry_after() {
    let store = FakeRemoteStore::start().await;
    store.state().rate_limited = true;
    let gateway = gateway(&store, &signed_in_session());

    assert!(matches!(
        gateway.list_wishlist().await,
        Err(GatewayError::RateLimited(7))
    ));
}

#[tokio::test]
async fn test_error_status_carries_server_message() {
    let store = FakeRemoteStore::start().await;
    let gateway = gateway(&store, &signed_in_session());

    let err = gateway
        .move_wishlist_item_to_cart(&key("absent", "absent", "Free Size"))
        .await
        .expect_err("not in wishlist");
    match err {
        GatewayError::Status { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Product not in wishlist");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_cart_images_enriched_once() {
    let store = FakeRemoteStore::start().await;
    store.state().cart = vec![line("p7", 1)];
    let gateway = gateway(&store, &signed_in_session());

    let cart = gateway.list_cart().await.expect("list cart");
    let item = cart.items.first().expect("one line");
    assert_eq!(
        item.product.primary_image(),
        Some("https://cdn.example.test/p7-red.jpg")
    );

    gateway.list_cart().await.expect("list cart again");
    assert_eq!(store.state().requests_to("products/p7").len(), 1);
}

#[tokio::test]
async fn test_no_session_never_reaches_network() {
    let store = FakeRemoteStore::start().await;
    let gateway = gateway(&store, &LocalSession::in_memory());

    assert!(matches!(
        gateway.clear_cart().await,
        Err(GatewayError::NoSession)
    ));
    assert!(store.state().requests.is_empty());
}
