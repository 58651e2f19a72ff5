//! Router

use axum::{
    Router,
    extract::Request,
    routing::{any, get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    create_order, gateway_info, get_settings, health_check, kupay_callback, order_received,
    process_payment, save_settings,
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/gateway", get(gateway_info))
        // Checkout
        .route("/api/orders", post(create_order))
        .route("/api/checkout/{order_id}", post(process_payment))
        .route("/checkout/order-received/{order_id}/", get(order_received))
        // KuPay notification
        .route("/callback", any(kupay_callback))
        // Admin
        .route("/api/admin/settings", get(get_settings).post(save_settings))
        // Path only; query strings carry the API key and order keys
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::debug_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
            )
        }))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use rust_decimal_macros::dec;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use kupay_gateway::{
        GatewayConfig, LineItem, MemoryCart, MemoryOrderStore, MemorySettingsStore, Order,
        OrderDraft, OrderStatus, OrderStore, SiteUrls, StaticShippingCatalog,
    };

    use super::build_router;
    use crate::state::AppState;

    const API_KEY: &str = "25621898-6434-11ec-93c2-525401d2ddc2";
    const ADMIN_TOKEN: &str = "admin-secret";

    fn test_state(api_base_url: &str) -> AppState {
        let config = GatewayConfig {
            api_key: API_KEY.into(),
            api_base_url: api_base_url.into(),
            timeout_secs: 5,
            ..Default::default()
        };

        AppState {
            orders: Arc::new(MemoryOrderStore::new()),
            settings: Arc::new(MemorySettingsStore::with_config(&config).expect("settings")),
            cart: Arc::new(MemoryCart::new()),
            shipping: Arc::new(StaticShippingCatalog::default()),
            urls: SiteUrls::new("https://shop.example").expect("urls"),
            store_currency: "USD".into(),
            admin_token: Some(ADMIN_TOKEN.into()),
        }
    }

    fn place_order(state: &AppState) -> Order {
        state
            .orders
            .create(OrderDraft {
                currency: "USD".into(),
                payment_method: "kupay".into(),
                line_items: vec![LineItem {
                    name: "Hoodie".into(),
                    quantity: 1,
                    total: dec!(49.90),
                    needs_shipping: false,
                }],
                ..Default::default()
            })
            .expect("order")
    }

    fn status_of(state: &AppState, order: &Order) -> OrderStatus {
        state.orders.get(order.id).expect("get").expect("order").status
    }

    async fn send(state: &AppState, request: Request<Body>) -> axum::response::Response {
        build_router(state.clone()).oneshot(request).await.expect("response")
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).expect("request")
    }

    fn callback_uri(api_key: &str, order: &Order, key: &str, status: &str) -> String {
        format!(
            "/callback?kupay_callback={api_key}&order_id={}&key={key}&status={status}",
            order.id
        )
    }

    /// Captures formatted log output
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().expect("log buffer")).into_owned()
        }
    }

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn health_route_returns_200() {
        let state = test_state("https://api.kupay.finance");
        let response = send(&state, get("/health")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
        assert_eq!(body["kupay_configured"], json!(true));
    }

    #[tokio::test]
    async fn checkout_marks_order_processing() {
        let state = test_state("https://api.kupay.finance");
        let order = place_order(&state);

        let response = send(
            &state,
            Request::builder()
                .method("POST")
                .uri(format!("/api/checkout/{}", order.id))
                .body(Body::empty())
                .expect("request"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
        assert_eq!(body["result"], json!("success"));
        assert_eq!(
            body["redirect"],
            json!(format!(
                "https://shop.example/checkout/order-received/{}/?key={}",
                order.id, order.order_key
            ))
        );
        assert_eq!(status_of(&state, &order), OrderStatus::Processing);
        assert_eq!(state.cart.times_emptied(), 1);
    }

    #[tokio::test]
    async fn order_received_redirects_to_pay_url() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", format!("/webhook/woocommerce/{API_KEY}").as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"pay_url": "https://pay.example/abc"}"#)
            .expect(1)
            .create_async()
            .await;

        let state = test_state(&server.url());
        let order = place_order(&state);

        let response = send(
            &state,
            get(&format!("/checkout/order-received/{}/?key={}", order.id, order.order_key)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).expect("location"),
            "https://pay.example/abc"
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn order_received_shows_alert_on_remote_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let state = test_state(&server.url());
        let order = place_order(&state);

        let response = send(
            &state,
            get(&format!("/checkout/order-received/{}/?key={}", order.id, order.order_key)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Something went wrong (1002)"));
    }

    #[tokio::test]
    async fn order_received_rejects_unusable_pay_url() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"pay_url": "https://pay.example/abc\r\nSet-Cookie: x=1"}"#)
            .create_async()
            .await;

        let state = test_state(&server.url());
        let order = place_order(&state);

        let response = send(
            &state,
            get(&format!("/checkout/order-received/{}/?key={}", order.id, order.order_key)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::LOCATION).is_none());
        assert!(body_text(response).await.contains("Something went wrong (1001)"));
    }

    #[tokio::test]
    async fn order_received_requires_order_key() {
        let state = test_state("https://api.kupay.finance");
        let order = place_order(&state);

        let response = send(
            &state,
            get(&format!("/checkout/order-received/{}/?key=wc_order_wrong", order.id)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn order_received_cancelled_resets_to_pending() {
        let state = test_state("https://api.kupay.finance");
        let order = place_order(&state);
        state.orders.update_status(order.id, OrderStatus::Processing).expect("update");

        let response = send(
            &state,
            get(&format!(
                "/checkout/order-received/{}/?key={}&status=cancelled",
                order.id, order.order_key
            )),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Select Payment Method"));
        assert_eq!(status_of(&state, &order), OrderStatus::Pending);
    }

    #[tokio::test]
    async fn callback_completes_order() {
        let state = test_state("https://api.kupay.finance");
        let order = place_order(&state);
        let other = place_order(&state);

        let uri = callback_uri(API_KEY, &order, order.order_key.as_str(), "completed");
        let response = send(&state, get(&uri)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(status_of(&state, &order), OrderStatus::Completed);
        assert_eq!(status_of(&state, &other), OrderStatus::Pending);
    }

    #[tokio::test]
    async fn callback_accepts_post() {
        let state = test_state("https://api.kupay.finance");
        let order = place_order(&state);

        let response = send(
            &state,
            Request::builder()
                .method("POST")
                .uri(callback_uri(API_KEY, &order, order.order_key.as_str(), "completed"))
                .body(Body::empty())
                .expect("request"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(status_of(&state, &order), OrderStatus::Completed);
    }

    #[tokio::test]
    async fn callback_rejections_are_silent() {
        let state = test_state("https://api.kupay.finance");
        let order = place_order(&state);
        let other = place_order(&state);
        let key = order.order_key.as_str();

        let uris = [
            // wrong API key
            callback_uri("00000000-0000-0000-0000-000000000000", &order, key, "completed"),
            // key of another order
            callback_uri(API_KEY, &order, other.order_key.as_str(), "completed"),
            // malformed API key
            callback_uri("g5621898-6434-11ec-93c2-525401d2ddc2", &order, key, "completed"),
            // unknown status
            callback_uri(API_KEY, &order, key, "paid"),
            // nothing at all
            "/callback".to_string(),
        ];

        for uri in uris {
            let response = send(&state, get(&uri)).await;
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
            assert!(body_text(response).await.is_empty());
            assert_eq!(status_of(&state, &order), OrderStatus::Pending, "{uri}");
        }
    }

    #[tokio::test]
    async fn request_logs_omit_query_secrets() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let state = test_state("https://api.kupay.finance");
        let order = place_order(&state);
        let key = order.order_key.as_str();

        send(&state, get(&callback_uri(API_KEY, &order, key, "open"))).await;
        send(
            &state,
            get(&format!("/checkout/order-received/{}/?key={key}&status=completed", order.id)),
        )
        .await;

        let output = logs.contents();
        assert!(output.contains("path=/callback"), "{output}");
        assert!(!output.contains(API_KEY), "{output}");
        assert!(!output.contains(key), "{output}");
    }

    #[tokio::test]
    async fn admin_settings_require_token() {
        let state = test_state("https://api.kupay.finance");

        let response = send(&state, get("/api/admin/settings")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let mut disabled = state.clone();
        disabled.admin_token = None;
        let response = send(&disabled, get("/api/admin/settings")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_settings_hide_api_key_and_save() {
        let state = test_state("https://api.kupay.finance");

        let response = send(
            &state,
            Request::builder()
                .uri("/api/admin/settings")
                .header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(!body.contains(API_KEY));
        let body: Value = serde_json::from_str(&body).expect("json");
        assert_eq!(body["api_key_set"], json!(true));

        let response = send(
            &state,
            Request::builder()
                .method("POST")
                .uri("/api/admin/settings")
                .header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"api_key": "", "title": "Crypto"}).to_string()))
                .expect("request"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
        assert_eq!(body["api_key_set"], json!(false));
        assert_eq!(body["values"]["title"], json!("Crypto"));
        assert_eq!(body["notices"].as_array().expect("notices").len(), 1);

        let config = state.gateway_config().expect("config");
        assert!(!config.has_api_key());
    }

    #[tokio::test]
    async fn admin_rejects_invalid_settings() {
        let state = test_state("https://api.kupay.finance");

        let response = send(
            &state,
            Request::builder()
                .method("POST")
                .uri("/api/admin/settings")
                .header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"enabled": "maybe"}).to_string()))
                .expect("request"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
