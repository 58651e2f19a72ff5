//! HTTP Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use kupay_gateway::{
    AdminLocation, AdminNotice, CallbackQuery, GatewayConfig, GatewayError, GatewayRegistration,
    Order, OrderDraft, OrderId, OrderStore, PaymentResult, ReturnPage, SettingsField,
    settings_fields, shipping::ShippingOptionGroup,
};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub kupay_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

fn gateway_error(e: &GatewayError) -> ApiError {
    match e {
        GatewayError::OrderNotFound(_) => {
            api_error(StatusCode::NOT_FOUND, e.user_message(), "ORDER_NOT_FOUND")
        }
        _ => {
            tracing::error!("Gateway error: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.user_message(), "GATEWAY_ERROR")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReturnQuery {
    pub key: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GatewayInfoResponse {
    pub gateway: GatewayRegistration,
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub fields: Vec<SettingsField>,

    /// Stored values; the API key is never echoed
    pub values: HashMap<String, String>,
    pub api_key_set: bool,
    pub notices: Vec<AdminNotice>,
    pub shipping_options: Vec<ShippingOptionGroup>,
}

fn page(body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>Order received</title></head>\
<body>{body}</body></html>"
    ))
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let kupay_configured = state
        .gateway_config()
        .is_ok_and(|config| config.has_api_key());

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        kupay_configured,
    })
}

/// Place an order (host checkout stand-in)
pub async fn create_order(
    State(state): State<AppState>,
    Json(draft): Json<OrderDraft>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state.orders.create(draft).map_err(|e| gateway_error(&e))?;
    tracing::info!(order_id = %order.id, total = %order.total, "Order created");
    Ok((StatusCode::CREATED, Json(order)))
}

/// Gateway registration and current availability
pub async fn gateway_info(
    State(state): State<AppState>,
) -> Result<Json<GatewayInfoResponse>, ApiError> {
    let gateway = state.gateway().map_err(|e| gateway_error(&e))?;
    Ok(Json(GatewayInfoResponse {
        gateway: gateway.registration(),
        available: gateway.is_available(None),
    }))
}

/// Pay for an order with KuPay
pub async fn process_payment(
    State(state): State<AppState>,
    Path(order_id): Path<u64>,
) -> Result<Json<PaymentResult>, ApiError> {
    let gateway = state.gateway().map_err(|e| gateway_error(&e))?;

    if !gateway.is_available(None) {
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "KuPay is not available for this checkout",
            "PAYMENTS_DISABLED",
        ));
    }

    let result = gateway
        .initiate_payment(OrderId(order_id))
        .map_err(|e| gateway_error(&e))?;
    Ok(Json(result))
}

/// Order-received page
///
/// Without `status` the shopper is sent to KuPay; KuPay sends them back
/// with `status=completed` or `status=cancelled`.
pub async fn order_received(
    State(state): State<AppState>,
    Path(order_id): Path<u64>,
    Query(query): Query<ReturnQuery>,
) -> Result<Response, ApiError> {
    let order_id = OrderId(order_id);

    let order = state
        .orders
        .get(order_id)
        .map_err(|e| gateway_error(&e))?
        .filter(|order| query.key.as_deref() == Some(order.order_key.as_str()))
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Order not found.", "ORDER_NOT_FOUND"))?;

    let gateway = state.gateway().map_err(|e| gateway_error(&e))?;
    let page_content = gateway
        .render_return_page(order.id, query.status.as_deref())
        .await
        .map_err(|e| gateway_error(&e))?;

    let response = match page_content {
        ReturnPage::Redirect(pay_url) => {
            (StatusCode::FOUND, [(header::LOCATION, pay_url)]).into_response()
        }
        ReturnPage::Html(html) | ReturnPage::Alert { html, .. } => page(&html).into_response(),
    };
    Ok(response)
}

/// KuPay callback
///
/// Accepts any method. Answers 200 with an empty body for every rejection;
/// only an order store failure gives 500.
pub async fn kupay_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> StatusCode {
    let outcome = state
        .callback_handler()
        .and_then(|handler| handler.handle_query(&query));

    match outcome {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::error!("Callback processing error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn authorize_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(token) = state.admin_token.as_deref() else {
        return Err(api_error(StatusCode::NOT_FOUND, "Not found", "ADMIN_DISABLED"));
    };

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if presented == Some(token) {
        Ok(())
    } else {
        Err(api_error(StatusCode::UNAUTHORIZED, "Invalid admin token", "UNAUTHORIZED"))
    }
}

fn settings_response(
    state: &AppState,
    config: GatewayConfig,
) -> Result<SettingsResponse, ApiError> {
    let location = AdminLocation::gateway_settings();

    let mut values = config.to_settings();
    values.remove("api_key");
    let api_key_set = config.has_api_key();

    let gateway = kupay_gateway::KuPayGateway::with_kupay_client(
        config,
        state.orders.clone(),
        state.cart.clone(),
        state.urls.clone(),
    )
    .map_err(|e| gateway_error(&e))?;

    Ok(SettingsResponse {
        fields: settings_fields(),
        values,
        api_key_set,
        notices: gateway.admin_notices(&location, &state.store_currency),
        shipping_options: gateway.shipping_method_options(state.shipping.as_ref(), &location),
    })
}

/// Gateway settings panel
pub async fn get_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SettingsResponse>, ApiError> {
    authorize_admin(&state, &headers)?;
    let config = state.gateway_config().map_err(|e| gateway_error(&e))?;
    settings_response(&state, config).map(Json)
}

/// Save gateway settings
pub async fn save_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(form): Json<HashMap<String, String>>,
) -> Result<Json<SettingsResponse>, ApiError> {
    authorize_admin(&state, &headers)?;

    let config = GatewayConfig::process_admin_options(state.settings.as_ref(), &form).map_err(
        |e| match e {
            GatewayError::Config(msg) => {
                api_error(StatusCode::UNPROCESSABLE_ENTITY, msg, "INVALID_SETTINGS")
            }
            other => gateway_error(&other),
        },
    )?;

    settings_response(&state, config).map(Json)
}
