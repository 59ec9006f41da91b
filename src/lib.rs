use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use thiserror::Error;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::trace::TraceLayer;

pub mod callback;
pub mod canonical;
pub mod config;
pub mod payment;
pub mod signature;

use crate::callback::{describe_response_code, IpnAck, PaymentDetails, VerificationOutcome};
use crate::canonical::ParamSet;
use crate::config::GatewayConfig;
use crate::payment::{PaymentRequest, PaymentService, PaymentUrl};

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Invalid amount")]
    InvalidAmount,
    #[error("Invalid signature")]
    SignatureInvalid,
    #[error("Payment declined by gateway: {}", .0.response_code)]
    GatewayDeclined(Box<PaymentDetails>),
    #[error("Malformed callback field: {0}")]
    MalformedCallback(&'static str),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PaymentError>;

/// Envelope for every JSON answer given to the storefront.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self { success: true, message: message.into(), data: Some(data) }
    }

    pub fn failure(message: impl Into<String>, data: Option<T>) -> Self {
        Self { success: false, message: message.into(), data }
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            // business failure: the storefront still gets the verified details
            PaymentError::GatewayDeclined(details) => {
                let message = describe_response_code(&details.response_code);
                return Json(ApiResponse::failure(message, Some(*details))).into_response();
            }
            PaymentError::Internal(detail) => {
                tracing::error!("internal error: {}", detail);
                METRICS.errors.fetch_add(1, Ordering::Relaxed);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            other => (StatusCode::BAD_REQUEST, other.to_string()),
        };
        (status, Json(ApiResponse::<()>::failure(message, None))).into_response()
    }
}

/// Body of a payment initiation request.
#[derive(Debug, Deserialize)]
pub struct CreatePaymentBody {
    /// Number or numeric string.
    #[serde(default)]
    pub amount: Option<serde_json::Value>,
    #[serde(default, rename = "bankCode")]
    pub bank_code: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// Whole, positive amounts only. Numeric strings are coerced like numbers.
fn parse_amount(amount: Option<&serde_json::Value>) -> Result<i64> {
    let value = match amount {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match value {
        Some(a) if a.is_finite() && a > 0.0 && a.fract() == 0.0 && a < i64::MAX as f64 => Ok(a as i64),
        _ => Err(PaymentError::InvalidAmount),
    }
}

/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    header("x-forwarded-for")
        .or_else(|| header("x-real-ip"))
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

async fn create_payment_url(
    State(service): State<PaymentService>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: std::result::Result<Json<CreatePaymentBody>, JsonRejection>,
) -> Result<Json<ApiResponse<PaymentUrl>>> {
    let Json(body) = body.map_err(|rejection| {
        tracing::warn!("unreadable payment request: {}", rejection);
        PaymentError::InvalidAmount
    })?;
    let amount = parse_amount(body.amount.as_ref())?;
    let request = PaymentRequest {
        amount,
        bank_code: body.bank_code,
        client_ip: client_ip(&headers, peer.map(|ConnectInfo(addr)| addr)),
        locale: body.language,
    };
    let url = service.build(&request)?;
    METRICS.payments_created.fetch_add(1, Ordering::Relaxed);
    Ok(Json(ApiResponse::ok("Payment URL created", url)))
}

fn verify_query(service: &PaymentService, query: BTreeMap<String, String>) -> Result<VerificationOutcome> {
    let outcome = service.verify(ParamSet::from(query));
    match &outcome {
        Ok(VerificationOutcome::Approved(_)) => METRICS.callbacks_approved.fetch_add(1, Ordering::Relaxed),
        Ok(VerificationOutcome::Declined(_)) => METRICS.callbacks_declined.fetch_add(1, Ordering::Relaxed),
        Ok(VerificationOutcome::SignatureInvalid) => METRICS.signature_failures.fetch_add(1, Ordering::Relaxed),
        Err(_) => 0,
    };
    outcome
}

/// Browser redirect back from the gateway.
async fn vnpay_return(
    State(service): State<PaymentService>,
    Query(query): Query<BTreeMap<String, String>>,
) -> Result<Json<ApiResponse<PaymentDetails>>> {
    let details = verify_query(&service, query)?.into_result()?;
    let message = describe_response_code(&details.response_code);
    Ok(Json(ApiResponse::ok(message, details)))
}

/// Server-to-server notification; always answered with an ack body.
async fn vnpay_ipn(
    State(service): State<PaymentService>,
    Query(query): Query<BTreeMap<String, String>>,
) -> Json<IpnAck> {
    let outcome = verify_query(&service, query);
    if let Err(e) = &outcome {
        tracing::warn!("IPN rejected: {}", e);
    }
    Json(IpnAck::from_verification(&outcome))
}

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters
pub struct Metrics {
    pub payments_created: AtomicU64,
    pub callbacks_approved: AtomicU64,
    pub callbacks_declined: AtomicU64,
    pub signature_failures: AtomicU64,
    pub errors: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            payments_created: AtomicU64::new(0),
            callbacks_approved: AtomicU64::new(0),
            callbacks_declined: AtomicU64::new(0),
            signature_failures: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self { Self::new() }
}

lazy_static::lazy_static! {
    static ref METRICS: Metrics = Metrics::new();
}

async fn health_handler() -> impl IntoResponse {
    use serde_json::json;

    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "vnpay-checkout"
    }))
}

/// Prometheus text exposition
async fn metrics_handler() -> impl IntoResponse {
    let counters = [
        ("payments_created_total", "Payment URLs signed", &METRICS.payments_created),
        ("callbacks_approved_total", "Verified callbacks reporting approval", &METRICS.callbacks_approved),
        ("callbacks_declined_total", "Verified callbacks reporting a decline", &METRICS.callbacks_declined),
        ("signature_failures_total", "Callbacks rejected for a bad signature", &METRICS.signature_failures),
        ("errors_total", "Internal errors", &METRICS.errors),
    ];
    let mut body = String::new();
    for (name, help, counter) in counters {
        body.push_str(&format!(
            "# HELP vnpay_{name} {help}\n# TYPE vnpay_{name} counter\nvnpay_{name} {}\n",
            counter.load(Ordering::Relaxed)
        ));
    }

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        body,
    )
}

pub fn router(config: GatewayConfig) -> Router {
    let service = PaymentService::new(config);

    // Observability endpoints - no rate limiting
    let observability_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler));

    let mut payment_routes = Router::new()
        .route("/payment/create_payment_url", post(create_payment_url))
        .route("/payment/vnpay_return", get(vnpay_return))
        .route("/payment/vnpay_ipn", get(vnpay_ipn))
        .with_state(service);

    // Keyed on the peer address, so the server must be run with connect info.
    if std::env::var("DISABLE_RATE_LIMIT").is_err() {
        match GovernorConfigBuilder::default().per_second(10).burst_size(30).finish() {
            Some(conf) => {
                tracing::info!("Router configured with rate limiting: 10/sec, burst 30");
                payment_routes = payment_routes.layer(GovernorLayer {
                    config: Box::leak(Box::new(conf)),
                });
            }
            None => tracing::warn!("Invalid rate limit settings, rate limiting disabled"),
        }
    } else {
        tracing::info!("Rate limiting disabled");
    }

    Router::new()
        .merge(observability_routes)
        .merge(payment_routes)
        .layer(TraceLayer::new_for_http())
}
