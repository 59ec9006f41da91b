use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::Serialize;
use time::{OffsetDateTime, UtcOffset};

use crate::canonical::{encode, ParamSet, SECURE_HASH};
use crate::config::{GatewayConfig, OrderRefStrategy};
use crate::signature::sign;
use crate::{PaymentError, Result};

pub const VERSION: &str = "2.1.0";
pub const COMMAND_PAY: &str = "pay";
pub const ORDER_TYPE: &str = "other";
pub const ORDER_INFO_PREFIX: &str = "Thanh toan cho ma GD:";

static ORDER_SEQ: AtomicU32 = AtomicU32::new(0);

/// Token echoed back by the gateway as `vnp_TxnRef`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OrderReference(String);

impl OrderReference {
    /// `DDHHmmss` of `local`, optionally suffixed with a sequence number.
    pub fn generate(local: &OffsetDateTime, strategy: OrderRefStrategy) -> Self {
        let base = format!(
            "{:02}{:02}{:02}{:02}",
            local.day(),
            local.hour(),
            local.minute(),
            local.second()
        );
        match strategy {
            OrderRefStrategy::DayTime => Self(base),
            OrderRefStrategy::Sequenced => {
                let seq = ORDER_SEQ.fetch_add(1, Ordering::Relaxed) % 10_000;
                Self(format!("{}{:04}", base, seq))
            }
        }
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl std::fmt::Display for OrderReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OrderReference {
    fn from(s: String) -> Self { Self(s) }
}

/// Amount in major units times 100, or `None` on overflow.
pub fn to_minor_units(amount: u64) -> Option<u64> { amount.checked_mul(100) }

pub fn from_minor_units(minor: u64) -> u64 { minor / 100 }

/// `YYYYMMDDHHmmss`
pub fn format_timestamp(local: &OffsetDateTime) -> String {
    format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}",
        local.year(),
        u8::from(local.month()),
        local.day(),
        local.hour(),
        local.minute(),
        local.second()
    )
}

/// Inputs for one payment initiation.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    /// Major currency units; must be positive.
    pub amount: i64,
    pub bank_code: Option<String>,
    pub client_ip: String,
    /// `vn` or `en`; anything else falls back to the configured locale.
    pub locale: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUrl {
    #[serde(rename = "paymentUrl")]
    pub redirect_url: String,
    pub order_reference: OrderReference,
}

/// Stateless signer/verifier bound to one merchant configuration.
#[derive(Debug, Clone)]
pub struct PaymentService {
    config: Arc<GatewayConfig>,
}

impl PaymentService {
    pub fn new(config: GatewayConfig) -> Self { Self { config: Arc::new(config) } }

    pub fn config(&self) -> &GatewayConfig { &self.config }

    fn local_offset(&self) -> Result<UtcOffset> {
        UtcOffset::from_hms(self.config.utc_offset_hours, 0, 0)
            .map_err(|_| PaymentError::Internal("invalid UTC offset".into()))
    }

    pub fn build(&self, req: &PaymentRequest) -> Result<PaymentUrl> {
        self.build_at(req, OffsetDateTime::now_utc())
    }

    /// Build the signed redirect URL as of `now`.
    pub fn build_at(&self, req: &PaymentRequest, now: OffsetDateTime) -> Result<PaymentUrl> {
        if req.amount <= 0 { return Err(PaymentError::InvalidAmount); }
        let minor = to_minor_units(req.amount as u64).ok_or(PaymentError::InvalidAmount)?;

        let cfg = &self.config;
        let local = now.to_offset(self.local_offset()?);
        let order_reference = OrderReference::generate(&local, cfg.order_ref);
        let locale = match req.locale.as_deref() {
            Some(l @ ("vn" | "en")) => l,
            _ => cfg.locale.as_str(),
        };

        let mut params = ParamSet::new();
        params
            .insert("vnp_Version", VERSION)
            .insert("vnp_Command", COMMAND_PAY)
            .insert("vnp_TmnCode", &cfg.tmn_code)
            .insert("vnp_Locale", locale)
            .insert("vnp_CurrCode", &cfg.currency)
            .insert("vnp_TxnRef", &order_reference)
            .insert("vnp_OrderInfo", format!("{}{}", ORDER_INFO_PREFIX, order_reference))
            .insert("vnp_OrderType", ORDER_TYPE)
            .insert("vnp_Amount", minor)
            .insert("vnp_ReturnUrl", &cfg.return_url)
            .insert("vnp_IpAddr", &req.client_ip)
            .insert("vnp_CreateDate", format_timestamp(&local));
        if let Some(bank) = req.bank_code.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            params.insert("vnp_BankCode", bank);
        }

        let canonical = encode(&params);
        let sig = sign(&canonical, &cfg.hash_secret)
            .map_err(|e| PaymentError::Internal(e.to_string()))?;

        let sep = if cfg.payment_url.contains('?') { '&' } else { '?' };
        let redirect_url = format!("{}{}{}&{}={}", cfg.payment_url, sep, canonical, SECURE_HASH, sig);

        tracing::info!(order_ref = %order_reference, amount = req.amount, "payment url created");
        Ok(PaymentUrl { redirect_url, order_reference })
    }
}
