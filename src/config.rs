use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_PAYMENT_URL: &str = "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html";
pub const DEFAULT_RETURN_URL: &str = "http://localhost:8888/payment/vnpay_return";
pub const DEFAULT_LOCALE: &str = "vn";
pub const DEFAULT_CURRENCY: &str = "VND";
/// The gateway expects timestamps in Indochina Time.
pub const DEFAULT_UTC_OFFSET_HOURS: i8 = 7;

/// How order references are derived from the request time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderRefStrategy {
    /// `DDHHmmss` only. Two requests in the same second collide.
    #[default]
    DayTime,
    /// `DDHHmmss` followed by a process-wide sequence number.
    Sequenced,
}

impl FromStr for OrderRefStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daytime" | "day-time" => Ok(OrderRefStrategy::DayTime),
            "sequenced" => Ok(OrderRefStrategy::Sequenced),
            _ => Err(ConfigError::InvalidOrderRef(s.to_string())),
        }
    }
}

#[derive(Clone)]
pub struct GatewayConfig {
    /// Merchant terminal code (`vnp_TmnCode`).
    pub tmn_code: String,
    pub hash_secret: String,
    pub payment_url: String,
    pub return_url: String,
    pub locale: String,
    pub currency: String,
    pub utc_offset_hours: i8,
    pub order_ref: OrderRefStrategy,
}

// hand-written so the secret never reaches a log line
impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("tmn_code", &self.tmn_code)
            .field("hash_secret", &"<redacted>")
            .field("payment_url", &self.payment_url)
            .field("return_url", &self.return_url)
            .field("locale", &self.locale)
            .field("currency", &self.currency)
            .field("utc_offset_hours", &self.utc_offset_hours)
            .field("order_ref", &self.order_ref)
            .finish()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            tmn_code: String::new(),
            hash_secret: String::new(),
            payment_url: DEFAULT_PAYMENT_URL.into(),
            return_url: DEFAULT_RETURN_URL.into(),
            locale: DEFAULT_LOCALE.into(),
            currency: DEFAULT_CURRENCY.into(),
            utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
            order_ref: OrderRefStrategy::DayTime,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Hash secret cannot be empty")] EmptySecret,
    #[error("Terminal code cannot be empty")] EmptyTmnCode,
    #[error("Payment URL must be http(s): {0}")] InvalidPaymentUrl(String),
    #[error("UTC offset out of range: {0}")] InvalidUtcOffset(String),
    #[error("Unknown order reference strategy: {0}")] InvalidOrderRef(String),
}

impl GatewayConfig {
    /// Read `VNPAY_*` variables, falling back to sandbox defaults for
    /// everything except the credentials.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let utc_offset_hours = match var("VNPAY_UTC_OFFSET") {
            Some(raw) => raw
                .trim()
                .parse::<i8>()
                .map_err(|_| ConfigError::InvalidUtcOffset(raw.clone()))?,
            None => defaults.utc_offset_hours,
        };
        let order_ref = match var("VNPAY_ORDER_REF") {
            Some(raw) => raw.parse()?,
            None => defaults.order_ref,
        };

        let cfg = Self {
            tmn_code: var("VNPAY_TMN_CODE").unwrap_or_default(),
            hash_secret: var("VNPAY_HASH_SECRET").unwrap_or_default(),
            payment_url: var("VNPAY_URL").unwrap_or(defaults.payment_url),
            return_url: var("VNPAY_RETURN_URL").unwrap_or(defaults.return_url),
            locale: var("VNPAY_LOCALE").unwrap_or(defaults.locale),
            currency: defaults.currency,
            utc_offset_hours,
            order_ref,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hash_secret.trim().is_empty() { return Err(ConfigError::EmptySecret); }
        if self.tmn_code.trim().is_empty() { return Err(ConfigError::EmptyTmnCode); }
        if !(self.payment_url.starts_with("https://") || self.payment_url.starts_with("http://")) {
            return Err(ConfigError::InvalidPaymentUrl(self.payment_url.clone()));
        }
        if !(-12..=14).contains(&self.utc_offset_hours) {
            return Err(ConfigError::InvalidUtcOffset(self.utc_offset_hours.to_string()));
        }
        Ok(())
    }
}
