//! Hosted payment gateway adapter.
//!
//! The gateway redirects the customer to a hosted payment page and later
//! calls back asynchronously. Both directions carry a flat parameter map
//! signed with HMAC-SHA512 over the form-urlencoded parameters in
//! lexicographic key order, keyed by a shared secret.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use domain::Money;
use hmac::{Hmac, Mac};
use sha2::Sha512;

use crate::error::GatewayError;

type HmacSha512 = Hmac<Sha512>;

/// Response code the gateway uses for a settled payment.
pub const RESPONSE_SUCCESS: &str = "00";

/// Parameter names of the gateway wire protocol.
pub mod keys {
    pub const VERSION: &str = "version";
    pub const COMMAND: &str = "command";
    pub const MERCHANT_CODE: &str = "merchant_code";
    pub const AMOUNT: &str = "amount";
    pub const CURRENCY: &str = "curr_code";
    pub const LOCALE: &str = "locale";
    pub const TXN_REF: &str = "txn_ref";
    pub const ORDER_INFO: &str = "order_info";
    pub const ORDER_TYPE: &str = "order_type";
    pub const RETURN_URL: &str = "return_url";
    pub const IP_ADDR: &str = "ip_addr";
    pub const CREATE_DATE: &str = "create_date";
    pub const EXPIRE_DATE: &str = "expire_date";
    pub const RESPONSE_CODE: &str = "response_code";
    pub const BANK_CODE: &str = "bank_code";
    pub const TXN_NO: &str = "txn_no";
    pub const TXN_STATUS: &str = "txn_status";
    pub const SECURE_HASH: &str = "secure_hash";
    pub const SECURE_HASH_TYPE: &str = "secure_hash_type";
}

/// Gateway connection settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Hosted payment page endpoint.
    pub endpoint: String,
    /// Merchant code assigned by the processor.
    pub merchant_code: String,
    /// Shared HMAC secret.
    pub secret: String,
    /// URL the customer is sent back to after paying.
    pub return_url: String,
    /// Minutes until a payment URL expires.
    pub expire_minutes: i64,
}

/// A redirect-URL request for one order.
#[derive(Debug, Clone)]
pub struct RedirectRequest {
    /// The order token; echoed back as `txn_ref` in the callback.
    pub txn_ref: String,
    /// The order total.
    pub amount: Money,
    /// Free-text order description shown on the payment page.
    pub order_info: String,
    /// Client IP forwarded to the processor.
    pub client_ip: String,
}

/// Builds outbound payment redirects.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Constructs the signed hosted-payment URL for an order.
    async fn build_redirect(&self, request: RedirectRequest) -> Result<String, GatewayError>;
}

/// The production gateway adapter.
#[derive(Debug, Clone)]
pub struct HostedGateway {
    config: GatewayConfig,
}

impl HostedGateway {
    /// Creates an adapter from connection settings.
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    fn redirect_params(&self, request: &RedirectRequest, now: DateTime<Utc>) -> BTreeMap<String, String> {
        // The processor timestamps in GMT+7 wall-clock time.
        let local = now + Duration::hours(7);
        let expire = local + Duration::minutes(self.config.expire_minutes);

        let mut params = BTreeMap::new();
        params.insert(keys::VERSION.to_string(), "2.1.0".to_string());
        params.insert(keys::COMMAND.to_string(), "pay".to_string());
        params.insert(
            keys::MERCHANT_CODE.to_string(),
            self.config.merchant_code.clone(),
        );
        // The wire amount is the minor-unit total times 100.
        params.insert(
            keys::AMOUNT.to_string(),
            (request.amount.cents() * 100).to_string(),
        );
        params.insert(keys::CURRENCY.to_string(), "VND".to_string());
        params.insert(keys::LOCALE.to_string(), "vn".to_string());
        params.insert(keys::TXN_REF.to_string(), request.txn_ref.clone());
        params.insert(keys::ORDER_INFO.to_string(), request.order_info.clone());
        params.insert(keys::ORDER_TYPE.to_string(), "other".to_string());
        params.insert(keys::RETURN_URL.to_string(), self.config.return_url.clone());
        params.insert(keys::IP_ADDR.to_string(), request.client_ip.clone());
        params.insert(
            keys::CREATE_DATE.to_string(),
            local.format("%Y%m%d%H%M%S").to_string(),
        );
        params.insert(
            keys::EXPIRE_DATE.to_string(),
            expire.format("%Y%m%d%H%M%S").to_string(),
        );
        params
    }
}

#[async_trait]
impl PaymentGateway for HostedGateway {
    async fn build_redirect(&self, request: RedirectRequest) -> Result<String, GatewayError> {
        if request.amount.cents() <= 0 {
            return Err(GatewayError::Rejected("non-positive amount".to_string()));
        }

        let params = self.redirect_params(&request, Utc::now());
        let query = signed_query(&params);
        let signature = hmac_hex(&self.config.secret, &query);

        Ok(format!(
            "{}?{}&{}={}",
            self.config.endpoint,
            query,
            keys::SECURE_HASH,
            signature
        ))
    }
}

/// Signs a parameter map the way the gateway does: HMAC-SHA512 over the
/// sorted, form-urlencoded parameters, hex-encoded.
pub fn sign_params(params: &BTreeMap<String, String>, secret: &str) -> String {
    hmac_hex(secret, &signed_query(params))
}

/// Recomputes the HMAC over every parameter except the signature fields and
/// compares it to the carried signature in constant time.
///
/// Any tampering, parameter reordering, or secret mismatch yields `false`.
pub fn verify_signature(params: &BTreeMap<String, String>, secret: &str) -> bool {
    let Some(signature) = params.get(keys::SECURE_HASH) else {
        return false;
    };
    let Some(signature) = decode_hex(signature) else {
        return false;
    };

    let query = signed_query(params);
    let mut mac = mac_for(secret);
    mac.update(query.as_bytes());
    mac.verify_slice(&signature).is_ok()
}

/// Joins the non-empty parameters, sorted by key and form-urlencoded,
/// excluding the signature fields themselves.
fn signed_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(key, value)| {
            !value.is_empty()
                && key.as_str() != keys::SECURE_HASH
                && key.as_str() != keys::SECURE_HASH_TYPE
        })
        .map(|(key, value)| format!("{}={}", encode(key), encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn mac_for(secret: &str) -> HmacSha512 {
    HmacSha512::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size")
}

fn hmac_hex(secret: &str, message: &str) -> String {
    let mut mac = mac_for(secret);
    mac.update(message.as_bytes());
    format!("{:x}", mac.finalize().into_bytes())
}

/// Form-urlencodes one component: unreserved bytes pass through, space
/// becomes `+`, everything else is percent-escaped. The signature is
/// defined over exactly this encoding.
fn encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
