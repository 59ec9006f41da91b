use serde::Serialize;

use crate::canonical::{ParamSet, SECURE_HASH, SECURE_HASH_TYPE};
use crate::payment::{from_minor_units, OrderReference, PaymentService};
use crate::signature::{verify_signature, SignatureError};
use crate::{PaymentError, Result};

/// Gateway response code for an approved transaction.
pub const RESPONSE_APPROVED: &str = "00";

/// Business fields of a callback whose signature checked out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub order_reference: OrderReference,
    /// Major units.
    pub amount: u64,
    pub amount_minor: u64,
    pub response_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pay_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Approved(PaymentDetails),
    Declined(PaymentDetails),
    SignatureInvalid,
}

impl VerificationOutcome {
    pub fn is_approved(&self) -> bool { matches!(self, VerificationOutcome::Approved(_)) }

    pub fn details(&self) -> Option<&PaymentDetails> {
        match self {
            VerificationOutcome::Approved(d) | VerificationOutcome::Declined(d) => Some(d),
            VerificationOutcome::SignatureInvalid => None,
        }
    }

    /// Collapse into the crate error taxonomy: only an approval is `Ok`.
    pub fn into_result(self) -> Result<PaymentDetails> {
        match self {
            VerificationOutcome::Approved(d) => Ok(d),
            VerificationOutcome::Declined(d) => Err(PaymentError::GatewayDeclined(Box::new(d))),
            VerificationOutcome::SignatureInvalid => Err(PaymentError::SignatureInvalid),
        }
    }
}

/// Verify a raw gateway callback against `secret`.
///
/// The signature fields are stripped before canonicalization. A missing or
/// mismatching signature yields `SignatureInvalid` without reading any other
/// field. `Err` is only returned for key failures or, after a valid
/// signature, for business fields that cannot be parsed.
pub fn verify_callback(mut params: ParamSet, secret: &str) -> Result<VerificationOutcome> {
    let supplied = params.remove(SECURE_HASH).unwrap_or_default();
    params.remove(SECURE_HASH_TYPE);

    match verify_signature(&params, &supplied, secret) {
        Ok(()) => {}
        Err(SignatureError::Missing) | Err(SignatureError::Invalid) => {
            tracing::warn!(order_ref = ?params.get("vnp_TxnRef"), "callback signature mismatch");
            return Ok(VerificationOutcome::SignatureInvalid);
        }
        Err(e @ SignatureError::Key) => return Err(PaymentError::Internal(e.to_string())),
    }

    let details = read_details(&params)?;
    if details.response_code == RESPONSE_APPROVED {
        tracing::info!(order_ref = %details.order_reference, amount = details.amount, "payment approved");
        Ok(VerificationOutcome::Approved(details))
    } else {
        tracing::warn!(
            order_ref = %details.order_reference,
            code = %details.response_code,
            "payment declined: {}",
            describe_response_code(&details.response_code)
        );
        Ok(VerificationOutcome::Declined(details))
    }
}

fn read_details(params: &ParamSet) -> Result<PaymentDetails> {
    let order_reference = params
        .get("vnp_TxnRef")
        .filter(|r| !r.is_empty())
        .ok_or(PaymentError::MalformedCallback("vnp_TxnRef"))?;
    let amount_minor = params
        .get("vnp_Amount")
        .and_then(|a| a.trim().parse::<u64>().ok())
        .ok_or(PaymentError::MalformedCallback("vnp_Amount"))?;
    // amounts are sent as whole major units times 100
    if amount_minor % 100 != 0 {
        return Err(PaymentError::MalformedCallback("vnp_Amount"));
    }
    let response_code = params
        .get("vnp_ResponseCode")
        .ok_or(PaymentError::MalformedCallback("vnp_ResponseCode"))?;
    let optional = |key: &str| params.get(key).filter(|v| !v.is_empty()).map(str::to_string);

    Ok(PaymentDetails {
        order_reference: OrderReference::from(order_reference.to_string()),
        amount: from_minor_units(amount_minor),
        amount_minor,
        response_code: response_code.to_string(),
        transaction_no: optional("vnp_TransactionNo"),
        bank_code: optional("vnp_BankCode"),
        pay_date: optional("vnp_PayDate"),
    })
}

impl PaymentService {
    pub fn verify(&self, params: ParamSet) -> Result<VerificationOutcome> {
        verify_callback(params, &self.config().hash_secret)
    }
}

/// Human-readable text for a gateway response code.
pub fn describe_response_code(code: &str) -> &'static str {
    match code {
        "00" => "Transaction successful",
        "07" => "Amount deducted; transaction flagged as suspicious",
        "09" => "Card or account is not registered for internet banking",
        "10" => "Card or account verification failed more than 3 times",
        "11" => "Payment window expired",
        "12" => "Card or account is locked",
        "13" => "Incorrect one-time password",
        "24" => "Customer cancelled the transaction",
        "51" => "Insufficient balance",
        "65" => "Daily transaction limit exceeded",
        "75" => "Issuing bank is under maintenance",
        "79" => "Too many incorrect payment password attempts",
        "99" => "Other error",
        _ => "Unknown response code",
    }
}

/// Acknowledgement returned to the gateway's server-to-server notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpnAck {
    #[serde(rename = "RspCode")]
    pub rsp_code: &'static str,
    #[serde(rename = "Message")]
    pub message: &'static str,
}

impl IpnAck {
    pub const CONFIRMED: IpnAck = IpnAck { rsp_code: "00", message: "Confirm Success" };
    pub const INVALID_AMOUNT: IpnAck = IpnAck { rsp_code: "04", message: "Invalid amount" };
    pub const INVALID_CHECKSUM: IpnAck = IpnAck { rsp_code: "97", message: "Invalid Checksum" };
    pub const UNKNOWN_ERROR: IpnAck = IpnAck { rsp_code: "99", message: "Unknown error" };

    /// Declined payments are still acknowledged: the notification itself
    /// was authentic and has been received.
    pub fn from_verification(result: &Result<VerificationOutcome>) -> Self {
        match result {
            Ok(VerificationOutcome::Approved(_)) | Ok(VerificationOutcome::Declined(_)) => Self::CONFIRMED,
            Ok(VerificationOutcome::SignatureInvalid) => Self::INVALID_CHECKSUM,
            Err(PaymentError::MalformedCallback("vnp_Amount")) => Self::INVALID_AMOUNT,
            Err(_) => Self::UNKNOWN_ERROR,
        }
    }
}
