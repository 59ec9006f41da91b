use time::macros::datetime;
use vnpay_checkout::callback::{verify_callback, IpnAck, VerificationOutcome};
use vnpay_checkout::canonical::{encode, ParamSet, SECURE_HASH, SECURE_HASH_TYPE};
use vnpay_checkout::config::{GatewayConfig, OrderRefStrategy};
use vnpay_checkout::payment::{PaymentRequest, PaymentService};
use vnpay_checkout::signature::{sign, sign_params};
use vnpay_checkout::PaymentError;

const SECRET: &str = "TESTSECRETKEY0123456789";

fn test_config() -> GatewayConfig {
    GatewayConfig {
        tmn_code: "TESTTMN1".into(),
        hash_secret: SECRET.into(),
        payment_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".into(),
        return_url: "http://localhost:8888/payment/vnpay_return".into(),
        ..Default::default()
    }
}

fn request(amount: i64, bank_code: &str) -> PaymentRequest {
    PaymentRequest {
        amount,
        bank_code: Some(bank_code.to_string()),
        client_ip: "127.0.0.1".into(),
        locale: None,
    }
}

/// Callback parameters as the gateway would send them, signed with `secret`.
fn signed_callback(response_code: &str, secret: &str) -> ParamSet {
    let mut params = ParamSet::new();
    params
        .insert("vnp_Amount", "50000000")
        .insert("vnp_BankCode", "NCB")
        .insert("vnp_BankTranNo", "VNP14328574")
        .insert("vnp_CardType", "ATM")
        .insert("vnp_OrderInfo", "Thanh toan cho ma GD:17093015")
        .insert("vnp_PayDate", "20240317093512")
        .insert("vnp_ResponseCode", response_code)
        .insert("vnp_TmnCode", "TESTTMN1")
        .insert("vnp_TransactionNo", "14328574")
        .insert("vnp_TransactionStatus", response_code)
        .insert("vnp_TxnRef", "17093015");
    let sig = sign_params(&params, secret).unwrap();
    params.insert(SECURE_HASH_TYPE, "HmacSHA512");
    params.insert(SECURE_HASH, sig);
    params
}

fn query_of(url: &str) -> Vec<(String, String)> {
    let (_, query) = url.split_once('?').unwrap();
    serde_urlencoded::from_str(query).unwrap()
}

#[test]
fn build_rejects_non_positive_amount() {
    let service = PaymentService::new(test_config());
    assert!(matches!(service.build(&request(0, "")), Err(PaymentError::InvalidAmount)));
    assert!(matches!(service.build(&request(-5, "")), Err(PaymentError::InvalidAmount)));
}

#[test]
fn build_rejects_overflowing_amount() {
    let service = PaymentService::new(test_config());
    assert!(matches!(service.build(&request(i64::MAX, "")), Err(PaymentError::InvalidAmount)));
}

#[test]
fn build_populates_protocol_fields() {
    let service = PaymentService::new(test_config());
    let now = datetime!(2024-03-17 02:30:15 UTC);
    let url = service.build_at(&request(500_000, "NCB"), now).unwrap();

    // 02:30 UTC is 09:30 gateway time
    assert_eq!(url.order_reference.as_str(), "17093015");
    assert!(url.redirect_url.starts_with("https://sandbox.vnpayment.vn/paymentv2/vpcpay.html?"));

    let query = query_of(&url.redirect_url);
    let get = |k: &str| query.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());
    assert_eq!(get("vnp_Version"), Some("2.1.0"));
    assert_eq!(get("vnp_Command"), Some("pay"));
    assert_eq!(get("vnp_TmnCode"), Some("TESTTMN1"));
    assert_eq!(get("vnp_Locale"), Some("vn"));
    assert_eq!(get("vnp_CurrCode"), Some("VND"));
    assert_eq!(get("vnp_TxnRef"), Some("17093015"));
    assert_eq!(get("vnp_OrderInfo"), Some("Thanh toan cho ma GD:17093015"));
    assert_eq!(get("vnp_OrderType"), Some("other"));
    assert_eq!(get("vnp_Amount"), Some("50000000"));
    assert_eq!(get("vnp_ReturnUrl"), Some("http://localhost:8888/payment/vnpay_return"));
    assert_eq!(get("vnp_IpAddr"), Some("127.0.0.1"));
    assert_eq!(get("vnp_CreateDate"), Some("20240317093015"));
    assert_eq!(get("vnp_BankCode"), Some("NCB"));
    // signature is the last parameter
    assert_eq!(query.last().map(|(k, _)| k.as_str()), Some(SECURE_HASH));
}

#[test]
fn empty_bank_code_is_omitted() {
    let service = PaymentService::new(test_config());
    let url = service.build(&request(500_000, "")).unwrap();
    assert!(!url.redirect_url.contains("vnp_BankCode"));
}

#[test]
fn language_override_is_limited_to_known_locales() {
    let service = PaymentService::new(test_config());
    let mut req = request(10_000, "");
    req.locale = Some("en".into());
    assert!(service.build(&req).unwrap().redirect_url.contains("vnp_Locale=en"));
    req.locale = Some("fr".into());
    assert!(service.build(&req).unwrap().redirect_url.contains("vnp_Locale=vn"));
}

#[test]
fn built_url_signature_is_reproducible() {
    let service = PaymentService::new(test_config());
    let url = service.build(&request(500_000, "")).unwrap();

    let mut params: ParamSet = query_of(&url.redirect_url).into_iter().collect();
    let embedded = params.remove(SECURE_HASH).unwrap();
    assert_eq!(sign(&encode(&params), SECRET).unwrap().as_str(), embedded);
}

#[test]
fn built_url_verifies_as_callback() {
    let service = PaymentService::new(test_config());
    let url = service.build(&request(500_000, "")).unwrap();

    let mut params: ParamSet = query_of(&url.redirect_url).into_iter().collect();
    params.insert("vnp_ResponseCode", "00");
    let sig = {
        let mut unsigned = params.clone();
        unsigned.remove(SECURE_HASH);
        sign_params(&unsigned, SECRET).unwrap()
    };
    params.insert(SECURE_HASH, sig);

    match service.verify(params).unwrap() {
        VerificationOutcome::Approved(details) => {
            assert_eq!(details.order_reference, url.order_reference);
            assert_eq!(details.amount, 500_000);
            assert_eq!(details.amount_minor, 50_000_000);
        }
        other => panic!("expected approval, got {:?}", other),
    }
}

#[test]
fn approved_callback() {
    let outcome = verify_callback(signed_callback("00", SECRET), SECRET).unwrap();
    assert!(outcome.is_approved());
    let details = outcome.details().unwrap();
    assert_eq!(details.order_reference.as_str(), "17093015");
    assert_eq!(details.amount, 500_000);
    assert_eq!(details.transaction_no.as_deref(), Some("14328574"));
    assert_eq!(details.bank_code.as_deref(), Some("NCB"));
    assert_eq!(details.pay_date.as_deref(), Some("20240317093512"));
}

#[test]
fn declined_callback() {
    let outcome = verify_callback(signed_callback("24", SECRET), SECRET).unwrap();
    assert!(matches!(outcome, VerificationOutcome::Declined(ref d) if d.response_code == "24"));
    assert!(matches!(outcome.into_result(), Err(PaymentError::GatewayDeclined(d)) if d.response_code == "24"));
}

#[test]
fn altered_signature_character_is_rejected() {
    let mut params = signed_callback("00", SECRET);
    let mut sig = params.get(SECURE_HASH).unwrap().to_string();
    let last = sig.pop().unwrap();
    sig.push(if last == '0' { '1' } else { '0' });
    params.insert(SECURE_HASH, sig);
    assert_eq!(verify_callback(params, SECRET).unwrap(), VerificationOutcome::SignatureInvalid);
}

#[test]
fn tampered_amount_is_rejected() {
    let mut params = signed_callback("00", SECRET);
    params.insert("vnp_Amount", "100");
    assert_eq!(verify_callback(params, SECRET).unwrap(), VerificationOutcome::SignatureInvalid);
}

#[test]
fn missing_signature_is_rejected() {
    let mut params = signed_callback("00", SECRET);
    params.remove(SECURE_HASH);
    let outcome = verify_callback(params, SECRET).unwrap();
    assert_eq!(outcome, VerificationOutcome::SignatureInvalid);
    assert!(matches!(outcome.into_result(), Err(PaymentError::SignatureInvalid)));
}

#[test]
fn wrong_secret_is_rejected() {
    let outcome = verify_callback(signed_callback("00", "another-secret"), SECRET).unwrap();
    assert_eq!(outcome, VerificationOutcome::SignatureInvalid);
}

#[test]
fn unparsable_amount_after_valid_signature_is_malformed() {
    let mut params = signed_callback("00", SECRET);
    params.remove(SECURE_HASH);
    params.remove(SECURE_HASH_TYPE);
    params.insert("vnp_Amount", "abc");
    let sig = sign_params(&params, SECRET).unwrap();
    params.insert(SECURE_HASH, sig);
    let result = verify_callback(params, SECRET);
    assert!(matches!(result, Err(PaymentError::MalformedCallback("vnp_Amount"))));
    assert_eq!(IpnAck::from_verification(&result), IpnAck::INVALID_AMOUNT);
}

#[test]
fn fractional_minor_amount_is_malformed() {
    let mut params = signed_callback("00", SECRET);
    params.remove(SECURE_HASH);
    params.remove(SECURE_HASH_TYPE);
    params.insert("vnp_Amount", "12345");
    let sig = sign_params(&params, SECRET).unwrap();
    params.insert(SECURE_HASH, sig);
    let result = verify_callback(params, SECRET);
    assert!(matches!(result, Err(PaymentError::MalformedCallback("vnp_Amount"))));
    assert_eq!(IpnAck::from_verification(&result), IpnAck::INVALID_AMOUNT);
}

#[test]
fn ipn_acknowledgements() {
    let approved = verify_callback(signed_callback("00", SECRET), SECRET);
    let declined = verify_callback(signed_callback("51", SECRET), SECRET);
    let forged = verify_callback(signed_callback("00", "forged"), SECRET);
    assert_eq!(IpnAck::from_verification(&approved), IpnAck::CONFIRMED);
    assert_eq!(IpnAck::from_verification(&declined), IpnAck::CONFIRMED);
    assert_eq!(IpnAck::from_verification(&forged), IpnAck::INVALID_CHECKSUM);
}

#[test]
fn sequenced_references_do_not_collide_within_a_second() {
    let service = PaymentService::new(GatewayConfig { order_ref: OrderRefStrategy::Sequenced, ..test_config() });
    let now = datetime!(2024-03-17 02:30:15 UTC);
    let a = service.build_at(&request(1_000, ""), now).unwrap();
    let b = service.build_at(&request(1_000, ""), now).unwrap();
    assert_ne!(a.order_reference, b.order_reference);
}
