use vnpay_checkout::canonical::{encode, ParamSet};
use vnpay_checkout::signature::{sign, sign_params, verify_signature, SignatureError};
use hmac::Mac;

fn sample() -> ParamSet {
    let mut params = ParamSet::new();
    params.insert("vnp_TxnRef", "17093015");
    params.insert("vnp_Amount", 50_000_000u64);
    params.insert("vnp_OrderInfo", "Thanh toan cho ma GD:17093015");
    params
}

#[test]
fn signature_validates() {
    let params = sample();
    let secret = "s";
    // compute expected by hand
    let canonical = encode(&params);
    let mut mac = hmac::Hmac::<sha2::Sha512>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(canonical.as_bytes());
    let sig = hex::encode(mac.finalize().into_bytes());
    assert!(verify_signature(&params, &sig, secret).is_ok());
}

#[test]
fn signature_rejects_tamper() {
    let params = sample();
    let sig = sign("bad=param", "s").unwrap();
    assert!(matches!(verify_signature(&params, sig.as_str(), "s"), Err(SignatureError::Invalid)));
}

#[test]
fn missing_signature_is_reported() {
    assert!(matches!(verify_signature(&sample(), "", "s"), Err(SignatureError::Missing)));
}

#[test]
fn encode_ignores_construction_order() {
    let forward: ParamSet = [("vnp_Amount", "100"), ("vnp_Locale", "vn"), ("vnp_TxnRef", "1")]
        .into_iter()
        .collect();
    let mut backward = ParamSet::new();
    backward.insert("vnp_TxnRef", "1").insert("vnp_Locale", "vn").insert("vnp_Amount", "100");
    assert_eq!(encode(&forward), encode(&backward));
    assert_eq!(sign_params(&forward, "k").unwrap(), sign_params(&backward, "k").unwrap());
}

#[test]
fn signing_is_stable() {
    let payload = encode(&sample());
    assert_eq!(sign(&payload, "secret").unwrap(), sign(&payload, "secret").unwrap());
}

#[test]
fn different_secrets_give_different_signatures() {
    let payload = encode(&sample());
    assert_ne!(sign(&payload, "secret-a").unwrap(), sign(&payload, "secret-b").unwrap());
}

#[test]
fn every_single_value_change_is_detected() {
    let params = sample();
    let sig = sign_params(&params, "s").unwrap();
    for (key, value) in params.iter() {
        let mut tampered = params.clone();
        tampered.insert(key, format!("{}0", value));
        assert!(verify_signature(&tampered, sig.as_str(), "s").is_err(), "tamper on {key} not detected");
    }
}
