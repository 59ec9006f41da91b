use goose::prelude::*;
use rand::Rng;
use serde_json::json;

/// Load testing suite for the payment signing service.
///
/// Traffic mix:
/// - payment URL creation (HMAC-SHA512 signing per request)
/// - callbacks with forged signatures (verification path, always rejected)
/// - health monitoring endpoint
///
/// # Usage
/// ```bash
/// cd loadtest
/// DISABLE_RATE_LIMIT=1 cargo run --release -- --host http://localhost:8888 --users 10 --hatch-rate 2 --run-time 60s
/// ```
///
/// # Performance Targets
/// - Payment URL creation: <10ms p95 latency
/// - Callback verification: <10ms p95 latency
/// - Error rate: <1% (forged callbacks are expected 400s and not counted)

#[tokio::main]
async fn main() -> Result<(), GooseError> {
    GooseAttack::initialize()?
        .register_scenario(
            scenario!("Checkout")
                .register_transaction(transaction!(create_payment_url).set_weight(10)?)
                .register_transaction(transaction!(health_check).set_weight(1)?)
        )
        .register_scenario(
            scenario!("Callbacks")
                .register_transaction(transaction!(forged_callback).set_weight(5)?)
        )
        .execute()
        .await?;

    Ok(())
}

/// Creates payment URLs with randomized amounts and bank codes.
async fn create_payment_url(user: &mut GooseUser) -> TransactionResult {
    // Generate random parameters before await to satisfy Send bounds
    let body = {
        let mut rng = rand::thread_rng();
        let amount = rng.gen_range(10_000..5_000_000) / 1000 * 1000;
        let banks = ["", "NCB", "VNPAYQR", "INTCARD"];
        let bank = banks[rng.gen_range(0..banks.len())];
        json!({ "amount": amount, "bankCode": bank })
    };

    let _goose = user.post_json("/payment/create_payment_url", &body).await?;

    Ok(())
}

/// Drives the verification path with a signature that never matches.
async fn forged_callback(user: &mut GooseUser) -> TransactionResult {
    let path = {
        let mut rng = rand::thread_rng();
        let txn_ref: u32 = rng.gen_range(10_000_000..31_235_959);
        format!(
            "/payment/vnpay_return?vnp_Amount=50000000&vnp_ResponseCode=00&vnp_TxnRef={}&vnp_SecureHash={}",
            txn_ref,
            "0".repeat(128)
        )
    };

    let mut goose = user.get(&path).await?;
    if let Ok(response) = &goose.response {
        if response.status().as_u16() == 400 {
            // rejection is the expected outcome
            return user.set_success(&mut goose.request);
        }
    }

    Ok(())
}

/// Monitors service availability via health check endpoint.
async fn health_check(user: &mut GooseUser) -> TransactionResult {
    let _goose = user.get("/health").await?;
    Ok(())
}
