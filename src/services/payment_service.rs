// src/services/payment_service.rs
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::{errors::KestrelError as AppError, models::ride::PaymentMethod};

#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    pub transaction_id: String,
    pub status: String,
}

/// Payment collaborator. A charge failure comes back as
/// `KestrelError::PaymentFailure`; the lifecycle manager catches it and maps
/// it to `payment.status = failed` without propagating further.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(
        &self,
        amount: f64,
        currency: &str,
        payer: &str,
        description: &str,
        method: PaymentMethod,
    ) -> Result<ChargeOutcome, AppError>;
}

/// Stripe-style gateway: a form-encoded payment-intent call.
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl StripeGateway {
    pub fn new(secret_key: String) -> Self {
        Self::with_base_url(secret_key, "https://api.stripe.com/v1".to_string())
    }

    pub fn with_base_url(secret_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key,
            base_url,
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn charge(
        &self,
        amount: f64,
        currency: &str,
        payer: &str,
        description: &str,
        _method: PaymentMethod,
    ) -> Result<ChargeOutcome, AppError> {
        // Stripe amounts are in the smallest currency unit
        let amount_cents = (amount * 100.0).round() as i64;

        let response = self
            .client
            .post(format!("{}/payment_intents", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .header("Idempotency-Key", Uuid::new_v4().to_string())
            .form(&[
                ("amount", amount_cents.to_string()),
                ("currency", currency.to_string()),
                ("description", description.to_string()),
                ("metadata[payer]", payer.to_string()),
                ("confirm", "true".to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::PaymentFailure(e.to_string()))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::PaymentFailure(body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::PaymentFailure(e.to_string()))?;

        Ok(ChargeOutcome {
            transaction_id: body["id"].as_str().unwrap_or_default().to_string(),
            status: body["status"].as_str().unwrap_or("succeeded").to_string(),
        })
    }
}

/// Mock gateway for development and testing; failure is scriptable so tests
/// can exercise the payment-failed completion path.
pub struct MockGateway {
    fail_next: AtomicBool,
    counter: std::sync::atomic::AtomicU64,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            fail_next: AtomicBool::new(false),
            counter: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn failing() -> Self {
        let gateway = Self::new();
        gateway.fail_next.store(true, Ordering::SeqCst);
        gateway
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail_next.store(fail, Ordering::SeqCst);
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn charge(
        &self,
        amount: f64,
        currency: &str,
        payer: &str,
        _description: &str,
        _method: PaymentMethod,
    ) -> Result<ChargeOutcome, AppError> {
        if self.fail_next.load(Ordering::SeqCst) {
            return Err(AppError::PaymentFailure("card declined".to_string()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(amount, currency, payer, "mock charge accepted");
        Ok(ChargeOutcome {
            transaction_id: format!("mock_txn_{:06}", n),
            status: "succeeded".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_gateway_succeeds_with_unique_transaction_ids() {
        let gw = MockGateway::new();
        let a = gw
            .charge(12.50, "eur", "usr-1", "ride", PaymentMethod::Card)
            .await
            .unwrap();
        let b = gw
            .charge(12.50, "eur", "usr-1", "ride", PaymentMethod::Card)
            .await
            .unwrap();
        assert_ne!(a.transaction_id, b.transaction_id);
        assert_eq!(a.status, "succeeded");
    }

    #[tokio::test]
    async fn failing_gateway_returns_payment_failure() {
        let gw = MockGateway::failing();
        let err = gw
            .charge(12.50, "eur", "usr-1", "ride", PaymentMethod::Card)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PaymentFailure(_)));
    }
}
