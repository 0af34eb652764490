// File: soulseer-core/src/payments/stripe.rs
//
// Thin client over the Stripe REST API: Checkout for deposits, Connect
// (Express accounts + transfers) for reader payouts. Requests are
// form-encoded; responses are parsed into the few fields we use.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use soulseer_common::models::money::usd;
use soulseer_common::models::{DepositCheckout, DepositStatus, PayoutAccountStatus};
use soulseer_common::traits::payment_traits::PaymentProvider;
use crate::Error;

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, Deserialize)]
struct CheckoutSessionResponse {
    id: String,
    url: Option<String>,
    payment_status: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    id: String,
    #[serde(default)]
    details_submitted: bool,
    #[serde(default)]
    payouts_enabled: bool,
}

#[derive(Debug, Deserialize)]
struct AccountLinkResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
struct TransferResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

pub struct StripeClient {
    http: ReqwestClient,
    api_base: String,
    secret_key: String,
    /// Where Stripe redirects the browser after checkout or onboarding.
    public_base_url: String,
}

impl StripeClient {
    pub fn new(secret_key: &str, public_base_url: &str) -> Self {
        Self::with_api_base(secret_key, public_base_url, DEFAULT_API_BASE)
    }

    /// Points the client at another host, e.g. stripe-mock.
    pub fn with_api_base(secret_key: &str, public_base_url: &str, api_base: &str) -> Self {
        Self {
            http: ReqwestClient::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post_form<T>(&self, path: &str, form: &[(&str, String)], idempotency_key: Option<&str>) -> Result<T, Error>
    where
        T: for<'de> Deserialize<'de>,
    {
        let mut request = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .form(form);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }
        Self::parse(request.send().await?).await
    }

    async fn get_json<T>(&self, path: &str) -> Result<T, Error>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .http
            .get(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn parse<T>(response: reqwest::Response) -> Result<T, Error>
    where
        T: for<'de> Deserialize<'de>,
    {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or_else(|| format!("HTTP {}", status));
            error!("Stripe request failed: {}", message);
            return Err(Error::PaymentProvider(message));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// Dollars to integer cents.
fn to_cents(amount: Decimal) -> Result<i64, Error> {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| Error::InvalidAmount(format!("{amount} cannot be expressed in cents")))
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_deposit(&self, user_id: Uuid, amount: Decimal) -> Result<DepositCheckout, Error> {
        let cents = to_cents(amount)?;
        let form = [
            ("mode", "payment".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", "usd".to_string()),
            ("line_items[0][price_data][unit_amount]", cents.to_string()),
            ("line_items[0][price_data][product_data][name]", "SoulSeer Balance Deposit".to_string()),
            (
                "line_items[0][price_data][product_data][description]",
                format!("Add ${:.2} to your account balance", amount),
            ),
            (
                "success_url",
                format!("{}/dashboard?deposit=success&amount={:.2}", self.public_base_url, amount),
            ),
            ("cancel_url", format!("{}/dashboard?deposit=cancelled", self.public_base_url)),
            ("metadata[userId]", user_id.to_string()),
            ("metadata[type]", "balance_deposit".to_string()),
            ("metadata[amountCents]", cents.to_string()),
        ];
        let session: CheckoutSessionResponse = self.post_form("/v1/checkout/sessions", &form, None).await?;
        let redirect_url = session
            .url
            .ok_or_else(|| Error::PaymentProvider("checkout session has no url".into()))?;

        info!("Created checkout session {} for user {} ({})", session.id, user_id, amount);
        Ok(DepositCheckout {
            provider_session_id: session.id,
            redirect_url,
        })
    }

    async fn confirm_deposit(&self, provider_session_id: &str) -> Result<DepositStatus, Error> {
        let session: CheckoutSessionResponse = self
            .get_json(&format!("/v1/checkout/sessions/{}", provider_session_id))
            .await?;

        let user_id = session
            .metadata
            .get("userId")
            .and_then(|s| Uuid::parse_str(s).ok());
        let cents = session
            .metadata
            .get("amountCents")
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0);

        Ok(DepositStatus {
            provider_session_id: session.id,
            paid: session.payment_status.as_deref() == Some("paid"),
            user_id,
            amount: usd(cents),
        })
    }

    async fn create_payout_account(&self, reader_id: Uuid, email: &str) -> Result<String, Error> {
        let form = [
            ("type", "express".to_string()),
            ("email", email.to_string()),
            ("capabilities[transfers][requested]", "true".to_string()),
            ("metadata[readerId]", reader_id.to_string()),
        ];
        let account: AccountResponse = self.post_form("/v1/accounts", &form, None).await?;
        info!("Created Connect account {} for reader {}", account.id, reader_id);
        Ok(account.id)
    }

    async fn create_onboarding_link(&self, account_id: &str) -> Result<String, Error> {
        let form = [
            ("account", account_id.to_string()),
            ("refresh_url", format!("{}/reader-dashboard?connect=refresh", self.public_base_url)),
            ("return_url", format!("{}/reader-dashboard?connect=success", self.public_base_url)),
            ("type", "account_onboarding".to_string()),
        ];
        let link: AccountLinkResponse = self.post_form("/v1/account_links", &form, None).await?;
        Ok(link.url)
    }

    async fn payout_account_status(&self, account_id: &str) -> Result<PayoutAccountStatus, Error> {
        let account: AccountResponse = self.get_json(&format!("/v1/accounts/{}", account_id)).await?;
        Ok(PayoutAccountStatus {
            details_submitted: account.details_submitted,
            payouts_enabled: account.payouts_enabled,
        })
    }

    async fn transfer_payout(&self, account_id: &str, amount: Decimal, idempotency_key: &str) -> Result<String, Error> {
        let form = [
            ("amount", to_cents(amount)?.to_string()),
            ("currency", "usd".to_string()),
            ("destination", account_id.to_string()),
            ("metadata[payoutKey]", idempotency_key.to_string()),
        ];
        let transfer: TransferResponse = self
            .post_form("/v1/transfers", &form, Some(idempotency_key))
            .await?;
        info!("Transferred {} to {} ({})", amount, account_id, transfer.id);
        Ok(transfer.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_cents() {
        assert_eq!(to_cents(usd(1197)).unwrap(), 1197);
        assert_eq!(to_cents(Decimal::new(5, 0)).unwrap(), 500);
        assert_eq!(to_cents(Decimal::new(8375, 3)).unwrap(), 838);
    }

    #[test]
    fn test_checkout_metadata_parses() {
        let body = r#"{
            "id": "cs_test_1",
            "url": null,
            "payment_status": "paid",
            "metadata": {"userId": "6f1c8a5e-1d7b-4a43-9b0e-2f4b1a7c9d10", "amountCents": "2500"}
        }"#;
        let parsed: CheckoutSessionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.payment_status.as_deref(), Some("paid"));
        assert_eq!(parsed.metadata.get("amountCents").map(String::as_str), Some("2500"));
    }
}
