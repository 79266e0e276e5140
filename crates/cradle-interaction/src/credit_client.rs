//! HTTP credit-ledger client.
//!
//! Implements the optimistic-concurrency contract over a REST ledger: a
//! consume is read-then-conditional-update, retried a bounded number of
//! times when the balance version moved underneath us, with a conflict
//! surfacing as its own error variant rather than a generic failure.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use cradle_core::credit::{CreditLedger, MAX_CONSUME_RETRIES};
use cradle_core::error::{CradleError, Result};

/// Client for the credit-ledger REST service.
#[derive(Clone)]
pub struct HttpCreditLedger {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    amount: u32,
    version: u64,
}

#[derive(Serialize)]
struct ConsumeRequest {
    amount: u32,
    expected_version: u64,
}

#[derive(Debug, Deserialize)]
struct ConsumeResponse {
    remaining: u32,
}

impl HttpCreditLedger {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn account_url(&self, id: &str) -> String {
        format!("{}/credits/{}", self.base_url.trim_end_matches('/'), id)
    }

    async fn read_balance(&self, id: &str, email: Option<&str>) -> Result<BalanceResponse> {
        let mut request = self.client.get(self.account_url(id));
        if let Some(email) = email {
            request = request.query(&[("email", email)]);
        }
        let response = request
            .send()
            .await
            .map_err(|err| CradleError::data_access(format!("ledger unreachable: {err}")))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(CradleError::not_found("credit account", id)),
            status if status.is_success() => response
                .json()
                .await
                .map_err(|err| CradleError::data_access(format!("bad ledger response: {err}"))),
            status => Err(CradleError::data_access(format!(
                "ledger returned {status}"
            ))),
        }
    }
}

#[async_trait]
impl CreditLedger for HttpCreditLedger {
    async fn fetch_balance(&self, id: &str, email: Option<&str>) -> Result<u32> {
        Ok(self.read_balance(id, email).await?.amount)
    }

    async fn consume(&self, id: &str, email: Option<&str>, amount: u32) -> Result<u32> {
        for attempt in 1..=MAX_CONSUME_RETRIES {
            let balance = self.read_balance(id, email).await?;
            if balance.amount < amount {
                return Err(CradleError::InsufficientCredits {
                    available: balance.amount,
                    required: amount,
                });
            }

            let response = self
                .client
                .post(format!("{}/consume", self.account_url(id)))
                .json(&ConsumeRequest {
                    amount,
                    expected_version: balance.version,
                })
                .send()
                .await
                .map_err(|err| CradleError::data_access(format!("ledger unreachable: {err}")))?;

            match response.status() {
                StatusCode::CONFLICT => {
                    tracing::debug!(
                        target: "credit",
                        attempt,
                        "ledger version moved during consume; retrying"
                    );
                    continue;
                }
                status if status.is_success() => {
                    let body: ConsumeResponse = response.json().await.map_err(|err| {
                        CradleError::data_access(format!("bad ledger response: {err}"))
                    })?;
                    return Ok(body.remaining);
                }
                status => {
                    return Err(CradleError::data_access(format!(
                        "ledger consume returned {status}"
                    )));
                }
            }
        }

        Err(CradleError::LedgerConflict {
            attempts: MAX_CONSUME_RETRIES,
        })
    }
}
