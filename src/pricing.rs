//! USD price conversion for collected funds.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bigdecimal::{BigDecimal, Zero};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::PriceServiceConfig;
use crate::types::Currency;

/// External price-conversion collaborator.
#[async_trait]
pub trait PriceLookup: Send + Sync {
    /// USD value of a human-unit `amount` of `currency`.
    ///
    /// A zero amount must resolve to zero without a network call.
    async fn price_of(&self, currency: Currency, amount: &BigDecimal) -> Result<BigDecimal>;
}

/// HTTP client for a CoinMarketCap-style price-conversion endpoint.
pub struct ConversionApiClient {
    client: Client,
    config: PriceServiceConfig,
}

impl ConversionApiClient {
    pub fn new(config: PriceServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build price HTTP client")?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl PriceLookup for ConversionApiClient {
    #[instrument(skip(self, amount), fields(currency = currency.as_str()))]
    async fn price_of(&self, currency: Currency, amount: &BigDecimal) -> Result<BigDecimal> {
        if amount.is_zero() {
            return Ok(BigDecimal::zero());
        }

        let url = format!(
            "{}/price-conversion?amount={}&symbol={}",
            self.config.base_url,
            amount,
            currency.as_str()
        );

        let payload: Value = self
            .client
            .get(&url)
            .header("X-CMC_PRO_API_KEY", &self.config.api_key)
            .send()
            .await
            .context("price conversion request failed")?
            .json()
            .await
            .context("price conversion returned a non-JSON response")?;

        let price = extract_usd_price(&payload)?;
        debug!(%price, "price conversion resolved");
        Ok(price)
    }
}

/// The quote sits at `data.quote.USD.price`; a missing quote is treated as
/// zero, matching the service's behaviour for unpriced symbols.
fn extract_usd_price(payload: &Value) -> Result<BigDecimal> {
    let Some(price) = payload.pointer("/data/quote/USD/price") else {
        return Ok(BigDecimal::zero());
    };

    match price {
        Value::Number(number) => {
            BigDecimal::from_str(&number.to_string()).context("unparseable USD price")
        }
        Value::String(text) => BigDecimal::from_str(text).context("unparseable USD price"),
        Value::Null => Ok(BigDecimal::zero()),
        other => Err(anyhow::anyhow!("unexpected USD price value: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_client() -> ConversionApiClient {
        ConversionApiClient::new(PriceServiceConfig {
            // Nothing listens here; any request would fail immediately.
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: "test-key".to_string(),
            timeout_secs: 1,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn zero_amount_short_circuits_without_a_call() {
        let client = unreachable_client();
        let price = client
            .price_of(Currency::Eth, &BigDecimal::zero())
            .await
            .unwrap();
        assert!(price.is_zero());
    }

    #[test]
    fn extracts_numeric_and_string_quotes() {
        let payload = serde_json::json!({ "data": { "quote": { "USD": { "price": 250.5 } } } });
        assert_eq!(
            extract_usd_price(&payload).unwrap(),
            BigDecimal::from_str("250.5").unwrap()
        );

        let payload = serde_json::json!({ "data": { "quote": { "USD": { "price": "1.0001" } } } });
        assert_eq!(
            extract_usd_price(&payload).unwrap(),
            BigDecimal::from_str("1.0001").unwrap()
        );

        let payload = serde_json::json!({ "data": {} });
        assert!(extract_usd_price(&payload).unwrap().is_zero());
    }
}
