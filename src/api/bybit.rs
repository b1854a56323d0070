//! Bybit v2 private REST client.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{Exchange, ExchangeConnector, OrderAck, PositionInfo};
use crate::auth::{request_timestamp, ApiCredentials, RequestSigner, SignedParams};
use crate::config::ExchangeSettings;
use crate::error::TradeError;
use crate::models::Side;
use crate::Result;

const ORDER_CREATE: &str = "/v2/private/order/create";
const TRADING_STOP: &str = "/v2/private/position/trading-stop";
const POSITION_LIST: &str = "/v2/private/position/list";
const WALLET_BALANCE: &str = "/v2/private/wallet/balance";

// ============== Response Types ==============

#[derive(Debug, Deserialize)]
struct Envelope {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OrderResult {
    order_id: String,
    #[serde(default)]
    order_link_id: String,
}

#[derive(Debug, Deserialize)]
struct PositionRecord {
    #[serde(default)]
    side: String,
    #[serde(default)]
    size: f64,
}

/// Inverse contracts return one record, linear ones a list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PositionResult {
    Single(PositionRecord),
    Many(Vec<PositionRecord>),
}

#[derive(Debug, Deserialize)]
struct CoinBalance {
    wallet_balance: f64,
}

fn side_param(side: Side) -> &'static str {
    match side {
        Side::Long => "Buy",
        Side::Short => "Sell",
    }
}

fn parse_side(raw: &str) -> Option<Side> {
    match raw {
        "Buy" => Some(Side::Long),
        "Sell" => Some(Side::Short),
        _ => None,
    }
}

impl From<PositionRecord> for PositionInfo {
    fn from(record: PositionRecord) -> Self {
        let size = if record.size.is_finite() && record.size > 0.0 {
            record.size as u64
        } else {
            0
        };
        PositionInfo {
            size,
            side: if size > 0 { parse_side(&record.side) } else { None },
        }
    }
}

// ============== Client ==============

/// Signed REST session for one set of credentials
#[derive(Debug, Clone)]
pub struct BybitClient {
    client: Client,
    base_url: String,
    credentials: ApiCredentials,
    timestamp_skew_ms: i64,
}

impl BybitClient {
    pub fn new(settings: &ExchangeSettings, credentials: ApiCredentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            credentials,
            timestamp_skew_ms: settings.timestamp_skew_ms,
        })
    }

    fn sign(&self, params: &[(&str, String)]) -> Result<SignedParams> {
        RequestSigner::new(&self.credentials)
            .sign_params(params, request_timestamp(self.timestamp_skew_ms))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let signed = self.sign(params)?;
        let url = format!("{}{}?{}", self.base_url, path, signed.query_string());

        let response = self.client.get(&url).send().await?;
        self.decode(path, response).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let signed = self.sign(params)?;
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .json(&signed.to_json())
            .send()
            .await?;
        self.decode(path, response).await
    }

    /// Unwrap the `{ret_code, ret_msg, result}` envelope
    async fn decode<T: DeserializeOwned>(&self, path: &str, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TradeError::Exchange(format!(
                "{} returned HTTP {}: {}",
                path, status, body
            )));
        }

        let envelope: Envelope = response.json().await?;
        if envelope.ret_code != 0 {
            tracing::warn!(
                path = %path,
                ret_code = envelope.ret_code,
                ret_msg = %envelope.ret_msg,
                "Exchange rejected request"
            );
            return Err(TradeError::ExchangeRejected {
                code: envelope.ret_code,
                message: envelope.ret_msg,
            });
        }

        serde_json::from_value(envelope.result)
            .map_err(|e| TradeError::Exchange(format!("Unexpected {} result: {}", path, e)))
    }
}

#[async_trait]
impl Exchange for BybitClient {
    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        qty: u64,
        stop_loss: Option<f64>,
    ) -> Result<OrderAck> {
        let order_link_id = uuid::Uuid::new_v4().to_string();
        let mut params = vec![
            ("order_link_id", order_link_id.clone()),
            ("order_type", "Market".to_string()),
            ("qty", qty.to_string()),
            ("side", side_param(side).to_string()),
            ("symbol", symbol.to_string()),
            ("time_in_force", "GoodTillCancel".to_string()),
        ];
        if let Some(stop_loss) = stop_loss {
            params.push(("stop_loss", stop_loss.to_string()));
        }

        tracing::info!(
            symbol = %symbol,
            side = ?side,
            qty,
            stop_loss = ?stop_loss,
            order_link_id = %order_link_id,
            "Placing market order"
        );

        let result: OrderResult = self.post(ORDER_CREATE, &params).await?;
        Ok(OrderAck {
            order_id: result.order_id,
            order_link_id: if result.order_link_id.is_empty() {
                order_link_id
            } else {
                result.order_link_id
            },
        })
    }

    async fn place_take_profit(&self, symbol: &str, price: f64, qty: u64) -> Result<()> {
        let params = [
            ("symbol", symbol.to_string()),
            ("take_profit", price.to_string()),
            ("tp_size", qty.to_string()),
        ];

        tracing::info!(symbol = %symbol, price, qty, "Setting take-profit");
        let _: serde_json::Value = self.post(TRADING_STOP, &params).await?;
        Ok(())
    }

    async fn get_position(&self, symbol: &str) -> Result<PositionInfo> {
        let params = [("symbol", symbol.to_string())];
        let result: PositionResult = self.get(POSITION_LIST, &params).await?;

        let position = match result {
            PositionResult::Single(record) => PositionInfo::from(record),
            PositionResult::Many(records) => records
                .into_iter()
                .map(PositionInfo::from)
                .find(PositionInfo::is_open)
                .unwrap_or_else(PositionInfo::flat),
        };

        tracing::debug!(symbol = %symbol, size = position.size, side = ?position.side, "Fetched position");
        Ok(position)
    }

    async fn get_balance(&self, asset: &str) -> Result<f64> {
        let params = [("coin", asset.to_string())];
        let result: HashMap<String, CoinBalance> = self.get(WALLET_BALANCE, &params).await?;

        result
            .get(asset)
            .map(|coin| coin.wallet_balance)
            .ok_or_else(|| TradeError::Exchange(format!("No wallet balance reported for {}", asset)))
    }
}

/// Builds a `BybitClient` per set of credentials
#[derive(Debug, Clone)]
pub struct BybitConnector {
    settings: ExchangeSettings,
}

impl BybitConnector {
    pub fn new(settings: ExchangeSettings) -> Self {
        Self { settings }
    }
}

impl ExchangeConnector for BybitConnector {
    fn connect(&self, credentials: ApiCredentials) -> Result<Arc<dyn Exchange>> {
        Ok(Arc::new(BybitClient::new(&self.settings, credentials)?))
    }
}
