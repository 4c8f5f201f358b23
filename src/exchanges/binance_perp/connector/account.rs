use crate::core::errors::ExchangeError;
use crate::core::kernel::{from_json, Converted, Parameters};
use crate::core::types::PositionMode;
use crate::exchanges::binance_perp::connector::{AccountCaches, UsdMarginedFuturesMarket};
use crate::exchanges::binance_perp::conversions::{leverage_by_symbol, precision_by_symbol};
use crate::exchanges::binance_perp::types::{LeverageBracket, PositionInfo};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, instrument};

const POSITION_MODE_PATH: &str = "/fapi/v1/positionSide/dual";

fn convert_position_mode(body: Value) -> Result<PositionMode, ExchangeError> {
    body.get("dualSidePosition")
        .and_then(Value::as_bool)
        .map(PositionMode::from_dual_side)
        .ok_or_else(|| {
            ExchangeError::DeserializationError("Missing dualSidePosition in response".to_string())
        })
}

fn convert_acknowledgement(body: Value) -> Result<bool, ExchangeError> {
    Ok(body.get("msg").and_then(Value::as_str) == Some("success"))
}

impl UsdMarginedFuturesMarket {
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn get_position_mode(&self) -> Result<PositionMode, ExchangeError> {
        self.market
            .private_request(
                Method::GET,
                POSITION_MODE_PATH,
                Parameters::new(),
                convert_position_mode,
            )
            .await?
            .into_single()
    }

    /// Switch between one-way and hedge mode; `true` when the exchange acknowledged it
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn change_position_mode(&self, mode: PositionMode) -> Result<bool, ExchangeError> {
        let parameters = Parameters::new().with("dualSidePosition", mode.is_dual_side());
        self.market
            .private_request(
                Method::POST,
                POSITION_MODE_PATH,
                parameters,
                convert_acknowledgement,
            )
            .await?
            .into_single()
    }

    /// Position risk rows for `symbol`, or for every symbol when `None`
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn get_position_info(
        &self,
        symbol: Option<&str>,
    ) -> Result<Vec<PositionInfo>, ExchangeError> {
        let parameters = Parameters::new().with_opt("symbol", symbol);
        Ok(self
            .market
            .private_request(
                Method::GET,
                "/fapi/v2/positionRisk",
                parameters,
                from_json::<PositionInfo>,
            )
            .await?
            .into_vec())
    }

    /// Notional tiers and their maximum leverage, for `symbol` or every symbol
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn get_leverage_bracket(
        &self,
        symbol: Option<&str>,
    ) -> Result<Converted<LeverageBracket>, ExchangeError> {
        let parameters = Parameters::new().with_opt("symbol", symbol);
        self.market
            .private_request(
                Method::GET,
                "/fapi/v1/leverageBracket",
                parameters,
                from_json::<LeverageBracket>,
            )
            .await
    }

    /// Fetch positions and exchange info together; either failure discards both
    pub(crate) async fn load_account_caches(&self) -> Result<AccountCaches, ExchangeError> {
        let (positions, exchange_info) =
            tokio::try_join!(self.get_position_info(None), self.get_exchange_info())?;
        debug!(
            positions = positions.len(),
            symbols = exchange_info.symbols.len(),
            "Loaded account caches"
        );
        Ok(AccountCaches {
            leverage: leverage_by_symbol(&positions),
            precision: precision_by_symbol(&exchange_info),
        })
    }
}
