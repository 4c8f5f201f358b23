use crate::core::errors::ExchangeError;
use crate::core::kernel::{from_json, Parameters};
use crate::core::types::OrderType;
use crate::exchanges::binance_perp::connector::UsdMarginedFuturesMarket;
use crate::exchanges::binance_perp::conversions::protective_stop_price;
use crate::exchanges::binance_perp::types::{
    BatchOrderResult, NewOrder, OrderResponse, TpSlRequest,
};
use reqwest::Method;
use tracing::{debug, instrument};

/// Close-position trigger order on the opposite side of the protected position
fn protective_order(request: &TpSlRequest, order_type: OrderType, leverage: u32) -> Parameters {
    let (percent, towards_profit) = match order_type {
        OrderType::TakeProfitMarket => (request.take_profit, true),
        _ => (request.stop_loss, false),
    };
    let stop_price =
        protective_stop_price(request.side, request.price, percent, leverage, towards_profit);

    Parameters::new()
        .with("symbol", request.symbol.as_str())
        .with("side", request.side.opposite())
        .with("type", order_type)
        .with("stopPrice", stop_price)
        .with("closePosition", true)
        .with("priceProtect", true)
        .with("quantity", request.quantity)
        .with_opt("positionSide", request.position_side)
        .with_opt("timeInForce", request.time_in_force)
        .with_opt("workingType", request.working_type)
        .with_opt("newOrderRespType", request.new_order_resp_type)
}

impl UsdMarginedFuturesMarket {
    #[instrument(skip(self, order), fields(exchange = "binance_perp", symbol = %order.symbol))]
    pub async fn create_order(&self, order: &NewOrder) -> Result<OrderResponse, ExchangeError> {
        self.market
            .private_request(
                Method::POST,
                "/fapi/v1/order",
                order.to_parameters(),
                from_json::<OrderResponse>,
            )
            .await?
            .into_single()
    }

    /// Place up to five orders in one call; each entry succeeds or fails on its own
    #[instrument(skip(self, orders), fields(exchange = "binance_perp", count = orders.len()))]
    pub async fn create_batch_orders(
        &self,
        orders: &[NewOrder],
    ) -> Result<Vec<BatchOrderResult>, ExchangeError> {
        self.post_batch(orders.iter().map(NewOrder::to_parameters).collect())
            .await
    }

    /// Take-profit and stop-loss pair for an open position, priced with the cached
    /// leverage of the symbol (1 when account data is not loaded)
    #[instrument(skip(self, request), fields(exchange = "binance_perp", symbol = %request.symbol))]
    pub async fn add_tp_and_sl(
        &self,
        request: &TpSlRequest,
    ) -> Result<Vec<BatchOrderResult>, ExchangeError> {
        let leverage = self.leverage_or_default(&request.symbol);
        debug!(leverage, "Pricing protective orders");

        self.post_batch(vec![
            protective_order(request, OrderType::TakeProfitMarket, leverage),
            protective_order(request, OrderType::StopMarket, leverage),
        ])
        .await
    }

    async fn post_batch(
        &self,
        orders: Vec<Parameters>,
    ) -> Result<Vec<BatchOrderResult>, ExchangeError> {
        let parameters = Parameters::new().with("batchOrders", orders);
        Ok(self
            .market
            .private_request(
                Method::POST,
                "/fapi/v1/batchOrders",
                parameters,
                from_json::<BatchOrderResult>,
            )
            .await?
            .into_vec())
    }
}
