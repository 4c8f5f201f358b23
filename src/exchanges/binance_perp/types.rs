use crate::core::kernel::codec::Parameters;
use crate::core::types::{
    ContractType, OrderResponseType, OrderSide, OrderType, PositionSide, TimeInForce, WorkingType,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeInfo {
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub server_time: u64,
    #[serde(default)]
    pub rate_limits: Vec<RateLimit>,
    #[serde(default)]
    pub exchange_filters: Vec<Value>,
    #[serde(default)]
    pub assets: Vec<AssetInfo>,
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    pub rate_limit_type: String,
    pub interval: String,
    pub interval_num: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    pub asset: String,
    pub margin_available: bool,
    pub auto_asset_exchange: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    #[serde(default)]
    pub pair: String,
    #[serde(rename = "contractType")]
    pub contract_type: Option<ContractType>,
    #[serde(rename = "deliveryDate", default)]
    pub delivery_date: u64,
    #[serde(rename = "onboardDate", default)]
    pub onboard_date: u64,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "maintMarginPercent")]
    pub maint_margin_percent: Option<Decimal>,
    #[serde(rename = "requiredMarginPercent")]
    pub required_margin_percent: Option<Decimal>,
    #[serde(rename = "baseAsset", default)]
    pub base_asset: String,
    #[serde(rename = "quoteAsset", default)]
    pub quote_asset: String,
    #[serde(rename = "marginAsset", default)]
    pub margin_asset: String,
    #[serde(rename = "pricePrecision", default)]
    pub price_precision: u32,
    #[serde(rename = "quantityPrecision", default)]
    pub quantity_precision: u32,
    #[serde(rename = "triggerProtect")]
    pub trigger_protect: Option<Decimal>,
    #[serde(rename = "liquidationFee")]
    pub liquidation_fee: Option<Decimal>,
    #[serde(rename = "marketTakeBound")]
    pub market_take_bound: Option<Decimal>,
    #[serde(default)]
    pub filters: Vec<SymbolFilter>,
    #[serde(rename = "orderTypes", alias = "OrderType", default)]
    pub order_types: Vec<String>,
    #[serde(rename = "timeInForce", default)]
    pub time_in_force: Vec<String>,
}

impl SymbolInfo {
    pub fn tick_size(&self) -> Option<Decimal> {
        self.filters.iter().find_map(|filter| match filter {
            SymbolFilter::PriceFilter { tick_size, .. } => Some(*tick_size),
            _ => None,
        })
    }

    pub fn step_size(&self) -> Option<Decimal> {
        self.filters.iter().find_map(|filter| match filter {
            SymbolFilter::LotSize { step_size, .. } => Some(*step_size),
            _ => None,
        })
    }
}

/// Trading rule attached to a symbol. Filter types added by the exchange later map to
/// `Other`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "filterType")]
pub enum SymbolFilter {
    #[serde(rename = "PRICE_FILTER", rename_all = "camelCase")]
    PriceFilter {
        min_price: Decimal,
        max_price: Decimal,
        tick_size: Decimal,
    },
    #[serde(rename = "LOT_SIZE", rename_all = "camelCase")]
    LotSize {
        min_qty: Decimal,
        max_qty: Decimal,
        step_size: Decimal,
    },
    #[serde(rename = "MARKET_LOT_SIZE", rename_all = "camelCase")]
    MarketLotSize {
        min_qty: Decimal,
        max_qty: Decimal,
        step_size: Decimal,
    },
    #[serde(rename = "MAX_NUM_ORDERS")]
    MaxNumOrders {
        #[serde(alias = "maxNumOrders", default)]
        limit: u32,
    },
    #[serde(rename = "MAX_NUM_ALGO_ORDERS")]
    MaxNumAlgoOrders {
        #[serde(alias = "maxNumAlgoOrders", default)]
        limit: u32,
    },
    #[serde(rename = "PERCENT_PRICE", rename_all = "camelCase")]
    PercentPrice {
        multiplier_up: Decimal,
        multiplier_down: Decimal,
        multiplier_decimal: Decimal,
    },
    #[serde(rename = "MIN_NOTIONAL", rename_all = "camelCase")]
    MinNotional { notional: Decimal },
    #[serde(other)]
    Other,
}

/// One side of the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "RawBookLevel")]
pub struct BookLevel {
    pub price: Decimal,
    pub qty: Decimal,
}

#[derive(Deserialize)]
struct RawBookLevel(
    #[serde(with = "rust_decimal::serde::str")] Decimal,
    #[serde(with = "rust_decimal::serde::str")] Decimal,
);

impl From<RawBookLevel> for BookLevel {
    fn from(raw: RawBookLevel) -> Self {
        Self {
            price: raw.0,
            qty: raw.1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderBook {
    #[serde(rename = "lastUpdateId")]
    pub last_update_id: u64,
    #[serde(rename = "E")]
    pub message_output_time: u64,
    #[serde(rename = "T")]
    pub transaction_time: u64,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: u64,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub qty: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub quote_qty: Decimal,
    pub time: u64,
    pub is_buyer_maker: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregateTrade {
    #[serde(rename = "a")]
    pub aggregate_trade_id: u64,
    #[serde(rename = "p", with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(rename = "q", with = "rust_decimal::serde::str")]
    pub qty: Decimal,
    #[serde(rename = "f")]
    pub first_trade_id: u64,
    #[serde(rename = "l")]
    pub last_trade_id: u64,
    #[serde(rename = "T")]
    pub timestamp: u64,
    #[serde(rename = "m")]
    pub buyer_is_maker: bool,
}

/// Last-price candlestick, decoded from a positional array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastPriceCandlestick {
    pub open_time: u64,
    pub open_price: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close_price: Decimal,
    pub volume: Decimal,
    pub close_time: u64,
    pub quote_asset_volume: Decimal,
    pub number_of_trades: u64,
    pub taker_buy_base_asset_volume: Decimal,
    pub taker_buy_quote_asset_volume: Decimal,
}

/// Index-price or mark-price candlestick, decoded from a positional array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceCandlestick {
    pub open_time: u64,
    pub open_price: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close_price: Decimal,
    pub close_time: u64,
    pub number_of_basic_data: u64,
}

pub type IndexPriceCandlestick = PriceCandlestick;
pub type MarkPriceCandlestick = PriceCandlestick;

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolPrice {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(default)]
    pub time: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingRate {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub funding_rate: Decimal,
    pub funding_time: u64,
    #[serde(default)]
    pub mark_price: Option<Decimal>,
}

/// Row of `/fapi/v1/premiumIndex`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkPriceAndFundingRate {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub mark_price: Decimal,
    #[serde(default)]
    pub index_price: Decimal,
    #[serde(default)]
    pub estimated_settle_price: Decimal,
    #[serde(default)]
    pub last_funding_rate: Decimal,
    #[serde(default)]
    pub next_funding_time: u64,
    #[serde(default)]
    pub interest_rate: Decimal,
    #[serde(default)]
    pub time: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeverageBracket {
    pub symbol: String,
    #[serde(default)]
    pub notional_coef: Option<Decimal>,
    pub brackets: Vec<NotionalBracket>,
}

/// One notional tier; the exchange sends these fields as JSON numbers
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotionalBracket {
    pub bracket: u32,
    pub initial_leverage: u32,
    pub notional_cap: Decimal,
    pub notional_floor: Decimal,
    pub maint_margin_ratio: Decimal,
    #[serde(default)]
    pub cum: Decimal,
}

/// Row of `/fapi/v2/positionRisk`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionInfo {
    pub symbol: String,
    #[serde(default)]
    pub margin_type: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub entry_price: Decimal,
    #[serde(default, deserialize_with = "crate::exchanges::binance_perp::conversions::bool_from_any")]
    pub is_auto_add_margin: bool,
    #[serde(default)]
    pub isolated_margin: Decimal,
    #[serde(deserialize_with = "crate::exchanges::binance_perp::conversions::u32_from_any")]
    pub leverage: u32,
    #[serde(default)]
    pub liquidation_price: Decimal,
    #[serde(default)]
    pub mark_price: Decimal,
    #[serde(default)]
    pub max_notional_value: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub position_amt: Decimal,
    #[serde(default)]
    pub notional: Decimal,
    #[serde(default)]
    pub isolated_wallet: Decimal,
    #[serde(default)]
    pub un_realized_profit: Decimal,
    pub position_side: PositionSide,
    #[serde(default)]
    pub update_time: u64,
}

/// Symbol precision derived from the price and lot-size filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SymbolPrecision {
    /// Decimals of `tickSize`
    pub price: u32,
    /// Decimals of `stepSize`
    pub quantity: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: u64,
    pub symbol: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub client_order_id: String,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub avg_price: Decimal,
    #[serde(default)]
    pub orig_qty: Decimal,
    #[serde(default)]
    pub executed_qty: Decimal,
    #[serde(default)]
    pub cum_quote: Decimal,
    #[serde(default)]
    pub time_in_force: Option<String>,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    #[serde(default)]
    pub reduce_only: bool,
    #[serde(default)]
    pub close_position: bool,
    pub side: OrderSide,
    pub position_side: Option<PositionSide>,
    #[serde(default)]
    pub stop_price: Decimal,
    #[serde(default)]
    pub working_type: Option<WorkingType>,
    #[serde(default)]
    pub price_protect: bool,
    #[serde(default)]
    pub update_time: u64,
}

/// Each entry of a batch either placed an order or failed on its own
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BatchOrderResult {
    Placed(Box<OrderResponse>),
    Rejected { code: i64, msg: String },
}

/// Parameters of a new order
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub symbol: String,
    pub side: OrderSide,
    pub position_side: Option<PositionSide>,
    pub order_type: OrderType,
    pub time_in_force: Option<TimeInForce>,
    pub quantity: Option<Decimal>,
    pub reduce_only: Option<bool>,
    pub price: Option<Decimal>,
    pub new_client_order_id: Option<String>,
    pub stop_price: Option<Decimal>,
    pub close_position: Option<bool>,
    pub activation_price: Option<Decimal>,
    pub callback_rate: Option<Decimal>,
    pub working_type: Option<WorkingType>,
    pub price_protect: Option<bool>,
    pub new_order_resp_type: Option<OrderResponseType>,
}

impl NewOrder {
    pub fn new(symbol: impl Into<String>, side: OrderSide, order_type: OrderType) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            position_side: None,
            order_type,
            time_in_force: None,
            quantity: None,
            reduce_only: None,
            price: None,
            new_client_order_id: None,
            stop_price: None,
            close_position: None,
            activation_price: None,
            callback_rate: None,
            working_type: None,
            price_protect: None,
            new_order_resp_type: None,
        }
    }

    pub fn limit(symbol: impl Into<String>, side: OrderSide, quantity: Decimal, price: Decimal) -> Self {
        Self::new(symbol, side, OrderType::Limit)
            .quantity(quantity)
            .price(price)
            .time_in_force(TimeInForce::GTC)
    }

    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: Decimal) -> Self {
        Self::new(symbol, side, OrderType::Market).quantity(quantity)
    }

    pub fn quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    pub fn time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = Some(time_in_force);
        self
    }

    pub fn position_side(mut self, position_side: PositionSide) -> Self {
        self.position_side = Some(position_side);
        self
    }

    pub fn stop_price(mut self, stop_price: Decimal) -> Self {
        self.stop_price = Some(stop_price);
        self
    }

    pub fn reduce_only(mut self, reduce_only: bool) -> Self {
        self.reduce_only = Some(reduce_only);
        self
    }

    pub fn client_order_id(mut self, id: impl Into<String>) -> Self {
        self.new_client_order_id = Some(id.into());
        self
    }

    pub fn working_type(mut self, working_type: WorkingType) -> Self {
        self.working_type = Some(working_type);
        self
    }

    pub fn to_parameters(&self) -> Parameters {
        Parameters::new()
            .with("symbol", self.symbol.as_str())
            .with("side", self.side)
            .with_opt("positionSide", self.position_side)
            .with("type", self.order_type)
            .with_opt("timeInForce", self.time_in_force)
            .with_opt("quantity", self.quantity)
            .with_opt("reduceOnly", self.reduce_only)
            .with_opt("price", self.price)
            .with_opt("newClientOrderId", self.new_client_order_id.clone())
            .with_opt("stopPrice", self.stop_price)
            .with_opt("closePosition", self.close_position)
            .with_opt("activationPrice", self.activation_price)
            .with_opt("callbackRate", self.callback_rate)
            .with_opt("workingType", self.working_type)
            .with_opt("priceProtect", self.price_protect)
            .with_opt("newOrderRespType", self.new_order_resp_type)
    }
}

/// Entry price plus take-profit and stop-loss distances, in percent of margin
#[derive(Debug, Clone)]
pub struct TpSlRequest {
    pub symbol: String,
    /// Side of the position being protected
    pub side: OrderSide,
    pub position_side: Option<PositionSide>,
    pub time_in_force: Option<TimeInForce>,
    pub quantity: Decimal,
    pub price: Decimal,
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
    pub working_type: Option<WorkingType>,
    pub new_order_resp_type: Option<OrderResponseType>,
}

impl TpSlRequest {
    pub fn new(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
        take_profit: Decimal,
        stop_loss: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            position_side: None,
            time_in_force: None,
            quantity,
            price,
            take_profit,
            stop_loss,
            working_type: None,
            new_order_resp_type: None,
        }
    }
}
