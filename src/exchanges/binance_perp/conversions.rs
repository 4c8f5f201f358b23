use crate::core::errors::ExchangeError;
use crate::core::types::OrderSide;
use crate::exchanges::binance_perp::types::{
    ExchangeInfo, LastPriceCandlestick, PositionInfo, PriceCandlestick, SymbolPrecision,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

fn field<'a>(row: &'a [Value], index: usize) -> Result<&'a Value, ExchangeError> {
    row.get(index).ok_or_else(|| {
        ExchangeError::DeserializationError(format!("Candlestick is missing field {}", index))
    })
}

fn decimal_at(row: &[Value], index: usize) -> Result<Decimal, ExchangeError> {
    match field(row, index)? {
        Value::String(s) => Decimal::from_str(s).map_err(|e| {
            ExchangeError::DeserializationError(format!("Invalid decimal at {}: {}", index, e))
        }),
        Value::Number(n) => Decimal::from_str(&n.to_string()).map_err(|e| {
            ExchangeError::DeserializationError(format!("Invalid decimal at {}: {}", index, e))
        }),
        other => Err(ExchangeError::DeserializationError(format!(
            "Expected decimal at {}, got {}",
            index, other
        ))),
    }
}

fn u64_at(row: &[Value], index: usize) -> Result<u64, ExchangeError> {
    field(row, index)?.as_u64().ok_or_else(|| {
        ExchangeError::DeserializationError(format!("Expected integer at {}", index))
    })
}

fn as_row(record: &Value) -> Result<&[Value], ExchangeError> {
    record.as_array().map(Vec::as_slice).ok_or_else(|| {
        ExchangeError::DeserializationError("Candlestick is not an array".to_string())
    })
}

/// `[openTime, open, high, low, close, volume, closeTime, quoteVolume, trades,
/// takerBuyBase, takerBuyQuote, ignore]`
pub fn convert_last_price_candlestick(record: Value) -> Result<LastPriceCandlestick, ExchangeError> {
    let row = as_row(&record)?;
    Ok(LastPriceCandlestick {
        open_time: u64_at(row, 0)?,
        open_price: decimal_at(row, 1)?,
        high: decimal_at(row, 2)?,
        low: decimal_at(row, 3)?,
        close_price: decimal_at(row, 4)?,
        volume: decimal_at(row, 5)?,
        close_time: u64_at(row, 6)?,
        quote_asset_volume: decimal_at(row, 7)?,
        number_of_trades: u64_at(row, 8)?,
        taker_buy_base_asset_volume: decimal_at(row, 9)?,
        taker_buy_quote_asset_volume: decimal_at(row, 10)?,
    })
}

/// Index and mark price klines share the kline layout; volume fields are unused and
/// slot 8 holds the number of basic data points.
pub fn convert_price_candlestick(record: Value) -> Result<PriceCandlestick, ExchangeError> {
    let row = as_row(&record)?;
    Ok(PriceCandlestick {
        open_time: u64_at(row, 0)?,
        open_price: decimal_at(row, 1)?,
        high: decimal_at(row, 2)?,
        low: decimal_at(row, 3)?,
        close_price: decimal_at(row, 4)?,
        close_time: u64_at(row, 6)?,
        number_of_basic_data: u64_at(row, 8)?,
    })
}

/// Number of decimal places of a step such as `tickSize` (`0.0100` -> 2, `1` -> 0)
pub fn precision_of(step: Decimal) -> u32 {
    step.normalize().scale()
}

/// Leverage per symbol. Hedge mode lists one row per side with the same leverage, so the
/// first row wins.
pub fn leverage_by_symbol(positions: &[PositionInfo]) -> HashMap<String, u32> {
    let mut leverage = HashMap::with_capacity(positions.len());
    for position in positions {
        leverage
            .entry(position.symbol.clone())
            .or_insert(position.leverage);
    }
    leverage
}

/// Price and quantity precision per symbol; a missing filter counts as 0 decimals
pub fn precision_by_symbol(exchange_info: &ExchangeInfo) -> HashMap<String, SymbolPrecision> {
    exchange_info
        .symbols
        .iter()
        .map(|symbol| {
            let precision = SymbolPrecision {
                price: symbol.tick_size().map_or(0, precision_of),
                quantity: symbol.step_size().map_or(0, precision_of),
            };
            (symbol.symbol.clone(), precision)
        })
        .collect()
}

/// Trigger price `percent` of margin away from `price` at the given leverage, truncated
/// to 4 decimals. `towards_profit` picks the take-profit direction for `side`.
pub fn protective_stop_price(
    side: OrderSide,
    price: Decimal,
    percent: Decimal,
    leverage: u32,
    towards_profit: bool,
) -> Decimal {
    let direction = match (side, towards_profit) {
        (OrderSide::Buy, true) | (OrderSide::Sell, false) => Decimal::ONE,
        (OrderSide::Buy, false) | (OrderSide::Sell, true) => Decimal::NEGATIVE_ONE,
    };
    let leverage = Decimal::from(leverage.max(1));
    let offset = direction * percent / Decimal::ONE_HUNDRED / leverage;
    let scale = Decimal::from(10_000);

    ((price * (Decimal::ONE + offset)) * scale).trunc() / scale
}

/// Accept `true`, `"true"` and `"false"`
pub fn bool_from_any<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::String(s) => Ok(s.eq_ignore_ascii_case("true")),
        Value::Null => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected boolean, got {}",
            other
        ))),
    }
}

/// Accept `20` and `"20"`
pub fn u32_from_any<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| serde::de::Error::custom(format!("expected u32, got {}", n))),
        Value::String(s) => s
            .trim()
            .parse::<u32>()
            .map_err(|e| serde::de::Error::custom(format!("expected u32, got {}: {}", s, e))),
        other => Err(serde::de::Error::custom(format!("expected u32, got {}", other))),
    }
}
