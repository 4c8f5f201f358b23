use crate::core::kernel::codec::ParamValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire enums are sent as their exchange spelling
macro_rules! wire_enum {
    ($name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }
        }

        impl From<$name> for ParamValue {
            fn from(value: $name) -> Self {
                ParamValue::Str(value.as_str().to_string())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

wire_enum!(OrderSide { Buy => "BUY", Sell => "SELL" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit,
    Market,
    Stop,
    StopMarket,
    TakeProfit,
    TakeProfitMarket,
    TrailingStopMarket,
}

wire_enum!(OrderType {
    Limit => "LIMIT",
    Market => "MARKET",
    Stop => "STOP",
    StopMarket => "STOP_MARKET",
    TakeProfit => "TAKE_PROFIT",
    TakeProfitMarket => "TAKE_PROFIT_MARKET",
    TrailingStopMarket => "TRAILING_STOP_MARKET",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInForce {
    GTC, // Good Till Canceled
    IOC, // Immediate or Cancel
    FOK, // Fill or Kill
    GTX, // Post only
}

wire_enum!(TimeInForce { GTC => "GTC", IOC => "IOC", FOK => "FOK", GTX => "GTX" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Both,
    Long,
    Short,
}

wire_enum!(PositionSide { Both => "BOTH", Long => "LONG", Short => "SHORT" });

/// One-way mode holds a single `BOTH` position per symbol, hedge mode a `LONG` and a `SHORT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionMode {
    OneWay,
    Hedge,
}

impl PositionMode {
    pub fn from_dual_side(dual_side_position: bool) -> Self {
        if dual_side_position {
            Self::Hedge
        } else {
            Self::OneWay
        }
    }

    pub fn is_dual_side(self) -> bool {
        matches!(self, Self::Hedge)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkingType {
    MarkPrice,
    ContractPrice,
}

wire_enum!(WorkingType { MarkPrice => "MARK_PRICE", ContractPrice => "CONTRACT_PRICE" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderResponseType {
    Ack,
    Result,
}

wire_enum!(OrderResponseType { Ack => "ACK", Result => "RESULT" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractType {
    Perpetual,
    CurrentMonth,
    NextMonth,
    CurrentQuarter,
    NextQuarter,
    #[serde(other)]
    Other,
}

wire_enum!(ContractType {
    Perpetual => "PERPETUAL",
    CurrentMonth => "CURRENT_MONTH",
    NextMonth => "NEXT_MONTH",
    CurrentQuarter => "CURRENT_QUARTER",
    NextQuarter => "NEXT_QUARTER",
    Other => "",
});

/// Candlestick interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KlineInterval {
    // Spot only
    Seconds1,

    // Minutes
    Minutes1,
    Minutes3,
    Minutes5,
    Minutes15,
    Minutes30,

    // Hours
    Hours1,
    Hours2,
    Hours4,
    Hours6,
    Hours8,
    Hours12,

    // Days
    Days1,
    Days3,

    // Weeks
    Weeks1,

    // Months
    Months1,
}

impl KlineInterval {
    /// Binance spelling (e.g., "1m", "1h", "1d")
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seconds1 => "1s",
            Self::Minutes1 => "1m",
            Self::Minutes3 => "3m",
            Self::Minutes5 => "5m",
            Self::Minutes15 => "15m",
            Self::Minutes30 => "30m",
            Self::Hours1 => "1h",
            Self::Hours2 => "2h",
            Self::Hours4 => "4h",
            Self::Hours6 => "6h",
            Self::Hours8 => "8h",
            Self::Hours12 => "12h",
            Self::Days1 => "1d",
            Self::Days3 => "3d",
            Self::Weeks1 => "1w",
            Self::Months1 => "1M",
        }
    }

    pub fn is_supported_by_futures(&self) -> bool {
        !matches!(self, Self::Seconds1)
    }
}

impl From<KlineInterval> for ParamValue {
    fn from(value: KlineInterval) -> Self {
        ParamValue::Str(value.as_str().to_string())
    }
}

impl fmt::Display for KlineInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match self {
            Self::Seconds1 => "1 second",
            Self::Minutes1 => "1 minute",
            Self::Minutes3 => "3 minutes",
            Self::Minutes5 => "5 minutes",
            Self::Minutes15 => "15 minutes",
            Self::Minutes30 => "30 minutes",
            Self::Hours1 => "1 hour",
            Self::Hours2 => "2 hours",
            Self::Hours4 => "4 hours",
            Self::Hours6 => "6 hours",
            Self::Hours8 => "8 hours",
            Self::Hours12 => "12 hours",
            Self::Days1 => "1 day",
            Self::Days3 => "3 days",
            Self::Weeks1 => "1 week",
            Self::Months1 => "1 month",
        };
        write!(f, "{}", description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kernel::codec::{encode, Parameters};

    #[test]
    fn test_enums_encode_with_wire_spelling() {
        let params = Parameters::new()
            .with("side", OrderSide::Buy)
            .with("type", OrderType::TakeProfitMarket)
            .with("positionSide", PositionSide::Long)
            .with("interval", KlineInterval::Months1);
        assert_eq!(
            encode(&params),
            "side=BUY&type=TAKE_PROFIT_MARKET&positionSide=LONG&interval=1M"
        );
    }

    #[test]
    fn test_serde_matches_wire_spelling() {
        assert_eq!(
            serde_json::to_string(&OrderType::TrailingStopMarket).unwrap(),
            "\"TRAILING_STOP_MARKET\""
        );
        let side: PositionSide = serde_json::from_str("\"BOTH\"").unwrap();
        assert_eq!(side, PositionSide::Both);
        let contract: ContractType = serde_json::from_str("\"PERPETUAL_DELIVERING\"").unwrap();
        assert_eq!(contract, ContractType::Other);
    }

    #[test]
    fn test_position_mode() {
        assert_eq!(PositionMode::from_dual_side(true), PositionMode::Hedge);
        assert!(!PositionMode::OneWay.is_dual_side());
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
    }

    #[test]
    fn test_kline_interval() {
        assert_eq!(KlineInterval::Minutes15.as_str(), "15m");
        assert_eq!(KlineInterval::Hours1.to_string(), "1 hour");
        assert!(!KlineInterval::Seconds1.is_supported_by_futures());
    }
}
