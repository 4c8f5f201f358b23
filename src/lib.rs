pub mod core;
pub mod exchanges;

pub use crate::core::{
    config::{ClientOptions, ConfigError, Credentials, MarketOptions, UserDataStreamConfig},
    errors::ExchangeError,
    kernel::{Converted, Parameters, UserDataStream},
    market::{Endpoints, Market},
    traits::{AccountDataSource, MarketConnector},
    types::*,
};
pub use exchanges::binance::SpotMarket;
pub use exchanges::binance_perp::UsdMarginedFuturesMarket;
