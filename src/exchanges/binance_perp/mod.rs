pub mod connector; // market facade split by responsibility
pub mod conversions; // positional arrays, lenient scalars, derived caches
pub mod types; // serde structs <- raw JSON

use crate::core::market::{MarketPaths, MarketProfile};

pub use connector::UsdMarginedFuturesMarket;
pub use types::*;

pub static USD_MARGINED_FUTURES: MarketProfile = MarketProfile {
    name: "binance_perp",
    paths: MarketPaths {
        ping: "/fapi/v1/ping",
        server_time: "/fapi/v1/time",
        user_data_stream: "/fapi/v1/listenKey",
    },
    mainnet_rest: "https://fapi.binance.com",
    mainnet_stream: "wss://fstream.binance.com",
    testnet_rest: "https://testnet.binancefuture.com",
    testnet_stream: "wss://stream.binancefuture.com",
};
