pub mod connector;

use crate::core::market::{MarketPaths, MarketProfile};

pub use connector::SpotMarket;

pub static SPOT: MarketProfile = MarketProfile {
    name: "binance",
    paths: MarketPaths {
        ping: "/api/v3/ping",
        server_time: "/api/v3/time",
        user_data_stream: "/api/v3/userDataStream",
    },
    mainnet_rest: "https://api.binance.com",
    mainnet_stream: "wss://stream.binance.com",
    testnet_rest: "https://testnet.binance.vision",
    testnet_stream: "wss://testnet.binance.vision",
};
