//! Transport kernel shared by every market
//!
//! The kernel holds the exchange-agnostic pieces of the protocol. It does not know
//! about any specific product family.
//!
//! # Components
//!
//! ## Encoding and signing
//! - `Parameters` / `encode`: ordered request parameters and their canonical query string
//! - `sign`: HMAC-SHA256 over the exact query string
//! - `Signer` / `HmacSigner`: attach the API key header and produce the signature
//!
//! ## Requests
//! - `RequestClient`: public and signed calls with timestamp and `recvWindow` injection
//! - `ResponseConverter`: maps each response record into a typed value
//!
//! ## User data stream
//! - `UserDataSession`: listen-key create, keepalive and close around one socket
//! - `UserDataStream`: read-only handle to the pushed messages
//!
//! # Example
//! ```rust,no_run
//! use binance_markets::core::config::{ClientOptions, Credentials};
//! use binance_markets::core::kernel::*;
//! use reqwest::Method;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RequestClient::new(
//!     "binance_perp",
//!     ClientOptions::default(),
//!     Some(Credentials::new("api_key", "secret_key")),
//! )?;
//!
//! let positions = client
//!     .private_request_raw(
//!         Method::GET,
//!         "https://fapi.binance.com",
//!         "/fapi/v2/positionRisk",
//!         Parameters::new().with("symbol", "BTCUSDT"),
//!     )
//!     .await?;
//! println!("{}", positions);
//! # Ok(())
//! # }
//! ```
pub mod codec;
pub mod rest;
pub mod signer;
pub mod ws;

pub use codec::{encode, sign, ParamValue, Parameters};
pub use rest::{
    from_json, Clock, Converted, FixedClock, RequestClient, ResponseConverter, RestClientBuilder,
    RestClientConfig, SignedRequest, SystemClock,
};
pub use signer::{HmacSigner, SignatureResult, Signer, API_KEY_HEADER};
pub use ws::{event_type, ErrorObserver, UserDataSession, UserDataStream};
