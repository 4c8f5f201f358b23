use crate::core::config::{ClientOptions, Credentials, MarketOptions};
use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::Parameters;
use crate::core::kernel::rest::{Converted, RequestClient, ResponseConverter};
use crate::core::kernel::ws::{UserDataSession, UserDataStream};
use reqwest::Method;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, instrument};

/// REST and stream hosts of one network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Scheme and host, e.g. `https://fapi.binance.com`
    pub rest: String,
    /// Scheme and host, e.g. `wss://fstream.binance.com`
    pub stream: String,
}

impl Endpoints {
    pub fn new(rest: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            rest: rest.into(),
            stream: stream.into(),
        }
    }
}

/// Paths every market exposes
#[derive(Debug, Clone, Copy)]
pub struct MarketPaths {
    pub ping: &'static str,
    pub server_time: &'static str,
    /// Listen-key endpoint, used with POST, PUT and DELETE
    pub user_data_stream: &'static str,
}

/// Static description of a product family
#[derive(Debug, Clone, Copy)]
pub struct MarketProfile {
    pub name: &'static str,
    pub paths: MarketPaths,
    pub mainnet_rest: &'static str,
    pub mainnet_stream: &'static str,
    pub testnet_rest: &'static str,
    pub testnet_stream: &'static str,
}

impl MarketProfile {
    pub fn endpoints(&self, is_testnet: bool) -> Endpoints {
        if is_testnet {
            Endpoints::new(self.testnet_rest, self.testnet_stream)
        } else {
            Endpoints::new(self.mainnet_rest, self.mainnet_stream)
        }
    }
}

/// Behavior shared by every market: network selection, credentials, connectivity
/// checks and the user data stream.
///
/// Opening and closing the stream goes through the product's `AccountDataSource`, so
/// product state such as the futures caches cannot drift from the session:
///
/// ```compile_fail
/// use binance_markets::{MarketConnector, MarketOptions, UsdMarginedFuturesMarket};
///
/// async fn open(futures: &UsdMarginedFuturesMarket) {
///     let _ = futures.market().init_account_data().await;
/// }
/// ```
pub struct Market {
    profile: &'static MarketProfile,
    client: Arc<RequestClient>,
    endpoints: RwLock<Endpoints>,
    session: UserDataSession,
}

impl std::fmt::Debug for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Market")
            .field("name", &self.profile.name)
            .field("endpoints", &self.endpoints())
            .field("client", &self.client)
            .field("session", &self.session)
            .finish()
    }
}

impl Market {
    /// Build a market from its profile and options
    pub fn new(profile: &'static MarketProfile, options: MarketOptions) -> Result<Self, ExchangeError> {
        let client = RequestClient::new(
            profile.name,
            options.client_options.unwrap_or_default(),
            options.account_connection,
        )?;
        let endpoints = options
            .endpoints
            .unwrap_or_else(|| profile.endpoints(options.is_testnet));
        let client = Arc::new(client);

        Ok(Self {
            profile,
            session: UserDataSession::new(
                client.clone(),
                profile.paths.user_data_stream,
                options.stream,
            ),
            client,
            endpoints: RwLock::new(endpoints),
        })
    }

    pub fn profile(&self) -> &'static MarketProfile {
        self.profile
    }

    pub fn client(&self) -> &RequestClient {
        &self.client
    }

    /// Switch between mainnet and testnet hosts. An open stream keeps its connection.
    pub fn set_network(&self, is_testnet: bool) {
        self.set_endpoints(self.profile.endpoints(is_testnet));
    }

    pub fn set_endpoints(&self, endpoints: Endpoints) {
        debug!(rest = %endpoints.rest, stream = %endpoints.stream, "Endpoints changed");
        *self
            .endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner) = endpoints;
    }

    pub fn endpoints(&self) -> Endpoints {
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn rest_host(&self) -> String {
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rest
            .clone()
    }

    pub fn set_client_options(&self, options: ClientOptions) -> Result<(), ExchangeError> {
        self.client.configure(options)
    }

    /// Replace the account. `None` closes the user data stream first, then revokes the
    /// credentials.
    pub async fn set_account(&self, credentials: Option<Credentials>) {
        match credentials {
            Some(credentials) => self.client.set_credentials(Some(credentials)),
            None => {
                self.session.close().await;
                self.client.set_credentials(None);
                info!(market = self.profile.name, "Account removed");
            }
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.client.has_credentials()
    }

    pub(crate) fn ensure_authorized(&self) -> Result<(), ExchangeError> {
        if self.is_authorized() {
            Ok(())
        } else {
            Err(ExchangeError::NotAuthorized)
        }
    }

    /// Register a callback for stream failures that have no caller to return to
    pub fn on_error<F>(&self, observer: F)
    where
        F: Fn(&ExchangeError) + Send + Sync + 'static,
    {
        self.session.set_error_observer(Some(Arc::new(observer)));
    }

    /// Unsigned call against the current REST host
    pub async fn public_request<C: ResponseConverter>(
        &self,
        method: Method,
        path: &str,
        parameters: Parameters,
        converter: C,
    ) -> Result<Converted<C::Output>, ExchangeError> {
        let host = self.rest_host();
        self.client
            .public_request(method, &host, path, parameters, converter)
            .await
    }

    /// Signed call against the current REST host
    pub async fn private_request<C: ResponseConverter>(
        &self,
        method: Method,
        path: &str,
        parameters: Parameters,
        converter: C,
    ) -> Result<Converted<C::Output>, ExchangeError> {
        let host = self.rest_host();
        self.client
            .private_request(method, &host, path, parameters, converter)
            .await
    }

    /// Ping the REST host. Never fails; any error reads as `false`.
    #[instrument(skip(self), fields(market = self.profile.name))]
    pub async fn test_connectivity(&self) -> bool {
        let host = self.rest_host();
        match self
            .client
            .public_request_raw(Method::GET, &host, self.profile.paths.ping, Parameters::new())
            .await
        {
            Ok(_) => true,
            Err(e) => {
                debug!("Connectivity check failed: {}", e);
                false
            }
        }
    }

    #[instrument(skip(self), fields(market = self.profile.name))]
    pub async fn get_server_time(&self) -> Result<u64, ExchangeError> {
        self.public_request(
            Method::GET,
            self.profile.paths.server_time,
            Parameters::new(),
            |body: Value| {
                body.get("serverTime").and_then(Value::as_u64).ok_or_else(|| {
                    ExchangeError::DeserializationError("Missing serverTime in response".to_string())
                })
            },
        )
        .await?
        .into_single()
    }

    /// Open the user data stream. Products reach this through `AccountDataSource`.
    #[instrument(skip(self), fields(market = self.profile.name))]
    pub(crate) async fn init_account_data(&self) -> Result<UserDataStream, ExchangeError> {
        self.ensure_authorized()?;
        let Endpoints { rest, stream } = self.endpoints();
        self.session.open(&rest, &stream).await
    }

    /// Close the user data stream if one is open
    #[instrument(skip(self), fields(market = self.profile.name))]
    pub(crate) async fn delete_account_data(&self) -> Result<(), ExchangeError> {
        self.session.close().await;
        Ok(())
    }

    pub fn is_stream_open(&self) -> bool {
        self.session.is_open()
    }

    pub fn get_user_data_stream(&self) -> Result<UserDataStream, ExchangeError> {
        self.ensure_authorized()?;
        self.session.stream()
    }
}
