use crate::core::config::{ClientOptions, Credentials};
use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::{self, Parameters};
use crate::core::kernel::signer::{HmacSigner, Signer};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{instrument, trace};

/// Source of the current epoch time in milliseconds
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

impl<F> Clock for F
where
    F: Fn() -> u64 + Send + Sync,
{
    fn now_millis(&self) -> u64 {
        self()
    }
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
    }
}

/// Clock frozen at a given instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        self.0
    }
}

/// Maps one raw response record into a typed value
///
/// Applied once for an object body and element-wise for an array body.
pub trait ResponseConverter: Send + Sync {
    type Output: Send;

    fn convert(&self, record: Value) -> Result<Self::Output, ExchangeError>;
}

impl<F, T> ResponseConverter for F
where
    F: Fn(Value) -> Result<T, ExchangeError> + Send + Sync,
    T: Send,
{
    type Output = T;

    fn convert(&self, record: Value) -> Result<T, ExchangeError> {
        self(record)
    }
}

/// Converter that deserializes a record with serde
pub fn from_json<T: DeserializeOwned>(record: Value) -> Result<T, ExchangeError> {
    serde_json::from_value(record)
        .map_err(|e| ExchangeError::DeserializationError(format!("Failed to deserialize JSON: {}", e)))
}

/// Result of applying a converter to a response body
#[derive(Debug, Clone, PartialEq)]
pub enum Converted<T> {
    Single(T),
    Sequence(Vec<T>),
}

impl<T> Converted<T> {
    pub fn into_single(self) -> Result<T, ExchangeError> {
        match self {
            Self::Single(value) => Ok(value),
            Self::Sequence(items) => Err(ExchangeError::DeserializationError(format!(
                "Expected a single record, got a sequence of {}",
                items.len()
            ))),
        }
    }

    /// A single record becomes a one-element vector.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Single(value) => vec![value],
            Self::Sequence(items) => items,
        }
    }
}

fn apply_converter<C: ResponseConverter>(
    body: Value,
    converter: &C,
) -> Result<Converted<C::Output>, ExchangeError> {
    match body {
        Value::Array(items) => items
            .into_iter()
            .map(|item| converter.convert(item))
            .collect::<Result<Vec<_>, _>>()
            .map(Converted::Sequence),
        record => converter.convert(record).map(Converted::Single),
    }
}

/// Fully prepared outgoing request
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub method: Method,
    /// Host, path and query string
    pub url: String,
    pub headers: HashMap<String, String>,
}

impl SignedRequest {
    /// Query string without the leading '?'
    pub fn query(&self) -> &str {
        self.url.split_once('?').map_or("", |(_, query)| query)
    }
}

/// Configuration for the REST client
#[derive(Clone, Debug)]
pub struct RestClientConfig {
    /// Exchange name for logging and tracing
    pub exchange_name: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string to include in requests
    pub user_agent: String,
}

impl RestClientConfig {
    pub fn new(exchange_name: impl Into<String>) -> Self {
        Self {
            exchange_name: exchange_name.into(),
            timeout_seconds: 30,
            user_agent: "binance-markets/0.1".to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Builder for creating `RequestClient` instances
pub struct RestClientBuilder {
    config: RestClientConfig,
    options: ClientOptions,
    credentials: Option<Credentials>,
    clock: Arc<dyn Clock>,
}

impl RestClientBuilder {
    pub fn new(config: RestClientConfig) -> Self {
        Self {
            config,
            options: ClientOptions::default(),
            credentials: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the options and build the client
    pub fn build(self) -> Result<RequestClient, ExchangeError> {
        self.options.validate()?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(self.config.timeout_seconds))
            .user_agent(&self.config.user_agent)
            .build()
            .map_err(|e| ExchangeError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(RequestClient {
            client,
            config: self.config,
            options: RwLock::new(self.options),
            signer: RwLock::new(signer_for(self.credentials)),
            clock: self.clock,
        })
    }
}

fn signer_for(credentials: Option<Credentials>) -> Option<Arc<dyn Signer>> {
    credentials
        .filter(|credentials| !credentials.is_empty())
        .map(|credentials| Arc::new(HmacSigner::new(credentials)) as Arc<dyn Signer>)
}

/// Issues public and signed calls against a REST host
///
/// Options and credentials are read once when a request is prepared, so replacing them
/// only affects requests issued afterwards.
pub struct RequestClient {
    client: Client,
    config: RestClientConfig,
    options: RwLock<ClientOptions>,
    signer: RwLock<Option<Arc<dyn Signer>>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RequestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestClient")
            .field("config", &self.config)
            .field("options", &self.options())
            .field("has_credentials", &self.has_credentials())
            .finish_non_exhaustive()
    }
}

impl RequestClient {
    pub fn new(
        exchange_name: impl Into<String>,
        options: ClientOptions,
        credentials: Option<Credentials>,
    ) -> Result<Self, ExchangeError> {
        RestClientBuilder::new(RestClientConfig::new(exchange_name))
            .with_options(options)
            .with_credentials(credentials)
            .build()
    }

    pub fn exchange_name(&self) -> &str {
        &self.config.exchange_name
    }

    /// Validate and replace the client options
    pub fn configure(&self, options: ClientOptions) -> Result<(), ExchangeError> {
        options.validate()?;
        *self.options.write().unwrap_or_else(PoisonError::into_inner) = options;
        Ok(())
    }

    pub fn options(&self) -> ClientOptions {
        *self.options.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the authentication identity. `None` revokes private-call capability.
    pub fn set_credentials(&self, credentials: Option<Credentials>) {
        *self.signer.write().unwrap_or_else(PoisonError::into_inner) = signer_for(credentials);
    }

    pub fn has_credentials(&self) -> bool {
        self.signer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn current_signer(&self) -> Option<Arc<dyn Signer>> {
        self.signer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Add `timestamp` and `recvWindow` according to the options
    fn apply_options(&self, mut parameters: Parameters, options: &ClientOptions) -> Parameters {
        if options.replace_timestamp
            || (options.auto_timestamp && !parameters.contains_key("timestamp"))
        {
            parameters.insert("timestamp", self.clock.now_millis());
        }
        if let Some(recv_window) = options.recv_window {
            if !parameters.contains_key("recvWindow") {
                parameters.insert("recvWindow", recv_window);
            }
        }
        parameters
    }

    fn build_url(host: &str, path: &str, query: &str) -> String {
        if query.is_empty() {
            format!("{}{}", host, path)
        } else {
            format!("{}{}?{}", host, path, query)
        }
    }

    /// Build an unsigned request
    pub fn prepare_public(
        &self,
        method: Method,
        host: &str,
        path: &str,
        parameters: &Parameters,
    ) -> SignedRequest {
        SignedRequest {
            method,
            url: Self::build_url(host, path, &codec::encode(parameters)),
            headers: HashMap::new(),
        }
    }

    /// Build a signed request
    ///
    /// Parameters are augmented first, then encoded, then signed; the signature is
    /// appended last.
    pub fn prepare_private(
        &self,
        method: Method,
        host: &str,
        path: &str,
        parameters: Parameters,
    ) -> Result<SignedRequest, ExchangeError> {
        let signer = self
            .current_signer()
            .ok_or(ExchangeError::AuthenticationRequired)?;

        let parameters = self.apply_options(parameters, &self.options());
        let query_string = codec::encode(&parameters);
        let (headers, signature) = signer.sign_request(&query_string)?;

        let signed_query = if query_string.is_empty() {
            format!("signature={}", signature)
        } else {
            format!("{}&signature={}", query_string, signature)
        };

        Ok(SignedRequest {
            method,
            url: Self::build_url(host, path, &signed_query),
            headers,
        })
    }

    /// Send a prepared request and parse the JSON body
    #[instrument(skip(self, request), fields(exchange = %self.config.exchange_name, method = %request.method))]
    pub async fn send(&self, request: SignedRequest) -> Result<Value, ExchangeError> {
        let mut builder = self.client.request(request.method, &request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }

        let response = builder.send().await?;

        self.handle_response(response).await
    }

    /// Handle the response and extract JSON
    #[instrument(skip(self, response), fields(exchange = %self.config.exchange_name, status = %response.status()))]
    async fn handle_response(&self, response: Response) -> Result<Value, ExchangeError> {
        let status = response.status();
        let response_text = response.text().await?;

        trace!("Response body: {}", response_text);

        if status.is_success() {
            if response_text.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&response_text).map_err(|e| {
                ExchangeError::InvalidResponse(format!("Failed to parse JSON response: {}", e))
            })
        } else {
            Err(ExchangeError::from_api_response(
                status.as_u16(),
                &response_text,
            ))
        }
    }

    #[instrument(skip(self, parameters), fields(exchange = %self.config.exchange_name, method = %method, path = %path))]
    pub async fn public_request_raw(
        &self,
        method: Method,
        host: &str,
        path: &str,
        parameters: Parameters,
    ) -> Result<Value, ExchangeError> {
        let request = self.prepare_public(method, host, path, &parameters);
        self.send(request).await
    }

    #[instrument(skip(self, parameters), fields(exchange = %self.config.exchange_name, method = %method, path = %path))]
    pub async fn private_request_raw(
        &self,
        method: Method,
        host: &str,
        path: &str,
        parameters: Parameters,
    ) -> Result<Value, ExchangeError> {
        let request = self.prepare_private(method, host, path, parameters)?;
        self.send(request).await
    }

    /// Unsigned call with the body mapped through `converter`
    pub async fn public_request<C: ResponseConverter>(
        &self,
        method: Method,
        host: &str,
        path: &str,
        parameters: Parameters,
        converter: C,
    ) -> Result<Converted<C::Output>, ExchangeError> {
        let body = self.public_request_raw(method, host, path, parameters).await?;
        apply_converter(body, &converter)
    }

    /// Signed call with the body mapped through `converter`
    ///
    /// Fails with `AuthenticationRequired` before any network I/O when no credentials
    /// are set.
    pub async fn private_request<C: ResponseConverter>(
        &self,
        method: Method,
        host: &str,
        path: &str,
        parameters: Parameters,
        converter: C,
    ) -> Result<Converted<C::Output>, ExchangeError> {
        let body = self.private_request_raw(method, host, path, parameters).await?;
        apply_converter(body, &converter)
    }
}
