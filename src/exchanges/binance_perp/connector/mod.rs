use crate::core::config::{Credentials, MarketOptions};
use crate::core::errors::ExchangeError;
use crate::core::kernel::UserDataStream;
use crate::core::market::Market;
use crate::core::traits::{AccountDataSource, MarketConnector};
use crate::exchanges::binance_perp::types::SymbolPrecision;
use crate::exchanges::binance_perp::USD_MARGINED_FUTURES;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{info, instrument};

pub mod account;
pub mod market_data;
pub mod trading;

/// Account-derived lookups, valid while account data is initialized
#[derive(Debug, Clone, Default)]
pub(crate) struct AccountCaches {
    pub leverage: HashMap<String, u32>,
    pub precision: HashMap<String, SymbolPrecision>,
}

/// USDⓈ-M futures market
///
/// Market data methods live in `market_data`, position and mode methods in `account`,
/// order placement in `trading`.
#[derive(Debug)]
pub struct UsdMarginedFuturesMarket {
    market: Market,
    caches: RwLock<Option<AccountCaches>>,
    /// Held across a whole init or delete, cache loading included
    account_data: Mutex<()>,
}

impl UsdMarginedFuturesMarket {
    pub fn new(options: MarketOptions) -> Result<Self, ExchangeError> {
        Ok(Self {
            market: Market::new(&USD_MARGINED_FUTURES, options)?,
            caches: RwLock::new(None),
            account_data: Mutex::new(()),
        })
    }

    /// Replace the account. `None` waits for any init in flight, then closes the stream,
    /// revokes the credentials and drops the derived caches.
    pub async fn set_account(&self, credentials: Option<Credentials>) {
        if credentials.is_some() {
            self.market.set_account(credentials).await;
            return;
        }

        let _account_data = self.account_data.lock().await;
        self.market.set_account(None).await;
        self.clear_caches();
    }

    fn clear_caches(&self) {
        *self.caches.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn with_caches<T>(
        &self,
        read: impl FnOnce(&AccountCaches) -> Result<T, ExchangeError>,
    ) -> Result<T, ExchangeError> {
        self.market.ensure_authorized()?;
        let caches = self.caches.read().unwrap_or_else(PoisonError::into_inner);
        caches
            .as_ref()
            .ok_or(ExchangeError::AccountDataNotInitialized)
            .and_then(read)
    }

    /// Leverage cached for `symbol`, 1 when unknown
    pub(crate) fn leverage_or_default(&self, symbol: &str) -> u32 {
        self.caches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|caches| caches.leverage.get(symbol).copied())
            .unwrap_or(1)
    }

    pub fn get_leverage(&self, symbol: &str) -> Result<u32, ExchangeError> {
        self.with_caches(|caches| {
            caches
                .leverage
                .get(symbol)
                .copied()
                .ok_or_else(|| ExchangeError::UnknownSymbol(symbol.to_string()))
        })
    }

    pub fn get_all_leverage(&self) -> Result<HashMap<String, u32>, ExchangeError> {
        self.with_caches(|caches| Ok(caches.leverage.clone()))
    }

    pub fn get_symbol_precision(&self, symbol: &str) -> Result<SymbolPrecision, ExchangeError> {
        self.with_caches(|caches| {
            caches
                .precision
                .get(symbol)
                .copied()
                .ok_or_else(|| ExchangeError::UnknownSymbol(symbol.to_string()))
        })
    }

    pub fn get_all_symbol_precision(
        &self,
    ) -> Result<HashMap<String, SymbolPrecision>, ExchangeError> {
        self.with_caches(|caches| Ok(caches.precision.clone()))
    }
}

#[async_trait]
impl MarketConnector for UsdMarginedFuturesMarket {
    fn market(&self) -> &Market {
        &self.market
    }
}

#[async_trait]
impl AccountDataSource for UsdMarginedFuturesMarket {
    /// Load the caches, then open the stream. Caches are replaced only when both
    /// succeed.
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    async fn init_account_data(&self) -> Result<UserDataStream, ExchangeError> {
        let _account_data = self.account_data.lock().await;
        self.market.ensure_authorized()?;
        if self.market.is_stream_open() {
            return Err(ExchangeError::AlreadyInitialized);
        }

        let caches = self.load_account_caches().await?;
        let stream = self.market.init_account_data().await?;

        info!(
            symbols = caches.precision.len(),
            positions = caches.leverage.len(),
            "Account data initialized"
        );
        *self.caches.write().unwrap_or_else(PoisonError::into_inner) = Some(caches);
        Ok(stream)
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    async fn delete_account_data(&self) -> Result<(), ExchangeError> {
        let _account_data = self.account_data.lock().await;
        self.market.delete_account_data().await?;
        self.clear_caches();
        Ok(())
    }
}
