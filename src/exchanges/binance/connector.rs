use crate::core::config::{Credentials, MarketOptions};
use crate::core::errors::ExchangeError;
use crate::core::kernel::UserDataStream;
use crate::core::market::Market;
use crate::core::traits::{AccountDataSource, MarketConnector};
use crate::exchanges::binance::SPOT;
use async_trait::async_trait;

/// Spot market: connectivity, server time and the user data stream
#[derive(Debug)]
pub struct SpotMarket {
    market: Market,
}

impl SpotMarket {
    pub fn new(options: MarketOptions) -> Result<Self, ExchangeError> {
        Ok(Self {
            market: Market::new(&SPOT, options)?,
        })
    }

    pub async fn set_account(&self, credentials: Option<Credentials>) {
        self.market.set_account(credentials).await;
    }
}

#[async_trait]
impl MarketConnector for SpotMarket {
    fn market(&self) -> &Market {
        &self.market
    }
}

#[async_trait]
impl AccountDataSource for SpotMarket {
    async fn init_account_data(&self) -> Result<UserDataStream, ExchangeError> {
        self.market.init_account_data().await
    }

    async fn delete_account_data(&self) -> Result<(), ExchangeError> {
        self.market.delete_account_data().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::market::Endpoints;

    #[tokio::test]
    async fn test_spot_profile_endpoints() {
        let spot = SpotMarket::new(MarketOptions::read_only()).unwrap();
        assert_eq!(
            spot.market().endpoints(),
            Endpoints::new("https://api.binance.com", "wss://stream.binance.com")
        );
        spot.market().set_network(true);
        assert_eq!(spot.market().endpoints().rest, "https://testnet.binance.vision");
        assert!(!spot.market().is_authorized());
        assert!(matches!(
            spot.init_account_data().await,
            Err(ExchangeError::NotAuthorized)
        ));
    }
}
