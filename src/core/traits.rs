use crate::core::{errors::ExchangeError, kernel::UserDataStream, market::Market};
use async_trait::async_trait;

/// Operations every product family supports
#[async_trait]
pub trait MarketConnector: Send + Sync {
    /// Shared market engine
    fn market(&self) -> &Market;

    /// Ping the REST host; `false` on any failure
    async fn test_connectivity(&self) -> bool {
        self.market().test_connectivity().await
    }

    /// Exchange time in epoch milliseconds
    async fn get_server_time(&self) -> Result<u64, ExchangeError> {
        self.market().get_server_time().await
    }
}

/// Account data kept alive while the user data stream is open
#[async_trait]
pub trait AccountDataSource: MarketConnector {
    /// Open the user data stream and load any account-derived state
    async fn init_account_data(&self) -> Result<UserDataStream, ExchangeError>;

    /// Close the user data stream and drop account-derived state
    async fn delete_account_data(&self) -> Result<(), ExchangeError>;

    fn get_user_data_stream(&self) -> Result<UserDataStream, ExchangeError> {
        self.market().get_user_data_stream()
    }
}
