use crate::core::errors::ExchangeError;
use crate::core::kernel::{from_json, Converted, Parameters};
use crate::core::types::{ContractType, KlineInterval};
use crate::exchanges::binance_perp::connector::UsdMarginedFuturesMarket;
use crate::exchanges::binance_perp::conversions::{
    convert_last_price_candlestick, convert_price_candlestick,
};
use crate::exchanges::binance_perp::types::{
    AggregateTrade, ExchangeInfo, FundingRate, IndexPriceCandlestick, LastPriceCandlestick,
    MarkPriceAndFundingRate, MarkPriceCandlestick, OrderBook, SymbolPrice, Trade,
};
use reqwest::Method;
use tracing::{instrument, warn};

/// Time-bounded query shared by klines, aggregate trades and funding history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
    pub limit: Option<u32>,
}

impl TimeRange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_time(mut self, start_time: u64) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn end_time(mut self, end_time: u64) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    fn append_to(self, parameters: Parameters) -> Parameters {
        parameters
            .with_opt("startTime", self.start_time)
            .with_opt("endTime", self.end_time)
            .with_opt("limit", self.limit)
    }
}

fn kline_parameters(
    key: &str,
    value: &str,
    interval: KlineInterval,
    range: TimeRange,
) -> Parameters {
    if !interval.is_supported_by_futures() {
        warn!("Interval {} is not offered by the futures API", interval);
    }
    range.append_to(Parameters::new().with(key, value).with("interval", interval))
}

impl UsdMarginedFuturesMarket {
    /// Trading rules, rate limits and symbol filters
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn get_exchange_info(&self) -> Result<ExchangeInfo, ExchangeError> {
        self.market
            .public_request(
                Method::GET,
                "/fapi/v1/exchangeInfo",
                Parameters::new(),
                from_json::<ExchangeInfo>,
            )
            .await?
            .into_single()
    }

    /// `limit` is one of 5, 10, 20, 50, 100, 500, 1000; the exchange defaults to 500
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn get_order_book(
        &self,
        symbol: &str,
        limit: Option<u32>,
    ) -> Result<OrderBook, ExchangeError> {
        let parameters = Parameters::new()
            .with("symbol", symbol)
            .with_opt("limit", limit);
        self.market
            .public_request(Method::GET, "/fapi/v1/depth", parameters, from_json::<OrderBook>)
            .await?
            .into_single()
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn get_recent_trades(
        &self,
        symbol: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Trade>, ExchangeError> {
        let parameters = Parameters::new()
            .with("symbol", symbol)
            .with_opt("limit", limit);
        Ok(self
            .market
            .public_request(Method::GET, "/fapi/v1/trades", parameters, from_json::<Trade>)
            .await?
            .into_vec())
    }

    /// Trades older than the recent window, starting at trade id `from_id`
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn get_older_trades(
        &self,
        symbol: &str,
        from_id: Option<u64>,
        limit: Option<u32>,
    ) -> Result<Vec<Trade>, ExchangeError> {
        let parameters = Parameters::new()
            .with("symbol", symbol)
            .with_opt("limit", limit)
            .with_opt("fromId", from_id);
        Ok(self
            .market
            .public_request(
                Method::GET,
                "/fapi/v1/historicalTrades",
                parameters,
                from_json::<Trade>,
            )
            .await?
            .into_vec())
    }

    /// Aggregate trades starting at `from_id`, or inside `range`
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn get_aggregate_trades(
        &self,
        symbol: &str,
        from_id: Option<u64>,
        range: TimeRange,
    ) -> Result<Vec<AggregateTrade>, ExchangeError> {
        let parameters = range.append_to(
            Parameters::new()
                .with("symbol", symbol)
                .with_opt("fromId", from_id),
        );
        Ok(self
            .market
            .public_request(
                Method::GET,
                "/fapi/v1/aggTrades",
                parameters,
                from_json::<AggregateTrade>,
            )
            .await?
            .into_vec())
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn get_last_price_candlesticks(
        &self,
        symbol: &str,
        interval: KlineInterval,
        range: TimeRange,
    ) -> Result<Vec<LastPriceCandlestick>, ExchangeError> {
        Ok(self
            .market
            .public_request(
                Method::GET,
                "/fapi/v1/klines",
                kline_parameters("symbol", symbol, interval, range),
                convert_last_price_candlestick,
            )
            .await?
            .into_vec())
    }

    /// Last-price klines of one contract type of `pair`
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn get_continuous_last_price_candlesticks(
        &self,
        pair: &str,
        contract_type: ContractType,
        interval: KlineInterval,
        range: TimeRange,
    ) -> Result<Vec<LastPriceCandlestick>, ExchangeError> {
        let parameters = kline_parameters("pair", pair, interval, range)
            .with("contractType", contract_type);
        Ok(self
            .market
            .public_request(
                Method::GET,
                "/fapi/v1/continuousKlines",
                parameters,
                convert_last_price_candlestick,
            )
            .await?
            .into_vec())
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn get_mark_price_candlesticks(
        &self,
        symbol: &str,
        interval: KlineInterval,
        range: TimeRange,
    ) -> Result<Vec<MarkPriceCandlestick>, ExchangeError> {
        Ok(self
            .market
            .public_request(
                Method::GET,
                "/fapi/v1/markPriceKlines",
                kline_parameters("symbol", symbol, interval, range),
                convert_price_candlestick,
            )
            .await?
            .into_vec())
    }

    /// Index klines are keyed by pair (`BTCUSDT`), not by contract symbol
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn get_index_price_candlesticks(
        &self,
        pair: &str,
        interval: KlineInterval,
        range: TimeRange,
    ) -> Result<Vec<IndexPriceCandlestick>, ExchangeError> {
        Ok(self
            .market
            .public_request(
                Method::GET,
                "/fapi/v1/indexPriceKlines",
                kline_parameters("pair", pair, interval, range),
                convert_price_candlestick,
            )
            .await?
            .into_vec())
    }

    /// Latest price for `symbol`, or for every symbol when `None`
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn get_price(
        &self,
        symbol: Option<&str>,
    ) -> Result<Converted<SymbolPrice>, ExchangeError> {
        let parameters = Parameters::new().with_opt("symbol", symbol);
        self.market
            .public_request(
                Method::GET,
                "/fapi/v1/ticker/price",
                parameters,
                from_json::<SymbolPrice>,
            )
            .await
    }

    /// Mark price, index price and next funding for `symbol`, or every symbol when `None`
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn get_mark_price_and_funding_rate(
        &self,
        symbol: Option<&str>,
    ) -> Result<Converted<MarkPriceAndFundingRate>, ExchangeError> {
        let parameters = Parameters::new().with_opt("symbol", symbol);
        self.market
            .public_request(
                Method::GET,
                "/fapi/v1/premiumIndex",
                parameters,
                from_json::<MarkPriceAndFundingRate>,
            )
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn get_funding_rate_history(
        &self,
        symbol: Option<&str>,
        range: TimeRange,
    ) -> Result<Vec<FundingRate>, ExchangeError> {
        let parameters = range.append_to(Parameters::new().with_opt("symbol", symbol));
        Ok(self
            .market
            .public_request(
                Method::GET,
                "/fapi/v1/fundingRate",
                parameters,
                from_json::<FundingRate>,
            )
            .await?
            .into_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kernel::encode;

    #[test]
    fn test_time_range_appends_only_present_bounds() {
        let parameters = TimeRange::new()
            .start_time(1_000)
            .limit(50)
            .append_to(Parameters::new().with("symbol", "BTCUSDT"));
        assert_eq!(encode(&parameters), "symbol=BTCUSDT&startTime=1000&limit=50");
    }

    #[test]
    fn test_kline_parameters_order() {
        let parameters = kline_parameters(
            "pair",
            "BTCUSDT",
            KlineInterval::Hours1,
            TimeRange::new().end_time(2_000),
        );
        assert_eq!(encode(&parameters), "pair=BTCUSDT&interval=1h&endTime=2000");
    }

    #[test]
    fn test_continuous_kline_parameters_carry_contract_type() {
        let parameters = kline_parameters("pair", "BTCUSDT", KlineInterval::Minutes15, TimeRange::new())
            .with("contractType", ContractType::CurrentQuarter);
        assert_eq!(
            encode(&parameters),
            "pair=BTCUSDT&interval=15m&contractType=CURRENT_QUARTER"
        );
    }
}
