use crate::core::config::ConfigError;
use crate::core::errors::ExchangeError;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// A single parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Str(String),
    Map(Parameters),
    List(Vec<Parameters>),
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or_else(|_| Self::Str(value.to_string()), Self::Int)
    }
}

impl From<Decimal> for ParamValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Parameters> for ParamValue {
    fn from(value: Parameters) -> Self {
        Self::Map(value)
    }
}

impl From<Vec<Parameters>> for ParamValue {
    fn from(value: Vec<Parameters>) -> Self {
        Self::List(value)
    }
}

/// Ordered request parameters with unique keys
///
/// Insertion order is kept through encoding because the signature covers the exact
/// query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    entries: Vec<(String, ParamValue)>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Builder-style insert that skips `None`
    #[must_use]
    pub fn with_opt<V: Into<ParamValue>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.insert(key, value);
        }
        self
    }

    /// Insert a value. An existing key keeps its position and gets the new value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }
}

/// Encode parameters as a URL query string (without the leading `?`).
///
/// Nested maps flatten to `key[sub]=value`, lists to `key[index][sub]=value`. Keys and
/// values are percent-encoded per RFC 3986, so brackets appear as `%5B` and `%5D`.
pub fn encode(parameters: &Parameters) -> String {
    let mut pairs = Vec::with_capacity(parameters.len());
    flatten(None, parameters, &mut pairs);
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", percent_encode(key), percent_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// HMAC-SHA256 of `query_string` keyed with `secret_key`, as 64 lowercase hex chars.
pub fn sign(query_string: &str, secret_key: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes()).map_err(|e| {
        ExchangeError::ConfigError(ConfigError::InvalidConfiguration(format!(
            "Invalid secret key: {}",
            e
        )))
    })?;
    mac.update(query_string.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn flatten(prefix: Option<&str>, parameters: &Parameters, out: &mut Vec<(String, String)>) {
    for (key, value) in parameters.iter() {
        let full_key = prefix.map_or_else(|| key.to_string(), |p| format!("{}[{}]", p, key));
        match value {
            ParamValue::Map(nested) => flatten(Some(&full_key), nested, out),
            ParamValue::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    flatten(Some(&format!("{}[{}]", full_key, index)), item, out);
                }
            }
            scalar => out.push((full_key, scalar_to_string(scalar))),
        }
    }
}

fn scalar_to_string(value: &ParamValue) -> String {
    match value {
        ParamValue::Bool(b) => b.to_string(),
        ParamValue::Int(i) => i.to_string(),
        ParamValue::Decimal(d) => d.normalize().to_string(),
        ParamValue::Str(s) => s.clone(),
        ParamValue::Map(_) | ParamValue::List(_) => String::new(),
    }
}

fn percent_encode(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len());
    for byte in input.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_encode_keeps_insertion_order() {
        let params = Parameters::new()
            .with("symbol", "BTCUSDT")
            .with("limit", 10_u32)
            .with("fromId", 42_i64);
        assert_eq!(encode(&params), "symbol=BTCUSDT&limit=10&fromId=42");
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut params = Parameters::new().with("a", 1_i64).with("b", 2_i64);
        params.insert("a", 3_i64);
        assert_eq!(params.len(), 2);
        assert_eq!(encode(&params), "a=3&b=2");
    }

    #[test]
    fn test_encode_scalars() {
        let params = Parameters::new()
            .with("reduceOnly", true)
            .with("price", Decimal::from_str("30000.1000").unwrap())
            .with("note", "a b&c=d");
        assert_eq!(
            encode(&params),
            "reduceOnly=true&price=30000.1&note=a%20b%26c%3Dd"
        );
    }

    #[test]
    fn test_encode_multibyte_as_uppercase_escapes() {
        let params = Parameters::new().with("newClientOrderId", "ordré~1");
        assert_eq!(encode(&params), "newClientOrderId=ordr%C3%A9~1");
    }

    #[test]
    fn test_encode_nested_and_lists() {
        let order = |side: &str| Parameters::new().with("symbol", "BTCUSDT").with("side", side);
        let params = Parameters::new()
            .with("batchOrders", vec![order("BUY"), order("SELL")])
            .with("meta", Parameters::new().with("tag", "x"));

        assert_eq!(
            encode(&params),
            "batchOrders%5B0%5D%5Bsymbol%5D=BTCUSDT&batchOrders%5B0%5D%5Bside%5D=BUY\
             &batchOrders%5B1%5D%5Bsymbol%5D=BTCUSDT&batchOrders%5B1%5D%5Bside%5D=SELL\
             &meta%5Btag%5D=x"
        );
    }

    #[test]
    fn test_encode_empty() {
        assert_eq!(encode(&Parameters::new()), "");
        let params = Parameters::new().with("empty", Vec::<Parameters>::new());
        assert_eq!(encode(&params), "");
    }

    #[test]
    fn test_encode_is_deterministic() {
        let params = Parameters::new()
            .with("symbol", "ETHUSDT")
            .with("orders", vec![Parameters::new().with("qty", 1_i64)]);
        assert_eq!(encode(&params), encode(&params.clone()));
    }

    #[test]
    fn test_sign_matches_reference_vector() {
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1\
                     &recvWindow=5000&timestamp=1499827319559";
        let signature = sign(query, secret).unwrap();
        assert_eq!(
            signature,
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_sign_is_lowercase_hex_of_fixed_length() {
        let signature = sign("", "B").unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_eq!(signature, sign("", "B").unwrap());
    }
}
