//! Environment configuration.

use std::{env, path::PathBuf, str::FromStr};

use thiserror::Error;
use tracing::info;

use crate::checkout::{CheckoutConfig, PaymentLink};

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub cart_storage_path: PathBuf,
    pub checkout: CheckoutConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let checkout = match lookup("CHECKOUT_LINKS") {
            Some(raw) => parse_links(&raw)?,
            None => {
                info!("CHECKOUT_LINKS not set, using placeholder payment link");
                CheckoutConfig::placeholder()
            }
        };
        Ok(Self {
            port: try_load(&lookup, "PORT", "8083")?,
            database_url: lookup("DATABASE_URL").filter(|v| !v.is_empty()),
            nats_url: lookup("NATS_URL").filter(|v| !v.is_empty()),
            cart_storage_path: try_load(&lookup, "CART_STORAGE_PATH", ".childlike-cart.json")?,
            checkout,
        })
    }
}

fn try_load<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    lookup(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid { key, reason: e.to_string() })
}

/// `product-id=url,product-id=url`
fn parse_links(raw: &str) -> Result<CheckoutConfig, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((product_id, url)) if !product_id.trim().is_empty() && !url.trim().is_empty() => {
                Ok(PaymentLink { product_id: product_id.trim().to_string(), url: url.trim().to_string() })
            }
            _ => Err(ConfigError::Invalid { key: "CHECKOUT_LINKS", reason: format!("expected product-id=url, got {pair:?}") }),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(CheckoutConfig::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8083);
        assert!(config.database_url.is_none());
        assert_eq!(config.cart_storage_path, PathBuf::from(".childlike-cart.json"));
        assert_eq!(config.checkout, CheckoutConfig::placeholder());
    }

    #[test]
    fn test_checkout_links() {
        let config = Config::from_lookup(lookup(&[("CHECKOUT_LINKS", "a=https://pay/a, b=https://pay/b?x=1")])).unwrap();
        assert_eq!(config.checkout.link_for("b"), Some("https://pay/b?x=1"));
        assert!(Config::from_lookup(lookup(&[("CHECKOUT_LINKS", "broken")])).is_err());
    }

    #[test]
    fn test_bad_port() {
        let err = Config::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
