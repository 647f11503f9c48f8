//! Reward wallet account ids (`<shard>.<realm>.<num>`, e.g. `0.0.4815162`).

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("invalid wallet address {0:?} (format: 0.0.xxxx)")]
    InvalidFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletAddress {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

impl FromStr for WalletAddress {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || WalletError::InvalidFormat(s.to_string());
        let mut parts = s.trim().split('.');
        let mut next = || -> Result<u64, WalletError> {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse().map_err(|_| invalid())
        };
        let addr = Self {
            shard: next()?,
            realm: next()?,
            num: next()?,
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(addr)
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_addresses() {
        let a: WalletAddress = "0.0.4815162".parse().unwrap();
        assert_eq!(a, WalletAddress { shard: 0, realm: 0, num: 4815162 });
        assert_eq!(a.to_string(), "0.0.4815162");
        assert!(" 1.2.3 ".parse::<WalletAddress>().is_ok());
    }

    #[test]
    fn test_invalid_addresses() {
        for bad in ["", "0.0", "0.0.1.2", "0.0.x", "0..1", "-1.0.1", "0.0.+1", "0x0.0.1"] {
            assert!(bad.parse::<WalletAddress>().is_err(), "{bad:?} should be rejected");
        }
    }
}
