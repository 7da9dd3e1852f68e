//! Token metadata reads with per-field fallbacks for non-standard tokens.

use alloy::{
    primitives::{Address, U256},
    providers::Provider,
    transports::Transport,
};
use tracing::{debug, error};

use crate::abi::IERC20;
use crate::units::format_units;

#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: U256,
}

impl TokenInfo {
    /// Assemble metadata from four independent reads; each failing read is
    /// replaced by its own default without affecting the others.
    pub fn from_reads<E>(
        address: Address,
        name: Result<String, E>,
        symbol: Result<String, E>,
        decimals: Result<u8, E>,
        total_supply: Result<U256, E>,
    ) -> Self {
        Self {
            address,
            name: name.unwrap_or_else(|_| "Unknown".to_string()),
            symbol: symbol.unwrap_or_else(|_| "???".to_string()),
            decimals: decimals.unwrap_or(18),
            total_supply: total_supply.unwrap_or(U256::ZERO),
        }
    }

    /// totalSupply scaled down by the token's own decimals.
    pub fn circulating_supply(&self) -> f64 {
        format_units(self.total_supply, self.decimals)
            .parse()
            .unwrap_or(f64::MAX)
    }
}

#[derive(Debug, Clone)]
pub struct WalletTokenInfo {
    pub info: TokenInfo,
    pub balance: U256,
}

/// Read name/symbol/decimals/totalSupply, substituting a default for any
/// individual call that reverts. Returns `None` only when the address has no
/// contract code (or the code probe itself fails).
pub async fn fetch_token_info<T, P>(provider: &P, address: Address) -> Option<TokenInfo>
where
    T: Transport + Clone,
    P: Provider<T> + Clone,
{
    match provider.get_code_at(address).await {
        Ok(code) if !code.is_empty() => {}
        Ok(_) => {
            debug!(token = %address, "no contract code at token address");
            return None;
        }
        Err(e) => {
            error!(token = %address, ?e, "code probe failed");
            return None;
        }
    }

    let token = IERC20::new(address, provider.clone());
    let name_call = token.name();
    let symbol_call = token.symbol();
    let decimals_call = token.decimals();
    let total_supply_call = token.totalSupply();
    let (name, symbol, decimals, total_supply) = tokio::join!(
        name_call.call(),
        symbol_call.call(),
        decimals_call.call(),
        total_supply_call.call(),
    );

    Some(TokenInfo::from_reads(
        address,
        name.map(|r| r._0),
        symbol.map(|r| r._0),
        decimals.map(|r| r._0),
        total_supply.map(|r| r._0),
    ))
}

/// Token metadata plus the operator wallet's current balance.
pub async fn fetch_wallet_token_info<T, P>(
    provider: &P,
    address: Address,
    owner: Address,
) -> Option<WalletTokenInfo>
where
    T: Transport + Clone,
    P: Provider<T> + Clone,
{
    let info = fetch_token_info(provider, address).await?;
    let token = IERC20::new(address, provider.clone());
    let balance = match token.balanceOf(owner).call().await {
        Ok(r) => r._0,
        Err(e) => {
            error!(token = %address, ?e, "balanceOf failed");
            U256::ZERO
        }
    };
    Some(WalletTokenInfo { info, balance })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn token(total_supply: U256, decimals: u8) -> TokenInfo {
        TokenInfo {
            address: Address::from_str("0x00000000000000000000000000000000000000aa").unwrap(),
            name: "Test".to_string(),
            symbol: "TST".to_string(),
            decimals,
            total_supply,
        }
    }

    fn reads(
        name: Result<&str, ()>,
        symbol: Result<&str, ()>,
        decimals: Result<u8, ()>,
        total_supply: Result<U256, ()>,
    ) -> TokenInfo {
        TokenInfo::from_reads(
            Address::from_str("0x00000000000000000000000000000000000000bb").unwrap(),
            name.map(str::to_string),
            symbol.map(str::to_string),
            decimals,
            total_supply,
        )
    }

    #[test]
    fn all_reads_succeeding_keeps_real_values() {
        let t = reads(Ok("Pepe"), Ok("PEPE"), Ok(6), Ok(U256::from(42)));
        assert_eq!(t.name, "Pepe");
        assert_eq!(t.symbol, "PEPE");
        assert_eq!(t.decimals, 6);
        assert_eq!(t.total_supply, U256::from(42));
    }

    #[test]
    fn failed_name_read_defaults_alone() {
        let t = reads(Err(()), Ok("PEPE"), Ok(6), Ok(U256::from(42)));
        assert_eq!(t.name, "Unknown");
        assert_eq!(t.symbol, "PEPE");
        assert_eq!(t.decimals, 6);
        assert_eq!(t.total_supply, U256::from(42));
    }

    #[test]
    fn failed_symbol_read_defaults_alone() {
        let t = reads(Ok("Pepe"), Err(()), Ok(6), Ok(U256::from(42)));
        assert_eq!(t.symbol, "???");
        assert_eq!(t.name, "Pepe");
    }

    #[test]
    fn failed_decimals_read_defaults_alone() {
        let t = reads(Ok("Pepe"), Ok("PEPE"), Err(()), Ok(U256::from(42)));
        assert_eq!(t.decimals, 18);
        assert_eq!(t.total_supply, U256::from(42));
    }

    #[test]
    fn failed_supply_read_defaults_alone() {
        let t = reads(Ok("Pepe"), Ok("PEPE"), Ok(6), Err(()));
        assert_eq!(t.total_supply, U256::ZERO);
        assert_eq!(t.decimals, 6);
    }

    #[test]
    fn every_read_failing_yields_all_defaults() {
        let t = reads(Err(()), Err(()), Err(()), Err(()));
        assert_eq!(t.name, "Unknown");
        assert_eq!(t.symbol, "???");
        assert_eq!(t.decimals, 18);
        assert_eq!(t.total_supply, U256::ZERO);
    }

    #[test]
    fn circulating_supply_scales_by_decimals() {
        let t = token(U256::from(1_000_000u64) * U256::from(10).pow(U256::from(18)), 18);
        assert_eq!(t.circulating_supply(), 1_000_000.0);
    }

    #[test]
    fn circulating_supply_zero_supply() {
        let t = token(U256::ZERO, 18);
        assert_eq!(t.circulating_supply(), 0.0);
    }
}
