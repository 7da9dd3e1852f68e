//! Pair analysis and the alert filter.
//!
//! A discovered pair is enriched with both tokens' metadata and its
//! WETH-denominated liquidity, then run through a pure liquidity-band
//! predicate to decide whether it is worth alerting on.

use alloy::{
    primitives::{Address, U256},
    providers::Provider,
    transports::Transport,
};
use tracing::error;

use crate::abi::IV2Pair;
use crate::token::{fetch_token_info, TokenInfo};
use crate::units::wei_to_eth;

/// Pool designs the analyzer understands. V3-style pools have no simple
/// reserve accessor; their liquidity is measured off the Mint event instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    V2,
    V3,
}

#[derive(Debug, Clone)]
pub struct PairInfo {
    pub pair_address: Address,
    pub token0: TokenInfo,
    pub token1: TokenInfo,
    pub reserve0: U256,
    pub reserve1: U256,
    pub liquidity_eth: f64,
    pub token0_verified: Option<bool>,
    pub token1_verified: Option<bool>,
}

/// Fetch both token legs and (for V2 pools) the reserves, then derive the
/// WETH-side liquidity. Any failure is logged and collapses to `None`.
pub async fn analyze_pair<T, P>(
    provider: &P,
    weth: Address,
    pair_address: Address,
    token0_address: Address,
    token1_address: Address,
    kind: PoolKind,
) -> Option<PairInfo>
where
    T: Transport + Clone,
    P: Provider<T> + Clone,
{
    let (token0, token1) = tokio::join!(
        fetch_token_info(provider, token0_address),
        fetch_token_info(provider, token1_address),
    );
    let (token0, token1) = (token0?, token1?);

    let (reserve0, reserve1) = match kind {
        PoolKind::V2 => {
            let pair = IV2Pair::new(pair_address, provider.clone());
            match pair.getReserves().call().await {
                Ok(r) => (U256::from(r.reserve0), U256::from(r.reserve1)),
                Err(e) => {
                    error!(pair = %pair_address, ?e, "getReserves failed");
                    return None;
                }
            }
        }
        PoolKind::V3 => (U256::ZERO, U256::ZERO),
    };

    let liquidity_eth = weth_liquidity(weth, token0.address, token1.address, reserve0, reserve1);

    Some(PairInfo {
        pair_address,
        token0,
        token1,
        reserve0,
        reserve1,
        liquidity_eth,
        token0_verified: None,
        token1_verified: None,
    })
}

/// WETH-denominated liquidity: the reserve on whichever side is the wrapped
/// native asset, scaled by 18 decimals; zero when neither side is WETH.
pub fn weth_liquidity(
    weth: Address,
    token0: Address,
    token1: Address,
    reserve0: U256,
    reserve1: U256,
) -> f64 {
    if token0 == weth {
        wei_to_eth(reserve0)
    } else if token1 == weth {
        wei_to_eth(reserve1)
    } else {
        0.0
    }
}

/// Alert policy: a strict liquidity band plus an optional supply ceiling on
/// the non-WETH token.
#[derive(Debug, Clone)]
pub struct AlertPolicy {
    pub min_liquidity_eth: f64,
    pub max_liquidity_eth: f64,
    pub max_supply_threshold: Option<f64>,
}

impl AlertPolicy {
    pub fn should_alert(&self, pair: &PairInfo, weth: Address) -> bool {
        if pair.liquidity_eth <= self.min_liquidity_eth
            || pair.liquidity_eth >= self.max_liquidity_eth
        {
            return false;
        }

        if let Some(max_supply) = self.max_supply_threshold {
            let token = non_weth_token(pair, weth);
            if token.circulating_supply() > max_supply {
                return false;
            }
        }

        true
    }
}

/// The tradeable side of the pair: token1 when token0 is WETH, else token0.
pub fn non_weth_token(pair: &PairInfo, weth: Address) -> &TokenInfo {
    if pair.token0.address == weth {
        &pair.token1
    } else {
        &pair.token0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const WETH: &str = "0x4200000000000000000000000000000000000006";

    fn addr(s: &str) -> Address {
        Address::from_str(s).unwrap()
    }

    fn eth(n: u64) -> U256 {
        U256::from(n) * U256::from(10).pow(U256::from(18))
    }

    fn token(address: Address, total_supply: U256) -> TokenInfo {
        TokenInfo {
            address,
            name: "Test".to_string(),
            symbol: "TST".to_string(),
            decimals: 18,
            total_supply,
        }
    }

    fn pair(token0: Address, token1: Address, reserve0: U256, reserve1: U256) -> PairInfo {
        let weth = addr(WETH);
        let liquidity_eth = weth_liquidity(weth, token0, token1, reserve0, reserve1);
        PairInfo {
            pair_address: addr("0x00000000000000000000000000000000000000cc"),
            token0: token(token0, eth(1_000_000)),
            token1: token(token1, eth(1_000_000)),
            reserve0,
            reserve1,
            liquidity_eth,
            token0_verified: None,
            token1_verified: None,
        }
    }

    #[test]
    fn liquidity_zero_when_neither_side_is_weth() {
        let p = pair(
            addr("0x00000000000000000000000000000000000000aa"),
            addr("0x00000000000000000000000000000000000000bb"),
            eth(100),
            eth(200),
        );
        assert_eq!(p.liquidity_eth, 0.0);
    }

    #[test]
    fn liquidity_from_reserve0_when_token0_is_weth() {
        let p = pair(
            addr(WETH),
            addr("0x00000000000000000000000000000000000000bb"),
            eth(6),
            eth(200),
        );
        assert_eq!(p.liquidity_eth, 6.0);
    }

    #[test]
    fn liquidity_from_reserve1_when_token1_is_weth() {
        let p = pair(
            addr("0x00000000000000000000000000000000000000aa"),
            addr(WETH),
            eth(200),
            eth(7),
        );
        assert_eq!(p.liquidity_eth, 7.0);
    }

    #[test]
    fn address_comparison_ignores_source_case() {
        // Factory logs and env config may disagree on hex casing; parsed
        // addresses must still compare equal.
        let lower = addr("0x00000000000000000000000000000000000000ab");
        let upper = addr("0x00000000000000000000000000000000000000AB");
        assert_eq!(lower, upper);
        // token0 matches the wrapped-native address despite the case
        // difference in the source strings.
        assert_eq!(weth_liquidity(lower, upper, addr(WETH), eth(3), eth(9)), 3.0);
    }

    #[test]
    fn alert_band_is_exclusive_on_both_ends() {
        let policy = AlertPolicy {
            min_liquidity_eth: 5.0,
            max_liquidity_eth: 10.0,
            max_supply_threshold: None,
        };
        let weth = addr(WETH);
        let other = addr("0x00000000000000000000000000000000000000bb");

        assert!(!policy.should_alert(&pair(weth, other, eth(5), U256::ZERO), weth));
        assert!(!policy.should_alert(&pair(weth, other, eth(4), U256::ZERO), weth));
        assert!(!policy.should_alert(&pair(weth, other, eth(10), U256::ZERO), weth));
        assert!(!policy.should_alert(&pair(weth, other, eth(11), U256::ZERO), weth));
        assert!(policy.should_alert(&pair(weth, other, eth(6), U256::ZERO), weth));
        assert!(policy.should_alert(&pair(weth, other, eth(9), U256::ZERO), weth));
    }

    #[test]
    fn supply_ceiling_filters_when_enabled() {
        let policy = AlertPolicy {
            min_liquidity_eth: 5.0,
            max_liquidity_eth: 10.0,
            max_supply_threshold: Some(500_000.0),
        };
        let weth = addr(WETH);
        let other = addr("0x00000000000000000000000000000000000000bb");

        // Non-WETH token carries a 1M supply, over the 500k ceiling.
        let p = pair(weth, other, eth(6), U256::ZERO);
        assert!(!policy.should_alert(&p, weth));

        let mut small = p.clone();
        small.token1.total_supply = eth(100_000);
        assert!(policy.should_alert(&small, weth));
    }

    #[test]
    fn non_weth_token_prefers_token1_when_token0_is_weth() {
        let weth = addr(WETH);
        let other = addr("0x00000000000000000000000000000000000000bb");

        let p = pair(weth, other, eth(6), U256::ZERO);
        assert_eq!(non_weth_token(&p, weth).address, other);

        let q = pair(other, weth, U256::ZERO, eth(6));
        assert_eq!(non_weth_token(&q, weth).address, other);
    }

    #[test]
    fn degenerate_weth_weth_pair_returns_token1() {
        let weth = addr(WETH);
        let p = pair(weth, weth, eth(6), eth(6));
        // token0 is WETH, so token1 wins even though it is WETH too.
        assert!(std::ptr::eq(non_weth_token(&p, weth), &p.token1));
    }
}
