//! Swap execution across an ordered list of V2-style venues.
//!
//! Each buy/sell walks the venue list in priority order, skips venues with
//! no pool for the token, quotes via getAmountsOut, and attempts a standard
//! swap first. A revert is retried once on the same venue with the
//! fee-on-transfer variant (zero minimum out, larger gas allowance) before
//! falling through to the next venue.

use alloy::{
    primitives::{Address, TxHash, U256},
    providers::Provider,
    transports::Transport,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

use crate::abi::{IERC20, IV2Factory, IV2Router};

const STANDARD_SWAP_GAS: u64 = 300_000;
const FEE_TOLERANT_SWAP_GAS: u64 = 500_000;
const APPROVE_GAS: u64 = 100_000;
const DEADLINE_SECS: u64 = 300;

/// Default quoted-output tolerance: accept 95% of the quoted amount.
const DEFAULT_SLIPPAGE_PERCENT: u8 = 5;

#[derive(Debug, Clone)]
pub struct SwapResult {
    pub venue: String,
    pub tx_hash: TxHash,
    pub amount_in: U256,
    /// Output quoted by getAmountsOut before the swap; the realized amount
    /// can differ (fee-on-transfer sends skip the minimum entirely).
    pub amount_out_quoted: U256,
    pub fee_tolerant: bool,
}

/// One V2-style trading venue (router + factory). Implementations issue the
/// actual transactions; the executor owns ordering and fallback.
#[async_trait]
pub trait SwapVenue: Send + Sync {
    fn name(&self) -> &str;
    fn router(&self) -> Address;

    /// Pool for the token pair, or `None` when the factory has none.
    async fn pair_for(&self, token_a: Address, token_b: Address) -> Result<Option<Address>>;

    /// Quoted output for `amount_in` along `path`.
    async fn amounts_out(&self, amount_in: U256, path: &[Address]) -> Result<U256>;

    async fn swap_eth_for_tokens(
        &self,
        amount_in: U256,
        min_out: U256,
        path: &[Address],
        to: Address,
        deadline: U256,
        gas: u64,
    ) -> Result<TxHash>;

    async fn swap_eth_for_tokens_fee_tolerant(
        &self,
        amount_in: U256,
        min_out: U256,
        path: &[Address],
        to: Address,
        deadline: U256,
        gas: u64,
    ) -> Result<TxHash>;

    async fn swap_tokens_for_eth(
        &self,
        amount_in: U256,
        min_out: U256,
        path: &[Address],
        to: Address,
        deadline: U256,
        gas: u64,
    ) -> Result<TxHash>;

    async fn swap_tokens_for_eth_fee_tolerant(
        &self,
        amount_in: U256,
        min_out: U256,
        path: &[Address],
        to: Address,
        deadline: U256,
        gas: u64,
    ) -> Result<TxHash>;

    async fn approve(&self, token: Address, amount: U256) -> Result<TxHash>;
}

/// Live venue backed by on-chain router/factory contracts. Sends wait for
/// the receipt and treat a reverted status as an error so the executor's
/// fallback chain fires.
pub struct LiveVenue<T, P> {
    name: String,
    router: Address,
    factory: Address,
    provider: P,
    _transport: std::marker::PhantomData<T>,
}

impl<T, P> LiveVenue<T, P>
where
    T: Transport + Clone,
    P: Provider<T> + Clone,
{
    pub fn new(name: impl Into<String>, router: Address, factory: Address, provider: P) -> Self {
        Self {
            name: name.into(),
            router,
            factory,
            provider,
            _transport: std::marker::PhantomData,
        }
    }

    async fn confirm(&self, tx_hash: TxHash, pending: impl std::future::Future<Output = Result<alloy::rpc::types::TransactionReceipt, anyhow::Error>>) -> Result<TxHash> {
        let receipt = pending.await?;
        if !receipt.status() {
            anyhow::bail!("transaction {tx_hash} reverted on {}", self.name);
        }
        Ok(tx_hash)
    }
}

#[async_trait]
impl<T, P> SwapVenue for LiveVenue<T, P>
where
    T: Transport + Clone,
    P: Provider<T> + Clone,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn router(&self) -> Address {
        self.router
    }

    async fn pair_for(&self, token_a: Address, token_b: Address) -> Result<Option<Address>> {
        let factory = IV2Factory::new(self.factory, self.provider.clone());
        let pair = factory
            .getPair(token_a, token_b)
            .call()
            .await
            .with_context(|| format!("getPair failed on {}", self.name))?
            .pair;
        Ok((pair != Address::ZERO).then_some(pair))
    }

    async fn amounts_out(&self, amount_in: U256, path: &[Address]) -> Result<U256> {
        let router = IV2Router::new(self.router, self.provider.clone());
        let amounts = router
            .getAmountsOut(amount_in, path.to_vec())
            .call()
            .await
            .with_context(|| format!("getAmountsOut failed on {}", self.name))?
            .amounts;
        amounts
            .last()
            .copied()
            .ok_or_else(|| anyhow!("empty amounts from {}", self.name))
    }

    async fn swap_eth_for_tokens(
        &self,
        amount_in: U256,
        min_out: U256,
        path: &[Address],
        to: Address,
        deadline: U256,
        gas: u64,
    ) -> Result<TxHash> {
        let router = IV2Router::new(self.router, self.provider.clone());
        let pending = router
            .swapExactETHForTokens(min_out, path.to_vec(), to, deadline)
            .value(amount_in)
            .gas(gas)
            .send()
            .await?;
        let tx_hash = *pending.tx_hash();
        self.confirm(tx_hash, async move {
            pending.get_receipt().await.map_err(Into::into)
        })
        .await
    }

    async fn swap_eth_for_tokens_fee_tolerant(
        &self,
        amount_in: U256,
        min_out: U256,
        path: &[Address],
        to: Address,
        deadline: U256,
        gas: u64,
    ) -> Result<TxHash> {
        let router = IV2Router::new(self.router, self.provider.clone());
        let pending = router
            .swapExactETHForTokensSupportingFeeOnTransferTokens(min_out, path.to_vec(), to, deadline)
            .value(amount_in)
            .gas(gas)
            .send()
            .await?;
        let tx_hash = *pending.tx_hash();
        self.confirm(tx_hash, async move {
            pending.get_receipt().await.map_err(Into::into)
        })
        .await
    }

    async fn swap_tokens_for_eth(
        &self,
        amount_in: U256,
        min_out: U256,
        path: &[Address],
        to: Address,
        deadline: U256,
        gas: u64,
    ) -> Result<TxHash> {
        let router = IV2Router::new(self.router, self.provider.clone());
        let pending = router
            .swapExactTokensForETH(amount_in, min_out, path.to_vec(), to, deadline)
            .gas(gas)
            .send()
            .await?;
        let tx_hash = *pending.tx_hash();
        self.confirm(tx_hash, async move {
            pending.get_receipt().await.map_err(Into::into)
        })
        .await
    }

    async fn swap_tokens_for_eth_fee_tolerant(
        &self,
        amount_in: U256,
        min_out: U256,
        path: &[Address],
        to: Address,
        deadline: U256,
        gas: u64,
    ) -> Result<TxHash> {
        let router = IV2Router::new(self.router, self.provider.clone());
        let pending = router
            .swapExactTokensForETHSupportingFeeOnTransferTokens(
                amount_in,
                min_out,
                path.to_vec(),
                to,
                deadline,
            )
            .gas(gas)
            .send()
            .await?;
        let tx_hash = *pending.tx_hash();
        self.confirm(tx_hash, async move {
            pending.get_receipt().await.map_err(Into::into)
        })
        .await
    }

    async fn approve(&self, token: Address, amount: U256) -> Result<TxHash> {
        let erc20 = IERC20::new(token, self.provider.clone());
        let pending = erc20.approve(self.router, amount).gas(APPROVE_GAS).send().await?;
        let tx_hash = *pending.tx_hash();
        self.confirm(tx_hash, async move {
            pending.get_receipt().await.map_err(Into::into)
        })
        .await
    }
}

/// Ordered router-fallback executor.
pub struct SwapExecutor {
    venues: Vec<Arc<dyn SwapVenue>>,
    weth: Address,
    wallet: Address,
}

impl SwapExecutor {
    pub fn new(venues: Vec<Arc<dyn SwapVenue>>, weth: Address, wallet: Address) -> Self {
        Self {
            venues,
            weth,
            wallet,
        }
    }

    pub fn wallet(&self) -> Address {
        self.wallet
    }

    /// Spend `amount_in` wei of native ETH on `token`, trying each venue in
    /// order. Returns the first successful swap.
    pub async fn buy_token(&self, token: Address, amount_in: U256) -> Result<SwapResult> {
        let path = [self.weth, token];
        let mut last_err = anyhow!("no venue has a pool for {token}");

        for venue in &self.venues {
            match venue.pair_for(self.weth, token).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    info!(venue = venue.name(), %token, "no pool, trying next venue");
                    continue;
                }
                Err(e) => {
                    warn!(venue = venue.name(), %token, ?e, "pool lookup failed");
                    last_err = e;
                    continue;
                }
            }

            let quote = match venue.amounts_out(amount_in, &path).await {
                Ok(q) => q,
                Err(e) => {
                    warn!(venue = venue.name(), %token, ?e, "quote failed");
                    last_err = e;
                    continue;
                }
            };
            let min_out = apply_slippage(quote, DEFAULT_SLIPPAGE_PERCENT);
            let deadline = swap_deadline();

            match venue
                .swap_eth_for_tokens(amount_in, min_out, &path, self.wallet, deadline, STANDARD_SWAP_GAS)
                .await
            {
                Ok(tx_hash) => {
                    info!(venue = venue.name(), %token, %tx_hash, "buy succeeded");
                    return Ok(SwapResult {
                        venue: venue.name().to_string(),
                        tx_hash,
                        amount_in,
                        amount_out_quoted: quote,
                        fee_tolerant: false,
                    });
                }
                Err(e) => {
                    warn!(venue = venue.name(), %token, ?e, "standard buy reverted, retrying fee-tolerant");
                }
            }

            // Fee-on-transfer tokens fail the exact-output check; retry with
            // no minimum and more gas.
            match venue
                .swap_eth_for_tokens_fee_tolerant(
                    amount_in,
                    U256::ZERO,
                    &path,
                    self.wallet,
                    deadline,
                    FEE_TOLERANT_SWAP_GAS,
                )
                .await
            {
                Ok(tx_hash) => {
                    info!(venue = venue.name(), %token, %tx_hash, "fee-tolerant buy succeeded");
                    return Ok(SwapResult {
                        venue: venue.name().to_string(),
                        tx_hash,
                        amount_in,
                        amount_out_quoted: quote,
                        fee_tolerant: true,
                    });
                }
                Err(e) => {
                    warn!(venue = venue.name(), %token, ?e, "fee-tolerant buy reverted");
                    last_err = e;
                }
            }
        }

        Err(last_err.context(format!("buy failed on every venue for {token}")))
    }

    /// Sell `amount_in` of `token` back to native ETH with the same venue
    /// walk as buys. The router is approved for the exact amount first.
    pub async fn sell_token(
        &self,
        token: Address,
        amount_in: U256,
        slippage_percent: Option<u8>,
    ) -> Result<SwapResult> {
        let slippage = slippage_percent.unwrap_or(DEFAULT_SLIPPAGE_PERCENT);
        let path = [token, self.weth];
        let mut last_err = anyhow!("no venue has a pool for {token}");

        for venue in &self.venues {
            match venue.pair_for(token, self.weth).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    info!(venue = venue.name(), %token, "no pool, trying next venue");
                    continue;
                }
                Err(e) => {
                    warn!(venue = venue.name(), %token, ?e, "pool lookup failed");
                    last_err = e;
                    continue;
                }
            }

            if let Err(e) = venue.approve(token, amount_in).await {
                warn!(venue = venue.name(), %token, ?e, "approve failed");
                last_err = e;
                continue;
            }

            let quote = match venue.amounts_out(amount_in, &path).await {
                Ok(q) => q,
                Err(e) => {
                    warn!(venue = venue.name(), %token, ?e, "quote failed");
                    last_err = e;
                    continue;
                }
            };
            let min_out = apply_slippage(quote, slippage);
            let deadline = swap_deadline();

            match venue
                .swap_tokens_for_eth(amount_in, min_out, &path, self.wallet, deadline, STANDARD_SWAP_GAS)
                .await
            {
                Ok(tx_hash) => {
                    info!(venue = venue.name(), %token, %tx_hash, "sell succeeded");
                    return Ok(SwapResult {
                        venue: venue.name().to_string(),
                        tx_hash,
                        amount_in,
                        amount_out_quoted: quote,
                        fee_tolerant: false,
                    });
                }
                Err(e) => {
                    warn!(venue = venue.name(), %token, ?e, "standard sell reverted, retrying fee-tolerant");
                }
            }

            match venue
                .swap_tokens_for_eth_fee_tolerant(
                    amount_in,
                    U256::ZERO,
                    &path,
                    self.wallet,
                    deadline,
                    FEE_TOLERANT_SWAP_GAS,
                )
                .await
            {
                Ok(tx_hash) => {
                    info!(venue = venue.name(), %token, %tx_hash, "fee-tolerant sell succeeded");
                    return Ok(SwapResult {
                        venue: venue.name().to_string(),
                        tx_hash,
                        amount_in,
                        amount_out_quoted: quote,
                        fee_tolerant: true,
                    });
                }
                Err(e) => {
                    warn!(venue = venue.name(), %token, ?e, "fee-tolerant sell reverted");
                    last_err = e;
                }
            }
        }

        Err(last_err.context(format!("sell failed on every venue for {token}")))
    }
}

fn apply_slippage(quote: U256, slippage_percent: u8) -> U256 {
    quote * U256::from(100 - slippage_percent.min(99) as u64) / U256::from(100)
}

fn swap_deadline() -> U256 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    U256::from(now + DEADLINE_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::Mutex;

    struct MockVenue {
        name: &'static str,
        has_pair: bool,
        standard_fails: bool,
        fee_tolerant_fails: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl MockVenue {
        fn new(
            name: &'static str,
            has_pair: bool,
            standard_fails: bool,
            fee_tolerant_fails: bool,
            calls: Arc<Mutex<Vec<String>>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                has_pair,
                standard_fails,
                fee_tolerant_fails,
                calls,
            })
        }

        fn record(&self, op: &str) {
            self.calls.lock().unwrap().push(format!("{}:{}", self.name, op));
        }
    }

    #[async_trait]
    impl SwapVenue for MockVenue {
        fn name(&self) -> &str {
            self.name
        }

        fn router(&self) -> Address {
            Address::ZERO
        }

        async fn pair_for(&self, _a: Address, _b: Address) -> Result<Option<Address>> {
            self.record("pair_for");
            Ok(self
                .has_pair
                .then(|| Address::from_str("0x00000000000000000000000000000000000000dd").unwrap()))
        }

        async fn amounts_out(&self, amount_in: U256, _path: &[Address]) -> Result<U256> {
            self.record("amounts_out");
            Ok(amount_in * U256::from(2))
        }

        async fn swap_eth_for_tokens(
            &self,
            _amount_in: U256,
            min_out: U256,
            _path: &[Address],
            _to: Address,
            _deadline: U256,
            gas: u64,
        ) -> Result<TxHash> {
            self.record(&format!("buy_standard min={min_out} gas={gas}"));
            if self.standard_fails {
                anyhow::bail!("revert");
            }
            Ok(TxHash::ZERO)
        }

        async fn swap_eth_for_tokens_fee_tolerant(
            &self,
            _amount_in: U256,
            min_out: U256,
            _path: &[Address],
            _to: Address,
            _deadline: U256,
            gas: u64,
        ) -> Result<TxHash> {
            self.record(&format!("buy_fee_tolerant min={min_out} gas={gas}"));
            if self.fee_tolerant_fails {
                anyhow::bail!("revert");
            }
            Ok(TxHash::ZERO)
        }

        async fn swap_tokens_for_eth(
            &self,
            _amount_in: U256,
            min_out: U256,
            _path: &[Address],
            _to: Address,
            _deadline: U256,
            gas: u64,
        ) -> Result<TxHash> {
            self.record(&format!("sell_standard min={min_out} gas={gas}"));
            if self.standard_fails {
                anyhow::bail!("revert");
            }
            Ok(TxHash::ZERO)
        }

        async fn swap_tokens_for_eth_fee_tolerant(
            &self,
            _amount_in: U256,
            min_out: U256,
            _path: &[Address],
            _to: Address,
            _deadline: U256,
            gas: u64,
        ) -> Result<TxHash> {
            self.record(&format!("sell_fee_tolerant min={min_out} gas={gas}"));
            if self.fee_tolerant_fails {
                anyhow::bail!("revert");
            }
            Ok(TxHash::ZERO)
        }

        async fn approve(&self, _token: Address, _amount: U256) -> Result<TxHash> {
            self.record("approve");
            Ok(TxHash::ZERO)
        }
    }

    fn executor(venues: Vec<Arc<MockVenue>>) -> SwapExecutor {
        SwapExecutor::new(
            venues
                .into_iter()
                .map(|v| v as Arc<dyn SwapVenue>)
                .collect(),
            Address::from_str("0x4200000000000000000000000000000000000006").unwrap(),
            Address::from_str("0x00000000000000000000000000000000000000ee").unwrap(),
        )
    }

    fn token() -> Address {
        Address::from_str("0x00000000000000000000000000000000000000bb").unwrap()
    }

    #[test]
    fn slippage_scales_the_quote() {
        assert_eq!(apply_slippage(U256::from(100), 5), U256::from(95));
        assert_eq!(apply_slippage(U256::from(100), 10), U256::from(90));
        assert_eq!(apply_slippage(U256::ZERO, 5), U256::ZERO);
    }

    #[tokio::test]
    async fn buy_stops_at_first_successful_venue() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let first = MockVenue::new("aerodrome", true, false, false, calls.clone());
        let second = MockVenue::new("uniswap_v2", true, false, false, calls.clone());
        let exec = executor(vec![first, second]);

        let result = exec.buy_token(token(), U256::from(100)).await.unwrap();
        assert_eq!(result.venue, "aerodrome");
        assert!(!result.fee_tolerant);
        assert_eq!(result.amount_out_quoted, U256::from(200));

        let log = calls.lock().unwrap();
        assert!(log.iter().all(|c| c.starts_with("aerodrome:")));
        assert_eq!(
            log.last().unwrap(),
            &format!("aerodrome:buy_standard min=190 gas={STANDARD_SWAP_GAS}")
        );
    }

    #[tokio::test]
    async fn buy_skips_venue_without_pool() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let first = MockVenue::new("aerodrome", false, false, false, calls.clone());
        let second = MockVenue::new("uniswap_v2", true, false, false, calls.clone());
        let exec = executor(vec![first, second]);

        let result = exec.buy_token(token(), U256::from(100)).await.unwrap();
        assert_eq!(result.venue, "uniswap_v2");

        let log = calls.lock().unwrap();
        // The poolless venue was probed but never quoted or swapped on.
        assert_eq!(log.iter().filter(|c| c.starts_with("aerodrome:")).count(), 1);
    }

    #[tokio::test]
    async fn buy_retries_fee_tolerant_with_zero_min_out() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let venue = MockVenue::new("aerodrome", true, true, false, calls.clone());
        let exec = executor(vec![venue]);

        let result = exec.buy_token(token(), U256::from(100)).await.unwrap();
        assert!(result.fee_tolerant);

        let log = calls.lock().unwrap();
        assert!(log.contains(&format!(
            "aerodrome:buy_fee_tolerant min=0 gas={FEE_TOLERANT_SWAP_GAS}"
        )));
    }

    #[tokio::test]
    async fn buy_falls_through_to_second_venue_after_both_attempts_fail() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let first = MockVenue::new("aerodrome", true, true, true, calls.clone());
        let second = MockVenue::new("uniswap_v2", true, false, false, calls.clone());
        let exec = executor(vec![first, second]);

        let result = exec.buy_token(token(), U256::from(100)).await.unwrap();
        assert_eq!(result.venue, "uniswap_v2");
    }

    #[tokio::test]
    async fn buy_errors_when_every_venue_fails() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let first = MockVenue::new("aerodrome", true, true, true, calls.clone());
        let second = MockVenue::new("uniswap_v2", false, false, false, calls.clone());
        let exec = executor(vec![first, second]);

        assert!(exec.buy_token(token(), U256::from(100)).await.is_err());
    }

    #[tokio::test]
    async fn sell_approves_before_swapping() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let venue = MockVenue::new("aerodrome", true, false, false, calls.clone());
        let exec = executor(vec![venue]);

        exec.sell_token(token(), U256::from(100), None).await.unwrap();

        let log = calls.lock().unwrap();
        let approve_at = log.iter().position(|c| c.ends_with(":approve")).unwrap();
        let swap_at = log.iter().position(|c| c.contains("sell_standard")).unwrap();
        assert!(approve_at < swap_at);
    }

    #[tokio::test]
    async fn sell_honors_custom_slippage() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let venue = MockVenue::new("aerodrome", true, false, false, calls.clone());
        let exec = executor(vec![venue]);

        exec.sell_token(token(), U256::from(100), Some(20)).await.unwrap();

        // Quote is 2x the input, so 200 less 20% is 160.
        let log = calls.lock().unwrap();
        assert!(log.contains(&format!(
            "aerodrome:sell_standard min=160 gas={STANDARD_SWAP_GAS}"
        )));
    }
}
