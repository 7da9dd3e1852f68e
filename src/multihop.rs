//! Multi-hop routing through intermediate base tokens.
//!
//! When the direct WETH->token pool is missing or quotes to dust, two-hop
//! paths through a fixed set of liquid bases (USDC, USDbC, DAI, cbETH) are
//! simulated and the strictly best one wins. Direct swaps go through the
//! Universal Router (wrap + V2 swap in one transaction); longer paths fall
//! back to the legacy V2 router.

use alloy::{
    primitives::{address, Address, Bytes, TxHash, U256},
    providers::Provider,
    sol_types::SolValue,
    transports::Transport,
};
use anyhow::{anyhow, Result};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::abi::{IERC20, IUniversalRouter, IV2Router};
use crate::swap::SwapVenue;

/// Direct quotes at or below this output are treated as no liquidity.
pub const DIRECT_PATH_DUST_WEI: u128 = 1_000_000_000_000_000;

const UNIVERSAL_ROUTER_GAS: u64 = 300_000;
const LEGACY_MULTI_HOP_GAS: u64 = 400_000;
const APPROVE_GAS: u64 = 100_000;
const DEADLINE_SECS: u64 = 300;

// Universal Router command bytes.
const CMD_WRAP_ETH: u8 = 0x0b;
const CMD_V2_SWAP_EXACT_IN: u8 = 0x08;

/// Universal Router sentinel meaning "this contract" as a recipient.
const ADDRESS_THIS: Address = address!("0000000000000000000000000000000000000002");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathQuote {
    pub path: Vec<Address>,
    pub amount_out: U256,
}

/// Best route from WETH to `token` for `amount_in`: the direct pool when it
/// quotes above dust, otherwise the best two-hop path through `bases`.
pub async fn find_best_path(
    quoter: &dyn SwapVenue,
    weth: Address,
    token: Address,
    amount_in: U256,
    bases: &[Address],
) -> Option<PathQuote> {
    let direct = vec![weth, token];
    if let Ok(out) = quoter.amounts_out(amount_in, &direct).await {
        if out > U256::from(DIRECT_PATH_DUST_WEI) {
            debug!(%token, %out, "direct path quotes above dust");
            return Some(PathQuote {
                path: direct,
                amount_out: out,
            });
        }
    }

    let mut candidates = Vec::new();
    for &base in bases {
        if base == weth || base == token {
            continue;
        }
        let path = vec![weth, base, token];
        match quoter.amounts_out(amount_in, &path).await {
            Ok(out) if out > U256::ZERO => candidates.push(PathQuote {
                path,
                amount_out: out,
            }),
            Ok(_) => {}
            Err(e) => debug!(%token, %base, ?e, "hop quote failed"),
        }
    }

    pick_best(candidates)
}

/// Strictly-greater selection; earlier candidates win ties.
pub fn pick_best(candidates: Vec<PathQuote>) -> Option<PathQuote> {
    let mut best: Option<PathQuote> = None;
    for candidate in candidates {
        match &best {
            Some(b) if candidate.amount_out <= b.amount_out => {}
            _ => best = Some(candidate),
        }
    }
    best
}

/// True when the winning route needs an intermediate hop.
pub async fn is_multi_hop_beneficial(
    quoter: &dyn SwapVenue,
    weth: Address,
    token: Address,
    amount_in: U256,
    bases: &[Address],
) -> bool {
    find_best_path(quoter, weth, token, amount_in, bases)
        .await
        .map(|q| q.path.len() > 2)
        .unwrap_or(false)
}

/// Commands + per-command inputs for a wrap-then-swap through the Universal
/// Router. WRAP_ETH deposits into the router itself, which then pays the V2
/// pool directly (payerIsUser = false).
pub fn encode_universal_router_swap(
    recipient: Address,
    amount_in: U256,
    min_out: U256,
    path: &[Address],
) -> (Bytes, Vec<Bytes>) {
    let commands = Bytes::from(vec![CMD_WRAP_ETH, CMD_V2_SWAP_EXACT_IN]);
    let wrap_input = (ADDRESS_THIS, amount_in).abi_encode_params();
    let swap_input =
        (recipient, amount_in, min_out, path.to_vec(), false).abi_encode_params();
    (commands, vec![Bytes::from(wrap_input), Bytes::from(swap_input)])
}

/// Executes routed buys: direct paths through the Universal Router, longer
/// paths through the legacy V2 router.
pub struct MultiHopExecutor<T, P> {
    provider: P,
    universal_router: Address,
    legacy_router: Address,
    weth: Address,
    wallet: Address,
    _transport: std::marker::PhantomData<T>,
}

impl<T, P> MultiHopExecutor<T, P>
where
    T: Transport + Clone,
    P: Provider<T> + Clone,
{
    pub fn new(
        provider: P,
        universal_router: Address,
        legacy_router: Address,
        weth: Address,
        wallet: Address,
    ) -> Self {
        Self {
            provider,
            universal_router,
            legacy_router,
            weth,
            wallet,
            _transport: std::marker::PhantomData,
        }
    }

    pub async fn execute(
        &self,
        path: &[Address],
        amount_in: U256,
        min_out: U256,
    ) -> Result<TxHash> {
        match path {
            [] | [_] => Err(anyhow!("path needs at least two tokens")),
            [_, _] => self.execute_universal(path, amount_in, min_out).await,
            _ => self.execute_legacy(path, amount_in, min_out).await,
        }
    }

    async fn execute_universal(
        &self,
        path: &[Address],
        amount_in: U256,
        min_out: U256,
    ) -> Result<TxHash> {
        let (commands, inputs) =
            encode_universal_router_swap(self.wallet, amount_in, min_out, path);
        let router = IUniversalRouter::new(self.universal_router, self.provider.clone());
        let pending = router
            .execute(commands, inputs, swap_deadline())
            .value(amount_in)
            .gas(UNIVERSAL_ROUTER_GAS)
            .send()
            .await?;
        let tx_hash = *pending.tx_hash();
        let receipt = pending.get_receipt().await?;
        if !receipt.status() {
            anyhow::bail!("universal router swap {tx_hash} reverted");
        }
        info!(%tx_hash, "universal router swap confirmed");
        Ok(tx_hash)
    }

    async fn execute_legacy(
        &self,
        path: &[Address],
        amount_in: U256,
        min_out: U256,
    ) -> Result<TxHash> {
        let router = IV2Router::new(self.legacy_router, self.provider.clone());
        let deadline = swap_deadline();

        let pending = if path[0] == self.weth {
            router
                .swapExactETHForTokens(min_out, path.to_vec(), self.wallet, deadline)
                .value(amount_in)
                .gas(LEGACY_MULTI_HOP_GAS)
                .send()
                .await?
        } else {
            let erc20 = IERC20::new(path[0], self.provider.clone());
            let approve = erc20
                .approve(self.legacy_router, amount_in)
                .gas(APPROVE_GAS)
                .send()
                .await?;
            let approve_receipt = approve.get_receipt().await?;
            if !approve_receipt.status() {
                anyhow::bail!("approve for multi-hop swap reverted");
            }
            router
                .swapExactTokensForTokens(amount_in, min_out, path.to_vec(), self.wallet, deadline)
                .gas(LEGACY_MULTI_HOP_GAS)
                .send()
                .await?
        };

        let tx_hash = *pending.tx_hash();
        let receipt = pending.get_receipt().await?;
        if !receipt.status() {
            anyhow::bail!("multi-hop swap {tx_hash} reverted");
        }
        info!(%tx_hash, hops = path.len() - 1, "multi-hop swap confirmed");
        Ok(tx_hash)
    }

    /// Route-aware buy: find the best path, apply the standard slippage
    /// tolerance, execute.
    pub async fn smart_buy(
        &self,
        quoter: &dyn SwapVenue,
        token: Address,
        amount_in: U256,
        bases: &[Address],
    ) -> Result<(TxHash, PathQuote)> {
        let quote = find_best_path(quoter, self.weth, token, amount_in, bases)
            .await
            .ok_or_else(|| anyhow!("no viable route to {token}"))?;

        if quote.path.len() > 2 {
            warn!(%token, hops = quote.path.len() - 1, "direct pool illiquid, routing multi-hop");
        }

        let min_out = quote.amount_out * U256::from(95) / U256::from(100);
        let tx_hash = self.execute(&quote.path, amount_in, min_out).await?;
        Ok((tx_hash, quote))
    }
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
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::str::FromStr;

    const WETH: &str = "0x4200000000000000000000000000000000000006";

    fn addr(s: &str) -> Address {
        Address::from_str(s).unwrap()
    }

    fn quote(path: Vec<&str>, out: u128) -> PathQuote {
        PathQuote {
            path: path.into_iter().map(addr).collect(),
            amount_out: U256::from(out),
        }
    }

    /// Quoter with canned per-path outputs; unknown paths error.
    struct TableQuoter {
        outputs: HashMap<Vec<Address>, U256>,
    }

    impl TableQuoter {
        fn new(entries: Vec<(Vec<&str>, u128)>) -> Self {
            Self {
                outputs: entries
                    .into_iter()
                    .map(|(p, out)| (p.into_iter().map(addr).collect(), U256::from(out)))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl SwapVenue for TableQuoter {
        fn name(&self) -> &str {
            "table"
        }
        fn router(&self) -> Address {
            Address::ZERO
        }
        async fn pair_for(&self, _a: Address, _b: Address) -> Result<Option<Address>> {
            Ok(None)
        }
        async fn amounts_out(&self, _amount_in: U256, path: &[Address]) -> Result<U256> {
            self.outputs
                .get(path)
                .copied()
                .ok_or_else(|| anyhow!("no pool"))
        }
        async fn swap_eth_for_tokens(
            &self,
            _: U256,
            _: U256,
            _: &[Address],
            _: Address,
            _: U256,
            _: u64,
        ) -> Result<TxHash> {
            unimplemented!()
        }
        async fn swap_eth_for_tokens_fee_tolerant(
            &self,
            _: U256,
            _: U256,
            _: &[Address],
            _: Address,
            _: U256,
            _: u64,
        ) -> Result<TxHash> {
            unimplemented!()
        }
        async fn swap_tokens_for_eth(
            &self,
            _: U256,
            _: U256,
            _: &[Address],
            _: Address,
            _: U256,
            _: u64,
        ) -> Result<TxHash> {
            unimplemented!()
        }
        async fn swap_tokens_for_eth_fee_tolerant(
            &self,
            _: U256,
            _: U256,
            _: &[Address],
            _: Address,
            _: U256,
            _: u64,
        ) -> Result<TxHash> {
            unimplemented!()
        }
        async fn approve(&self, _: Address, _: U256) -> Result<TxHash> {
            unimplemented!()
        }
    }

    const TOKEN: &str = "0x00000000000000000000000000000000000000bb";
    const USDC: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";
    const DAI: &str = "0x50c5725949A6F0c72E6C4a641F24049A917DB0Cb";

    #[test]
    fn pick_best_selects_strict_maximum() {
        let best = pick_best(vec![
            quote(vec![WETH, USDC, TOKEN], 100),
            quote(vec![WETH, DAI, TOKEN], 150),
            quote(vec![WETH, USDC, TOKEN], 120),
        ])
        .unwrap();
        assert_eq!(best.amount_out, U256::from(150));
    }

    #[test]
    fn pick_best_keeps_earlier_candidate_on_tie() {
        let best = pick_best(vec![
            quote(vec![WETH, USDC, TOKEN], 150),
            quote(vec![WETH, DAI, TOKEN], 150),
        ])
        .unwrap();
        assert_eq!(best.path[1], addr(USDC));
    }

    #[test]
    fn pick_best_empty_is_none() {
        assert!(pick_best(vec![]).is_none());
    }

    #[tokio::test]
    async fn direct_path_wins_when_above_dust() {
        let quoter = TableQuoter::new(vec![
            (vec![WETH, TOKEN], DIRECT_PATH_DUST_WEI + 1),
            (vec![WETH, USDC, TOKEN], 10 * DIRECT_PATH_DUST_WEI),
        ]);
        let best = find_best_path(
            &quoter,
            addr(WETH),
            addr(TOKEN),
            U256::from(1u64),
            &[addr(USDC)],
        )
        .await
        .unwrap();
        assert_eq!(best.path.len(), 2);
    }

    #[tokio::test]
    async fn dust_direct_quote_routes_through_hops() {
        let quoter = TableQuoter::new(vec![
            (vec![WETH, TOKEN], DIRECT_PATH_DUST_WEI),
            (vec![WETH, USDC, TOKEN], 100),
            (vec![WETH, DAI, TOKEN], 150),
        ]);
        let best = find_best_path(
            &quoter,
            addr(WETH),
            addr(TOKEN),
            U256::from(1u64),
            &[addr(USDC), addr(DAI)],
        )
        .await
        .unwrap();
        assert_eq!(best.path, vec![addr(WETH), addr(DAI), addr(TOKEN)]);
        assert_eq!(best.amount_out, U256::from(150));
    }

    #[tokio::test]
    async fn bases_equal_to_endpoints_are_skipped() {
        let quoter = TableQuoter::new(vec![(vec![WETH, USDC, TOKEN], 100)]);
        let best = find_best_path(
            &quoter,
            addr(WETH),
            addr(TOKEN),
            U256::from(1u64),
            &[addr(WETH), addr(TOKEN), addr(USDC)],
        )
        .await
        .unwrap();
        assert_eq!(best.path, vec![addr(WETH), addr(USDC), addr(TOKEN)]);
    }

    #[tokio::test]
    async fn no_route_at_all_is_none() {
        let quoter = TableQuoter::new(vec![]);
        assert!(find_best_path(
            &quoter,
            addr(WETH),
            addr(TOKEN),
            U256::from(1u64),
            &[addr(USDC)],
        )
        .await
        .is_none());
    }

    #[tokio::test]
    async fn beneficial_only_when_winning_route_hops() {
        let hop_only = TableQuoter::new(vec![(vec![WETH, USDC, TOKEN], 100)]);
        assert!(
            is_multi_hop_beneficial(
                &hop_only,
                addr(WETH),
                addr(TOKEN),
                U256::from(1u64),
                &[addr(USDC)]
            )
            .await
        );

        let direct = TableQuoter::new(vec![(vec![WETH, TOKEN], DIRECT_PATH_DUST_WEI + 1)]);
        assert!(
            !is_multi_hop_beneficial(
                &direct,
                addr(WETH),
                addr(TOKEN),
                U256::from(1u64),
                &[addr(USDC)]
            )
            .await
        );
    }

    #[test]
    fn universal_router_encoding_shape() {
        let recipient = addr("0x00000000000000000000000000000000000000ee");
        let path = vec![addr(WETH), addr(TOKEN)];
        let (commands, inputs) = encode_universal_router_swap(
            recipient,
            U256::from(1000),
            U256::from(950),
            &path,
        );

        assert_eq!(commands.as_ref(), &[CMD_WRAP_ETH, CMD_V2_SWAP_EXACT_IN]);
        assert_eq!(inputs.len(), 2);

        let (wrap_to, wrap_amount) =
            <(Address, U256)>::abi_decode_params(&inputs[0], true).unwrap();
        assert_eq!(wrap_to, ADDRESS_THIS);
        assert_eq!(wrap_amount, U256::from(1000));

        let (to, amount_in, min_out, decoded_path, payer_is_user) =
            <(Address, U256, U256, Vec<Address>, bool)>::abi_decode_params(&inputs[1], true)
                .unwrap();
        assert_eq!(to, recipient);
        assert_eq!(amount_in, U256::from(1000));
        assert_eq!(min_out, U256::from(950));
        assert_eq!(decoded_path, path);
        assert!(!payer_is_user);
    }
}
