//! The monitoring session: pair discovery, big-buy detection, wallet
//! watching, and the Telegram command loop, all hanging off one shared
//! session object instead of process globals.

use alloy::{
    consensus::Transaction,
    primitives::{Address, B256, I256, TxHash, U256},
    providers::Provider,
    rpc::types::{BlockTransactionsKind, Filter},
    sol_types::SolEvent,
    transports::Transport,
};
use anyhow::{Context, Result};
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::abi::{IERC20, IRouterEvents, IV2Factory, IV3Factory, IV3Pool, IV4PoolManager, IZoraFactory};
use crate::commands::{parse_command, Command, CommandPoller, Inbound, SellAmount, HELP_TEXT};
use crate::config::Config;
use crate::multihop::MultiHopExecutor;
use crate::pair::{analyze_pair, non_weth_token, AlertPolicy, PoolKind};
use crate::state::{DedupSet, StateStore};
use crate::swap::{SwapExecutor, SwapVenue};
use crate::telegram::{
    format_big_buy, format_pair_alert, format_swap_result, format_v4_liquidity,
    format_wallet_activity, format_zora_coin, Notifier, TelegramClient,
};
use crate::token::{fetch_token_info, fetch_wallet_token_info};
use crate::units::{eth_to_wei, format_units, parse_units, wei_to_eth};
use crate::etherscan::VerificationClient;

const DEDUP_CAPACITY: usize = 10_000;

/// Liquidity-seed thresholds shared by the V3 and V4 monitors: a pool only
/// becomes interesting once someone seeds it with real size on the WETH or
/// USDC side.
const MIN_SEED_WETH: f64 = 5.0;
const MIN_SEED_USDC_UNITS: u64 = 20_000_000_000; // 20k USDC at 6 decimals

/// True when `amount` of `currency` clears the seed threshold. Currencies
/// other than WETH and USDC never qualify.
fn meets_seed_threshold(currency: Address, amount: U256, weth: Address, usdc: Address) -> bool {
    if currency == weth {
        wei_to_eth(amount) >= MIN_SEED_WETH
    } else if currency == usdc {
        amount >= U256::from(MIN_SEED_USDC_UNITS)
    } else {
        false
    }
}

/// Sum the Transfer amounts attributable to each pool currency. V4's
/// ModifyLiquidity event carries no token amounts, so they are recovered
/// from the ERC-20 transfers in the same receipt.
fn seeded_amounts(
    transfers: &[(Address, U256)],
    currency0: Address,
    currency1: Address,
) -> (U256, U256) {
    let mut amount0 = U256::ZERO;
    let mut amount1 = U256::ZERO;
    for (token, value) in transfers {
        if *token == currency0 {
            amount0 += *value;
        } else if *token == currency1 {
            amount1 += *value;
        }
    }
    (amount0, amount1)
}

fn currency_label(currency: Address, weth: Address, usdc: Address) -> String {
    if currency == weth {
        "WETH".to_string()
    } else if currency == usdc {
        "USDC".to_string()
    } else {
        format!("{currency:?}")
    }
}

/// Display amount for a pool side, only for the currencies whose decimals
/// are known.
fn seed_display(currency: Address, amount: U256, weth: Address, usdc: Address) -> Option<f64> {
    if amount.is_zero() {
        return None;
    }
    if currency == weth {
        Some(wei_to_eth(amount))
    } else if currency == usdc {
        format_units(amount, 6).parse().ok()
    } else {
        None
    }
}

/// Trading half of the session, absent when no wallet key is configured.
pub struct Trading<T, P> {
    pub executor: SwapExecutor,
    pub multihop: MultiHopExecutor<T, P>,
    /// Venue used for route quoting, normally the first fallback venue.
    pub quoter: Arc<dyn SwapVenue>,
}

pub struct MonitorSession<T, P> {
    provider: P,
    config: Config,
    state: Arc<StateStore>,
    notifier: Notifier,
    client: TelegramClient,
    verification: VerificationClient,
    trading: Option<Trading<T, P>>,
    policy: AlertPolicy,
    pair_dedup: DedupSet,
    big_buy_dedup: DedupSet,
    /// V3 pool address -> (token0, token1), filled by PoolCreated.
    v3_pools: Mutex<HashMap<Address, (Address, Address)>>,
    /// V4 pool id -> (currency0, currency1), filled by Initialize.
    v4_pools: Mutex<HashMap<B256, (Address, Address)>>,
    running: AtomicBool,
    started_at: Instant,
    _transport: std::marker::PhantomData<T>,
}

impl<T, P> MonitorSession<T, P>
where
    T: Transport + Clone,
    P: Provider<T> + Clone + 'static,
{
    pub fn new(
        provider: P,
        config: Config,
        state: Arc<StateStore>,
        notifier: Notifier,
        client: TelegramClient,
        trading: Option<Trading<T, P>>,
    ) -> Arc<Self> {
        let policy = AlertPolicy {
            min_liquidity_eth: config.min_liquidity_eth,
            max_liquidity_eth: config.max_liquidity_eth,
            max_supply_threshold: config.max_supply_threshold,
        };
        let verification = VerificationClient::new(
            config.etherscan_api.clone(),
            config.etherscan_api_key.clone(),
            config.chain_id,
        );
        Arc::new(Self {
            provider,
            config,
            state,
            notifier,
            client,
            verification,
            trading,
            policy,
            pair_dedup: DedupSet::new(DEDUP_CAPACITY),
            big_buy_dedup: DedupSet::new(DEDUP_CAPACITY),
            v3_pools: Mutex::new(HashMap::new()),
            v4_pools: Mutex::new(HashMap::new()),
            running: AtomicBool::new(true),
            started_at: Instant::now(),
            _transport: std::marker::PhantomData,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// V2-style PairCreated monitoring on the Uniswap V2 and Aerodrome
    /// factories.
    pub async fn run_pair_monitor(self: Arc<Self>) -> Result<()> {
        let filter = Filter::new()
            .address(vec![
                self.config.uniswap_v2_factory,
                self.config.aerodrome_factory,
            ])
            .event_signature(IV2Factory::PairCreated::SIGNATURE_HASH);

        let sub = self
            .provider
            .subscribe_logs(&filter)
            .await
            .context("PairCreated subscription failed")?;
        let mut stream = sub.into_stream();
        info!("pair monitor subscribed");

        while let Some(log) = stream.next().await {
            let decoded = match log.log_decode::<IV2Factory::PairCreated>() {
                Ok(d) => d,
                Err(e) => {
                    warn!(?e, "undecodable PairCreated log");
                    continue;
                }
            };
            let factory = decoded.inner.address;
            let event = decoded.inner.data;
            let dex = if factory == self.config.aerodrome_factory {
                "Aerodrome"
            } else {
                "Uniswap V2"
            };

            let session = self.clone();
            tokio::spawn(async move {
                session
                    .process_new_pair(dex, event.pair, event.token0, event.token1)
                    .await;
            });
        }

        anyhow::bail!("PairCreated stream ended")
    }

    async fn process_new_pair(
        &self,
        dex: &str,
        pair_address: Address,
        token0: Address,
        token1: Address,
    ) {
        let key = format!("{pair_address:?}");

        // Recording before the confirmation wait closes the window where a
        // second log for the same pair slips through; the old behavior is
        // kept behind a flag.
        if self.config.dedup_before_confirm && !self.pair_dedup.insert(key.clone()).await {
            return;
        }

        tokio::time::sleep(Duration::from_millis(self.config.confirmation_delay_ms())).await;

        if !self.config.dedup_before_confirm && !self.pair_dedup.insert(key).await {
            return;
        }

        if !self.is_running() {
            return;
        }
        if !self.state.factory_enabled(dex).await {
            info!(dex, "factory disabled, skipping pair");
            return;
        }

        info!(%pair_address, dex, "analyzing new pair");
        let Some(mut pair) = analyze_pair(
            &self.provider,
            self.config.weth,
            pair_address,
            token0,
            token1,
            PoolKind::V2,
        )
        .await
        else {
            return;
        };

        let token = non_weth_token(&pair, self.config.weth);
        if self
            .state
            .is_blacklisted_any(&[format!("{:?}", token.address).as_str(), token.symbol.as_str()])
            .await
        {
            info!(token = %token.address, "blacklisted token, skipping");
            return;
        }

        if !self.policy.should_alert(&pair, self.config.weth) {
            info!(
                %pair_address,
                liquidity = pair.liquidity_eth,
                "outside liquidity band"
            );
            return;
        }

        let token_address = token.address;
        let verified = self.verification.is_verified(token_address).await;
        if pair.token0.address == token_address {
            pair.token0_verified = verified;
        } else {
            pair.token1_verified = verified;
        }

        self.notifier
            .notify(format_pair_alert(&pair, self.config.weth, dex))
            .await;

        if self.config.auto_swap_enabled {
            self.auto_buy(token_address).await;
        }
    }

    async fn auto_buy(&self, token: Address) {
        let Some(trading) = &self.trading else {
            warn!("auto-swap enabled but no wallet key configured");
            return;
        };
        let amount_in = eth_to_wei(self.config.auto_swap_buy_amount_eth);
        match trading.executor.buy_token(token, amount_in).await {
            Ok(result) => {
                let balance = fetch_wallet_token_info(
                    &self.provider,
                    token,
                    trading.executor.wallet(),
                )
                .await
                .map(|w| w.balance)
                .unwrap_or(U256::ZERO);
                if let Some(info) = fetch_token_info(&self.provider, token).await {
                    self.notifier
                        .notify(format_swap_result("Auto-buy", &info, &result, balance))
                        .await;
                }
            }
            Err(e) => {
                error!(%token, ?e, "auto-buy failed");
                self.notifier
                    .notify(format!("⚠️ Auto-buy failed for `{token:?}`: {e:#}"))
                    .await;
            }
        }
    }

    /// V3 monitoring: PoolCreated registers pools, a global Mint
    /// subscription flags the first sizeable liquidity add.
    pub async fn run_v3_monitor(self: Arc<Self>) -> Result<()> {
        let created_filter = Filter::new()
            .address(vec![self.config.uniswap_v3_factory])
            .event_signature(IV3Factory::PoolCreated::SIGNATURE_HASH);
        let mint_filter = Filter::new().event_signature(IV3Pool::Mint::SIGNATURE_HASH);

        let created_sub = self
            .provider
            .subscribe_logs(&created_filter)
            .await
            .context("PoolCreated subscription failed")?;
        let mint_sub = self
            .provider
            .subscribe_logs(&mint_filter)
            .await
            .context("Mint subscription failed")?;

        let mut created = created_sub.into_stream();
        let mut mints = mint_sub.into_stream();
        info!("v3 monitor subscribed");

        loop {
            tokio::select! {
                Some(log) = created.next() => {
                    if let Ok(decoded) = log.log_decode::<IV3Factory::PoolCreated>() {
                        let event = decoded.inner.data;
                        self.v3_pools
                            .lock()
                            .await
                            .insert(event.pool, (event.token0, event.token1));
                        info!(pool = %event.pool, "v3 pool registered");
                    }
                }
                Some(log) = mints.next() => {
                    let Ok(decoded) = log.log_decode::<IV3Pool::Mint>() else {
                        continue;
                    };
                    let pool = decoded.inner.address;
                    let tokens = self.v3_pools.lock().await.get(&pool).copied();
                    let Some((token0, token1)) = tokens else {
                        continue;
                    };
                    let event = decoded.inner.data;
                    let session = self.clone();
                    tokio::spawn(async move {
                        session
                            .process_v3_mint(pool, token0, token1, event.amount0, event.amount1)
                            .await;
                    });
                }
                else => break,
            }
        }

        anyhow::bail!("v3 streams ended")
    }

    async fn process_v3_mint(
        &self,
        pool: Address,
        token0: Address,
        token1: Address,
        amount0: U256,
        amount1: U256,
    ) {
        if !self.is_running() {
            return;
        }

        let weth_amount = if token0 == self.config.weth {
            Some(amount0)
        } else if token1 == self.config.weth {
            Some(amount1)
        } else {
            None
        };
        let weth_side = weth_amount.map(wei_to_eth).unwrap_or(0.0);
        if !meets_seed_threshold(token0, amount0, self.config.weth, self.config.usdc)
            && !meets_seed_threshold(token1, amount1, self.config.weth, self.config.usdc)
        {
            return;
        }

        if !self.pair_dedup.insert(format!("{pool:?}")).await {
            return;
        }

        let Some(mut pair) = analyze_pair(
            &self.provider,
            self.config.weth,
            pool,
            token0,
            token1,
            PoolKind::V3,
        )
        .await
        else {
            return;
        };
        // V3 pools carry no V2 reserves; surface the minted WETH size.
        pair.liquidity_eth = weth_side;

        let token = non_weth_token(&pair, self.config.weth);
        if self
            .state
            .is_blacklisted_any(&[format!("{:?}", token.address).as_str(), token.symbol.as_str()])
            .await
        {
            return;
        }

        let token_address = token.address;
        let verified = self.verification.is_verified(token_address).await;
        if pair.token0.address == token_address {
            pair.token0_verified = verified;
        } else {
            pair.token1_verified = verified;
        }

        info!(%pool, weth_side, "v3 pool seeded with size");
        self.notifier
            .notify(format_pair_alert(&pair, self.config.weth, "Uniswap V3"))
            .await;
    }

    /// V4 monitoring on the singleton pool manager: Initialize registers the
    /// pool's currencies, ModifyLiquidity flags the first sizeable add.
    pub async fn run_v4_monitor(self: Arc<Self>) -> Result<()> {
        let init_filter = Filter::new()
            .address(vec![self.config.uniswap_v4_pool_manager])
            .event_signature(IV4PoolManager::Initialize::SIGNATURE_HASH);
        let modify_filter = Filter::new()
            .address(vec![self.config.uniswap_v4_pool_manager])
            .event_signature(IV4PoolManager::ModifyLiquidity::SIGNATURE_HASH);

        let init_sub = self
            .provider
            .subscribe_logs(&init_filter)
            .await
            .context("Initialize subscription failed")?;
        let modify_sub = self
            .provider
            .subscribe_logs(&modify_filter)
            .await
            .context("ModifyLiquidity subscription failed")?;

        let mut inits = init_sub.into_stream();
        let mut modifies = modify_sub.into_stream();
        info!("v4 monitor subscribed");

        loop {
            tokio::select! {
                Some(log) = inits.next() => {
                    if let Ok(decoded) = log.log_decode::<IV4PoolManager::Initialize>() {
                        let event = decoded.inner.data;
                        self.v4_pools
                            .lock()
                            .await
                            .insert(event.id, (event.currency0, event.currency1));
                        info!(id = %event.id, "v4 pool registered");
                    }
                }
                Some(log) = modifies.next() => {
                    let Ok(decoded) = log.log_decode::<IV4PoolManager::ModifyLiquidity>() else {
                        continue;
                    };
                    let event = decoded.inner.data;
                    // Only adds; removals and zero-delta pokes are noise.
                    if event.liquidityDelta <= I256::ZERO {
                        continue;
                    }
                    let Some(tx_hash) = log.transaction_hash else {
                        continue;
                    };
                    let currencies = self.v4_pools.lock().await.get(&event.id).copied();
                    let Some((currency0, currency1)) = currencies else {
                        continue;
                    };
                    let session = self.clone();
                    tokio::spawn(async move {
                        session
                            .process_v4_liquidity(
                                event.id,
                                event.sender,
                                currency0,
                                currency1,
                                tx_hash,
                            )
                            .await;
                    });
                }
                else => break,
            }
        }

        anyhow::bail!("v4 streams ended")
    }

    async fn process_v4_liquidity(
        &self,
        id: B256,
        owner: Address,
        currency0: Address,
        currency1: Address,
        tx_hash: TxHash,
    ) {
        if !self.is_running() {
            return;
        }

        let Ok(Some(receipt)) = self.provider.get_transaction_receipt(tx_hash).await else {
            return;
        };
        let transfers: Vec<(Address, U256)> = receipt
            .inner
            .logs()
            .iter()
            .filter_map(|log| {
                let decoded = log.log_decode::<IERC20::Transfer>().ok()?;
                Some((decoded.inner.address, decoded.inner.data.value))
            })
            .collect();

        let weth = self.config.weth;
        let usdc = self.config.usdc;
        let (amount0, amount1) = seeded_amounts(&transfers, currency0, currency1);
        if !meets_seed_threshold(currency0, amount0, weth, usdc)
            && !meets_seed_threshold(currency1, amount1, weth, usdc)
        {
            return;
        }
        if !self.pair_dedup.insert(format!("{id:?}")).await {
            return;
        }

        info!(%id, "v4 pool seeded with size");
        self.notifier
            .notify(format_v4_liquidity(
                id,
                owner,
                &currency_label(currency0, weth, usdc),
                &currency_label(currency1, weth, usdc),
                seed_display(currency0, amount0, weth, usdc),
                seed_display(currency1, amount1, weth, usdc),
                tx_hash,
            ))
            .await;
    }

    /// Coin creations on the Zora factory; both coin flavors get the same
    /// alert.
    pub async fn run_zora_monitor(self: Arc<Self>) -> Result<()> {
        let filter = Filter::new()
            .address(vec![self.config.zora_factory])
            .event_signature(vec![
                IZoraFactory::CoinCreatedV4::SIGNATURE_HASH,
                IZoraFactory::CreatorCoinCreated::SIGNATURE_HASH,
            ]);

        let sub = self
            .provider
            .subscribe_logs(&filter)
            .await
            .context("Zora factory subscription failed")?;
        let mut stream = sub.into_stream();
        info!("zora monitor subscribed");

        while let Some(log) = stream.next().await {
            if !self.is_running() {
                continue;
            }
            let (name, symbol, coin) =
                if let Ok(d) = log.log_decode::<IZoraFactory::CoinCreatedV4>() {
                    let e = d.inner.data;
                    (e.name, e.symbol, e.coin)
                } else if let Ok(d) = log.log_decode::<IZoraFactory::CreatorCoinCreated>() {
                    let e = d.inner.data;
                    (e.name, e.symbol, e.coin)
                } else {
                    continue;
                };
            if !self.pair_dedup.insert(format!("{coin:?}")).await {
                continue;
            }
            info!(%coin, %name, "zora coin created");
            self.notifier
                .notify(format_zora_coin(&name, &symbol, coin))
                .await;
        }

        anyhow::bail!("Zora factory stream ended")
    }

    /// Big buys observed through the routers' path-carrying Swap events.
    pub async fn run_big_buy_monitor(self: Arc<Self>) -> Result<()> {
        let filter = Filter::new()
            .address(vec![
                self.config.uniswap_v2_router,
                self.config.aerodrome_router,
            ])
            .event_signature(IRouterEvents::Swap::SIGNATURE_HASH);

        let sub = self
            .provider
            .subscribe_logs(&filter)
            .await
            .context("router Swap subscription failed")?;
        let mut stream = sub.into_stream();
        info!("big-buy monitor subscribed");

        let threshold = eth_to_wei(self.config.big_buy_threshold_eth);

        while let Some(log) = stream.next().await {
            if !self.is_running() {
                continue;
            }
            let Ok(decoded) = log.log_decode::<IRouterEvents::Swap>() else {
                continue;
            };
            let router_name = if decoded.inner.address == self.config.aerodrome_router {
                "Aerodrome"
            } else {
                "Uniswap V2"
            };
            let event = decoded.inner.data;

            // Only ETH-in buys count.
            if event.path.first() != Some(&self.config.weth) || event.amountIn < threshold {
                continue;
            }
            let Some(&bought) = event.path.last() else {
                continue;
            };
            let Some(tx_hash) = log.transaction_hash else {
                continue;
            };
            if !self.big_buy_dedup.insert(format!("{tx_hash:?}")).await {
                continue;
            }

            let Some(info) = fetch_token_info(&self.provider, bought).await else {
                continue;
            };
            if self
                .state
                .is_blacklisted_any(&[format!("{bought:?}").as_str(), info.symbol.as_str()])
                .await
            {
                continue;
            }
            let amount_eth = wei_to_eth(event.amountIn);
            info!(token = %bought, amount_eth, "big buy detected");
            self.notifier
                .notify(format_big_buy(
                    &info,
                    event.sender,
                    amount_eth,
                    router_name,
                    tx_hash,
                ))
                .await;
        }

        anyhow::bail!("router Swap stream ended")
    }

    /// Native-value transfers touching watched wallets, found by scanning
    /// full blocks.
    pub async fn run_wallet_monitor(self: Arc<Self>) -> Result<()> {
        let sub = self
            .provider
            .subscribe_blocks()
            .await
            .context("block subscription failed")?;
        let mut stream = sub.into_stream();
        info!("wallet monitor subscribed");

        while let Some(header) = stream.next().await {
            if !self.is_running() {
                continue;
            }
            let watched = self.state.watched_wallets().await;
            if watched.is_empty() {
                continue;
            }

            let block_number = header.number;
            let Ok(Some(block)) = self
                .provider
                .get_block_by_number(block_number.into(), BlockTransactionsKind::Full)
                .await
            else {
                continue;
            };
            let Some(txs) = block.transactions.as_transactions() else {
                continue;
            };

            for tx in txs {
                if tx.value().is_zero() {
                    continue;
                }
                let to = tx.to();
                let hit = watched
                    .iter()
                    .copied()
                    .find(|w| *w == tx.from || Some(*w) == to);
                let Some(wallet) = hit else {
                    continue;
                };
                let tx_hash = *tx.inner.tx_hash();
                let gas_used = self
                    .provider
                    .get_transaction_receipt(tx_hash)
                    .await
                    .ok()
                    .flatten()
                    .map(|r| r.gas_used as u128);
                info!(%wallet, %tx_hash, block = block_number, "watched wallet activity");
                self.notifier
                    .notify(format_wallet_activity(
                        wallet,
                        tx.from,
                        to,
                        wei_to_eth(tx.value()),
                        gas_used,
                        tx_hash,
                    ))
                    .await;
            }
        }

        anyhow::bail!("block stream ended")
    }

    /// Telegram command loop. Runs until the process exits.
    pub async fn run_command_loop(self: Arc<Self>) -> Result<()> {
        let mut poller = CommandPoller::new(&self.client)?;
        info!("command loop polling");

        loop {
            let texts = match poller.next_batch().await {
                Ok(texts) => texts,
                Err(e) => {
                    warn!(?e, "getUpdates failed, backing off");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };
            for message in texts {
                match message {
                    Inbound::Authorized(text) => {
                        let reply = match parse_command(&text) {
                            Ok(command) => self.dispatch(command).await,
                            Err(usage) => usage,
                        };
                        if let Err(e) = self.client.send_message(&reply).await {
                            error!(?e, "command reply failed");
                        }
                    }
                    Inbound::Unauthorized { chat_id } => {
                        let _ = self
                            .client
                            .send_message_to(&chat_id.to_string(), "unauthorized")
                            .await;
                    }
                }
            }
        }
    }

    async fn dispatch(&self, command: Command) -> String {
        match command {
            Command::Start => {
                self.running.store(true, Ordering::Relaxed);
                "▶️ Monitoring resumed".to_string()
            }
            Command::Stop => {
                self.running.store(false, Ordering::Relaxed);
                "⏸ Monitoring paused".to_string()
            }
            Command::Status => self.status_text().await,
            Command::Help => HELP_TEXT.to_string(),
            Command::Buy { token, eth_amount } => self.handle_buy(token, eth_amount).await,
            Command::Sell {
                token,
                amount,
                slippage_percent,
            } => self.handle_sell(token, amount, slippage_percent).await,
            Command::TokenBalance { token } => self.handle_token_balance(token).await,
            Command::WatchAdd(wallet) => match self.state.watch_wallet(wallet).await {
                Ok(true) => format!("👀 Watching `{wallet:?}`"),
                Ok(false) => "Already watching that wallet".to_string(),
                Err(e) => format!("State write failed: {e:#}"),
            },
            Command::WatchRemove(wallet) => match self.state.unwatch_wallet(wallet).await {
                Ok(true) => format!("Stopped watching `{wallet:?}`"),
                Ok(false) => "That wallet was not watched".to_string(),
                Err(e) => format!("State write failed: {e:#}"),
            },
            Command::WatchList => {
                let wallets = self.state.watched_wallets().await;
                if wallets.is_empty() {
                    "No watched wallets".to_string()
                } else {
                    wallets
                        .iter()
                        .map(|w| format!("`{w:?}`"))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            Command::BlacklistAdd(token) => match self.state.blacklist_token(&token).await {
                Ok(true) => format!("🚫 Blacklisted `{token}`"),
                Ok(false) => "Already blacklisted".to_string(),
                Err(e) => format!("State write failed: {e:#}"),
            },
            Command::BlacklistRemove(token) => {
                match self.state.unblacklist_token(&token).await {
                    Ok(true) => format!("Removed `{token}` from the blacklist"),
                    Ok(false) => "That token was not blacklisted".to_string(),
                    Err(e) => format!("State write failed: {e:#}"),
                }
            }
            Command::BlacklistList => {
                let tokens = self.state.blacklist().await;
                if tokens.is_empty() {
                    "Blacklist is empty".to_string()
                } else {
                    tokens
                        .iter()
                        .map(|t| format!("`{t}`"))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
        }
    }

    async fn status_text(&self) -> String {
        let uptime = self.started_at.elapsed();
        let hours = uptime.as_secs() / 3600;
        let minutes = (uptime.as_secs() % 3600) / 60;
        format!(
            "📊 *Status*\n\
             Monitoring: {}\n\
             Uptime: {hours}h {minutes}m\n\
             Liquidity band: {} - {} ETH\n\
             Big-buy threshold: {} ETH\n\
             Auto-swap: {}\n\
             Trading: {}\n\
             Watched wallets: {}\n\
             Blacklisted tokens: {}",
            if self.is_running() { "active" } else { "paused" },
            self.config.min_liquidity_eth,
            self.config.max_liquidity_eth,
            self.config.big_buy_threshold_eth,
            if self.config.auto_swap_enabled { "on" } else { "off" },
            if self.trading.is_some() { "armed" } else { "disabled" },
            self.state.watched_wallets().await.len(),
            self.state.blacklist().await.len(),
        )
    }

    async fn handle_buy(&self, token: Address, eth_amount: f64) -> String {
        let Some(trading) = &self.trading else {
            return "Trading disabled: WALLET_PRIVATE_KEY not configured".to_string();
        };
        let amount_in = eth_to_wei(eth_amount);

        // Direct router fallback first; multi-hop routing covers tokens
        // with no direct WETH pool.
        match trading.executor.buy_token(token, amount_in).await {
            Ok(result) => {
                let balance =
                    fetch_wallet_token_info(&self.provider, token, trading.executor.wallet())
                        .await
                        .map(|w| w.balance)
                        .unwrap_or(U256::ZERO);
                match fetch_token_info(&self.provider, token).await {
                    Some(info) => format_swap_result("Buy", &info, &result, balance),
                    None => format!("✅ Buy sent: {:?}", result.tx_hash),
                }
            }
            Err(direct_err) => {
                warn!(%token, ?direct_err, "direct buy failed, trying multi-hop");
                match trading
                    .multihop
                    .smart_buy(
                        trading.quoter.as_ref(),
                        token,
                        amount_in,
                        &self.config.multihop_bases,
                    )
                    .await
                {
                    Ok((tx_hash, quote)) => format!(
                        "✅ Multi-hop buy confirmed ({} hops)\n[tx](https://basescan.org/tx/{tx_hash:?})",
                        quote.path.len() - 1
                    ),
                    Err(e) => format!("❌ Buy failed: {direct_err:#}; multi-hop: {e:#}"),
                }
            }
        }
    }

    async fn handle_sell(
        &self,
        token: Address,
        amount: SellAmount,
        slippage_percent: Option<u8>,
    ) -> String {
        let Some(trading) = &self.trading else {
            return "Trading disabled: WALLET_PRIVATE_KEY not configured".to_string();
        };

        let Some(wallet_info) =
            fetch_wallet_token_info(&self.provider, token, trading.executor.wallet()).await
        else {
            return format!("`{token:?}` does not look like a token contract");
        };

        let amount_in = match amount {
            SellAmount::Max => wallet_info.balance,
            SellAmount::Exact(raw) => {
                match parse_units(&raw, wallet_info.info.decimals) {
                    Ok(v) => v,
                    Err(e) => return format!("Invalid amount: {e:#}"),
                }
            }
        };
        if amount_in.is_zero() {
            return "Nothing to sell".to_string();
        }
        if amount_in > wallet_info.balance {
            return "Amount exceeds wallet balance".to_string();
        }

        match trading
            .executor
            .sell_token(token, amount_in, slippage_percent)
            .await
        {
            Ok(result) => {
                let balance =
                    fetch_wallet_token_info(&self.provider, token, trading.executor.wallet())
                        .await
                        .map(|w| w.balance)
                        .unwrap_or(U256::ZERO);
                format_swap_result("Sell", &wallet_info.info, &result, balance)
            }
            Err(e) => format!("❌ Sell failed: {e:#}"),
        }
    }

    async fn handle_token_balance(&self, token: Address) -> String {
        let owner = match &self.trading {
            Some(trading) => trading.executor.wallet(),
            None => return "Trading disabled: WALLET_PRIVATE_KEY not configured".to_string(),
        };
        match fetch_wallet_token_info(&self.provider, token, owner).await {
            Some(w) => format!(
                "{} ({}): {}",
                w.info.name,
                w.info.symbol,
                format_units(w.balance, w.info.decimals)
            ),
            None => format!("`{token:?}` does not look like a token contract"),
        }
    }
}
