use alloy::primitives::Address;
use anyhow::{Context, Result};
use std::{env, str::FromStr};
use url::Url;

// Base mainnet defaults; every one of these can be overridden from .env.
const DEFAULT_WETH: &str = "0x4200000000000000000000000000000000000006";
const DEFAULT_USDC: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";
const DEFAULT_USDBC: &str = "0xd9aAEc86B65D86f6A7B5B1b0c42FFA531710b6CA";
const DEFAULT_DAI: &str = "0x50c5725949A6F0c72E6C4a641F24049A917DB0Cb";
const DEFAULT_CBETH: &str = "0x2Ae3F1Ec7F1F5012CFEab0185bfc7aa3cf0DEc22";
const DEFAULT_UNISWAP_V2_FACTORY: &str = "0x8909Dc15e40173Ff4699343b6eB8132c65e18eC6";
const DEFAULT_UNISWAP_V2_ROUTER: &str = "0x4752ba5DBc23f44D87826276BF6Fd6b1C372aD24";
const DEFAULT_UNISWAP_V3_FACTORY: &str = "0x33128a8fC17869897dcE68Ed026d694621f6FDfD";
const DEFAULT_AERODROME_FACTORY: &str = "0x420DD381b31aEf6683db6B902084cB0FFECe40Da";
const DEFAULT_AERODROME_ROUTER: &str = "0xcF77a3Ba9A5CA399B7c97c74d54e5b1Beb874E43";
const DEFAULT_UNIVERSAL_ROUTER: &str = "0x3fC91A3afd70395Cd496C647d5a6CC9D4B2b7FAD";
const DEFAULT_UNISWAP_V4_POOL_MANAGER: &str = "0x498581fF718922c3f8e6A244956aF099B2652b2b";
const DEFAULT_ZORA_FACTORY: &str = "0x777777751622c0d3258f214F9DF38E35BF45baF3";
const DEFAULT_ETHERSCAN_API: &str = "https://api.etherscan.io/v2/api";

#[derive(Debug, Clone)]
pub struct Config {
    pub ws_url: String,

    pub telegram_bot_token: String,
    pub telegram_chat_id: String,

    pub weth: Address,
    pub usdc: Address,
    pub multihop_bases: Vec<Address>,

    pub uniswap_v2_factory: Address,
    pub uniswap_v2_router: Address,
    pub uniswap_v3_factory: Address,
    pub aerodrome_factory: Address,
    pub aerodrome_router: Address,
    pub universal_router: Address,
    pub uniswap_v4_pool_manager: Address,
    pub zora_factory: Address,

    pub min_liquidity_eth: f64,
    pub max_liquidity_eth: f64,
    pub big_buy_threshold_eth: f64,
    /// Ceiling on the non-WETH token's circulating supply; `None` disables
    /// the secondary supply filter.
    pub max_supply_threshold: Option<f64>,

    pub block_confirmation_count: u64,
    pub retry_delay_ms: u64,
    /// Record a pair in the dedup set before (true) or after (false) the
    /// confirmation delay. Before is the safe default.
    pub dedup_before_confirm: bool,

    pub auto_swap_enabled: bool,
    pub auto_swap_buy_amount_eth: f64,

    pub wallet_private_key: Option<String>,

    pub etherscan_api: String,
    pub etherscan_api_key: Option<String>,
    pub chain_id: u64,

    pub state_path: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let ws_url = env::var("BASE_WS_URL").context("BASE_WS_URL missing from environment")?;
        let parsed = Url::parse(&ws_url).context("BASE_WS_URL is not a valid URL")?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            anyhow::bail!("BASE_WS_URL must use ws:// or wss://, got {}", parsed.scheme());
        }

        let telegram_bot_token =
            env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN missing from environment")?;
        let telegram_chat_id =
            env::var("TELEGRAM_CHAT_ID").context("TELEGRAM_CHAT_ID missing from environment")?;

        let weth = env_address("WETH_ADDRESS", DEFAULT_WETH)?;
        let usdc = env_address("USDC_ADDRESS", DEFAULT_USDC)?;
        let multihop_bases = vec![
            weth,
            usdc,
            env_address("USDBC_ADDRESS", DEFAULT_USDBC)?,
            env_address("DAI_ADDRESS", DEFAULT_DAI)?,
            env_address("CBETH_ADDRESS", DEFAULT_CBETH)?,
        ];

        let supply_filter_enabled = env_flag("SUPPLY_FILTER_ENABLED", false);
        let max_supply_threshold = if supply_filter_enabled {
            Some(env_f64("MAX_SUPPLY_THRESHOLD", 1_000_000_000.0))
        } else {
            None
        };

        Ok(Self {
            ws_url,
            telegram_bot_token,
            telegram_chat_id,
            weth,
            usdc,
            multihop_bases,
            uniswap_v2_factory: env_address("UNISWAP_V2_FACTORY", DEFAULT_UNISWAP_V2_FACTORY)?,
            uniswap_v2_router: env_address("UNISWAP_V2_ROUTER", DEFAULT_UNISWAP_V2_ROUTER)?,
            uniswap_v3_factory: env_address("UNISWAP_V3_FACTORY", DEFAULT_UNISWAP_V3_FACTORY)?,
            aerodrome_factory: env_address("AERODROME_FACTORY", DEFAULT_AERODROME_FACTORY)?,
            aerodrome_router: env_address("AERODROME_ROUTER", DEFAULT_AERODROME_ROUTER)?,
            universal_router: env_address("UNIVERSAL_ROUTER", DEFAULT_UNIVERSAL_ROUTER)?,
            uniswap_v4_pool_manager: env_address(
                "UNISWAP_V4_POOL_MANAGER",
                DEFAULT_UNISWAP_V4_POOL_MANAGER,
            )?,
            zora_factory: env_address("ZORA_FACTORY", DEFAULT_ZORA_FACTORY)?,
            min_liquidity_eth: env_f64("MIN_LIQUIDITY_ETH", 0.1),
            max_liquidity_eth: env_f64("MAX_LIQUIDITY_ETH", 10.0),
            big_buy_threshold_eth: env_f64("BIG_BUY_THRESHOLD", 1.0),
            max_supply_threshold,
            block_confirmation_count: env_u64("BLOCK_CONFIRMATION_COUNT", 3),
            retry_delay_ms: env_u64("RETRY_DELAY_MS", 1000),
            dedup_before_confirm: env_flag("DEDUP_BEFORE_CONFIRM", true),
            auto_swap_enabled: env_flag("AUTO_SWAP_ENABLED", false),
            auto_swap_buy_amount_eth: env_f64("AUTO_SWAP_BUY_AMOUNT", 0.01),
            wallet_private_key: env::var("WALLET_PRIVATE_KEY").ok().filter(|k| !k.is_empty()),
            etherscan_api: env::var("ETHER_SCAN_API")
                .unwrap_or_else(|_| DEFAULT_ETHERSCAN_API.to_string()),
            etherscan_api_key: env::var("ETHER_SCAN_API_KEY").ok().filter(|k| !k.is_empty()),
            chain_id: env_u64("BASE_CHAIN_ID", 8453),
            state_path: env::var("STATE_PATH").unwrap_or_else(|_| "state.json".to_string()),
        })
    }

    /// Confirmation delay applied between a PairCreated event and analysis.
    pub fn confirmation_delay_ms(&self) -> u64 {
        self.retry_delay_ms * self.block_confirmation_count
    }
}

fn env_address(key: &str, default: &str) -> Result<Address> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    Address::from_str(&raw).with_context(|| format!("invalid address in {}='{}'", key, raw))
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => v == "true" || v == "1",
        Err(_) => default,
    }
}
