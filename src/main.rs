use alloy::{
    network::EthereumWallet,
    providers::{Provider, ProviderBuilder, WsConnect},
    signers::local::PrivateKeySigner,
    transports::Transport,
};
use anyhow::{Context, Result};
use dotenv::dotenv;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use base_sniper::config::Config;
use base_sniper::monitor::{MonitorSession, Trading};
use base_sniper::multihop::MultiHopExecutor;
use base_sniper::state::StateStore;
use base_sniper::swap::{LiveVenue, SwapExecutor, SwapVenue};
use base_sniper::telegram::{format_startup, Notifier, TelegramClient};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_ansi(true),
        )
        .init();

    let config = Config::from_env()?;
    let state = Arc::new(StateStore::load(&config.state_path));
    let client = TelegramClient::new(
        config.telegram_bot_token.clone(),
        config.telegram_chat_id.clone(),
    );
    let notifier = Notifier::spawn(client.clone());

    info!("🔌 Connecting to WebSocket...");
    let ws_connect = WsConnect::new(config.ws_url.clone());

    match config.wallet_private_key.clone() {
        Some(key) => {
            let signer =
                PrivateKeySigner::from_str(&key).context("invalid WALLET_PRIVATE_KEY")?;
            let wallet_address = signer.address();
            let wallet = EthereumWallet::from(signer);
            let provider = ProviderBuilder::new()
                .with_recommended_fillers()
                .wallet(wallet)
                .on_ws(ws_connect)
                .await?;
            info!(wallet = %wallet_address, "connected, trading armed");

            // Aerodrome first; Uniswap V2 is the fallback venue.
            let venues: Vec<Arc<dyn SwapVenue>> = vec![
                Arc::new(LiveVenue::new(
                    "Aerodrome",
                    config.aerodrome_router,
                    config.aerodrome_factory,
                    provider.clone(),
                )),
                Arc::new(LiveVenue::new(
                    "Uniswap V2",
                    config.uniswap_v2_router,
                    config.uniswap_v2_factory,
                    provider.clone(),
                )),
            ];
            let quoter = venues[0].clone();
            let executor = SwapExecutor::new(venues, config.weth, wallet_address);
            let multihop = MultiHopExecutor::new(
                provider.clone(),
                config.universal_router,
                config.uniswap_v2_router,
                config.weth,
                wallet_address,
            );
            let trading = Some(Trading {
                executor,
                multihop,
                quoter,
            });
            run(provider, config, state, notifier, client, trading).await
        }
        None => {
            let provider = ProviderBuilder::new()
                .with_recommended_fillers()
                .on_ws(ws_connect)
                .await?;
            info!("connected, monitor-only mode (no wallet key)");
            run(provider, config, state, notifier, client, None).await
        }
    }
}

async fn run<T, P>(
    provider: P,
    config: Config,
    state: Arc<StateStore>,
    notifier: Notifier,
    client: TelegramClient,
    trading: Option<Trading<T, P>>,
) -> Result<()>
where
    T: Transport + Clone,
    P: Provider<T> + Clone + 'static,
{
    notifier
        .notify(format_startup(
            config.min_liquidity_eth,
            config.max_liquidity_eth,
            config.auto_swap_enabled,
        ))
        .await;

    let session = MonitorSession::new(provider, config, state, notifier, client, trading);

    let pair_monitor = tokio::spawn(session.clone().run_pair_monitor());
    let v3_monitor = tokio::spawn(session.clone().run_v3_monitor());
    let v4_monitor = tokio::spawn(session.clone().run_v4_monitor());
    let zora_monitor = tokio::spawn(session.clone().run_zora_monitor());
    let big_buy_monitor = tokio::spawn(session.clone().run_big_buy_monitor());
    let wallet_monitor = tokio::spawn(session.clone().run_wallet_monitor());
    let command_loop = tokio::spawn(session.run_command_loop());

    // Any monitor ending means the WS connection is gone; exit and let the
    // supervisor restart the process.
    tokio::select! {
        r = pair_monitor => error!(?r, "pair monitor ended"),
        r = v3_monitor => error!(?r, "v3 monitor ended"),
        r = v4_monitor => error!(?r, "v4 monitor ended"),
        r = zora_monitor => error!(?r, "zora monitor ended"),
        r = big_buy_monitor => error!(?r, "big-buy monitor ended"),
        r = wallet_monitor => error!(?r, "wallet monitor ended"),
        r = command_loop => error!(?r, "command loop ended"),
    }

    anyhow::bail!("a monitor task exited")
}
