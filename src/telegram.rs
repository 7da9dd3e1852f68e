//! Telegram delivery: a thin sendMessage client plus a queued notifier so
//! monitor tasks never block on the Telegram API.

use alloy::primitives::{Address, TxHash, B256, U256};
use anyhow::{Context, Result};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::pair::{non_weth_token, PairInfo};
use crate::swap::SwapResult;
use crate::token::TokenInfo;
use crate::units::format_units;

/// Telegram rejects messages over 4096 characters.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

const NOTIFY_QUEUE_DEPTH: usize = 256;

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramClient {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token,
            chat_id,
        }
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn bot_token(&self) -> &str {
        &self.bot_token
    }

    pub async fn send_message(&self, text: &str) -> Result<()> {
        self.send_message_to(&self.chat_id, text).await
    }

    pub async fn send_message_to(&self, chat_id: &str, text: &str) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let body = json!({
            "chat_id": chat_id,
            "text": truncate_message(text),
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("telegram sendMessage request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("telegram sendMessage returned {status}: {detail}");
        }
        Ok(())
    }
}

/// Bounded queue in front of the client; a dedicated worker drains it so a
/// slow or failing Telegram API never stalls event processing.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<String>,
}

impl Notifier {
    pub fn spawn(client: TelegramClient) -> Self {
        let (tx, mut rx) = mpsc::channel::<String>(NOTIFY_QUEUE_DEPTH);
        tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                if let Err(e) = client.send_message(&text).await {
                    error!(?e, "telegram delivery failed");
                }
            }
        });
        Self { tx }
    }

    /// Queue a message; waits for queue space, drops only when the worker
    /// has exited.
    pub async fn notify(&self, text: String) {
        if self.tx.send(text).await.is_err() {
            warn!("notifier worker gone, message dropped");
        }
    }
}

fn truncate_message(text: &str) -> String {
    if text.chars().count() <= TELEGRAM_MESSAGE_LIMIT {
        return text.to_string();
    }
    let truncated: String = text.chars().take(TELEGRAM_MESSAGE_LIMIT - 3).collect();
    format!("{truncated}...")
}

fn basescan_token(address: Address) -> String {
    format!("https://basescan.org/token/{address:?}")
}

fn basescan_tx(tx_hash: TxHash) -> String {
    format!("https://basescan.org/tx/{tx_hash:?}")
}

fn verification_label(verified: Option<bool>) -> &'static str {
    match verified {
        Some(true) => "verified",
        Some(false) => "NOT verified",
        None => "unknown",
    }
}

/// New-pair alert in Markdown. Links point at Basescan; previews are
/// disabled at send time so long pages don't bloat the chat.
pub fn format_pair_alert(pair: &PairInfo, weth: Address, dex: &str) -> String {
    let token = non_weth_token(pair, weth);
    let verified = if pair.token0.address == weth {
        pair.token1_verified
    } else {
        pair.token0_verified
    };
    format!(
        "🆕 *New pair on {dex}*\n\
         Token: [{name} ({symbol})]({token_url})\n\
         Pair: `{pair_addr:?}`\n\
         Liquidity: {liq:.4} ETH\n\
         Supply: {supply}\n\
         Source: {verified}",
        dex = dex,
        name = token.name,
        symbol = token.symbol,
        token_url = basescan_token(token.address),
        pair_addr = pair.pair_address,
        liq = pair.liquidity_eth,
        supply = format_units(token.total_supply, token.decimals),
        verified = verification_label(verified),
    )
}

pub fn format_big_buy(
    token: &TokenInfo,
    buyer: Address,
    amount_in_eth: f64,
    router_name: &str,
    tx_hash: TxHash,
) -> String {
    format!(
        "🐋 *Big buy detected*\n\
         Token: [{name} ({symbol})]({token_url})\n\
         Buyer: `{buyer:?}`\n\
         Size: {amount:.4} ETH\n\
         Router: {router_name}\n\
         [tx]({tx_url})",
        name = token.name,
        symbol = token.symbol,
        token_url = basescan_token(token.address),
        buyer = buyer,
        amount = amount_in_eth,
        router_name = router_name,
        tx_url = basescan_tx(tx_hash),
    )
}

/// Swap confirmation. The balance is fetched fresh after the swap rather
/// than inferred from the quote, since fee-on-transfer sends deliver less.
pub fn format_swap_result(
    action: &str,
    token: &TokenInfo,
    result: &SwapResult,
    new_balance: U256,
) -> String {
    let mode = if result.fee_tolerant {
        " (fee-tolerant)"
    } else {
        ""
    };
    format!(
        "✅ *{action} executed on {venue}{mode}*\n\
         Token: [{name} ({symbol})]({token_url})\n\
         Quoted out: {quoted}\n\
         New balance: {balance} {symbol}\n\
         [tx]({tx_url})",
        action = action,
        venue = result.venue,
        mode = mode,
        name = token.name,
        symbol = token.symbol,
        token_url = basescan_token(token.address),
        quoted = format_units(result.amount_out_quoted, token.decimals),
        balance = format_units(new_balance, token.decimals),
        tx_url = basescan_tx(result.tx_hash),
    )
}

/// V4 liquidity-add alert. Only sides denominated in WETH or USDC carry an
/// amount; the other side is shown by label alone.
pub fn format_v4_liquidity(
    pool_id: B256,
    owner: Address,
    label0: &str,
    label1: &str,
    amount0: Option<f64>,
    amount1: Option<f64>,
    tx_hash: TxHash,
) -> String {
    let mut message = format!(
        "🟣 *Uniswap V4 liquidity added*\n\
         Pool ID: `{pool_id:?}`\n\
         Owner: `{owner:?}`\n\
         Currency0: {label0}\n\
         Currency1: {label1}\n",
    );
    if let Some(amount) = amount0 {
        message.push_str(&format!("Amount0: {amount:.4} {label0}\n"));
    }
    if let Some(amount) = amount1 {
        message.push_str(&format!("Amount1: {amount:.4} {label1}\n"));
    }
    message.push_str(&format!("[tx]({})", basescan_tx(tx_hash)));
    message
}

pub fn format_zora_coin(name: &str, symbol: &str, coin: Address) -> String {
    format!(
        "🆕 *New coin created on Zora*\n\
         [{name} ({symbol})]({url})",
        name = name,
        symbol = symbol,
        url = basescan_token(coin),
    )
}

pub fn format_wallet_activity(
    watched: Address,
    from: Address,
    to: Option<Address>,
    value_eth: f64,
    gas_used: Option<u128>,
    tx_hash: TxHash,
) -> String {
    let direction = if from == watched { "sent" } else { "received" };
    let counterparty = match to {
        Some(to) if from == watched => format!("to `{to:?}`"),
        _ => format!("from `{from:?}`"),
    };
    let gas = match gas_used {
        Some(gas) => format!("\nGas used: {gas}"),
        None => String::new(),
    };
    format!(
        "👀 *Watched wallet activity*\n\
         Wallet: `{watched:?}`\n\
         {direction} {value:.4} ETH {counterparty}{gas}\n\
         [tx]({tx_url})",
        watched = watched,
        direction = direction,
        value = value_eth,
        counterparty = counterparty,
        gas = gas,
        tx_url = basescan_tx(tx_hash),
    )
}

pub fn format_startup(min_liquidity: f64, max_liquidity: f64, auto_swap: bool) -> String {
    format!(
        "🚀 *Sniper online* ({})\n\
         Liquidity band: {min_liquidity} - {max_liquidity} ETH\n\
         Auto-swap: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        if auto_swap { "on" } else { "off" },
    )
}
