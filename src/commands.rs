//! Operator command interface over Telegram getUpdates long-polling.
//!
//! Parsing is pure and separated from polling so the grammar is testable
//! without a network. Only messages from the configured chat are acted on.

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::telegram::TelegramClient;

const POLL_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SellAmount {
    /// Decimal amount string, parsed later against the token's decimals.
    Exact(String),
    /// Entire wallet balance.
    Max,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Stop,
    Status,
    Help,
    Buy { token: Address, eth_amount: f64 },
    Sell {
        token: Address,
        amount: SellAmount,
        slippage_percent: Option<u8>,
    },
    TokenBalance { token: Address },
    WatchAdd(Address),
    WatchRemove(Address),
    WatchList,
    BlacklistAdd(String),
    BlacklistRemove(String),
    BlacklistList,
}

pub const HELP_TEXT: &str = "Commands:\n\
/start - resume monitoring\n\
/stop - pause monitoring\n\
/status - current settings and uptime\n\
/buy <token> <eth> - buy a token with ETH\n\
/sell <token> <amount|max> [slippage%] - sell a token for ETH\n\
/tokenbalance <token> - wallet balance of a token\n\
/watch add|remove <wallet> - manage watched wallets\n\
/watch list - show watched wallets\n\
/blacklist add|remove <token> - manage the token blacklist\n\
/blacklist list - show the blacklist\n\
/help - this message";

/// Parse a raw message into a command. The error string is shown to the
/// operator verbatim.
pub fn parse_command(text: &str) -> std::result::Result<Command, String> {
    let mut words = text.trim().split_whitespace();
    let head = words.next().ok_or("empty message")?;
    // "/cmd@BotName" arrives in group chats.
    let head = head.split('@').next().unwrap_or(head);

    match head {
        "/start" => Ok(Command::Start),
        "/stop" => Ok(Command::Stop),
        "/status" => Ok(Command::Status),
        "/help" => Ok(Command::Help),
        "/buy" => {
            let token = parse_address(words.next().ok_or("usage: /buy <token> <eth>")?)?;
            let eth_amount: f64 = words
                .next()
                .ok_or("usage: /buy <token> <eth>")?
                .parse()
                .map_err(|_| "invalid ETH amount".to_string())?;
            if eth_amount <= 0.0 {
                return Err("ETH amount must be positive".to_string());
            }
            Ok(Command::Buy { token, eth_amount })
        }
        "/sell" => {
            let usage = "usage: /sell <token> <amount|max> [slippage%]";
            let token = parse_address(words.next().ok_or(usage)?)?;
            let raw = words.next().ok_or(usage)?;
            let amount = if raw.eq_ignore_ascii_case("max") {
                SellAmount::Max
            } else {
                if raw.parse::<f64>().map(|v| v <= 0.0).unwrap_or(true) {
                    return Err("invalid sell amount".to_string());
                }
                SellAmount::Exact(raw.to_string())
            };
            let slippage_percent = match words.next() {
                Some(raw) => Some(
                    raw.trim_end_matches('%')
                        .parse::<u8>()
                        .ok()
                        .filter(|s| (1..=99).contains(s))
                        .ok_or("slippage must be 1-99 percent")?,
                ),
                None => None,
            };
            Ok(Command::Sell {
                token,
                amount,
                slippage_percent,
            })
        }
        "/tokenbalance" => {
            let token = parse_address(words.next().ok_or("usage: /tokenbalance <token>")?)?;
            Ok(Command::TokenBalance { token })
        }
        "/watch" => match words.next() {
            Some("add") => Ok(Command::WatchAdd(parse_address(
                words.next().ok_or("usage: /watch add <wallet>")?,
            )?)),
            Some("remove") => Ok(Command::WatchRemove(parse_address(
                words.next().ok_or("usage: /watch remove <wallet>")?,
            )?)),
            Some("list") | None => Ok(Command::WatchList),
            Some(other) => Err(format!("unknown /watch action '{other}'")),
        },
        "/blacklist" => match words.next() {
            // Entries can be an address or a bare symbol.
            Some("add") => {
                let token = words.next().ok_or("usage: /blacklist add <token|symbol>")?;
                Ok(Command::BlacklistAdd(token.to_string()))
            }
            Some("remove") => {
                let token = words.next().ok_or("usage: /blacklist remove <token>")?;
                Ok(Command::BlacklistRemove(token.to_string()))
            }
            Some("list") | None => Ok(Command::BlacklistList),
            Some(other) => Err(format!("unknown /blacklist action '{other}'")),
        },
        other => Err(format!("unknown command '{other}', try /help")),
    }
}

fn parse_address(raw: &str) -> std::result::Result<Address, String> {
    Address::from_str(raw).map_err(|_| format!("'{raw}' is not a valid address"))
}

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

/// One received message, tagged with whether it came from the configured
/// chat. Unauthorized senders get a refusal instead of silence.
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
    Authorized(String),
    Unauthorized { chat_id: i64 },
}

/// Long-polls getUpdates and yields message texts from the authorized chat.
pub struct CommandPoller {
    http: reqwest::Client,
    bot_token: String,
    authorized_chat_id: i64,
    offset: i64,
}

impl CommandPoller {
    pub fn new(client: &TelegramClient) -> Result<Self> {
        let authorized_chat_id = client
            .chat_id()
            .parse()
            .context("TELEGRAM_CHAT_ID must be a numeric chat id")?;
        Ok(Self {
            http: reqwest::Client::new(),
            bot_token: client.bot_token().to_string(),
            authorized_chat_id,
            offset: 0,
        })
    }

    /// One long-poll round. Unauthorized updates are still acknowledged so
    /// they don't replay.
    pub async fn next_batch(&mut self) -> Result<Vec<Inbound>> {
        let url = format!("https://api.telegram.org/bot{}/getUpdates", self.bot_token);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("offset", self.offset.to_string()),
                ("timeout", POLL_TIMEOUT_SECS.to_string()),
            ])
            .timeout(std::time::Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .send()
            .await
            .context("getUpdates request failed")?
            .json::<UpdatesResponse>()
            .await
            .context("getUpdates response unreadable")?;

        if !response.ok {
            anyhow::bail!("getUpdates returned ok=false");
        }

        let mut inbound = Vec::new();
        for update in response.result {
            self.offset = self.offset.max(update.update_id + 1);
            let Some(message) = update.message else {
                continue;
            };
            if message.chat.id != self.authorized_chat_id {
                warn!(chat_id = message.chat.id, "message from unauthorized chat");
                inbound.push(Inbound::Unauthorized {
                    chat_id: message.chat.id,
                });
                continue;
            }
            if let Some(text) = message.text {
                debug!(%text, "command received");
                inbound.push(Inbound::Authorized(text));
            }
        }
        Ok(inbound)
    }
}
