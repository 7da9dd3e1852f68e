pub mod abi;
pub mod commands;
pub mod config;
pub mod etherscan;
pub mod monitor;
pub mod multihop;
pub mod pair;
pub mod state;
pub mod swap;
pub mod telegram;
pub mod token;
pub mod units;
