// Core types and upstream access for the Marketing Miner keyword API

pub mod client;
pub mod error;
pub mod token;
pub mod types;

pub use client::{ClientConfig, MarketingMinerClient, SuggestionsQuery, DEFAULT_API_BASE};
pub use error::{MinerError, MinerResult};
pub use token::TokenResolver;
pub use types::*;
