//! API token discovery.
//!
//! The token is looked up on every outbound call so that a rotated value in
//! the environment is picked up without a restart.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Environment variables checked for the token, first match wins.
pub const TOKEN_ENV_VARS: [&str; 7] = [
    "MARKETING_MINER_API_TOKEN",
    "MARKETING_MINER_API_KEY",
    "MARKETING_MINER_TOKEN",
    "MM_API_TOKEN",
    "MM_API_KEY",
    "API_TOKEN",
    "API_KEY",
];

/// Environment variables that may hold a JSON session config carrying the token.
pub const SESSION_CONFIG_ENV_VARS: [&str; 3] = [
    "SMITHERY_SESSION_CONFIG",
    "SMITHERY_CONFIG",
    "MCP_SESSION_CONFIG",
];

/// Deepest nesting level searched inside a session config.
const MAX_CONFIG_DEPTH: usize = 64;

/// Bare strings at least this long are taken as a token during descent.
const MIN_BARE_TOKEN_LEN: usize = 11;

type Lookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Resolves the Marketing Miner API token from environment-like sources.
#[derive(Clone)]
pub struct TokenResolver {
    lookup: Arc<Lookup>,
}

impl TokenResolver {
    /// Resolver backed by the process environment
    pub fn from_env() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    /// Resolver backed by an arbitrary variable lookup
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Arc::new(lookup),
        }
    }

    /// Find the token, or `None` when no source yields one.
    pub fn resolve(&self) -> Option<String> {
        for name in TOKEN_ENV_VARS {
            if let Some(value) = (self.lookup)(name) {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    tracing::debug!(source = name, "Resolved API token");
                    return Some(trimmed.to_string());
                }
            }
        }

        for name in SESSION_CONFIG_ENV_VARS {
            let Some(raw) = (self.lookup)(name) else {
                continue;
            };
            let config: Value = match serde_json::from_str(&raw) {
                Ok(config) => config,
                Err(e) => {
                    tracing::debug!(source = name, error = %e, "Ignoring unparsable session config");
                    continue;
                }
            };
            if let Some(token) = find_token_in_config(&config, 0) {
                tracing::debug!(source = name, "Resolved API token from session config");
                return Some(token);
            }
        }

        None
    }
}

impl Default for TokenResolver {
    fn default() -> Self {
        Self::from_env()
    }
}

impl fmt::Debug for TokenResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResolver").finish_non_exhaustive()
    }
}

fn is_token_key(key: &str) -> bool {
    let key = key.to_lowercase();
    key.contains("token") || key.contains("key")
}

/// Depth-first search for something that looks like a token.
fn find_token_in_config(value: &Value, depth: usize) -> Option<String> {
    if depth > MAX_CONFIG_DEPTH {
        return None;
    }

    match value {
        Value::String(s) if s.chars().count() >= MIN_BARE_TOKEN_LEN => Some(s.clone()),
        Value::Object(map) => map.iter().find_map(|(key, value)| match value {
            Value::String(s) if !s.is_empty() && is_token_key(key) => Some(s.clone()),
            _ => find_token_in_config(value, depth + 1),
        }),
        Value::Array(items) => items
            .iter()
            .find_map(|item| find_token_in_config(item, depth + 1)),
        _ => None,
    }
}
