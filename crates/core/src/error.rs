//! Error types for calls against the Marketing Miner API.

/// Result type for upstream operations.
pub type MinerResult<T> = Result<T, MinerError>;

/// Errors that can occur while talking to the Marketing Miner API.
///
/// The `Display` strings are user-facing: tools hand them back to the
/// calling agent verbatim.
#[derive(Debug, thiserror::Error)]
pub enum MinerError {
    /// No API token could be found in the environment.
    #[error("Error: Marketing Miner API token is not set. Please set it in the configuration.")]
    CredentialMissing,

    /// Network failure, timeout or undecodable body.
    #[error("Error calling Marketing Miner API: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-success HTTP status.
    #[error("Error calling Marketing Miner API: status {status}: {body}")]
    Status { status: u16, body: String },

    /// Invalid base URL or endpoint path.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
