//! fras-client — HTTP client for the attendance service.
//!
//! The match call is exposed through the [`MatchService`] trait so the
//! trigger loop can be driven by a fake in tests. Registration and history
//! are plain methods on [`HttpClient`].

mod error;
mod http;
pub mod wallet;
pub mod wire;

pub use error::ClientError;
pub use http::HttpClient;
pub use wallet::{WalletAddress, WalletError};
pub use wire::{AttendanceRecord, Registration, RegisterReply};

use async_trait::async_trait;
use fras_core::{Embedding, MatchResult};

/// Remote descriptor matching: one network round-trip per call, no retries.
#[async_trait]
pub trait MatchService: Send + Sync {
    async fn match_embedding(&self, embedding: &Embedding) -> Result<MatchResult, ClientError>;
}
