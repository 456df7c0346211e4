//! HTTP clients for the two external services the ingestion engine observes:
//! a peer's JSON-RPC 2.0 endpoint (C1) and the credits HTTP endpoint (C2).

pub mod credits;
pub mod error;
pub mod peer;

pub use credits::CreditsClient;
pub use error::RpcError;
pub use peer::{PeerClient, PodInfo, Stats};
