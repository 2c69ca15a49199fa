//! Reachability probing
//!
//! A [`Prober`] measures the round-trip latency of one host. The production
//! implementation is [`IcmpProber`], which sends ICMP echo requests. The policy
//! is strict: a single lost packet disqualifies the host, successful packets
//! are never averaged on their own.

pub mod icmp;

use async_trait::async_trait;

pub use icmp::IcmpProber;

/// Result type for probe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors that can occur while probing a host
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    /// Host could not be resolved, had no usable address, or never answered
    #[error("Host '{host}' unreachable: {reason}")]
    Unreachable { host: String, reason: String },

    /// Some echo requests went unanswered
    #[error("Packet loss for '{host}': {received}/{sent} replies")]
    PacketLoss { host: String, sent: u16, received: u16 },

    /// The process may not open the ICMP socket it needs
    #[error("Insufficient privilege for ICMP socket: {reason}")]
    Privilege { reason: String },
}

impl ProbeError {
    pub fn unreachable(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unreachable {
            host: host.into(),
            reason: reason.into(),
        }
    }

    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unreachable { .. } => "unreachable",
            Self::PacketLoss { .. } => "packet_loss",
            Self::Privilege { .. } => "privilege",
        }
    }
}

/// Measures round-trip latency of a host
#[async_trait]
pub trait Prober: Send + Sync {
    /// Mean round-trip time in whole milliseconds (floor)
    async fn probe(&self, host: &str) -> ProbeResult<u64>;
}
