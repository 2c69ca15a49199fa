//! ICMP echo prober built on surge-ping

use async_trait::async_trait;
use socket2::Type;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use surge_ping::{Client, Config, PingIdentifier, PingSequence, SurgeError, ICMP};

use super::{ProbeError, ProbeResult, Prober};
use crate::config::ProbeConfig;

/// Payload carried by every echo request, the size `ping` uses by default
const PAYLOAD: [u8; 56] = [0; 56];

/// Prober sending ICMP echo requests
///
/// Sockets are opened once, when the prober is built, so missing privileges
/// are reported at startup rather than as a stream of unreachable hosts.
pub struct IcmpProber {
    v4: Client,
    v6: Option<Client>,
    count: u16,
    timeout: Duration,
}

impl IcmpProber {
    /// Open the ICMP sockets described by `config`
    pub fn new(config: &ProbeConfig) -> ProbeResult<Self> {
        let sock_type = if config.privileged {
            Type::RAW
        } else {
            Type::DGRAM
        };

        let v4 = open_client(ICMP::V4, sock_type)?;
        let v6 = match open_client(ICMP::V6, sock_type) {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "IPv6 ICMP socket unavailable, probing IPv4 only");
                None
            }
        };

        tracing::debug!(
            count = config.count,
            timeout_secs = config.timeout_secs,
            privileged = config.privileged,
            "ICMP prober ready"
        );

        Ok(Self {
            v4,
            v6,
            count: config.count.max(1),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    async fn resolve(&self, host: &str) -> ProbeResult<IpAddr> {
        let name = strip_port(host);
        if let Ok(ip) = name.parse::<IpAddr>() {
            return Ok(ip);
        }

        let lookup = tokio::time::timeout(self.timeout, tokio::net::lookup_host((name, 0)))
            .await
            .map_err(|_| ProbeError::unreachable(host, "name resolution timed out"))?
            .map_err(|e| ProbeError::unreachable(host, format!("name resolution failed: {e}")))?;

        let addrs: Vec<SocketAddr> = lookup.collect();
        addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.iter().find(|_| self.v6.is_some()))
            .map(|a| a.ip())
            .ok_or_else(|| ProbeError::unreachable(host, "no usable address"))
    }
}

fn open_client(kind: ICMP, sock_type: Type) -> ProbeResult<Client> {
    let config = Config::builder().kind(kind).sock_type_hint(sock_type).build();
    Client::new(&config).map_err(|e| match e.kind() {
        io::ErrorKind::PermissionDenied => ProbeError::Privilege {
            reason: format!(
                "{e}; run with CAP_NET_RAW or set probe.privileged = false"
            ),
        },
        _ => ProbeError::Privilege {
            reason: format!("cannot open ICMP socket: {e}"),
        },
    })
}

/// Host part of a candidate name, without `:port` or IPv6 brackets
///
/// Ports matter to the sampler only; ICMP has none.
pub(crate) fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split_once(']').map_or(rest, |(ip, _)| ip);
    }
    match host.rsplit_once(':') {
        // a bare IPv6 address has more than one colon
        Some((name, port)) if !name.contains(':') && port.parse::<u16>().is_ok() => name,
        _ => host,
    }
}

/// Classify the replies to `sent` echo requests
///
/// Every request must be answered; a partial set of replies is never averaged.
pub(crate) fn outcome(host: &str, sent: u16, rtts: &[Duration]) -> ProbeResult<u64> {
    let received = rtts.len() as u16;
    if received == 0 {
        return Err(ProbeError::unreachable(host, "timed out"));
    }
    if received < sent {
        tracing::warn!(host, sent, received, "packet loss detected");
        return Err(ProbeError::PacketLoss {
            host: host.to_string(),
            sent,
            received,
        });
    }

    mean_rtt_ms(rtts).ok_or_else(|| ProbeError::unreachable(host, "no replies"))
}

/// Floor of the mean round-trip time, in milliseconds
pub(crate) fn mean_rtt_ms(rtts: &[Duration]) -> Option<u64> {
    if rtts.is_empty() {
        return None;
    }
    let total: Duration = rtts.iter().sum();
    Some((total.as_millis() / rtts.len() as u128) as u64)
}

#[async_trait]
impl Prober for IcmpProber {
    async fn probe(&self, host: &str) -> ProbeResult<u64> {
        let ip = self.resolve(host).await?;
        let client = match ip {
            IpAddr::V4(_) => &self.v4,
            IpAddr::V6(_) => self
                .v6
                .as_ref()
                .ok_or_else(|| ProbeError::unreachable(host, "IPv6 probing unavailable"))?,
        };

        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(self.timeout);

        let mut rtts = Vec::with_capacity(self.count as usize);
        for seq in 0..self.count {
            match pinger.ping(PingSequence(seq), &PAYLOAD).await {
                Ok((_, rtt)) => rtts.push(rtt),
                Err(SurgeError::Timeout { .. }) => {
                    tracing::debug!(host, seq, "echo request timed out");
                }
                Err(SurgeError::IOError(e)) if e.kind() == io::ErrorKind::PermissionDenied => {
                    return Err(ProbeError::Privilege {
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    return Err(ProbeError::unreachable(host, e.to_string()));
                }
            }
        }

        outcome(host, self.count, &rtts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_rtt_floors() {
        let rtts = [Duration::from_micros(10_900), Duration::from_micros(11_900)];
        // mean 11.4ms
        assert_eq!(mean_rtt_ms(&rtts), Some(11));
    }

    #[test]
    fn test_mean_rtt_sub_millisecond() {
        assert_eq!(mean_rtt_ms(&[Duration::from_micros(400)]), Some(0));
    }

    fn ms(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|v| Duration::from_millis(*v)).collect()
    }

    #[test]
    fn test_outcome_all_replies() {
        let rtts = [
            Duration::from_micros(10_200),
            Duration::from_micros(11_000),
            Duration::from_micros(12_500),
        ];
        // mean 11.23ms
        assert_eq!(outcome("a.test", 3, &rtts), Ok(11));
    }

    #[test]
    fn test_outcome_partial_loss_disqualifies() {
        assert_eq!(
            outcome("a.test", 3, &ms(&[1, 2])),
            Err(ProbeError::PacketLoss {
                host: "a.test".to_string(),
                sent: 3,
                received: 2,
            })
        );
    }

    #[test]
    fn test_outcome_no_replies_is_unreachable() {
        assert!(matches!(
            outcome("a.test", 3, &[]),
            Err(ProbeError::Unreachable { .. })
        ));
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("mirror.example.com"), "mirror.example.com");
        assert_eq!(strip_port("mirror.example.com:8443"), "mirror.example.com");
        assert_eq!(strip_port("localhost:8443"), "localhost");
        assert_eq!(strip_port("10.0.0.1:80"), "10.0.0.1");
        assert_eq!(strip_port("[2001:db8::1]:8443"), "2001:db8::1");
        assert_eq!(strip_port("[2001:db8::1]"), "2001:db8::1");
        assert_eq!(strip_port("2001:db8::1"), "2001:db8::1");
        assert_eq!(strip_port("::1"), "::1");
    }

    #[test]
    fn test_mean_rtt_empty() {
        assert_eq!(mean_rtt_ms(&[]), None);
    }
}
