//! CLI surface and broker configuration.

use std::str::FromStr;

use clap::Parser;
use thiserror::Error;

/// How long a log entry lives before it's eligible for head eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// `session`: entries never evict.
    Session,
    /// `<N>s`: entries evict once older than `N` seconds.
    Ttl(u64),
}

#[derive(Error, Debug)]
#[error("invalid ttl-spec {0:?}, expected \"session\" or \"<N>s\" with N > 0")]
pub struct InvalidRetention(String);

impl FromStr for Retention {
    type Err = InvalidRetention;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "session" {
            return Ok(Retention::Session);
        }

        let digits = s.strip_suffix('s').ok_or_else(|| InvalidRetention(s.to_owned()))?;
        let secs: u64 = digits.parse().map_err(|_| InvalidRetention(s.to_owned()))?;
        if secs == 0 {
            return Err(InvalidRetention(s.to_owned()));
        }
        Ok(Retention::Ttl(secs))
    }
}

/// `broker <ttl-spec> <subscriber-port> <publisher-port>...`
#[derive(Parser, Debug)]
#[command(name = "topicd", about = "Topic-based publish/subscribe message broker")]
pub struct Cli {
    /// "session" for no eviction, or "<N>s" (N > 0) for a retention TTL.
    pub retention: Retention,

    /// TCP port that accepts subscriber registrations.
    pub subscriber_port: u16,

    /// One or more TCP ports that accept publisher connections.
    #[arg(required = true, num_args = 1..)]
    pub publisher_ports: Vec<u16>,

    /// Maximum number of concurrently admitted subscriber workers.
    #[arg(long, default_value_t = 1024)]
    pub max_subscribers: usize,
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub retention: Retention,
    pub subscriber_port: u16,
    pub publisher_ports: Vec<u16>,
    pub max_subscribers: usize,
}

impl From<Cli> for BrokerConfig {
    fn from(cli: Cli) -> Self {
        BrokerConfig {
            retention: cli.retention,
            subscriber_port: cli.subscriber_port,
            publisher_ports: cli.publisher_ports,
            max_subscribers: cli.max_subscribers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_session_retention() {
        assert_eq!(Retention::from_str("session").unwrap(), Retention::Session);
    }

    #[test]
    fn parses_ttl_retention() {
        assert_eq!(Retention::from_str("2s").unwrap(), Retention::Ttl(2));
    }

    #[test]
    fn rejects_zero_and_negative_and_unsuffixed_ttl() {
        assert!(Retention::from_str("0s").is_err());
        assert!(Retention::from_str("5").is_err());
        assert!(Retention::from_str("-1s").is_err());
    }
}
