//! Cache status source: a minimal memcached text protocol client.
//!
//! Only the two statistics requests the exporter needs are implemented.
//! Every request opens its own connection, so a failure of one request
//! never affects the other.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::trace;

use crate::config::MemcachedConfig;
use crate::decode::stats::StatsMap;
use crate::error::FetchError;

/// Retrieves statistics from a cache server.
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// General server statistics (`stats`).
    async fn fetch_stats(&self) -> Result<StatsMap, FetchError>;

    /// Server configuration statistics (`stats settings`).
    async fn fetch_stats_settings(&self) -> Result<StatsMap, FetchError>;
}

/// [`CacheClient`] speaking the memcached text protocol over TCP.
#[derive(Debug, Clone)]
pub struct MemcachedClient {
    address: String,
    timeout: Duration,
}

impl MemcachedClient {
    /// Create a client for `address` (`host:port`).
    ///
    /// `timeout` bounds each request, connection setup included.
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    /// Create a client from configuration.
    pub fn from_config(config: &MemcachedConfig) -> Self {
        Self::new(
            config.address.clone(),
            Duration::from_millis(config.timeout_ms),
        )
    }

    async fn request(&self, command: &'static str) -> Result<StatsMap, FetchError> {
        trace!(address = %self.address, command, "Sending memcached request");

        match tokio::time::timeout(self.timeout, self.exchange(command)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                target: format!("memcached `{}` on {}", command, self.address),
                timeout: self.timeout,
            }),
        }
    }

    async fn exchange(&self, command: &str) -> Result<StatsMap, FetchError> {
        let stream =
            TcpStream::connect(&self.address)
                .await
                .map_err(|source| FetchError::Connect {
                    address: self.address.clone(),
                    source,
                })?;

        let (reader, mut writer) = stream.into_split();
        writer
            .write_all(format!("{}\r\n", command).as_bytes())
            .await
            .map_err(|source| self.io_error(source))?;

        let mut lines = BufReader::new(reader).lines();
        let mut stats = StatsMap::new();

        loop {
            let line = lines
                .next_line()
                .await
                .map_err(|source| self.io_error(source))?
                .ok_or_else(|| self.protocol_error("connection closed before END"))?;

            match parse_reply_line(&line) {
                Ok(ReplyLine::Stat(name, value)) => {
                    stats.insert(name.to_string(), value.to_string());
                }
                Ok(ReplyLine::End) => break,
                Err(message) => return Err(self.protocol_error(message)),
            }
        }

        Ok(stats)
    }

    fn io_error(&self, source: std::io::Error) -> FetchError {
        FetchError::Io {
            address: self.address.clone(),
            source,
        }
    }

    fn protocol_error(&self, message: impl Into<String>) -> FetchError {
        FetchError::Protocol {
            address: self.address.clone(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl CacheClient for MemcachedClient {
    async fn fetch_stats(&self) -> Result<StatsMap, FetchError> {
        self.request("stats").await
    }

    async fn fetch_stats_settings(&self) -> Result<StatsMap, FetchError> {
        self.request("stats settings").await
    }
}

/// One line of a `stats` reply.
#[derive(Debug, PartialEq, Eq)]
enum ReplyLine<'a> {
    Stat(&'a str, &'a str),
    End,
}

fn parse_reply_line(line: &str) -> Result<ReplyLine<'_>, String> {
    let line = line.trim_end_matches('\r');

    if line == "END" {
        return Ok(ReplyLine::End);
    }

    if let Some(rest) = line.strip_prefix("STAT ") {
        return match rest.split_once(' ') {
            Some((name, value)) if !name.is_empty() => Ok(ReplyLine::Stat(name, value)),
            _ => Err(format!("malformed STAT line: {:?}", line)),
        };
    }

    if line == "ERROR" {
        return Err("server returned ERROR".to_string());
    }
    if let Some(message) = line
        .strip_prefix("CLIENT_ERROR ")
        .or_else(|| line.strip_prefix("SERVER_ERROR "))
    {
        return Err(format!("server returned error: {}", message));
    }

    Err(format!("unexpected line: {:?}", line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_reply_line() {
        assert_eq!(
            parse_reply_line("STAT curr_items 42\r"),
            Ok(ReplyLine::Stat("curr_items", "42"))
        );
        assert_eq!(
            parse_reply_line("STAT domain_socket NULL"),
            Ok(ReplyLine::Stat("domain_socket", "NULL"))
        );
        assert_eq!(
            parse_reply_line("STAT version 1.6.21 extra"),
            Ok(ReplyLine::Stat("version", "1.6.21 extra"))
        );
        assert_eq!(parse_reply_line("END\r"), Ok(ReplyLine::End));
    }

    #[test]
    fn test_parse_reply_line_errors() {
        assert!(parse_reply_line("ERROR").is_err());
        assert!(
            parse_reply_line("SERVER_ERROR out of memory")
                .unwrap_err()
                .contains("out of memory")
        );
        assert!(parse_reply_line("STAT lonely").is_err());
        assert!(parse_reply_line("VALUE foo 0 3").is_err());
    }

    /// Serve a single canned reply to the first connection.
    async fn serve_once(reply: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut lines = BufReader::new(reader).lines();
            let _ = lines.next_line().await;
            writer.write_all(reply.as_bytes()).await.unwrap();
        });

        addr
    }

    #[tokio::test]
    async fn test_fetch_stats() {
        let addr = serve_once("STAT pid 1\r\nSTAT curr_items 42\r\nEND\r\n").await;
        let client = MemcachedClient::new(addr, Duration::from_secs(2));

        let stats = client.fetch_stats().await.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats.get("curr_items").map(String::as_str), Some("42"));
    }

    #[tokio::test]
    async fn test_fetch_stats_server_error() {
        let addr = serve_once("SERVER_ERROR busy\r\n").await;
        let client = MemcachedClient::new(addr, Duration::from_secs(2));

        let result = client.fetch_stats().await;
        assert!(matches!(result, Err(FetchError::Protocol { .. })));
    }

    #[tokio::test]
    async fn test_fetch_stats_truncated_reply() {
        let addr = serve_once("STAT curr_items 42\r\n").await;
        let client = MemcachedClient::new(addr, Duration::from_secs(2));

        let result = client.fetch_stats().await;
        assert!(matches!(result, Err(FetchError::Protocol { .. })));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let client = MemcachedClient::new(addr, Duration::from_secs(2));
        let result = client.fetch_stats().await;

        assert!(matches!(result, Err(FetchError::Connect { .. })));
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        // Accept but never answer.
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let client = MemcachedClient::new(addr, Duration::from_millis(100));
        let result = client.fetch_stats_settings().await;

        assert!(matches!(result, Err(FetchError::Timeout { .. })));
    }
}
