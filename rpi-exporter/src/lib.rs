//! Prometheus exporter for Raspberry Pi throttling state and memcached
//! statistics.
//!
//! Every scrape runs the hardware status tool and queries the memcached
//! server, decodes both, and returns one complete metric set. A failing
//! source only flips its own `*_up` metric to 0.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌────────────────┐
//! │ vcgencmd         │────>│ bitmask decode │──┐
//! └──────────────────┘     └────────────────┘  │   ┌───────────┐    ┌─────────────┐
//!                                              ├──>│ Collector │───>│ HTTP Server │
//! ┌──────────────────┐     ┌────────────────┐  │   │  (emit)   │    │ (/metrics)  │
//! │ memcached stats  │────>│ stats decode   │──┘   └───────────┘    └─────────────┘
//! └──────────────────┘     └────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! rpi-exporter --config config.json5
//! ```
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod collector;
pub mod config;
pub mod decode;
pub mod descriptors;
pub mod emit;
pub mod error;
pub mod http;
pub mod render;
pub mod source;

pub use collector::{Liveness, Scrape, ScrapeCollector, SharedCollector};
pub use config::ExporterConfig;
pub use error::{EmitError, FetchError, ParseError, PartialDecodeError};
pub use http::HttpServer;
pub use source::{CacheClient, CommandRunner, HardwareSource, MemcachedClient};
