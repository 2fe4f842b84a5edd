//! HTTP transport seam
//!
//! The orchestrator never talks HTTP directly. Raw string fetches and the
//! default mirror list source go through the [`Transport`] trait so tests and
//! embedders can swap the network layer out.
//!
//! - [`HttpTransport`]: `reqwest`-backed implementation with retry
//!
//! ## Usage
//!
//! ```no_run
//! use mapfiles_dl::transport::{HttpTransport, Transport};
//! use mapfiles_dl::config::RetryConfig;
//! use std::time::Duration;
//!
//! # async fn example() -> mapfiles_dl::Result<()> {
//! let transport = HttpTransport::new(RetryConfig::default())?;
//! let body = transport
//!     .get("https://meta.example.com/servers", Duration::from_secs(10))
//!     .await?;
//! println!("{} bytes", body.len());
//! # Ok(())
//! # }
//! ```

mod http;
mod traits;

pub use http::HttpTransport;
pub use traits::Transport;
