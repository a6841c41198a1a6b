#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Network operations for plugfetch
//!
//! This crate defines the fetch job contract the install coordinator drives
//! ([`Transport`], [`JobSink`], [`TransferHandle`]) and ships the HTTP
//! implementation of it. Fetches are never retried.

mod client;
mod http;
mod locator;
mod transport;

pub use client::{NetClient, NetConfig};
pub use http::HttpTransport;
pub use locator::artifact_url;
pub use transport::{
    job_channel, FetchRequest, JobEvent, JobEventKind, JobEventReceiver, JobEventSender, JobSink,
    TransferHandle, Transport,
};

use plugfetch_config::Config;
use plugfetch_errors::Error;

/// Build the HTTP transport described by a configuration
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be created.
pub fn transport_from_config(config: &Config) -> Result<HttpTransport, Error> {
    let client = NetClient::new(NetConfig::from(&config.network))?;
    Ok(HttpTransport::new(client))
}
