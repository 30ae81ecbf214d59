//! # virtualizor-core
//!
//! Core types and utilities for working with the Virtualizor control panel API.
//!
//! This crate provides the error taxonomy, host profile configuration, HTTP client
//! settings, and query-string helpers shared by Virtualizor integrations.
//!
//! ## Modules
//!
//! - [`error`] - Error types and HTTP status code mapping
//! - [`config`] - Host profiles and credential decoding
//! - [`client`] - HTTP client settings, timeouts, and TLS policy
//! - [`query`] - Authenticated query-string construction

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod query;

pub use client::{ClientConfig, QueryEncoding, DEFAULT_TIMEOUT_SECS};
pub use config::HostProfile;
pub use error::{Error, ErrorDetail, ErrorResponse, Result};
pub use query::QueryParams;
