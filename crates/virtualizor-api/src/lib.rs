//! Virtualizor API client and data models.
//!
//! Provides typed structures and an asynchronous client for listing virtual machines
//! and managing HAProxy-backed port forwarding rules ("VDF") on a Virtualizor panel.

#![deny(missing_docs)]

pub mod client;
pub mod models;

pub use client::{VirtualizorApi, VirtualizorClient, VirtualizorClientBuilder};
pub use models::{
    ApiResponse, ForwardingRule, HaproxyConfig, PortRanges, Protocol, VdfAction, VmInfo,
    VmStatus,
};

/// Convenient result alias that reuses the shared Virtualizor error type.
pub type Result<T> = virtualizor_core::Result<T>;
