//! Remote card-pool API client.
//!
//! [`CardPoolApi`] is the seam between the gateway and the remote service;
//! [`CardPoolClient`] implements it over HTTP. Tests and the allocation
//! crate substitute their own implementations.

pub mod client;
pub mod observer;

pub use client::{CardPoolApi, CardPoolClient, CardPoolClientConfig, RemoteError};
pub use observer::{ApiCallRecord, CallObserver};
