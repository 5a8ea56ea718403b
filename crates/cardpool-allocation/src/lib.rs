//! Card allocation for the card-pool gateway.
//!
//! # Architecture
//!
//! - [`AllocationCoordinator`] - Switch and forced return around the remote
//!   call, with compare-and-set binding and compensation
//! - [`PoolMirror`] - Pass-through proxy calls that refresh the local mirror,
//!   plus local queries
//! - [`AuditLogWriter`] - Non-blocking audit and API-call recording
//! - [`BackgroundQueue`] - Bounded worker queue with retry and dead letters
//!
//! Both the coordinator and the mirror are generic over
//! [`cardpool_network::CardPoolApi`], so tests drive them with an in-process
//! fake instead of HTTP.

pub mod audit;
pub mod background;
pub mod coordinator;
pub mod error;
pub mod mirror;
pub mod request;

pub use audit::AuditLogWriter;
pub use background::{BackgroundConfig, BackgroundQueue, DeadLetter, Job, JobHandler, StorageJobHandler};
pub use coordinator::AllocationCoordinator;
pub use error::{AllocationError, AllocationResult, QueueError};
pub use mirror::PoolMirror;
pub use request::{ReturnRequest, SwitchOutcome, SwitchRequest, SwitchTarget};
