//! # LGP Core
//!
//! Workflow engine for the Lloyd George record portal.
//!
//! This crate contains the pure, presentation-free logic behind the portal:
//! - Session and patient context objects with a swappable persistence adapter
//! - The stage machines driving record view/download, deletion and upload
//! - Role and locality gated action-menu construction
//! - The shared error-to-route policy and its opaque error payload
//! - Display formatting helpers asserted by the workflow tests
//!
//! **No API concerns**: HTTP calls, wire models and the token-refresh policy
//! belong in `api-client`. Everything here is driven by results handed in from
//! that layer.

pub mod config;
pub mod deletion;
pub mod format;
pub mod lloyd_george;
pub mod menu;
pub mod patient;
pub mod routing;
pub mod session;
pub mod upload;

pub use config::{ConfigError, PortalConfig};
pub use patient::{PatientContext, PatientDetails};
pub use routing::{FailureDisposition, FetchFailure, Route};
pub use session::{Session, SessionStorage, UserAuth};
