//! # Shared Types Crate
//!
//! This crate contains the domain entities, status records and queue message
//! types shared by every validation component.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-component types are defined here.
//! - **Forward-Only State**: `ValidationStatus` only moves forward
//!   (`NotStarted < Incomplete < {Succeeded, Failed}`).
//! - **Issues Are Data**: Policy failures are captured as `ValidationIssue`
//!   values attached to a terminal `Failed` status, never as errors.

pub mod entities;
pub mod errors;
pub mod issues;
pub mod messages;
pub mod status;

pub use entities::*;
pub use errors::*;
pub use issues::{IssueCode, ValidationIssue};
pub use messages::SignatureValidationMessage;
pub use status::{ValidationStatus, ValidatorStatus};
