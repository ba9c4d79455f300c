//! Receiving store front end
//!
//! - [`validator`] - Structural checks per document type
//! - [`checksum`] - Payload checksums
//! - [`service`] - Validate-then-append entry point for producers

pub mod checksum;
pub mod service;
pub mod validator;

pub use service::ReceivingService;
pub use validator::DocumentValidator;
