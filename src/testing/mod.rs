//! Test support utilities.
//!
//! Scripted implementations of the controller's collaborator traits, used
//! by unit tests and the integration suite alike.

pub mod mocks;
