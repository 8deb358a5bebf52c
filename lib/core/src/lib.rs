//! Core identifier types for the keygate authentication service.
//!
//! This crate provides the strongly-typed ULID identifiers shared by the
//! identity domain and the server.

pub mod id;

pub use id::{ParseIdError, SessionId, TokenPairId, UserId};
