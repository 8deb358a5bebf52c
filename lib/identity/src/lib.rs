//! Identity domain types for the keygate authentication service.
//!
//! This crate provides:
//! - `User` records provisioned from identity provider profiles
//! - `Session` audit records of issued token pairs
//! - `TokenClaims`, the signed payload of access and refresh tokens
//! - provider value types (`ProviderKind`, `ProviderIdentity`, `ProviderConfig`)

pub mod claims;
pub mod provider;
pub mod session;
pub mod user;

pub use claims::TokenClaims;
pub use provider::{ParseProviderError, ProviderConfig, ProviderIdentity, ProviderKind};
pub use session::{ParseSessionStatusError, Session, SessionStatus};
pub use user::{ParseStatusError, User, UserStatus};
