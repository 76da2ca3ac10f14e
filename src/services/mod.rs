//! Business logic services.
//!
//! Services contain the key lifecycle rules, separated from HTTP handlers.
//! They talk to storage only through the injected `KeyStore`.

pub mod expiry;
pub mod key_service;
pub mod keygen;
pub mod validation_service;
