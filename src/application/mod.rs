//! Application services: operator authentication and purge nonces.

pub mod error;
pub mod nonces;
pub mod operators;
