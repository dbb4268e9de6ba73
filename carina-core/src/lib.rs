//! Carina Core
//!
//! Core library for an infrastructure management tool: the resource model,
//! attribute schemas, the Provider contract and the retry primitives shared
//! by provider crates.

pub mod differ;
pub mod provider;
pub mod resource;
pub mod retry;
pub mod schema;
