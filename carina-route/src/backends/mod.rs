//! Route table hosts

pub mod memory;

pub use memory::{CallCounts, MemoryRouteTable, Operation};
