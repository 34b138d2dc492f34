//! Command implementations for the Rill CLI

pub mod collect;
pub mod filter;
pub mod group_by;
pub mod input;
pub mod sum;
