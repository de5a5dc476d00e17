//! SoulFlow CLI library
//!
//! Exposes the command layer and the simulated backend for integration
//! testing.

pub mod cli;
pub mod config;
pub mod flow_io;
pub mod simulate;
