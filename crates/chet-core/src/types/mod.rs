//! Core type definitions used across the Chet workspace.

pub mod id;

pub use id::*;
