//! Shared domain types for the Concord match runner.
//!
//! This crate is dependency-light by design: every other crate in the
//! workspace builds on the closed sets, game-state model, event taxonomy,
//! error enum and configuration tree defined here.

pub mod capability;
pub mod config;
pub mod error;
pub mod event;
pub mod game;
pub mod order;

pub use error::{Error, Result};
