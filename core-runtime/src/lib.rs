//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the media session bridge:
//! - Logging and tracing infrastructure
//! - Bridge configuration and capability checks
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its logging conventions and
//! for the [`BridgeConfig`](config::BridgeConfig) that carries the host
//! capabilities into the playback runtime.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{BridgeConfig, BridgeConfigBuilder, PlaybackSettings};
pub use error::{Error, Result};
