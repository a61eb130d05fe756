//! Workspace placeholder crate.
//!
//! This crate exposes feature flags that map onto the individual workspace
//! crates. Native hosts depend on `media-bridge-workspace` with the default
//! `desktop-shims` feature to get the full service façade; embedders that only
//! need the scripted side enable `client` for the virtual element.

#[cfg(feature = "desktop-shims")]
pub use core_service as service;

#[cfg(feature = "client")]
pub use core_element as element;
