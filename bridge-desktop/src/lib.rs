//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpArtworkFetcher` using `reqwest`
//! - `HeadlessNowPlaying` and `HeadlessControlSurface` keep system
//!   integration state in memory for tray/media-key front ends
//! - `TracingHaptics` logs feedback requests (desktops have no haptic engine)
//!
//! The media engine itself is always host-provided.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{HeadlessControlSurface, HeadlessNowPlaying, HttpArtworkFetcher};
//!
//! let config = BridgeConfig::builder()
//!     .media_engine(engine)
//!     .now_playing(Arc::new(HeadlessNowPlaying::new()))
//!     .control_surface(Arc::new(HeadlessControlSurface::new()))
//!     .artwork_fetcher(Arc::new(HttpArtworkFetcher::new()?))
//!     .build()?;
//! ```

mod artwork;
mod system;

pub use artwork::{HttpArtworkFetcher, RetryPolicy, DEFAULT_MAX_ARTWORK_BYTES};
pub use system::{HeadlessControlSurface, HeadlessNowPlaying, TracingHaptics};
