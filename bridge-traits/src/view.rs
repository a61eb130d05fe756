//! Content view abstraction.
//!
//! A content view is the sandboxed web view that hosts the scripted side of
//! the bridge. Every session remembers the view that created it and delivers
//! its events there; when the view closes, the host reports it once and the
//! bridge tears down whatever sessions the view still owns.

use serde_json::Value;
use std::fmt;

use crate::error::Result;

/// Script message handler carrying media commands.
pub const AUDIO_HANDLER: &str = "audio";

/// Script message handler carrying haptic feedback strings.
pub const FEEDBACK_HANDLER: &str = "feedback";

/// Host-assigned identifier for a content view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u64);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view-{}", self.0)
    }
}

/// Event delivery target inside a content view.
///
/// Implementations typically evaluate a small script in the page that
/// dispatches the event object to the document.
pub trait ContentView: Send + Sync {
    fn id(&self) -> ViewId;

    /// Deliver one serialized event record to the page.
    fn deliver_event(&self, event: Value) -> Result<()>;
}
