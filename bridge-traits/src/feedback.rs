//! Haptic feedback relay.
//!
//! The page posts a bare string; known values map to a one-shot device effect
//! and everything else is ignored. There is no return value and no state.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Haptic effect requested by the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Selection,
    Light,
    Medium,
    Heavy,
    Rigid,
    Soft,
    Success,
    Warning,
    Error,
}

impl FeedbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackKind::Selection => "selection",
            FeedbackKind::Light => "light",
            FeedbackKind::Medium => "medium",
            FeedbackKind::Heavy => "heavy",
            FeedbackKind::Rigid => "rigid",
            FeedbackKind::Soft => "soft",
            FeedbackKind::Success => "success",
            FeedbackKind::Warning => "warning",
            FeedbackKind::Error => "error",
        }
    }
}

impl FromStr for FeedbackKind {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "selection" => Ok(FeedbackKind::Selection),
            "light" => Ok(FeedbackKind::Light),
            "medium" => Ok(FeedbackKind::Medium),
            "heavy" => Ok(FeedbackKind::Heavy),
            "rigid" => Ok(FeedbackKind::Rigid),
            "soft" => Ok(FeedbackKind::Soft),
            "success" => Ok(FeedbackKind::Success),
            "warning" => Ok(FeedbackKind::Warning),
            "error" => Ok(FeedbackKind::Error),
            _ => Err(()),
        }
    }
}

/// Device haptics.
pub trait HapticFeedback: Send + Sync {
    fn trigger(&self, kind: FeedbackKind);
}
