//! Cached toggle value and its update rules.
//!
//! The toggle is a tri-valued cache of a remote boolean: unknown, off, or
//! on. `Unknown` is the only legal value before a subscription exists and
//! immediately after any disconnect — the cache deliberately forgets
//! rather than trusting a value the broker may have moved past.

use crate::session::RemoteToggle;

/// Locally cached state of the shared toggle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ToggleValue {
    /// No trustworthy value. Never rendered as a widget position.
    #[default]
    Unknown,
    Off,
    On,
}

impl ToggleValue {
    /// The local activation rule: a press is a flip, not a set.
    /// Unknown and Off both become On; On becomes Off.
    pub fn flipped(self) -> ToggleValue {
        match self {
            ToggleValue::On => ToggleValue::Off,
            ToggleValue::Off | ToggleValue::Unknown => ToggleValue::On,
        }
    }

    /// Single-byte wire payload for a known value.
    pub fn as_payload(self) -> Option<&'static [u8]> {
        match self {
            ToggleValue::On => Some(b"1"),
            ToggleValue::Off => Some(b"0"),
            ToggleValue::Unknown => None,
        }
    }

    /// Widget position for a known value; `Unknown` has no widget state.
    pub fn as_widget_position(self) -> Option<bool> {
        match self {
            ToggleValue::On => Some(true),
            ToggleValue::Off => Some(false),
            ToggleValue::Unknown => None,
        }
    }
}

impl From<RemoteToggle> for ToggleValue {
    fn from(remote: RemoteToggle) -> Self {
        match remote {
            RemoteToggle::Off => ToggleValue::Off,
            RemoteToggle::On => ToggleValue::On,
        }
    }
}
