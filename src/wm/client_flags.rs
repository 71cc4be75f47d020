//! Client Flags
//!
//! Per-client policy flags, each tagged with the provenance of the value so
//! that lower priority sources never clobber what a higher one already set.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Who assigned a policy value. Ordered: a new assignment is accepted only
/// when its provenance is at least the one already recorded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    #[default]
    Unset,
    HintSet,
    UserSet,
}

/// A policy value plus its provenance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flagged<T> {
    value: T,
    provenance: Provenance,
}

impl<T: Copy> Flagged<T> {
    pub const fn new(value: T) -> Self {
        Self {
            value,
            provenance: Provenance::Unset,
        }
    }

    pub fn get(&self) -> T {
        self.value
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Store `value` unless the current value came from a higher priority source.
    /// Returns whether the assignment took effect.
    pub fn assign(&mut self, value: T, provenance: Provenance) -> bool {
        if provenance < self.provenance {
            return false;
        }
        self.value = value;
        self.provenance = provenance;
        true
    }

    /// Unconditional user assignment
    pub fn force(&mut self, value: T) {
        self.value = value;
        self.provenance = Provenance::UserSet;
    }
}

impl<T: Copy + Default> Default for Flagged<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// How a client receives input focus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusPolicy {
    #[default]
    ClickToFocus,
    /// Focus on pointer enter, kept when the pointer leaves to the root
    Sloppy,
    Never,
}

/// How a client takes part in focus cycling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleBehavior {
    #[default]
    Participate,
    Skip,
    RaiseImmediately,
    RaiseOnFinish,
}

/// Stacking strata, bottom to top
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Bottom,
    Normal,
    Top,
}

/// Everything the hint layer and the rule engine may set on a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub focus: Flagged<FocusPolicy>,
    pub cycle: Flagged<CycleBehavior>,
    pub sticky: Flagged<bool>,
    pub omnipresent: Flagged<bool>,
    pub always_on_top: Flagged<bool>,
    pub always_on_bottom: Flagged<bool>,
    pub has_titlebar: Flagged<bool>,
    /// Replay the focusing click to the application
    pub click_through: Flagged<bool>,
    pub keep_transients_above: Flagged<bool>,
}

impl Policy {
    pub fn new(focus: FocusPolicy, has_titlebar: bool) -> Self {
        Self {
            focus: Flagged::new(focus),
            cycle: Flagged::new(CycleBehavior::Participate),
            sticky: Flagged::new(false),
            omnipresent: Flagged::new(false),
            always_on_top: Flagged::new(false),
            always_on_bottom: Flagged::new(false),
            has_titlebar: Flagged::new(has_titlebar),
            click_through: Flagged::new(false),
            keep_transients_above: Flagged::new(true),
        }
    }

    /// Tier chosen by the client's own flags; on-top wins over on-bottom
    pub fn tier(&self) -> Tier {
        if self.always_on_top.get() {
            Tier::Top
        } else if self.always_on_bottom.get() {
            Tier::Bottom
        } else {
            Tier::Normal
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::new(FocusPolicy::ClickToFocus, true)
    }
}

bitflags! {
    /// WM_PROTOCOLS the client advertises
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Protocols: u8 {
        const DELETE_WINDOW = 1 << 0;
        const TAKE_FOCUS    = 1 << 1;
        const SAVE_YOURSELF = 1 << 2;
    }
}

/// Window type (EWMH _NET_WM_WINDOW_TYPE), reduced to what policy depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowType {
    #[default]
    Normal,
    Desktop,
    Dock,
    Dialog,
    Toolbar,
    Menu,
    Utility,
    Splashscreen,
    Notification,
}
