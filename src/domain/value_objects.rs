//! Value Objects - Immutable domain primitives

use serde::{Deserialize, Serialize};
use std::fmt;

/// Event an AF subscribes to for user plane path changes.
pub const UP_PATH_CHANGE: &str = "UP_PATH_CHANGE";

/// Core network function that receives the policy derived from a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SouthboundTarget {
    /// Policy Control Function, single-UE app sessions
    Pcf,
    /// Unified Data Repository, group and any-UE influence data
    Udr,
}

impl SouthboundTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            SouthboundTarget::Pcf => "PCF",
            SouthboundTarget::Udr => "UDR",
        }
    }
}

impl fmt::Display for SouthboundTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of inbound core network notification, taken from the last path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// SMF user plane path change (`.../notification/upf`)
    UpPathChange,
}

impl NotificationKind {
    pub fn from_path(segment: &str) -> Option<Self> {
        match segment {
            "upf" => Some(NotificationKind::UpPathChange),
            _ => None,
        }
    }

    pub fn path_segment(&self) -> &'static str {
        match self {
            NotificationKind::UpPathChange => "upf",
        }
    }

    /// Event name the SMF uses in `eventNotifs[].event`.
    pub fn trigger_event(&self) -> &'static str {
        match self {
            NotificationKind::UpPathChange => "UP_PATH_CH",
        }
    }

    /// Event name reported to the AF.
    pub fn subscribed_event(&self) -> &'static str {
        match self {
            NotificationKind::UpPathChange => UP_PATH_CHANGE,
        }
    }
}
