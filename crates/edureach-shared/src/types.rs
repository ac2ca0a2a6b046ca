use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::constants::{
    VIDEO_QUALITY_AUDIO_ONLY, VIDEO_QUALITY_HIGH, VIDEO_QUALITY_LOW, VIDEO_QUALITY_MEDIUM,
};

// ---------------------------------------------------------------------------
// Quality level
// ---------------------------------------------------------------------------

/// Ordinal classification of current network conditions.
///
/// `Offline < VeryLow < Low < Medium < High`. `Unknown` is not ordered
/// against anything but itself, so `partial_cmp` returns `None` for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    Unknown,
    Offline,
    VeryLow,
    Low,
    Medium,
    High,
}

impl QualityLevel {
    /// Position on the ordinal scale, `None` for `Unknown`.
    pub fn rank(self) -> Option<u8> {
        match self {
            Self::Unknown => None,
            Self::Offline => Some(0),
            Self::VeryLow => Some(1),
            Self::Low => Some(2),
            Self::Medium => Some(3),
            Self::High => Some(4),
        }
    }

    /// Classify a platform bandwidth hint in Mbps. Thresholds are strict.
    pub fn from_downlink_mbps(mbps: f64) -> Self {
        if mbps > 1.0 {
            Self::High
        } else if mbps > 0.5 {
            Self::Medium
        } else if mbps > 0.1 {
            Self::Low
        } else {
            Self::VeryLow
        }
    }

    /// Classify a measured round-trip latency in milliseconds.
    pub fn from_latency_ms(ms: f64) -> Self {
        if ms < 100.0 {
            Self::High
        } else if ms < 300.0 {
            Self::Medium
        } else if ms < 1000.0 {
            Self::Low
        } else {
            Self::VeryLow
        }
    }

    /// The preset media should be encoded or fetched at.
    pub fn recommended_preset(self) -> QualityPreset {
        match self {
            Self::High => VIDEO_QUALITY_HIGH,
            Self::Medium => VIDEO_QUALITY_MEDIUM,
            Self::Low => VIDEO_QUALITY_LOW,
            Self::VeryLow | Self::Offline | Self::Unknown => VIDEO_QUALITY_AUDIO_ONLY,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Offline => "offline",
            Self::VeryLow => "very_low",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl PartialOrd for QualityLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            (None, None) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl std::fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Quality preset
// ---------------------------------------------------------------------------

/// Resolution and bitrate tuple for adaptive media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityPreset {
    pub width: u32,
    pub height: u32,
    pub bitrate_kbps: u32,
}

impl QualityPreset {
    pub fn is_audio_only(&self) -> bool {
        self.width == 0 && self.height == 0
    }
}

// ---------------------------------------------------------------------------
// Network status snapshot
// ---------------------------------------------------------------------------

/// Transient view of connectivity, replaced wholesale on every recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    pub is_online: bool,
    pub quality: QualityLevel,
    /// Last downlink hint in Mbps, or 0 when the level came from a probe.
    pub speed: f64,
    /// The last latency probe failed. The level then reads `VeryLow`.
    pub probe_failed: bool,
}

impl NetworkStatus {
    pub fn initial(is_online: bool) -> Self {
        Self {
            is_online,
            quality: if is_online {
                QualityLevel::Unknown
            } else {
                QualityLevel::Offline
            },
            speed: 0.0,
            probe_failed: false,
        }
    }

    pub fn recommended_preset(&self) -> QualityPreset {
        self.quality.recommended_preset()
    }
}
