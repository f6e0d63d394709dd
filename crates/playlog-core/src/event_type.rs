//! Event kind enum as the single source of truth for log event names.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Canonical event kinds emitted by the game client.
///
/// Unrecognized names are kept verbatim in [`EventKind::Other`] so that new
/// log fields fall inside segment windows without breaking the scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    StageBegin,
    StageClear,
    StageExit,
    StageRetry,
    StageStar,
    CameraZoom,
    CameraRotate,
    CameraPanning,
    InputGrab,
    InputGrabBreak,
    InputPushPull,
    Other(String),
}

impl EventKind {
    /// The log name of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::StageBegin => "StageBegin",
            Self::StageClear => "StageClear",
            Self::StageExit => "StageExit",
            Self::StageRetry => "StageRetry",
            Self::StageStar => "StageStar",
            Self::CameraZoom => "CameraZoom",
            Self::CameraRotate => "CameraRotate",
            Self::CameraPanning => "CameraPanning",
            Self::InputGrab => "InputGrab",
            Self::InputGrabBreak => "InputGrabBreak",
            Self::InputPushPull => "InputPushPull",
            Self::Other(name) => name,
        }
    }

    /// Returns true for the camera manipulation kinds.
    pub const fn is_camera(&self) -> bool {
        matches!(
            self,
            Self::CameraZoom | Self::CameraRotate | Self::CameraPanning
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Ok(match name {
            "StageBegin" => Self::StageBegin,
            "StageClear" => Self::StageClear,
            "StageExit" => Self::StageExit,
            "StageRetry" => Self::StageRetry,
            "StageStar" => Self::StageStar,
            "CameraZoom" => Self::CameraZoom,
            "CameraRotate" => Self::CameraRotate,
            "CameraPanning" => Self::CameraPanning,
            "InputGrab" => Self::InputGrab,
            "InputGrabBreak" => Self::InputGrabBreak,
            "InputPushPull" => Self::InputPushPull,
            other => Self::Other(other.to_string()),
        })
    }
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl Serialize for EventKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_variants() {
        let variants = [
            EventKind::StageBegin,
            EventKind::StageClear,
            EventKind::StageExit,
            EventKind::StageRetry,
            EventKind::StageStar,
            EventKind::CameraZoom,
            EventKind::CameraRotate,
            EventKind::CameraPanning,
            EventKind::InputGrab,
            EventKind::InputGrabBreak,
            EventKind::InputPushPull,
        ];

        for variant in &variants {
            let s = variant.to_string();
            let parsed = EventKind::from(s.as_str());
            assert_eq!(parsed, *variant, "roundtrip failed for {variant:?}");
        }
    }

    #[test]
    fn unknown_names_become_other() {
        let kind = EventKind::from("InventoryOpen");
        assert_eq!(kind, EventKind::Other("InventoryOpen".to_string()));
        assert_eq!(kind.to_string(), "InventoryOpen");
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(EventKind::from("  StageClear \t"), EventKind::StageClear);
    }

    #[test]
    fn names_are_case_sensitive() {
        assert_eq!(
            EventKind::from("stagebegin"),
            EventKind::Other("stagebegin".to_string())
        );
    }

    #[test]
    fn serializes_as_log_name() {
        let json = serde_json::to_string(&EventKind::CameraPanning).unwrap();
        assert_eq!(json, r#""CameraPanning""#);
        let parsed: EventKind = serde_json::from_str(r#""Heartbeat""#).unwrap();
        assert_eq!(parsed, EventKind::Other("Heartbeat".to_string()));
    }

    #[test]
    fn camera_kinds() {
        assert!(EventKind::CameraZoom.is_camera());
        assert!(EventKind::CameraRotate.is_camera());
        assert!(EventKind::CameraPanning.is_camera());
        assert!(!EventKind::InputGrab.is_camera());
    }
}
