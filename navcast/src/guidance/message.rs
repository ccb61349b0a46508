//! Guidance message value types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Distance text used when nothing better is known.
pub const UNKNOWN_DISTANCE: &str = "未知距离";

/// Road name used before any road has been announced.
pub const UNKNOWN_ROAD: &str = "未知道路";

/// Normalized maneuver category.
///
/// The wire and display form is the Chinese label returned by [`label`].
///
/// [`label`]: TurnCategory::label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TurnCategory {
    Straight,
    Left,
    Right,
    BearLeft,
    BearRight,
    UTurn,
    Roundabout,
    SlightLeft,
    SlightRight,
    EnterMainRoad,
    EnterSideRoad,
    #[default]
    Unknown,
}

impl TurnCategory {
    /// Every category with a defined icon, in icon order.
    pub const KNOWN: [TurnCategory; 11] = [
        TurnCategory::Straight,
        TurnCategory::Left,
        TurnCategory::Right,
        TurnCategory::BearLeft,
        TurnCategory::BearRight,
        TurnCategory::UTurn,
        TurnCategory::Roundabout,
        TurnCategory::SlightLeft,
        TurnCategory::SlightRight,
        TurnCategory::EnterMainRoad,
        TurnCategory::EnterSideRoad,
    ];

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            TurnCategory::Straight => "直行",
            TurnCategory::Left => "左转",
            TurnCategory::Right => "右转",
            TurnCategory::BearLeft => "靠左",
            TurnCategory::BearRight => "靠右",
            TurnCategory::UTurn => "掉头",
            TurnCategory::Roundabout => "进入环岛",
            TurnCategory::SlightLeft => "斜左",
            TurnCategory::SlightRight => "斜右",
            TurnCategory::EnterMainRoad => "进入主路",
            TurnCategory::EnterSideRoad => "进入辅路",
            TurnCategory::Unknown => "未知",
        }
    }

    /// Icon code 0-10, or -1 for `Unknown`.
    pub fn icon_code(&self) -> i32 {
        match self {
            TurnCategory::Straight => 0,
            TurnCategory::Left => 1,
            TurnCategory::Right => 2,
            TurnCategory::BearLeft => 3,
            TurnCategory::BearRight => 4,
            TurnCategory::UTurn => 5,
            TurnCategory::Roundabout => 6,
            TurnCategory::SlightLeft => 7,
            TurnCategory::SlightRight => 8,
            TurnCategory::EnterMainRoad => 9,
            TurnCategory::EnterSideRoad => 10,
            TurnCategory::Unknown => -1,
        }
    }

    /// Inverse of [`icon_code`](Self::icon_code); out-of-range codes map to `Unknown`.
    pub fn from_icon_code(code: i32) -> Self {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::KNOWN.get(i).copied())
            .unwrap_or(TurnCategory::Unknown)
    }

    /// Category for a display label; unrecognized labels map to `Unknown`.
    pub fn from_label(label: &str) -> Self {
        Self::KNOWN
            .iter()
            .copied()
            .find(|c| c.label() == label)
            .unwrap_or(TurnCategory::Unknown)
    }
}

impl fmt::Display for TurnCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for TurnCategory {
    fn from(label: String) -> Self {
        TurnCategory::from_label(&label)
    }
}

impl From<TurnCategory> for String {
    fn from(turn: TurnCategory) -> Self {
        turn.label().to_string()
    }
}

/// Structured, display- and speech-ready summary of the next maneuver.
///
/// Published as a snapshot; consumers never see it change. Field names on
/// the wire follow the peer's existing JSON schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidanceMessage {
    /// Maneuver category.
    #[serde(rename = "TurnInstruction")]
    pub turn: TurnCategory,
    /// Icon code (0-10, -1 unknown).
    #[serde(rename = "IconID")]
    pub icon_code: i32,
    /// Distance to the maneuver, e.g. "500米".
    #[serde(rename = "DistanceText")]
    pub distance_text: String,
    /// Road currently being travelled.
    #[serde(rename = "CurrentRoad")]
    pub current_road: String,
    /// Road entered after the maneuver.
    #[serde(rename = "NextRoad")]
    pub next_road: String,
}

impl Default for GuidanceMessage {
    fn default() -> Self {
        Self {
            turn: TurnCategory::Unknown,
            icon_code: TurnCategory::Unknown.icon_code(),
            distance_text: UNKNOWN_DISTANCE.to_string(),
            current_road: UNKNOWN_ROAD.to_string(),
            next_road: String::new(),
        }
    }
}

impl fmt::Display for GuidanceMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} | {}",
            self.icon_code, self.turn, self.distance_text, self.current_road
        )?;
        if !self.next_road.is_empty() {
            write!(f, " -> {}", self.next_road)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icon_codes_are_a_bijection() {
        for (i, turn) in TurnCategory::KNOWN.iter().enumerate() {
            assert_eq!(turn.icon_code(), i as i32);
            assert_eq!(TurnCategory::from_icon_code(i as i32), *turn);
        }
        assert_eq!(TurnCategory::Unknown.icon_code(), -1);
        assert_eq!(TurnCategory::from_icon_code(-1), TurnCategory::Unknown);
        assert_eq!(TurnCategory::from_icon_code(11), TurnCategory::Unknown);
    }

    #[test]
    fn test_label_lookup() {
        assert_eq!(TurnCategory::from_label("进入环岛"), TurnCategory::Roundabout);
        assert_eq!(TurnCategory::from_label("未知"), TurnCategory::Unknown);
        assert_eq!(TurnCategory::from_label("飞行"), TurnCategory::Unknown);
    }

    #[test]
    fn test_default_message() {
        let msg = GuidanceMessage::default();
        assert_eq!(msg.turn, TurnCategory::Unknown);
        assert_eq!(msg.icon_code, -1);
        assert_eq!(msg.distance_text, UNKNOWN_DISTANCE);
        assert_eq!(msg.current_road, UNKNOWN_ROAD);
        assert!(msg.next_road.is_empty());
    }

    #[test]
    fn test_display() {
        let msg = GuidanceMessage {
            turn: TurnCategory::Left,
            icon_code: 1,
            distance_text: "200米".to_string(),
            current_road: "长安路".to_string(),
            next_road: "友谊路".to_string(),
        };
        assert_eq!(msg.to_string(), "[1] 左转 200米 | 长安路 -> 友谊路");
    }
}
