//! Instruction mining: free-text routing instructions → structured fields.
//!
//! Routing providers describe each step with a sentence such as
//! `沿<b>长安路</b>行驶500米，右转进入<b>大雁塔南路</b>`. This module pulls a
//! turn category, a distance and the current/next road names out of it.
//!
//! # Rules
//!
//! - **Turn category**: the first entry of [`TURN_PATTERNS`] whose keyword
//!   occurs in the text wins, regardless of where in the text it occurs.
//! - **Distance**: a number and unit (米 or 公里) right after 行驶; failing
//!   that, any number and unit, but only in "continue along the road"
//!   sentences. Kilometers are converted to meters.
//! - **Roads**: text between `沿<b>` / `</b>` (current) and `进入<b>` / `</b>`
//!   (next).
//!
//! Parsing never fails: anything that cannot be extracted falls back to a
//! default or to `None`, which tells the caller to keep its previous value.

mod distance;

pub use distance::extract_distance;

use std::sync::OnceLock;

use regex::Regex;

use crate::guidance::{GuidanceMessage, TurnCategory, UNKNOWN_DISTANCE};

/// A keyword that selects a turn category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnPattern {
    /// Substring searched for in the instruction.
    pub keyword: &'static str,
    /// Category selected when the keyword is present.
    pub turn: TurnCategory,
}

/// Turn keywords in scan order.
pub const TURN_PATTERNS: [TurnPattern; 11] = [
    TurnPattern { keyword: "直行", turn: TurnCategory::Straight },
    TurnPattern { keyword: "左转", turn: TurnCategory::Left },
    TurnPattern { keyword: "右转", turn: TurnCategory::Right },
    TurnPattern { keyword: "靠左", turn: TurnCategory::BearLeft },
    TurnPattern { keyword: "靠右", turn: TurnCategory::BearRight },
    TurnPattern { keyword: "掉头", turn: TurnCategory::UTurn },
    TurnPattern { keyword: "环岛", turn: TurnCategory::Roundabout },
    TurnPattern { keyword: "斜左", turn: TurnCategory::SlightLeft },
    TurnPattern { keyword: "斜右", turn: TurnCategory::SlightRight },
    TurnPattern { keyword: "主路", turn: TurnCategory::EnterMainRoad },
    TurnPattern { keyword: "辅路", turn: TurnCategory::EnterSideRoad },
];

/// Start/end markers delimiting a road name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoadMarkers {
    pub start: &'static str,
    pub end: &'static str,
}

/// Markers around the road currently being travelled.
pub const CURRENT_ROAD_MARKERS: RoadMarkers = RoadMarkers {
    start: "沿<b>",
    end: "</b>",
};

/// Markers around the road entered after the maneuver.
pub const NEXT_ROAD_MARKERS: RoadMarkers = RoadMarkers {
    start: "进入<b>",
    end: "</b>",
};

/// Fields mined from one instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInstruction {
    /// Turn category (first matching pattern).
    pub turn: TurnCategory,
    /// Icon code for `turn`.
    pub icon_code: i32,
    /// Extracted distance, the caller's fallback, or [`UNKNOWN_DISTANCE`].
    pub distance_text: String,
    /// Current road, if the markers were present.
    pub current_road: Option<String>,
    /// Next road, if the markers were present.
    pub next_road: Option<String>,
}

impl ParsedInstruction {
    /// Build a message, keeping `previous` road names where extraction failed.
    pub fn into_message(self, previous: &GuidanceMessage) -> GuidanceMessage {
        GuidanceMessage {
            turn: self.turn,
            icon_code: self.icon_code,
            distance_text: self.distance_text,
            current_road: self
                .current_road
                .unwrap_or_else(|| previous.current_road.clone()),
            next_road: self.next_road.unwrap_or_else(|| previous.next_road.clone()),
        }
    }
}

/// Parse one instruction.
///
/// `fallback_distance` is used when the text carries no distance; it is
/// normally derived from the current fix and the target point.
pub fn parse(instruction: &str, fallback_distance: Option<&str>) -> ParsedInstruction {
    let turn = classify_turn(instruction);
    let distance_text = extract_distance(instruction)
        .or_else(|| fallback_distance.map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_DISTANCE.to_string());

    ParsedInstruction {
        turn,
        icon_code: turn.icon_code(),
        distance_text,
        current_road: extract_road(instruction, CURRENT_ROAD_MARKERS),
        next_road: extract_road(instruction, NEXT_ROAD_MARKERS),
    }
}

/// Turn category of an instruction (first match in [`TURN_PATTERNS`]).
pub fn classify_turn(instruction: &str) -> TurnCategory {
    TURN_PATTERNS
        .iter()
        .find(|p| instruction.contains(p.keyword))
        .map(|p| p.turn)
        .unwrap_or(TurnCategory::Unknown)
}

/// Text between the first `markers.start` and the next `markers.end`.
///
/// Returns `None` when either marker is missing or the name is blank.
pub fn extract_road(instruction: &str, markers: RoadMarkers) -> Option<String> {
    let start = instruction.find(markers.start)? + markers.start.len();
    let len = instruction[start..].find(markers.end)?;
    let name = instruction[start..start + len].trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Remove `<...>` markup for plain-text display.
pub fn strip_markup(instruction: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid markup regex"));
    tag.replace_all(instruction, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_scan_order_beats_text_order() {
        // 左转 appears first in the text, but 直行 is scanned first
        assert_eq!(classify_turn("左转后直行300米"), TurnCategory::Straight);
        assert_eq!(classify_turn("直行100米后左转"), TurnCategory::Straight);
        // 环岛 is scanned before 主路
        assert_eq!(classify_turn("进入环岛，驶入主路"), TurnCategory::Roundabout);
    }

    #[test]
    fn test_each_keyword_maps_to_its_category() {
        for pattern in TURN_PATTERNS {
            let text = format!("前方{}", pattern.keyword);
            assert_eq!(classify_turn(&text), pattern.turn, "keyword {}", pattern.keyword);
        }
        assert_eq!(classify_turn("沿长安路行驶"), TurnCategory::Unknown);
        assert_eq!(classify_turn(""), TurnCategory::Unknown);
    }

    #[test]
    fn test_extract_roads() {
        let text = "沿<b>长安路</b>行驶500米，右转进入<b>大雁塔南路</b>";
        assert_eq!(
            extract_road(text, CURRENT_ROAD_MARKERS).as_deref(),
            Some("长安路")
        );
        assert_eq!(
            extract_road(text, NEXT_ROAD_MARKERS).as_deref(),
            Some("大雁塔南路")
        );
    }

    #[test]
    fn test_extract_road_missing_markers() {
        assert_eq!(extract_road("行驶500米", CURRENT_ROAD_MARKERS), None);
        // Start marker without a closing tag
        assert_eq!(extract_road("沿<b>长安路", CURRENT_ROAD_MARKERS), None);
        // Closing tag only before the start marker
        assert_eq!(extract_road("</b>沿<b>长安路", CURRENT_ROAD_MARKERS), None);
        // Blank names count as missing
        assert_eq!(extract_road("沿<b></b>", CURRENT_ROAD_MARKERS), None);
        assert_eq!(extract_road("沿<b> </b>", CURRENT_ROAD_MARKERS), None);
    }

    #[test]
    fn test_parse_full_instruction() {
        let parsed = parse("沿<b>长安路</b>行驶1.5 公里后直行，进入<b>二环南路</b>", None);
        assert_eq!(parsed.turn, TurnCategory::Straight);
        assert_eq!(parsed.icon_code, 0);
        assert_eq!(parsed.distance_text, "1500米");
        assert_eq!(parsed.current_road.as_deref(), Some("长安路"));
        assert_eq!(parsed.next_road.as_deref(), Some("二环南路"));
    }

    #[test]
    fn test_parse_distance_fallbacks() {
        let parsed = parse("进入<b>大雁塔南路</b>", Some("42米"));
        assert_eq!(parsed.distance_text, "42米");

        let parsed = parse("进入<b>大雁塔南路</b>", None);
        assert_eq!(parsed.distance_text, UNKNOWN_DISTANCE);
    }

    #[test]
    fn test_into_message_keeps_previous_roads() {
        let previous = GuidanceMessage {
            current_road: "长安路".to_string(),
            next_road: "友谊路".to_string(),
            ..GuidanceMessage::default()
        };
        let msg = parse("右转", Some("10米")).into_message(&previous);
        assert_eq!(msg.turn, TurnCategory::Right);
        assert_eq!(msg.icon_code, 2);
        assert_eq!(msg.distance_text, "10米");
        assert_eq!(msg.current_road, "长安路");
        assert_eq!(msg.next_road, "友谊路");
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(
            strip_markup("沿<b>长安路</b>行驶500米"),
            "沿长安路行驶500米"
        );
        assert_eq!(strip_markup("no tags"), "no tags");
    }

    proptest! {
        #[test]
        fn prop_parse_is_pure(text in "\\PC{0,40}") {
            prop_assert_eq!(parse(&text, None), parse(&text, None));
        }

        #[test]
        fn prop_parse_never_panics_on_markup(
            prefix in "[沿进入<b>/]{0,6}",
            body in "\\PC{0,12}",
            suffix in "[</b>行驶米公里0-9.]{0,10}",
        ) {
            let text = format!("{prefix}{body}{suffix}");
            let parsed = parse(&text, Some("1米"));
            prop_assert_eq!(parsed.icon_code, parsed.turn.icon_code());
        }
    }
}
