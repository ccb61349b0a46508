//! Spoken prompts for guidance messages.
//!
//! A voice consumer turns each message into one sentence, e.g.
//! `请右转，前方500米后，进入大雁塔南路`. Synthesis itself happens elsewhere;
//! this module only builds the text and hands it to a [`SpeechSink`].

use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::info;

use super::{GuidanceConsumer, GuidanceMessage, TurnCategory, UNKNOWN_DISTANCE};

/// Distances at or below this are announced without a qualifier.
const IMMEDIATE_RANGE_M: f64 = 50.0;

/// Distances at or above this are announced as approximate.
const APPROXIMATE_RANGE_M: f64 = 1000.0;

/// Placeholder when the current road is blank.
const CURRENT_ROAD_PLACEHOLDER: &str = "当前道路";

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[0-9.]+").expect("valid number regex"))
}

/// Meters encoded in a distance text such as "500米" or "1.5公里".
fn distance_meters(distance_text: &str) -> Option<f64> {
    let value: f64 = number_pattern()
        .find(distance_text)?
        .as_str()
        .parse()
        .ok()?;
    if distance_text.contains("公里") {
        Some(value * 1000.0)
    } else {
        Some(value)
    }
}

fn turn_prompt(turn: TurnCategory) -> String {
    match turn {
        TurnCategory::UTurn => "请掉头".to_string(),
        TurnCategory::Roundabout => "请进入环岛".to_string(),
        TurnCategory::Straight => "请继续直行".to_string(),
        TurnCategory::Unknown => "请继续前行".to_string(),
        other => format!("请{}", other.label()),
    }
}

/// Build the spoken prompt for a message.
///
/// ```
/// use navcast::guidance::{format_prompt, GuidanceMessage, TurnCategory};
///
/// let msg = GuidanceMessage {
///     turn: TurnCategory::Right,
///     icon_code: 2,
///     distance_text: "500米".into(),
///     current_road: "长安路".into(),
///     next_road: "大雁塔南路".into(),
/// };
/// assert_eq!(format_prompt(&msg), "请右转，前方500米后，进入大雁塔南路");
/// ```
pub fn format_prompt(message: &GuidanceMessage) -> String {
    let distance = if message.distance_text.is_empty() {
        UNKNOWN_DISTANCE
    } else {
        message.distance_text.as_str()
    };
    let current_road = if message.current_road.is_empty() {
        CURRENT_ROAD_PLACEHOLDER
    } else {
        message.current_road.as_str()
    };

    let mut prompt = turn_prompt(message.turn);

    match distance_meters(distance) {
        Some(meters) => {
            let qualifier = if meters <= IMMEDIATE_RANGE_M {
                ""
            } else if meters >= APPROXIMATE_RANGE_M {
                "大约"
            } else {
                "前方"
            };
            prompt.push_str(&format!("，{}{}后", qualifier, distance));
        }
        None => prompt.push_str("，前方"),
    }

    if !message.next_road.is_empty() && message.next_road != current_road {
        prompt.push_str(&format!("，进入{}", message.next_road));
    } else if !matches!(message.turn, TurnCategory::UTurn | TurnCategory::Roundabout) {
        prompt.push_str(&format!("，沿{}继续行驶", current_road));
    }

    prompt
}

/// Destination for spoken prompts (a TTS engine, a log, a test recorder).
pub trait SpeechSink: Send + Sync + 'static {
    fn speak(&self, prompt: &str);
}

/// Writes prompts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSpeechSink;

impl SpeechSink for TracingSpeechSink {
    fn speak(&self, prompt: &str) {
        info!(prompt, "Speech prompt");
    }
}

/// Bus consumer that formats every message into a prompt for a sink.
pub struct SpeechConsumer {
    sink: Arc<dyn SpeechSink>,
}

impl SpeechConsumer {
    pub fn new(sink: Arc<dyn SpeechSink>) -> Self {
        Self { sink }
    }
}

impl GuidanceConsumer for SpeechConsumer {
    fn name(&self) -> &str {
        "speech"
    }

    fn on_guidance(&self, message: &GuidanceMessage) {
        self.sink.speak(&format_prompt(message));
    }
}
