//! Guidance messages and their delivery.
//!
//! - [`GuidanceMessage`]: the snapshot published for every maneuver change
//! - [`GuidanceBus`]: ordered, non-blocking fan-out to consumers
//! - [`format_prompt`]: spoken prompt text for voice consumers

mod bus;
mod message;
mod speech;

pub use bus::{BusError, CallbackConsumer, GuidanceBus, GuidanceConsumer, SubscriptionHandle};
pub use message::{GuidanceMessage, TurnCategory, UNKNOWN_DISTANCE, UNKNOWN_ROAD};
pub use speech::{format_prompt, SpeechConsumer, SpeechSink, TracingSpeechSink};
