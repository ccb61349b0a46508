//! navcast - turn-by-turn guidance tracking.
//!
//! This library follows a position fix stream along a planned route. It
//! detects arrival at each route point and deviation from the route, replans
//! when the traveler leaves the path, and fans structured guidance messages
//! out to local consumers and a UDP peer.
//!
//! The pieces, leaves first:
//!
//! - [`route`]: route points and the replace-on-replan store
//! - [`instruction`]: mining free-text instructions into guidance fields
//! - [`tracker`]: the progress/deviation state machine
//! - [`replan`]: single-flight background replanning
//! - [`guidance`]: the guidance message, the fan-out bus and speech prompts
//! - [`transport`]: datagram sender, receiver and hand-off queue
//! - [`engine`]: the owning context that ties them together
//!
//! # Example
//!
//! ```
//! use navcast::instruction;
//! use navcast::guidance::TurnCategory;
//!
//! let parsed = instruction::parse("沿长安路行驶200米，右转进入大雁塔南路", None);
//! assert_eq!(parsed.turn, TurnCategory::Right);
//! ```

pub mod config;
pub mod engine;
pub mod geo;
pub mod guidance;
pub mod instruction;
pub mod logging;
pub mod positioning;
pub mod replan;
pub mod retry;
pub mod route;
pub mod routing;
pub mod tracker;
pub mod transport;

/// Crate version, reported at startup.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
