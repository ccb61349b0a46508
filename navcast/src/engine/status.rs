//! User-visible navigation status.

use std::fmt;

use chrono::{DateTime, Local};

/// Navigation status, as shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationStatus {
    /// A route is being requested.
    Planning,
    /// The initial route request failed.
    PlanningFailed(String),
    /// Navigation started on a route.
    Started { points: usize, steps: usize },
    /// The traveler left the route; a replan was requested.
    Deviated { distance_m: f64 },
    /// A replacement route was applied.
    Replanned { points: usize },
    /// A replan failed after its retries.
    ReplanFailed(String),
    /// The final point was reached.
    Completed,
    /// Navigation was stopped.
    Stopped,
}

impl NavigationStatus {
    /// True for statuses that report a failure.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            NavigationStatus::PlanningFailed(_) | NavigationStatus::ReplanFailed(_)
        )
    }
}

impl fmt::Display for NavigationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationStatus::Planning => write!(f, "正在获取导航路径..."),
            NavigationStatus::PlanningFailed(reason) => write!(f, "路径规划失败：{}", reason),
            NavigationStatus::Started { points, steps } => {
                write!(f, "开始导航，路径点数: {}，步骤数: {}", points, steps)
            }
            NavigationStatus::Deviated { distance_m } => {
                write!(f, "检测到路径偏离（{:.0}米），正在重新规划...", distance_m)
            }
            NavigationStatus::Replanned { points } => {
                write!(f, "重新规划完成，路径点数: {}", points)
            }
            NavigationStatus::ReplanFailed(reason) => write!(f, "重新规划失败：{}", reason),
            NavigationStatus::Completed => write!(f, "导航完成"),
            NavigationStatus::Stopped => write!(f, "导航已停止"),
        }
    }
}

/// A status with the wall-clock time it was raised.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub timestamp: DateTime<Local>,
    pub status: NavigationStatus,
}

impl StatusUpdate {
    pub fn now(status: NavigationStatus) -> Self {
        Self {
            timestamp: Local::now(),
            status,
        }
    }
}

impl fmt::Display for StatusUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.status)
    }
}
