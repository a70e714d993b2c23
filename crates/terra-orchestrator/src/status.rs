use serde::Serialize;
use std::fmt::Display;
use terra_core::FetchError;

/// The kinds of request the orchestrator tracks, one status slot each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestShape {
    List,
    Detail,
    Borders,
}

/// Where a request currently is.
///
/// A detail request walks `Idle -> FetchingDetail -> FetchingBorders -> Done`,
/// skipping the border phase when the country has no neighbours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchPhase {
    #[default]
    Idle,
    FetchingList,
    FetchingDetail,
    FetchingBorders,
    Done,
}

impl Display for FetchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FetchPhase::Idle => "idle",
            FetchPhase::FetchingList => "fetching-list",
            FetchPhase::FetchingDetail => "fetching-detail",
            FetchPhase::FetchingBorders => "fetching-borders",
            FetchPhase::Done => "done",
        };
        write!(f, "{name}")
    }
}

/// Observable state of the latest request of one shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStatus {
    pub phase: FetchPhase,
    /// Error of the latest request, cleared when the next one starts.
    pub error: Option<FetchError>,
}

impl FetchStatus {
    pub fn is_pending(&self) -> bool {
        matches!(
            self.phase,
            FetchPhase::FetchingList | FetchPhase::FetchingDetail | FetchPhase::FetchingBorders
        )
    }

    pub fn started(phase: FetchPhase) -> Self {
        Self { phase, error: None }
    }
}
