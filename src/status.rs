use crate::metrics::snapshot::Snapshot;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusLabel {
    Processing,
    Idle,
    Inactive,
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StatusLabel::Processing => "Processing",
            StatusLabel::Idle => "Idle",
            StatusLabel::Inactive => "Inactive",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PauseLabel {
    Running,
    Paused,
}

impl fmt::Display for PauseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PauseLabel::Running => "Running",
            PauseLabel::Paused => "Paused",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ButtonState {
    pub pause_enabled: bool,
    pub resume_enabled: bool,
}

/// Where the job sits with respect to pause/resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Availability {
    RunningUnpaused,
    /// Pause was requested but the worker has not wound down yet.
    RunningPausePending,
    Paused,
    StoppedWithPending,
    StoppedIdle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DerivedStatus {
    pub label: StatusLabel,
    pub pause_label: PauseLabel,
    pub buttons: ButtonState,
    pub availability: Availability,
}

/// Derives the run status and control availability from a snapshot.
pub fn derive(snapshot: &Snapshot) -> DerivedStatus {
    let label = if snapshot.is_running {
        StatusLabel::Processing
    } else if snapshot.pending > 0 {
        StatusLabel::Idle
    } else {
        StatusLabel::Inactive
    };

    let pause_label = if snapshot.is_paused {
        PauseLabel::Paused
    } else {
        PauseLabel::Running
    };

    let buttons = ButtonState {
        pause_enabled: snapshot.is_running && !snapshot.is_paused,
        resume_enabled: snapshot.is_paused || (snapshot.pending > 0 && !snapshot.is_running),
    };

    let availability = match (snapshot.is_running, snapshot.is_paused) {
        (true, false) => Availability::RunningUnpaused,
        (true, true) => Availability::RunningPausePending,
        (false, true) => Availability::Paused,
        (false, false) if snapshot.pending > 0 => Availability::StoppedWithPending,
        (false, false) => Availability::StoppedIdle,
    };

    DerivedStatus {
        label,
        pause_label,
        buttons,
        availability,
    }
}
