use time::OffsetDateTime;

/// Where a countdown stands relative to its target. "No target" is its own
/// state rather than an expired-looking default, so callers never confuse
/// "no deadline" with "deadline passed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownPhase {
    NoTarget,
    Pending,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownState {
    pub phase: CountdownPhase,
    pub remaining_ms: u64,
    pub formatted: String,
}

impl CountdownState {
    pub fn none() -> Self {
        Self { phase: CountdownPhase::NoTarget, remaining_ms: 0, formatted: format_hms(0) }
    }

    pub fn is_expired(&self) -> bool {
        self.phase == CountdownPhase::Expired
    }

    pub fn parts(&self) -> ClockParts {
        ClockParts::from_ms(self.remaining_ms)
    }
}

/// Remaining duration until `target` as seen from `now`. Pure and
/// deterministic; every tick recomputes from scratch, so delayed ticks
/// self-correct instead of drifting.
pub fn remaining(target: Option<OffsetDateTime>, now: OffsetDateTime) -> CountdownState {
    let Some(target) = target else {
        return CountdownState::none();
    };

    let delta = target - now;
    let remaining_ms = if delta.is_positive() { delta.whole_milliseconds() as u64 } else { 0 };
    let phase = if remaining_ms == 0 { CountdownPhase::Expired } else { CountdownPhase::Pending };

    CountdownState { phase, remaining_ms, formatted: format_hms(remaining_ms) }
}

/// Zero-padded `HH:MM:SS`, truncated to whole seconds.
pub fn format_hms(remaining_ms: u64) -> String {
    let total_seconds = remaining_ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Day/hour/minute/second decomposition for the waiting-room card layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockParts {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl ClockParts {
    pub fn from_ms(remaining_ms: u64) -> Self {
        let total_seconds = remaining_ms / 1000;
        Self {
            days: total_seconds / 86_400,
            hours: (total_seconds % 86_400) / 3600,
            minutes: (total_seconds % 3600) / 60,
            seconds: total_seconds % 60,
        }
    }
}
