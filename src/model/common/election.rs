use chrono::{DateTime, Utc};
use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// The temporal phase of an election, always derived from the current time
/// against the start/end bounds. This, not the persisted status, is what
/// gates voting.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionPhase {
    /// The election has not started yet.
    Upcoming,
    /// The election is open for voting.
    Active,
    /// The election is over.
    Ended,
}

/// Derive the phase of an election at the given instant.
///
/// Pure and deterministic: the same `(start, end, now)` always yields the
/// same phase, and the three phases partition time into contiguous
/// intervals. Both bounds are inclusive on the active side.
pub fn phase(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> ElectionPhase {
    if now < start {
        ElectionPhase::Upcoming
    } else if now > end {
        ElectionPhase::Ended
    } else {
        ElectionPhase::Active
    }
}

/// The persisted election status. This is a write-through cache of
/// [`ElectionPhase`]: it is recomputed and stored on every election
/// mutation, but it goes stale between writes, so it must never be
/// consulted for gating decisions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionStatus {
    Upcoming,
    Ongoing,
    Completed,
}

impl From<ElectionPhase> for ElectionStatus {
    fn from(phase: ElectionPhase) -> Self {
        match phase {
            ElectionPhase::Upcoming => Self::Upcoming,
            ElectionPhase::Active => Self::Ongoing,
            ElectionPhase::Ended => Self::Completed,
        }
    }
}

impl From<ElectionStatus> for Bson {
    fn from(status: ElectionStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    fn bounds() -> (DateTime<Utc>, DateTime<Utc>) {
        let start = Utc::now();
        (start, start + Duration::days(7))
    }

    #[test]
    fn before_start_is_upcoming() {
        let (start, end) = bounds();
        assert_eq!(
            phase(start, end, start - Duration::seconds(1)),
            ElectionPhase::Upcoming
        );
    }

    #[test]
    fn after_end_is_ended() {
        let (start, end) = bounds();
        assert_eq!(
            phase(start, end, end + Duration::seconds(1)),
            ElectionPhase::Ended
        );
    }

    #[test]
    fn between_bounds_is_active() {
        let (start, end) = bounds();
        assert_eq!(
            phase(start, end, start + Duration::days(1)),
            ElectionPhase::Active
        );
    }

    #[test]
    fn bounds_are_inclusive() {
        let (start, end) = bounds();
        assert_eq!(phase(start, end, start), ElectionPhase::Active);
        assert_eq!(phase(start, end, end), ElectionPhase::Active);
    }

    #[test]
    fn phases_partition_time() {
        // Walking across the whole window must visit the three phases in
        // order, with no gaps and no overlaps.
        let (start, end) = bounds();
        let mut seen = Vec::new();
        let mut now = start - Duration::hours(1);
        while now <= end + Duration::hours(1) {
            let phase = phase(start, end, now);
            if seen.last() != Some(&phase) {
                seen.push(phase);
            }
            now = now + Duration::minutes(30);
        }
        assert_eq!(
            seen,
            vec![
                ElectionPhase::Upcoming,
                ElectionPhase::Active,
                ElectionPhase::Ended
            ]
        );
    }

    #[test]
    fn status_mirrors_phase() {
        assert_eq!(
            ElectionStatus::from(ElectionPhase::Upcoming),
            ElectionStatus::Upcoming
        );
        assert_eq!(
            ElectionStatus::from(ElectionPhase::Active),
            ElectionStatus::Ongoing
        );
        assert_eq!(
            ElectionStatus::from(ElectionPhase::Ended),
            ElectionStatus::Completed
        );
    }
}
