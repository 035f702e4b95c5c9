use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::election::{phase, ElectionPhase, ElectionStatus},
    mongodb::Id,
};

/// Core election data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ElectionCore {
    /// Election title.
    pub title: String,
    /// Voting opens at this instant (inclusive).
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_date: DateTime<Utc>,
    /// Voting closes at this instant (inclusive).
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_date: DateTime<Utc>,
    /// Cached status, recomputed on every write. Advisory only: gating
    /// decisions always go through [`ElectionCore::phase_at`].
    pub status: ElectionStatus,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ElectionCore {
    /// Create a new election with a freshly computed status.
    pub fn new(title: String, start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Self {
        let status = phase(start_date, end_date, Utc::now()).into();
        Self {
            title,
            start_date,
            end_date,
            status,
            created_at: Utc::now(),
        }
    }

    /// Derive the phase of this election at the given instant.
    pub fn phase_at(&self, now: DateTime<Utc>) -> ElectionPhase {
        phase(self.start_date, self.end_date, now)
    }

    /// Recompute the cached status from the current time.
    pub fn refresh_status(&mut self) {
        self.status = self.phase_at(Utc::now()).into();
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use chrono::Duration;

    impl ElectionCore {
        pub fn current_example() -> Self {
            let start = Utc::now() - Duration::days(1);
            Self::new("General Election".to_string(), start, start + Duration::days(7))
        }

        pub fn future_example() -> Self {
            let start = Utc::now() + Duration::days(7);
            Self::new("Next Election".to_string(), start, start + Duration::days(7))
        }

        pub fn past_example() -> Self {
            let start = Utc::now() - Duration::days(14);
            Self::new("Last Election".to_string(), start, start + Duration::days(7))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_status_is_derived_from_the_clock() {
        assert_eq!(ElectionCore::current_example().status, ElectionStatus::Ongoing);
        assert_eq!(
            ElectionCore::future_example().status,
            ElectionStatus::Upcoming
        );
        assert_eq!(
            ElectionCore::past_example().status,
            ElectionStatus::Completed
        );
    }

    #[test]
    fn gating_ignores_the_stored_status() {
        // Simulate a stale cache: the stored status claims the election is
        // still upcoming, but the clock says it is open.
        let mut election = ElectionCore::current_example();
        election.status = ElectionStatus::Upcoming;
        assert_eq!(election.phase_at(Utc::now()), ElectionPhase::Active);

        // And the other way round: a stored "ongoing" must not keep a
        // finished election open.
        let mut election = ElectionCore::past_example();
        election.status = ElectionStatus::Ongoing;
        assert_eq!(election.phase_at(Utc::now()), ElectionPhase::Ended);
    }

    #[test]
    fn refresh_status_repairs_a_stale_cache() {
        let mut election = ElectionCore::past_example();
        election.status = ElectionStatus::Ongoing;
        election.refresh_status();
        assert_eq!(election.status, ElectionStatus::Completed);
    }
}
