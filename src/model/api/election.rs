use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::{candidate::CandidateResponse, id::ApiId},
    common::election::ElectionStatus,
    db::{
        candidate::Candidate,
        election::{Election, ElectionCore, NewElection},
    },
};

/// Serde helpers that accept either an RFC 3339 timestamp with an offset
/// (normalised to UTC) or a naive timestamp (assumed to already be UTC —
/// never reinterpreted as local time).
pub mod utc_or_naive {
    use super::*;
    use serde::{de, Deserializer, Serializer};

    pub fn parse(s: &str) -> chrono::format::ParseResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| {
                s.parse::<NaiveDateTime>()
                    .map(|naive| Utc.from_utc_datetime(&naive))
            })
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(de::Error::custom)
    }

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&dt.to_rfc3339())
    }

    pub mod option {
        use super::*;

        pub fn deserialize<'de, D>(
            deserializer: D,
        ) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw = Option::<String>::deserialize(deserializer)?;
            raw.as_deref().map(parse).transpose().map_err(de::Error::custom)
        }

        pub fn serialize<S>(
            dt: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> std::result::Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match dt {
                Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
                None => serializer.serialize_none(),
            }
        }
    }
}

/// An election specification, as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub title: String,
    #[serde(alias = "startDate", with = "utc_or_naive")]
    pub start_date: DateTime<Utc>,
    #[serde(alias = "endDate", with = "utc_or_naive")]
    pub end_date: DateTime<Utc>,
}

impl ElectionSpec {
    /// Validate and convert into an election record with a freshly
    /// computed status.
    pub fn into_new_election(self) -> Result<NewElection> {
        validate_dates(self.start_date, self.end_date)?;
        Ok(ElectionCore::new(self.title, self.start_date, self.end_date))
    }
}

/// A partial election update; only the provided fields are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElectionUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "startDate", with = "utc_or_naive::option")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, alias = "endDate", with = "utc_or_naive::option")]
    pub end_date: Option<DateTime<Utc>>,
}

impl ElectionUpdate {
    /// Apply this update to an election, revalidating the merged date
    /// bounds and recomputing the cached status.
    pub fn apply_to(self, election: &mut ElectionCore) -> Result<()> {
        if let Some(title) = self.title {
            election.title = title;
        }
        if let Some(start_date) = self.start_date {
            election.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            election.end_date = end_date;
        }
        validate_dates(election.start_date, election.end_date)?;
        election.refresh_status();
        Ok(())
    }
}

/// An election must start before it ends.
fn validate_dates(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if start >= end {
        return Err(Error::bad_request(
            "Election start date must be before its end date",
        ));
    }
    Ok(())
}

/// The public view of an election, with its current (freshly recomputed)
/// status and candidates.
#[derive(Debug, Serialize, Deserialize)]
pub struct ElectionResponse {
    pub id: ApiId,
    pub title: String,
    #[serde(with = "utc_or_naive")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "utc_or_naive")]
    pub end_date: DateTime<Utc>,
    pub status: ElectionStatus,
    pub candidates: Vec<CandidateResponse>,
}

impl ElectionResponse {
    /// Build a response, deriving the status from the clock rather than
    /// echoing the stored value.
    pub fn new(election: Election, candidates: Vec<Candidate>, now: DateTime<Utc>) -> Self {
        let status = election.phase_at(now).into();
        Self {
            id: election.id.into(),
            title: election.election.title,
            start_date: election.election.start_date,
            end_date: election.election.end_date,
            status,
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use rocket::serde::json::serde_json;

    #[test]
    fn naive_timestamps_are_taken_as_utc() {
        let spec: ElectionSpec = serde_json::from_value(serde_json::json!({
            "title": "General Election",
            "start_date": "2026-09-01T08:00:00",
            "end_date": "2026-09-02T18:00:00",
        }))
        .unwrap();
        assert_eq!(spec.start_date, Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap());
        assert_eq!(spec.end_date, Utc.with_ymd_and_hms(2026, 9, 2, 18, 0, 0).unwrap());
    }

    #[test]
    fn offset_timestamps_are_normalised_to_utc() {
        let spec: ElectionSpec = serde_json::from_value(serde_json::json!({
            "title": "General Election",
            "startDate": "2026-09-01T09:00:00+01:00",
            "endDate": "2026-09-02T18:00:00Z",
        }))
        .unwrap();
        assert_eq!(spec.start_date, Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap());
    }

    #[test]
    fn start_must_precede_end() {
        let start = Utc::now();
        let backwards = ElectionSpec {
            title: "Backwards".to_string(),
            start_date: start,
            end_date: start - Duration::hours(1),
        };
        assert!(matches!(
            backwards.into_new_election(),
            Err(Error::BadRequest(_))
        ));

        let degenerate = ElectionSpec {
            title: "Degenerate".to_string(),
            start_date: start,
            end_date: start,
        };
        assert!(degenerate.into_new_election().is_err());
    }

    #[test]
    fn update_revalidates_merged_dates() {
        let mut election = ElectionCore::current_example();

        // Moving the end date before the existing start date must fail.
        let update = ElectionUpdate {
            end_date: Some(election.start_date - Duration::hours(1)),
            ..ElectionUpdate::default()
        };
        assert!(update.apply_to(&mut election).is_err());
    }

    #[test]
    fn update_applies_partial_fields_and_refreshes_status() {
        let mut election = ElectionCore::current_example();
        let original_start = election.start_date;

        // Push the whole election into the future.
        let update = ElectionUpdate {
            title: Some("Rescheduled".to_string()),
            start_date: Some(Utc::now() + Duration::days(3)),
            end_date: Some(Utc::now() + Duration::days(10)),
        };
        update.apply_to(&mut election).unwrap();

        assert_eq!(election.title, "Rescheduled");
        assert_ne!(election.start_date, original_start);
        assert_eq!(election.status, ElectionStatus::Upcoming);
    }
}
