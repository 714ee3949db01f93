//! Out-of-band edits to the activity log: manual entries and tag
//! corrections. Neither touches the live open activity.

use anyhow::Result;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::storage::{activity::Activity, store::ActivityStore};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("activity name must not be empty")]
    EmptyName,
    #[error("start time must be before end time")]
    StartNotBeforeEnd,
}

/// Builds a manual activity record. Fails without touching the store when the
/// name is empty or the times are not an increasing pair.
pub fn manual_activity(
    name: &str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    tags: &str,
) -> Result<Activity, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if start_time >= end_time {
        return Err(ValidationError::StartNotBeforeEnd);
    }
    Ok(Activity {
        app_name: name.into(),
        start_time,
        end_time,
        duration_seconds: (end_time - start_time).num_seconds(),
        tags: tags.trim().to_string(),
    })
}

/// Validates and appends a manual entry in one step.
pub async fn add_manual_activity(
    store: &impl ActivityStore,
    name: &str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    tags: &str,
) -> Result<Activity> {
    let activity = manual_activity(name, start_time, end_time, tags)?;
    store.append(&activity).await?;
    Ok(activity)
}

/// Replaces the tags of the record identified by `start_time`. Returns
/// whether a record matched; an unmatched identifier is the caller's call to
/// surface, not an error.
pub async fn retag(
    store: &impl ActivityStore,
    start_time: DateTime<Utc>,
    tags: &str,
) -> Result<bool> {
    store.update_tags(start_time, tags).await
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::tempdir;

    use crate::storage::store::CsvActivityStore;

    use super::*;

    fn moment(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn rejects_empty_names() {
        assert_eq!(
            manual_activity("  ", moment(0), moment(10), ""),
            Err(ValidationError::EmptyName)
        );
    }

    #[test]
    fn rejects_inverted_and_zero_length_ranges() {
        assert_eq!(
            manual_activity("Reading", moment(10), moment(10), ""),
            Err(ValidationError::StartNotBeforeEnd)
        );
        assert_eq!(
            manual_activity("Reading", moment(20), moment(10), ""),
            Err(ValidationError::StartNotBeforeEnd)
        );
    }

    #[test]
    fn computes_duration_and_trims_inputs() {
        let activity = manual_activity(" Reading ", moment(0), moment(90), " books,focus ").unwrap();
        assert_eq!(activity.app_name.as_ref(), "Reading");
        assert_eq!(activity.duration_seconds, 90);
        assert_eq!(activity.tags, "books,focus");
    }

    #[tokio::test]
    async fn failed_validation_persists_nothing() -> Result<()> {
        let dir = tempdir()?;
        let store = CsvActivityStore::new(dir.path().to_path_buf())?;

        let result = add_manual_activity(&store, "", moment(0), moment(10), "").await;
        assert!(result.is_err());
        assert_eq!(store.load_all().await?, vec![]);
        Ok(())
    }

    #[tokio::test]
    async fn add_and_retag_flow() -> Result<()> {
        let dir = tempdir()?;
        let store = CsvActivityStore::new(dir.path().to_path_buf())?;

        add_manual_activity(&store, "Meeting", moment(0), moment(1800), "").await?;
        assert!(retag(&store, moment(0), "planning").await?);
        assert!(!retag(&store, moment(500), "planning").await?);

        let loaded = store.load_all().await?;
        assert_eq!(loaded[0].tags, "planning");
        Ok(())
    }
}
