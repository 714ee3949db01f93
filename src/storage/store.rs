use std::{
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::PathBuf,
};

use anyhow::Result;
use chrono::{DateTime, Utc};
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::warn;

use super::activity::Activity;

/// How far a record's `start_time` may be from the requested one and still
/// count as the same record. The log has no surrogate keys, so start times
/// are the only identity closed activities have.
pub const START_TIME_TOLERANCE_SECONDS: i64 = 1;

/// Durable, serially-accessed log of closed activities.
///
/// `append`/`load_all` are the tracker's hot path; `update_tags` and
/// `extend_last_real_end_time` are whole-log read-modify-writes issued by the
/// editor and the idle reconciliation.
pub trait ActivityStore {
    fn append(&self, activity: &Activity) -> impl Future<Output = Result<()>>;

    fn load_all(&self) -> impl Future<Output = Result<Vec<Activity>>> + Send;

    /// Replaces the tags of the first record whose start time lies within
    /// [START_TIME_TOLERANCE_SECONDS] of `start_time`. Returns whether a
    /// record matched.
    fn update_tags(
        &self,
        start_time: DateTime<Utc>,
        tags: &str,
    ) -> impl Future<Output = Result<bool>>;

    /// Extends the latest non-`Idle`, non-`Break` record to `new_end`,
    /// recomputing its duration. Returns false (a no-op) when no such record
    /// exists.
    fn extend_last_real_end_time(
        &self,
        new_end: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool>>;

    /// Drops every record. Used by `prodtrack clear`.
    fn clear(&self) -> impl Future<Output = Result<()>>;
}

impl<T: Deref> ActivityStore for T
where
    T::Target: ActivityStore,
{
    fn append(&self, activity: &Activity) -> impl Future<Output = Result<()>> {
        self.deref().append(activity)
    }

    fn load_all(&self) -> impl Future<Output = Result<Vec<Activity>>> + Send {
        self.deref().load_all()
    }

    fn update_tags(
        &self,
        start_time: DateTime<Utc>,
        tags: &str,
    ) -> impl Future<Output = Result<bool>> {
        self.deref().update_tags(start_time, tags)
    }

    fn extend_last_real_end_time(
        &self,
        new_end: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool>> {
        self.deref().extend_last_real_end_time(new_end)
    }

    fn clear(&self) -> impl Future<Output = Result<()>> {
        self.deref().clear()
    }
}

pub const ACTIVITY_LOG_NAME: &str = "activities.csv";
pub const CSV_HEADER: &str = "app_name,start_time,end_time,duration_seconds,tags";

/// The main realization of [ActivityStore]: a header-prefixed csv file,
/// guarded by advisory file locks so the daemon and the cli can touch it
/// concurrently.
pub struct CsvActivityStore {
    path: PathBuf,
}

impl CsvActivityStore {
    pub fn new(data_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self {
            path: data_dir.join(ACTIVITY_LOG_NAME),
        })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn open_log(&self) -> std::io::Result<File> {
        File::options()
            .write(true)
            .create(true)
            .read(true)
            .truncate(false)
            .open(&self.path)
            .await
    }

    fn parse_log(content: &str) -> Vec<Activity> {
        let mut activities = vec![];
        for line in content.lines() {
            let line = line.trim_end();
            if line.is_empty() || line == CSV_HEADER {
                continue;
            }
            match Activity::parse_csv_line(line) {
                Some(activity) => activities.push(activity),
                None => {
                    // Might happen after a shutdown cut a write short.
                    warn!("Skipping illegal activity row: {line}");
                }
            }
        }
        activities
    }

    async fn read_log(file: &mut File) -> Result<Vec<Activity>> {
        let mut content = String::new();
        file.read_to_string(&mut content).await?;
        Ok(Self::parse_log(&content))
    }

    async fn overwrite_log(file: &mut File, activities: &[Activity]) -> Result<()> {
        let mut buffer = String::from(CSV_HEADER);
        buffer.push('\n');
        for activity in activities {
            buffer.push_str(&activity.to_csv_line());
            buffer.push('\n');
        }

        file.seek(std::io::SeekFrom::Start(0)).await?;
        file.set_len(0).await?;
        file.write_all(buffer.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Runs a whole-log read-modify-write under a single exclusive lock.
    /// `apply` returns whether anything changed; the file is only rewritten
    /// when it did.
    async fn modify(
        &self,
        apply: impl FnOnce(&mut Vec<Activity>) -> bool,
    ) -> Result<bool> {
        let mut file = self.open_log().await?;
        file.lock_exclusive()?;
        let result = Self::modify_with_file(&mut file, apply).await;
        file.unlock_async().await?;
        result
    }

    async fn modify_with_file(
        file: &mut File,
        apply: impl FnOnce(&mut Vec<Activity>) -> bool,
    ) -> Result<bool> {
        let mut activities = Self::read_log(file).await?;
        if !apply(&mut activities) {
            return Ok(false);
        }
        Self::overwrite_log(file, &activities).await?;
        Ok(true)
    }
}

impl ActivityStore for CsvActivityStore {
    async fn append(&self, activity: &Activity) -> Result<()> {
        let mut file = self.open_log().await?;
        file.lock_exclusive()?;
        let result = Self::append_with_file(&mut file, activity).await;
        file.unlock_async().await?;
        result
    }

    async fn load_all(&self) -> Result<Vec<Activity>> {
        let file = match File::open(&self.path).await {
            Ok(file) => file,
            // A missing log is an empty log, never fatal.
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };
        file.lock_shared()?;
        let mut file = file;
        let result = Self::read_log(&mut file).await;
        file.unlock_async().await?;
        result
    }

    async fn update_tags(&self, start_time: DateTime<Utc>, tags: &str) -> Result<bool> {
        let tags = tags.trim().to_string();
        self.modify(move |activities| {
            let matched = activities.iter_mut().find(|a| {
                (a.start_time - start_time).num_seconds().abs() <= START_TIME_TOLERANCE_SECONDS
            });
            match matched {
                Some(activity) => {
                    activity.tags = tags;
                    true
                }
                None => false,
            }
        })
        .await
    }

    async fn extend_last_real_end_time(&self, new_end: DateTime<Utc>) -> Result<bool> {
        self.modify(move |activities| {
            match activities.iter_mut().rev().find(|a| a.is_real()) {
                Some(activity) => {
                    activity.set_end(new_end);
                    true
                }
                None => false,
            }
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.modify(|activities| {
            activities.clear();
            true
        })
        .await?;
        Ok(())
    }
}

impl CsvActivityStore {
    async fn append_with_file(file: &mut File, activity: &Activity) -> Result<()> {
        let position = file.seek(std::io::SeekFrom::End(0)).await?;

        let mut buffer = String::new();
        if position == 0 {
            buffer.push_str(CSV_HEADER);
            buffer.push('\n');
        } else if !Self::ends_with_newline(file, position).await? {
            // A shutdown may have cut the previous write short. Terminating
            // the partial row keeps this append parseable.
            buffer.push('\n');
        }
        buffer.push_str(&activity.to_csv_line());
        buffer.push('\n');

        file.write_all(buffer.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn ends_with_newline(file: &mut File, len: u64) -> Result<bool> {
        debug_assert!(len > 0);
        file.seek(std::io::SeekFrom::End(-1)).await?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last).await?;
        Ok(last[0] == b'\n')
    }
}
