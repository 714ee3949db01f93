//! The activity-session state machine. Decides when a run of classified
//! observations becomes a closed record, filters flapping and idle noise,
//! and flags idle returns that need reconciliation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::storage::activity::{Activity, OpenActivity, IDLE_NAME};

/// Idle runs at or below this length are sampling noise: the idle record is
/// dropped without persisting and no reconciliation prompt is raised.
const IDLE_NOISE_CUTOFF_SECONDS: i64 = 60;

/// An open activity shorter than this at shutdown is not worth persisting.
const SHUTDOWN_PERSIST_CUTOFF_SECONDS: i64 = 1;

/// What a single observation did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Same name, or paused. The open activity keeps accruing.
    None,
    /// A new activity opened without anything worth persisting: the first
    /// observation ever, a too-short activity treated as a rename, or an
    /// idle blip absorbed as noise.
    Opened,
    /// The previous activity closed for good; persist it.
    Closed(Activity),
    /// An idle period longer than the noise cutoff just ended. The caller
    /// must run the three-way reconciliation for the returned idle record;
    /// the post-idle activity is already open.
    IdleEnded(Activity),
}

/// Single-writer state machine over classified name events. At most one
/// activity is open at any instant; closed records come out in strictly
/// increasing start-time order and never overlap.
pub struct Session {
    current: Option<OpenActivity>,
    paused: bool,
    /// Minimum dwell time before a close is persisted; equals the poll
    /// interval, so one-sample flaps never become records.
    min_dwell: Duration,
}

impl Session {
    pub fn new(check_interval: std::time::Duration) -> Self {
        Self {
            current: None,
            paused: false,
            min_dwell: Duration::seconds(check_interval.as_secs() as i64),
        }
    }

    pub fn current(&self) -> Option<&OpenActivity> {
        self.current.as_ref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// While paused, observations are ignored entirely. The open activity's
    /// `start_time` is deliberately NOT reset on resume, so wall-clock time
    /// spent paused is attributed to whichever activity is open when the
    /// next real event arrives. Known quirk of the product, kept as-is.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn observe(&mut self, name: Arc<str>, now: DateTime<Utc>) -> Transition {
        if self.paused {
            return Transition::None;
        }

        let Some(current) = self.current.as_ref() else {
            self.current = Some(OpenActivity::start(name, now));
            return Transition::Opened;
        };

        if current.app_name.as_ref() == IDLE_NAME && name.as_ref() != IDLE_NAME {
            let idle = current.close(now);
            self.current = Some(OpenActivity::start(name, now));
            return if idle.duration() > Duration::seconds(IDLE_NOISE_CUTOFF_SECONDS) {
                Transition::IdleEnded(idle)
            } else {
                // Short idle blip: the record is discarded and the gap is
                // absorbed into the new session's timeline.
                Transition::Opened
            };
        }

        if name == current.app_name {
            return Transition::None;
        }

        let closed = (current.elapsed(now) > self.min_dwell).then(|| current.close(now));
        self.current = Some(OpenActivity::start(name, now));
        match closed {
            Some(activity) => Transition::Closed(activity),
            // Too short to count: a rename, not a real session.
            None => Transition::Opened,
        }
    }

    /// Shutdown rule: an open, unpaused activity longer than one second is
    /// closed and handed back for persisting.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Option<Activity> {
        if self.paused {
            return None;
        }
        let current = self.current.take()?;
        (current.elapsed(now) > Duration::seconds(SHUTDOWN_PERSIST_CUTOFF_SECONDS))
            .then(|| current.close(now))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn moment(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn session(interval_seconds: u64) -> Session {
        Session::new(std::time::Duration::from_secs(interval_seconds))
    }

    #[test]
    fn first_event_opens_without_closing() {
        let mut session = session(3);
        assert_eq!(session.observe("A".into(), moment(0)), Transition::Opened);
        let current = session.current().unwrap();
        assert_eq!(current.app_name.as_ref(), "A");
        assert_eq!(current.start_time, moment(0));
    }

    #[test]
    fn repeat_observations_keep_the_activity_growing() {
        let mut session = session(3);
        session.observe("A".into(), moment(0));
        assert_eq!(session.observe("A".into(), moment(2)), Transition::None);
        assert_eq!(session.current().unwrap().start_time, moment(0));
    }

    #[test]
    fn name_change_after_dwell_closes_one_record() {
        // Events A(t=0), A(t=2), B(t=10) with a 3 second interval.
        let mut session = session(3);
        session.observe("A".into(), moment(0));
        session.observe("A".into(), moment(2));
        let transition = session.observe("B".into(), moment(10));

        let Transition::Closed(activity) = transition else {
            panic!("expected a close, got {transition:?}");
        };
        assert_eq!(activity.app_name.as_ref(), "A");
        assert_eq!(activity.start_time, moment(0));
        assert_eq!(activity.end_time, moment(10));
        assert_eq!(activity.duration_seconds, 10);

        let current = session.current().unwrap();
        assert_eq!(current.app_name.as_ref(), "B");
        assert_eq!(current.start_time, moment(10));
    }

    #[test]
    fn dwell_filter_is_strictly_greater_than() {
        // Exactly the interval: dropped as a rename.
        let mut session = session(3);
        session.observe("A".into(), moment(0));
        assert_eq!(session.observe("B".into(), moment(3)), Transition::Opened);

        // One second past the interval: persisted.
        let mut session = self::session(3);
        session.observe("A".into(), moment(0));
        assert!(matches!(
            session.observe("B".into(), moment(4)),
            Transition::Closed(_)
        ));
    }

    #[test]
    fn idle_run_of_exactly_sixty_seconds_is_noise() {
        let mut session = session(3);
        session.observe("A".into(), moment(0));
        session.observe(IDLE_NAME.into(), moment(10));
        let transition = session.observe("B".into(), moment(70));

        assert_eq!(transition, Transition::Opened);
        assert_eq!(session.current().unwrap().start_time, moment(70));
    }

    #[test]
    fn idle_run_past_sixty_seconds_needs_reconciliation() {
        let mut session = session(3);
        session.observe("A".into(), moment(0));
        session.observe(IDLE_NAME.into(), moment(10));
        let transition = session.observe("B".into(), moment(71));

        let Transition::IdleEnded(idle) = transition else {
            panic!("expected an idle end, got {transition:?}");
        };
        assert_eq!(idle.app_name.as_ref(), IDLE_NAME);
        assert_eq!(idle.start_time, moment(10));
        assert_eq!(idle.end_time, moment(71));
        assert_eq!(idle.duration_seconds, 61);
        // The post-idle activity is already open.
        assert_eq!(session.current().unwrap().app_name.as_ref(), "B");
    }

    #[test]
    fn switch_into_idle_closes_the_previous_activity_normally() {
        let mut session = session(3);
        session.observe("A".into(), moment(0));
        let transition = session.observe(IDLE_NAME.into(), moment(10));
        assert!(matches!(transition, Transition::Closed(a) if a.app_name.as_ref() == "A"));
    }

    #[test]
    fn closed_records_never_overlap() {
        let mut session = session(1);
        let names = ["A", "B", "C", "D"];
        let mut closed = vec![];
        for (i, name) in names.iter().enumerate() {
            match session.observe((*name).into(), moment(i as i64 * 5)) {
                Transition::Closed(activity) => closed.push(activity),
                _ => {}
            }
        }
        for pair in closed.windows(2) {
            assert!(pair[0].end_time <= pair[1].start_time);
            assert!(pair[0].start_time < pair[1].start_time);
        }
        for activity in &closed {
            assert_eq!(
                activity.duration_seconds,
                (activity.end_time - activity.start_time).num_seconds()
            );
        }
    }

    #[test]
    fn paused_sessions_ignore_observations() {
        let mut session = session(3);
        session.observe("A".into(), moment(0));
        session.set_paused(true);
        assert_eq!(session.observe("B".into(), moment(10)), Transition::None);
        assert_eq!(session.current().unwrap().app_name.as_ref(), "A");
    }

    #[test]
    fn resume_keeps_the_stale_start_time() {
        let mut session = session(3);
        session.observe("A".into(), moment(0));
        session.set_paused(true);
        session.observe("B".into(), moment(100));
        session.set_paused(false);

        // The paused wall-clock time lands on A.
        let Transition::Closed(activity) = session.observe("B".into(), moment(200)) else {
            panic!("expected a close");
        };
        assert_eq!(activity.app_name.as_ref(), "A");
        assert_eq!(activity.duration_seconds, 200);
    }

    #[test]
    fn finish_persists_only_long_enough_unpaused_activities() {
        let mut session = session(3);
        session.observe("A".into(), moment(0));
        let closed = session.finish(moment(5)).unwrap();
        assert_eq!(closed.app_name.as_ref(), "A");
        assert_eq!(closed.duration_seconds, 5);
        assert!(session.current().is_none());

        // Exactly one second: dropped.
        let mut session = self::session(3);
        session.observe("A".into(), moment(0));
        assert_eq!(session.finish(moment(1)), None);

        // Paused: left alone.
        let mut session = self::session(3);
        session.observe("A".into(), moment(0));
        session.set_paused(true);
        assert_eq!(session.finish(moment(100)), None);
    }

    #[test]
    fn finish_on_an_empty_session_is_a_noop() {
        let mut session = session(3);
        assert_eq!(session.finish(moment(10)), None);
    }
}
