use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

/// Time source shared by the detection pipeline, the tracker and the scheduler.
///
/// `instant` drives cooldowns and gesture durations, `now` stamps events and
/// decides calendar days.
pub trait Clock: Send + Sync {
    fn instant(&self) -> Instant;

    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&Local).date_naive()
    }
}

pub type SharedClock = Arc<dyn Clock>;

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn instant(&self) -> Instant {
        Instant::now()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for tests and replays. Both time bases move together on
/// `advance`; `set_now` only jumps the wall clock.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Debug)]
struct ManualState {
    elapsed: Duration,
    wall: DateTime<Utc>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            origin: Instant::now(),
            inner: Arc::new(Mutex::new(ManualState {
                elapsed: Duration::ZERO,
                wall: start,
            })),
        }
    }

    /// Starts at local noon of `date`, far from any day boundary.
    pub fn at_local_noon(date: NaiveDate) -> Self {
        let (start, _) = local_day_bounds(date);
        Self::new(start + chrono::Duration::hours(12))
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.lock();
        guard.elapsed += by;
        guard.wall += chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
    }

    pub fn advance_secs(&self, secs: f64) {
        self.advance(Duration::from_secs_f64(secs));
    }

    pub fn set_now(&self, wall: DateTime<Utc>) {
        self.lock().wall = wall;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Clock for ManualClock {
    fn instant(&self) -> Instant {
        self.origin + self.lock().elapsed
    }

    fn now(&self) -> DateTime<Utc> {
        self.lock().wall
    }
}

/// First and last representable instants of a local calendar day, in UTC.
pub fn local_day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_midnight(date);
    let next = date
        .succ_opt()
        .map(local_midnight)
        .unwrap_or_else(|| start + chrono::Duration::days(1));
    (start, next - chrono::Duration::microseconds(1))
}

fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(chrono::NaiveTime::MIN);
    match Local.from_local_datetime(&naive).earliest() {
        Some(local) => local.with_timezone(&Utc),
        // Midnight falls inside a DST gap.
        None => Utc.from_utc_datetime(&naive),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_both_time_bases() {
        let clock = ManualClock::new(Utc::now());
        let start_instant = clock.instant();
        let start_wall = clock.now();

        clock.advance_secs(1.5);

        assert_eq!(clock.instant() - start_instant, Duration::from_millis(1500));
        assert_eq!(
            (clock.now() - start_wall).num_milliseconds(),
            1500
        );
    }

    #[test]
    fn day_bounds_cover_the_whole_day() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        let (start, end) = local_day_bounds(date);

        assert!(start < end);
        assert_eq!(start.with_timezone(&Local).date_naive(), date);
        assert_eq!(end.with_timezone(&Local).date_naive(), date);
        assert_eq!(
            (end + chrono::Duration::microseconds(1))
                .with_timezone(&Local)
                .date_naive(),
            date.succ_opt().unwrap()
        );
    }

    #[test]
    fn noon_clock_reports_its_date() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let clock = ManualClock::at_local_noon(date);
        assert_eq!(clock.today(), date);
    }
}
