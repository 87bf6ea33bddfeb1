use chrono::{DateTime, Duration, Utc};
use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Source of "now" for every timestamp the data-access layer writes.
pub trait Clock: Debug + Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

pub type SharedClock = Arc<dyn Clock>;

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// Manually driven clock. Clones share the same instant, so a test can keep
/// one handle and advance the time every DAO sees.
#[derive(Debug, Clone)]
pub struct MockClock {
	micros: Arc<AtomicI64>,
}

impl MockClock {
	pub fn new(start: DateTime<Utc>) -> Self {
		MockClock{ micros: Arc::new(AtomicI64::new(start.timestamp_micros())) }
	}

	pub fn advance(&self, by: Duration) {
		let step = by.num_microseconds().unwrap_or(i64::MAX);
		self.micros.fetch_add(step, Ordering::SeqCst);
	}

	pub fn set(&self, to: DateTime<Utc>) {
		self.micros.store(to.timestamp_micros(), Ordering::SeqCst);
	}
}

impl Default for MockClock {
	fn default() -> Self {
		MockClock::new(Utc::now())
	}
}

impl Clock for MockClock {
	fn now(&self) -> DateTime<Utc> {
		from_micros(self.micros.load(Ordering::SeqCst))
	}
}

// timestamps live in the store as INTEGER microseconds since the epoch
pub fn to_micros(time: DateTime<Utc>) -> i64 {
	time.timestamp_micros()
}

pub fn from_micros(micros: i64) -> DateTime<Utc> {
	let secs = micros.div_euclid(1_000_000);
	let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
	DateTime::from_timestamp(secs, nanos).unwrap_or_default()
}
