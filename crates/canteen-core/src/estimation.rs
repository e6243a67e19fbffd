//! Preparation time estimation.
//!
//! Menu items carry free-form hints such as "20–25 mins". An order is only as
//! fast as its slowest dish, so the estimate is the largest upper bound across
//! all items plus a fixed buffer for packing and handoff.

use canteen_config::EstimationConfig;
use once_cell::sync::Lazy;
use regex::Regex;

/// Matches "20–25 mins", "20-25 min", "25 mins" anywhere in the hint.
static HINT_PATTERN: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"(?i)(\d+)\s*(?:[–-]\s*(\d+))?\s*min").expect("hint pattern is valid")
});

const MS_PER_MINUTE: u64 = 60_000;

/// Inclusive preparation time range in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepTimeRange {
	pub lo: u64,
	pub hi: u64,
}

/// Turns per-item hints into a single order duration.
#[derive(Debug, Clone)]
pub struct DurationEstimator {
	buffer_minutes: u64,
	default_range: PrepTimeRange,
	fallback_minutes: u64,
}

impl DurationEstimator {
	pub fn new(config: &EstimationConfig) -> Self {
		Self {
			buffer_minutes: config.buffer_minutes,
			default_range: PrepTimeRange {
				lo: config.default_min_minutes,
				hi: config.default_max_minutes,
			},
			fallback_minutes: config.fallback_minutes,
		}
	}

	/// Parses a hint, falling back to the default range when it has no
	/// recognizable "N min" form.
	pub fn parse_hint(&self, hint: &str) -> PrepTimeRange {
		HINT_PATTERN
			.captures(hint)
			.and_then(|caps| {
				let a: u64 = caps.get(1)?.as_str().parse().ok()?;
				let b: u64 = match caps.get(2) {
					Some(m) => m.as_str().parse().ok()?,
					None => a,
				};
				Some(PrepTimeRange {
					lo: a.min(b),
					hi: a.max(b),
				})
			})
			.unwrap_or(self.default_range)
	}

	/// Estimated minutes for an order, buffer included.
	pub fn estimate_minutes<'a, I>(&self, hints: I) -> u64
	where
		I: IntoIterator<Item = &'a str>,
	{
		let slowest = hints
			.into_iter()
			.map(|hint| self.parse_hint(hint).hi)
			.max()
			.unwrap_or(0);
		let minutes = if slowest == 0 {
			self.fallback_minutes
		} else {
			slowest
		};
		minutes.saturating_add(self.buffer_minutes)
	}

	/// Estimated duration in milliseconds, buffer included.
	pub fn estimate_ms<'a, I>(&self, hints: I) -> i64
	where
		I: IntoIterator<Item = &'a str>,
	{
		let ms = self
			.estimate_minutes(hints)
			.saturating_mul(MS_PER_MINUTE);
		i64::try_from(ms).unwrap_or(i64::MAX)
	}
}

impl Default for DurationEstimator {
	fn default() -> Self {
		Self::new(&EstimationConfig::default())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_hint_forms() {
		let estimator = DurationEstimator::default();
		assert_eq!(
			estimator.parse_hint("20–25 mins"),
			PrepTimeRange { lo: 20, hi: 25 }
		);
		assert_eq!(
			estimator.parse_hint("20-25 mins"),
			PrepTimeRange { lo: 20, hi: 25 }
		);
		assert_eq!(
			estimator.parse_hint("20 - 25 MIN"),
			PrepTimeRange { lo: 20, hi: 25 }
		);
		assert_eq!(
			estimator.parse_hint("25 min"),
			PrepTimeRange { lo: 25, hi: 25 }
		);
		assert_eq!(
			estimator.parse_hint("Veg • 30-20 mins"),
			PrepTimeRange { lo: 20, hi: 30 }
		);
	}

	#[test]
	fn test_unparseable_hint_defaults() {
		let estimator = DurationEstimator::default();
		for hint in ["", "soon", "25", "quick bite", "99999999999999999999999 mins"] {
			assert_eq!(
				estimator.parse_hint(hint),
				PrepTimeRange { lo: 15, hi: 20 },
				"hint {:?}",
				hint
			);
		}
	}

	#[test]
	fn test_unparseable_hint_stays_within_default_range() {
		let estimator = DurationEstimator::default();
		let ms = estimator.estimate_ms(["chef's special"]);
		assert!(ms >= (15 + 5) * 60_000);
		assert!(ms <= (20 + 5) * 60_000);
	}

	#[test]
	fn test_slowest_item_gates_order() {
		let estimator = DurationEstimator::default();
		assert_eq!(
			estimator.estimate_ms(["10-15 mins", "25-30 mins"]),
			(30 + 5) * 60_000
		);
		assert_eq!(estimator.estimate_ms(["5 mins", "5-10 mins"]), 900_000);
	}

	#[test]
	fn test_fallback_when_nothing_positive() {
		let estimator = DurationEstimator::default();
		assert_eq!(estimator.estimate_minutes(std::iter::empty()), 25);
		assert_eq!(estimator.estimate_minutes(["0 mins"]), 25);
	}

	#[test]
	fn test_configured_constants() {
		let estimator = DurationEstimator::new(&EstimationConfig {
			buffer_minutes: 2,
			default_min_minutes: 5,
			default_max_minutes: 8,
			fallback_minutes: 12,
			honor_estimated_ready_at: false,
		});
		assert_eq!(estimator.estimate_minutes(["mystery"]), 10);
		assert_eq!(estimator.estimate_minutes(["0 min"]), 14);
		assert_eq!(estimator.estimate_minutes(["3 mins"]), 5);
	}
}
