//! String formatting utilities.
//!
//! Provides helpers for shortening ids in log lines and rendering the
//! shopper-facing order number.

/// Truncates an id for display purposes.
///
/// Shows only the first 12 characters followed by ".." for longer strings.
/// Works on characters, so ids containing multi-byte text never split a
/// code point.
pub fn truncate_id(id: &str) -> String {
	const SHOWN: usize = 12;
	if id.chars().count() <= SHOWN {
		id.to_string()
	} else {
		let head: String = id.chars().take(SHOWN).collect();
		format!("{}..", head)
	}
}

/// Formats an order number zero-padded to four digits, e.g. `#0042`.
pub fn format_order_number(number: u64) -> String {
	format!("#{:04}", number)
}
