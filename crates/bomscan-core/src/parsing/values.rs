/// Quantity used whenever a row carries none, or an implausible one.
pub const DEFAULT_QUANTITY: u32 = 1;

/// Parse a run of digits as a part quantity.
///
/// Handles:
/// - "6" -> 6
/// - "0" -> 0 (an explicit zero is kept)
/// - "1500" with `max_quantity` 1000 -> 1 (transcription error)
/// - digit runs too long for u32 -> 1
/// - anything that is not purely digits -> None
pub fn parse_quantity(s: &str, max_quantity: u32) -> Option<u32> {
    let s = s.trim();
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    match s.parse::<u32>() {
        Ok(q) if q <= max_quantity => Some(q),
        _ => Some(DEFAULT_QUANTITY),
    }
}

/// Whether a token is a bare 1-3 digit number.
pub fn is_short_number(s: &str) -> bool {
    (1..=3).contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit())
}
