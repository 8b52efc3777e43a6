//! Display name sanitization and color assignment.

use uuid::Uuid;

/// Avatar colors assigned to display names.
const PALETTE: &[&str] = &[
    "#5865F2", "#EB459E", "#F2A900", "#3BA55D", "#ED4245", "#747F8D",
];

/// Whether a character may appear in a display name.
pub fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Strip disallowed characters and truncate to `max_chars`.
///
/// Falls back to a generated guest name when nothing usable remains.
pub fn sanitize_name(requested: &str, max_chars: usize) -> String {
    let name: String = requested
        .chars()
        .filter(|c| is_name_char(*c))
        .take(max_chars)
        .collect();

    if name.is_empty() {
        guest_name(max_chars)
    } else {
        name
    }
}

/// `guest-` followed by six hex characters.
pub fn guest_name(max_chars: usize) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("guest-{}", &hex[..6]).chars().take(max_chars).collect()
}

/// `base` with a numeric suffix, truncating the base so the result fits.
pub fn with_suffix(base: &str, suffix: u32, max_chars: usize) -> String {
    let suffix = suffix.to_string();
    let keep = max_chars.saturating_sub(suffix.len());
    let mut name: String = base.chars().take(keep).collect();
    name.push_str(&suffix);
    name
}

/// Deterministic palette color for a display name (FNV-1a).
pub fn color_for(name: &str) -> &'static str {
    let hash = name.bytes().fold(0x811c_9dc5_u32, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193)
    });
    PALETTE[hash as usize % PALETTE.len()]
}
