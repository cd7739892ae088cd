
/// Returns true if `c` may appear in an index key.
fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Normalize a raw agent identifier into a safe index key.
///
/// Every character outside `[A-Za-z0-9_]` is stripped. Distinct raw ids can
/// collapse onto the same key (`"rider-1"` and `"rider1"`); key safety is
/// preferred over preserving identity exactly.
///
/// Normalization is idempotent: normalizing a key returns it unchanged.
///
/// # Examples
///
/// ```
/// use geotrack::identity::normalize_agent_id;
///
/// assert_eq!(normalize_agent_id("rider-001"), "rider001");
/// assert_eq!(normalize_agent_id("\"trj_42\""), "trj_42");
/// assert_eq!(normalize_agent_id("trj_42"), "trj_42");
/// ```
pub fn normalize_agent_id(raw: &str) -> String {
    raw.chars().filter(|&c| is_key_char(c)).collect()
}
