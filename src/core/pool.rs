// ThreadSleuth - core/pool.rs
//
// Thread pool name derivation. Pure function, no state.

/// Derive the logical pool name from a raw thread name.
///
/// A name belongs to a pool when it ends in `-<digits>`; the pool is
/// everything before that suffix. The suffix must be at the very end, so
/// names such as `HttpClient-1-SelectorManager` are not truncated.
pub fn pool_of(name: &str) -> Option<String> {
    let (prefix, suffix) = name.rsplit_once('-')?;
    if prefix.is_empty() || suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(prefix.to_string())
}
