//! Reply chunking for the chat transport's per-message limit.
//!
//! Replies longer than the limit are cut into near-equal consecutive
//! windows rather than one full window plus a short tail, so no piece
//! looks truncated mid-thought. Concatenating the pieces in order
//! reproduces the reply exactly.

/// Piece delivered when the backend produced an empty reply. A business
/// rule, not a transport artifact: the user always receives something.
pub const NO_ANSWER_MARKER: &str = "No answer found.";

/// Split a reply into ordered pieces of at most `limit` characters.
///
/// Empty input yields exactly one marker piece. Input within the limit
/// is passed through as a single piece. Longer input is cut into
/// `ceil(len / limit)` windows of `floor(len / n)` characters, the
/// final window absorbing the remainder. No emitted piece is empty.
pub fn split_reply(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let total = text.chars().count();

    if total == 0 {
        return vec![NO_ANSWER_MARKER.to_string()];
    }
    if total <= limit {
        return vec![text.to_string()];
    }

    let count = total.div_ceil(limit);
    let size = total / count;
    let chars: Vec<char> = text.chars().collect();

    let mut pieces = Vec::with_capacity(count);
    for i in 0..count {
        let start = i * size;
        let end = if i == count - 1 { total } else { (i + 1) * size };
        if start >= end {
            continue; // never emit an empty piece
        }
        pieces.push(chars[start..end].iter().collect());
    }
    pieces
}
