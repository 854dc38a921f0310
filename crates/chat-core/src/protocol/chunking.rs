//! Word-aware splitting of user text into bounded parcels.
//!
//! Given the full text and a parcel limit `L`, the splitter walks the text
//! from the start:
//!
//! 1. If the remaining text is at most `L` characters it becomes the final
//!    parcel.
//! 2. Otherwise it tentatively takes `L` characters and shrinks the parcel
//!    one character at a time until the character just past the parcel is
//!    a space.
//! 3. If no space is found the parcel is hard-cut at exactly `L` characters,
//!    splitting a word.
//! 4. After emitting a parcel, a single space directly at the cut is
//!    consumed.  Any further spaces stay in the next parcel.
//!
//! Only a space sitting exactly at the cut is ever consumed.  A hard cut
//! never lands on a space (step 2 would have taken it), so after a hard cut
//! nothing is skipped, even when the following character is a space.

/// Splits `text` into parcels of at most `limit` characters.
///
/// Returns an empty vector for empty text.  `limit` must be non-zero; a zero
/// limit also yields an empty vector.
///
/// # Examples
///
/// ```rust
/// use chat_core::protocol::chunking::split_into_parcels;
///
/// let parcels = split_into_parcels("aaaa bbbb cccc", 9);
/// assert_eq!(parcels, vec!["aaaa bbbb", "cccc"]);
/// ```
pub fn split_into_parcels(text: &str, limit: usize) -> Vec<String> {
    if limit == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let mut parcels = Vec::with_capacity(total / limit + 1);
    let mut begin = 0;

    while begin < total {
        let len = if total - begin <= limit {
            total - begin
        } else {
            word_boundary_len(&chars[begin..], limit)
        };

        parcels.push(chars[begin..begin + len].iter().collect());
        begin += len;

        if chars.get(begin) == Some(&' ') {
            begin += 1;
        }
    }

    parcels
}

/// Length of the next parcel when more than `limit` characters remain.
///
/// `rest` is guaranteed to be longer than `limit`, so `rest[limit]` exists.
fn word_boundary_len(rest: &[char], limit: usize) -> usize {
    let mut len = limit;
    while len > 0 && rest[len] != ' ' {
        len -= 1;
    }
    if len == 0 {
        limit
    } else {
        len
    }
}
