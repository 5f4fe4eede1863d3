//! Builds contextual snippets around phrase match offsets.

/// Bytes of context kept on either side of a match.
const CONTEXT: usize = 40;

/// Extracts cleaned, human-readable windows of `content` around each
/// offset in `match_char_offsets`.
///
/// `query_len` is the byte length of the *raw* query string (not the
/// re-tokenized form) and sizes the snippet window together with
/// [`CONTEXT`]. Offsets are sorted first; overlapping windows are
/// coalesced by dropping the later one rather than merging the two —
/// the earlier window always wins. `\n`, `\r`, `\t`, and `;` are replaced
/// with spaces (`;` is the wire separator between snippets) and runs of
/// spaces are collapsed to one.
pub fn build_snippets(content: &str, query_len: usize, match_char_offsets: &[u64]) -> Vec<String> {
    if content.is_empty() || match_char_offsets.is_empty() {
        return Vec::new();
    }

    let bytes = content.as_bytes();
    let len = bytes.len();

    let mut offsets: Vec<u64> = match_char_offsets.to_vec();
    offsets.sort_unstable();

    let mut snippets = Vec::new();
    let mut last_end: usize = 0;

    for offset in offsets {
        // Offsets are unsigned (u64), so only the upper bound from the
        // spec's "pos < 0 or pos >= |C|" check can ever trigger here.
        let pos = offset as usize;
        if pos >= len {
            continue;
        }

        let start = pos.saturating_sub(CONTEXT);
        let end = (pos + query_len + CONTEXT).min(len);

        if start < last_end && !snippets.is_empty() {
            continue;
        }
        last_end = end;

        // `start`/`end` are byte offsets derived from `pos ± CONTEXT` and
        // are not guaranteed to land on a char boundary for non-ASCII
        // corpora (tokenization is ASCII-only per the data model, but
        // document text is not). Slice the raw bytes rather than `content`
        // itself to avoid panicking mid-codepoint, matching the original's
        // byte-oriented `std::string` snippet extraction.
        let window = String::from_utf8_lossy(&bytes[start..end]);
        snippets.push(clean(&window));
    }

    snippets
}

fn clean(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_space = false;
    for ch in raw.chars() {
        let ch = match ch {
            '\n' | '\r' | '\t' | ';' => ' ',
            other => other,
        };
        if ch == ' ' {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out
}
