//! In-place rewriting of playlist URI lines.

/// Rewrite the URI lines of an M3U8 playlist, leaving every other line
/// (tags, comments, blank lines, line endings) byte-for-byte intact.
///
/// `f` receives each URI with surrounding whitespace trimmed and returns the
/// replacement, or `None` to keep the line as it is.
pub fn rewrite_segment_uris(input: &str, mut f: impl FnMut(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / 2);

    for line in input.split_inclusive('\n') {
        let content = line.trim_end_matches(['\r', '\n']);
        let ending = &line[content.len()..];
        let uri = content.trim();

        if uri.is_empty() || uri.starts_with('#') {
            out.push_str(line);
            continue;
        }

        match f(uri) {
            Some(replacement) => {
                out.push_str(&replacement);
                out.push_str(ending);
            }
            None => out.push_str(line),
        }
    }

    out
}
