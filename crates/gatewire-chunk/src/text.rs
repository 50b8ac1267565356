/// Split `text` into chunks of at most `limit` bytes, preferring to break on
/// a newline, then whitespace, within the window. A break point is only
/// taken if it falls outside an unbalanced `(` `)` span; otherwise the
/// search keeps looking, falling all the way back to a hard break at
/// exactly `limit` bytes as a last resort.
pub fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    if limit == 0 || text.len() <= limit {
        return vec![text.to_string()];
    }

    let depths = paren_depths(text);
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while text.len() - start > limit {
        let window_end = start + limit;
        let window = &text[start..window_end];

        let split_at = best_break(window, '\n', start, &depths)
            .or_else(|| best_break(window, ' ', start, &depths))
            .unwrap_or(window_end);

        chunks.push(text[start..split_at].to_string());
        start = split_at;
        let rest = &text[start..];
        start += rest.len() - rest.trim_start().len();
    }

    if start < text.len() {
        chunks.push(text[start..].to_string());
    }

    chunks
}

/// For each char boundary in `s`, the running `(`/`)` depth of everything
/// before that boundary. Used to avoid splitting inside an unbalanced span.
fn paren_depths(s: &str) -> Vec<(usize, i32)> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        out.push((i, depth));
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
    }
    out.push((s.len(), depth));
    out
}

fn depth_before(depths: &[(usize, i32)], pos: usize) -> i32 {
    match depths.binary_search_by_key(&pos, |&(o, _)| o) {
        Ok(i) => depths[i].1,
        Err(0) => 0,
        Err(i) => depths[i - 1].1,
    }
}

/// Rightmost occurrence of `needle` inside `window` whose absolute position
/// (window starts at `offset`) sits at paren depth zero.
fn best_break(window: &str, needle: char, offset: usize, depths: &[(usize, i32)]) -> Option<usize> {
    window
        .match_indices(needle)
        .rev()
        .map(|(idx, _)| offset + idx)
        .find(|&pos| depth_before(depths, pos) == 0)
}
