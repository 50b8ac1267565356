use crate::text::chunk_text;

/// A fenced code block that is still open at the end of the scanned text,
/// identified by its opening line (e.g. ` ```js `).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFence {
    pub opener: String,
}

/// Scan `text` line by line and report the fence left open at the end, if
/// any. A chunk with a `None` result here has balanced fences.
pub fn parse_fence_spans(text: &str) -> Option<OpenFence> {
    let mut open: Option<String> = None;
    for line in text.lines() {
        let trimmed = line.trim_start();
        match &open {
            Some(opener) => {
                if trimmed.trim_end() == fence_marker(opener) {
                    open = None;
                }
            }
            None => {
                if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                    open = Some(trimmed.to_string());
                }
            }
        }
    }
    open.map(|opener| OpenFence { opener })
}

fn fence_marker(opener: &str) -> &'static str {
    if opener.starts_with("```") {
        "```"
    } else {
        "~~~"
    }
}

/// Split `text` into chunks of at most `limit` bytes (and, if `max_lines` is
/// set, at most that many lines), keeping markdown fenced code blocks
/// balanced: a chunk that would otherwise end mid-fence is closed with the
/// matching fence marker, and the next chunk reopens with the same fence
/// opener.
pub fn chunk_markdown_text(text: &str, limit: usize, max_lines: Option<usize>) -> Vec<String> {
    if parse_fence_spans(text).is_none() && text.len() <= limit && within_line_budget(text, max_lines) {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_lines = 0usize;
    let mut open_fence: Option<String> = None;

    let mut lines = text.split_inclusive('\n').peekable();
    while let Some(line) = lines.next() {
        let would_len = current.len() + line.len();
        let would_lines = current_lines + 1;
        let over_limit = would_len > limit;
        let over_lines = max_lines.is_some_and(|n| would_lines > n);

        if (over_limit || over_lines) && !current.is_empty() {
            if let Some(opener) = &open_fence {
                let closer = fence_marker(opener);
                if current.len() + closer.len() + 1 <= limit {
                    current.push_str(closer);
                    current.push('\n');
                } else {
                    // no room even for the closer; hard-break what we have.
                }
            }
            chunks.push(std::mem::take(&mut current));
            current_lines = 0;
            if let Some(opener) = &open_fence {
                current.push_str(opener);
                if !opener.ends_with('\n') {
                    current.push('\n');
                }
                current_lines += 1;
            }
        }

        let trimmed = line.trim_end_matches('\n');
        match &open_fence {
            Some(opener) => {
                if trimmed.trim_end() == fence_marker(opener) {
                    open_fence = None;
                }
            }
            None => {
                let t = trimmed.trim_start();
                if t.starts_with("```") || t.starts_with("~~~") {
                    open_fence = Some(t.to_string());
                }
            }
        }

        if current.len() + line.len() > limit && current.is_empty() {
            // a single line longer than the whole limit: hard-split it
            // through the plain chunker and flush each piece directly.
            for piece in chunk_text(line, limit) {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                    current_lines = 0;
                }
                current = piece;
            }
            current_lines += 1;
            continue;
        }

        current.push_str(line);
        current_lines += 1;
    }

    if let Some(opener) = &open_fence {
        // text ended with a genuinely unterminated fence; close it so every
        // returned chunk keeps balanced fences.
        let closer = fence_marker(opener);
        if current.len() + closer.len() + 1 > limit {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(closer);
        current.push('\n');
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

fn within_line_budget(text: &str, max_lines: Option<usize>) -> bool {
    match max_lines {
        Some(n) => text.lines().count() <= n,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_without_fences_is_untouched() {
        let chunks = chunk_markdown_text("hello world", 1000, None);
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn balanced_fence_round_trips_when_it_fits() {
        let text = "before\n```js\nconsole.log(1);\n```\nafter";
        let chunks = chunk_markdown_text(text, 1000, None);
        assert_eq!(chunks.len(), 1);
        assert!(parse_fence_spans(&chunks[0]).is_none());
    }

    #[test]
    fn long_fenced_block_splits_with_balanced_fences() {
        let body = "console.log(0);\n".repeat(30);
        let text = format!("Here is code:\n\n```js\n{body}```\nDone.");
        let chunks = chunk_markdown_text(&text, 200, Some(10));
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(parse_fence_spans(c).is_none(), "unbalanced chunk: {c:?}");
            assert!(c.len() <= 200 || c.lines().count() <= 1);
        }
        assert!(chunks[0].trim_start().starts_with("Here is code:") || chunks[0].contains("```js"));
        assert!(chunks.last().unwrap().contains("Done."));
    }

    #[test]
    fn discord_max_lines_is_enforced_between_fence_boundaries() {
        let body = "console.log(0);\n".repeat(30);
        let text = format!("```js\n{body}```");
        let chunks = chunk_markdown_text(&text, 4000, Some(10));
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(parse_fence_spans(c).is_none());
        }
    }
}
