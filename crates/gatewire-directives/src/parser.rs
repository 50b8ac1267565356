use serde::{Deserialize, Serialize};

const CURRENT_MESSAGE_MARKER: &str = "[Current message - respond to this]";

/// Canonical directive keys. Aliases all normalize to one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DirectiveKey {
    Think,
    Verbose,
    Reasoning,
    Elevated,
    Model,
    Usage,
    Cost,
    Send,
    Activation,
    Queue,
    Status,
    Stop,
    Restart,
    New,
    Reset,
    Help,
    Commands,
}

impl DirectiveKey {
    /// Directives that take a single whitespace- or colon-separated argument.
    fn takes_argument(self) -> bool {
        matches!(
            self,
            DirectiveKey::Think
                | DirectiveKey::Verbose
                | DirectiveKey::Reasoning
                | DirectiveKey::Elevated
                | DirectiveKey::Model
                | DirectiveKey::Usage
                | DirectiveKey::Cost
                | DirectiveKey::Send
                | DirectiveKey::Activation
                | DirectiveKey::Queue
        )
    }

    fn from_alias(alias: &str) -> Option<Self> {
        Some(match alias.to_ascii_lowercase().as_str() {
            "think" | "t" | "thinking" => DirectiveKey::Think,
            "verbose" | "v" => DirectiveKey::Verbose,
            "reasoning" | "r" => DirectiveKey::Reasoning,
            "elevated" | "elev" => DirectiveKey::Elevated,
            "model" | "m" => DirectiveKey::Model,
            "usage" | "u" => DirectiveKey::Usage,
            "cost" => DirectiveKey::Cost,
            "send" => DirectiveKey::Send,
            "activation" | "act" => DirectiveKey::Activation,
            "queue" | "q" => DirectiveKey::Queue,
            "status" => DirectiveKey::Status,
            "stop" => DirectiveKey::Stop,
            "restart" => DirectiveKey::Restart,
            "new" => DirectiveKey::New,
            "reset" => DirectiveKey::Reset,
            "help" | "h" => DirectiveKey::Help,
            "commands" | "cmds" => DirectiveKey::Commands,
            _ => return None,
        })
    }
}

/// One recognized directive. `raw_level` is the literal argument text;
/// `value` is the normalized form, `None` when the argument didn't match
/// any recognized level for this key (or the key takes no argument).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub key: DirectiveKey,
    pub raw_level: Option<String>,
    pub value: Option<String>,
}

/// Extract directives from a raw inbound body, returning the body with
/// recognized directives stripped plus the ordered, deduped directive list.
///
/// Only the segment after a `[Current message - respond to this]` wrapper
/// marker (if present) is scanned; anything before it — typically prior
/// turns re-sent for context — passes through untouched.
pub fn parse_directives(raw_body: &str) -> (String, Vec<Directive>) {
    if let Some(marker_pos) = raw_body.find(CURRENT_MESSAGE_MARKER) {
        let split_at = marker_pos + CURRENT_MESSAGE_MARKER.len();
        let (prefix, scannable) = raw_body.split_at(split_at);
        let (stripped, directives) = scan(scannable);
        (format!("{prefix}{stripped}"), directives)
    } else {
        scan(raw_body)
    }
}

fn scan(text: &str) -> (String, Vec<Directive>) {
    // Bare "stop" (no leading slash), optionally preceded by a bracketed
    // timestamp prefix, is treated as an emergency abort — safety-critical
    // enough that requiring the slash would be a trap for channels that
    // strip leading punctuation (some SMS gateways do).
    let trimmed = strip_leading_timestamp(text.trim());
    if trimmed.eq_ignore_ascii_case("stop") {
        return (
            String::new(),
            vec![Directive {
                key: DirectiveKey::Stop,
                raw_level: None,
                value: None,
            }],
        );
    }

    let mut found: Vec<(usize, Directive)> = Vec::new();
    let mut removals: Vec<(usize, usize)> = Vec::new();

    let words = words_with_ranges(text);
    let mut i = 0;
    while i < words.len() {
        let (start, end, word) = words[i];
        if let Some(rest) = word.strip_prefix('/') {
            let (key_part, inline_arg) = match rest.split_once(':') {
                Some((k, a)) => (k, Some(a.to_string())),
                None => (rest, None),
            };
            if let Some(key) = DirectiveKey::from_alias(key_part) {
                let mut removal_end = end;
                let (raw_level, value) = if key.takes_argument() {
                    if let Some(arg) = inline_arg {
                        let v = normalize_level(key, &arg);
                        (Some(arg), v)
                    } else if i + 1 < words.len() && !words[i + 1].2.starts_with('/') {
                        let (_, next_end, next_word) = words[i + 1];
                        removal_end = next_end;
                        i += 1;
                        let v = normalize_level(key, next_word);
                        (Some(next_word.to_string()), v)
                    } else {
                        (None, None)
                    }
                } else {
                    (None, None)
                };

                found.push((
                    start,
                    Directive {
                        key,
                        raw_level,
                        value,
                    },
                ));
                removals.push((start, removal_end));
            }
            // Unknown /word is left in place — not a removal, not a directive.
        }
        i += 1;
    }

    // Last-wins per key, preserving first-appearance order among survivors.
    let mut order: Vec<DirectiveKey> = Vec::new();
    let mut by_key: std::collections::HashMap<DirectiveKey, Directive> =
        std::collections::HashMap::new();
    for (_, d) in &found {
        if !by_key.contains_key(&d.key) {
            order.push(d.key);
        }
        by_key.insert(d.key, d.clone());
    }
    let directives: Vec<Directive> = order
        .into_iter()
        .map(|k| by_key.remove(&k).expect("key present"))
        .collect();

    let stripped = remove_ranges(text, &removals);
    (stripped, directives)
}

fn normalize_level(key: DirectiveKey, raw: &str) -> Option<String> {
    let lower = raw.to_ascii_lowercase();
    let valid: &[&str] = match key {
        DirectiveKey::Think => &["minimal", "low", "medium", "high"],
        DirectiveKey::Verbose | DirectiveKey::Elevated | DirectiveKey::Usage | DirectiveKey::Cost => {
            &["on", "off"]
        }
        DirectiveKey::Reasoning => &["on", "off", "stream"],
        DirectiveKey::Send => &["allow", "deny"],
        DirectiveKey::Activation => &["mention", "always"],
        DirectiveKey::Model => return Some(raw.to_string()),
        DirectiveKey::Queue => return raw.parse::<u32>().ok().map(|n| n.to_string()),
        _ => return None,
    };
    if valid.contains(&lower.as_str()) {
        Some(lower)
    } else {
        None
    }
}

fn strip_leading_timestamp(s: &str) -> &str {
    if let Some(rest) = s.strip_prefix('[') {
        if let Some(close) = rest.find(']') {
            return rest[close + 1..].trim();
        }
    }
    s
}

/// Whitespace-delimited words with their byte ranges in `s`.
fn words_with_ranges(s: &str) -> Vec<(usize, usize, &str)> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in s.char_indices() {
        if c.is_whitespace() {
            if let Some(st) = start.take() {
                out.push((st, i, &s[st..i]));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(st) = start {
        out.push((st, s.len(), &s[st..]));
    }
    out
}

fn remove_ranges(s: &str, ranges: &[(usize, usize)]) -> String {
    if ranges.is_empty() {
        return s.to_string();
    }
    let mut sorted = ranges.to_vec();
    sorted.sort_by_key(|r| r.0);
    let mut out = String::with_capacity(s.len());
    let mut cursor = 0;
    for (start, end) in sorted {
        if start > cursor {
            out.push_str(&s[cursor..start]);
        }
        cursor = end.max(cursor);
    }
    if cursor < s.len() {
        out.push_str(&s[cursor..]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_stop_after_timestamp_is_recognized() {
        let (body, directives) = parse_directives("[Dec 5 10:00] stop");
        assert!(body.is_empty());
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].key, DirectiveKey::Stop);
    }

    #[test]
    fn directive_inside_context_wrapper_is_ignored() {
        let raw = "[Chat messages since your last reply - for context]\n\
                   Peter: /thinking high [2025-12-05T21:45:00.000Z]\n\n\
                   [Current message - respond to this]\n\
                   Give me the status";
        let (body, directives) = parse_directives(raw);
        assert!(directives.is_empty());
        assert!(body.contains("Give me the status"));
        assert!(body.contains("/thinking high"));
    }

    #[test]
    fn verbose_on_produces_patch_directive() {
        let (body, directives) = parse_directives("/verbose on");
        assert_eq!(body.trim(), "");
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].key, DirectiveKey::Verbose);
        assert_eq!(directives[0].value.as_deref(), Some("on"));
    }

    #[test]
    fn colon_separator_is_accepted() {
        let (_, directives) = parse_directives("/think:high please");
        assert_eq!(directives[0].value.as_deref(), Some("high"));
    }

    #[test]
    fn malformed_level_yields_null_value() {
        let (_, directives) = parse_directives("/think foo");
        assert_eq!(directives[0].raw_level.as_deref(), Some("foo"));
        assert_eq!(directives[0].value, None);
    }

    #[test]
    fn duplicate_directives_collapse_last_wins() {
        let (_, directives) = parse_directives("/think low some text /think high");
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].value.as_deref(), Some("high"));
    }

    #[test]
    fn unknown_slash_word_is_left_in_body() {
        let (body, directives) = parse_directives("check /frobnicate please");
        assert!(directives.is_empty());
        assert!(body.contains("/frobnicate"));
    }

    #[test]
    fn model_with_slash_in_value_round_trips() {
        let (_, directives) = parse_directives("/model openai/gpt-x");
        assert_eq!(directives[0].key, DirectiveKey::Model);
        assert_eq!(directives[0].value.as_deref(), Some("openai/gpt-x"));
    }

    #[test]
    fn empty_body_after_extraction_is_valid() {
        let (body, directives) = parse_directives("/stop");
        assert_eq!(body.trim(), "");
        assert_eq!(directives.len(), 1);
    }
}
