/// Extracts a `[[reply-to:<id>]]` tag the agent may have emitted to pin its
/// reply to a specific inbound message, returning the tag-stripped text and
/// the id. Absent when the tag isn't present.
pub fn extract_reply_to(text: &str) -> (String, Option<String>) {
    const PREFIX: &str = "[[reply-to:";
    const SUFFIX: &str = "]]";

    let Some(start) = text.find(PREFIX) else {
        return (text.to_string(), None);
    };
    let after_prefix = start + PREFIX.len();
    let Some(suffix_rel) = text[after_prefix..].find(SUFFIX) else {
        return (text.to_string(), None);
    };
    let end = after_prefix + suffix_rel + SUFFIX.len();

    let id = text[after_prefix..after_prefix + suffix_rel].trim().to_string();
    let mut cleaned = String::with_capacity(text.len() - (end - start));
    cleaned.push_str(&text[..start]);
    cleaned.push_str(&text[end..]);

    (cleaned.trim().to_string(), Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tag_and_strips_it() {
        let (text, id) = extract_reply_to("here you go [[reply-to:msg-42]]");
        assert_eq!(text, "here you go");
        assert_eq!(id.as_deref(), Some("msg-42"));
    }

    #[test]
    fn tag_in_the_middle_is_removed_cleanly() {
        let (text, id) = extract_reply_to("prefix [[reply-to:abc]] suffix");
        assert_eq!(text, "prefix  suffix");
        assert_eq!(id.as_deref(), Some("abc"));
    }

    #[test]
    fn no_tag_returns_text_unchanged() {
        let (text, id) = extract_reply_to("plain reply");
        assert_eq!(text, "plain reply");
        assert_eq!(id, None);
    }
}
