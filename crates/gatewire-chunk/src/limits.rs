/// Default per-channel chunk-size ceilings in characters, used when a
/// channel's own configuration doesn't override them.
pub fn default_limit_for(channel_id: &str) -> Option<usize> {
    let limit = match channel_id.to_ascii_lowercase().as_str() {
        "whatsapp" => 4000,
        "telegram" => 4000,
        "discord" => 2000,
        "slack" => 4000,
        "signal" => 4000,
        "imessage" => 4000,
        "webchat" => 4000,
        "msteams" => 4000,
        _ => return None,
    };
    Some(limit)
}

/// Per-channel line-count ceiling for markdown chunking, used alongside
/// [`default_limit_for`] when a channel caps lines-per-message as well as
/// bytes (Discord embeds clip long code fences well before the byte limit).
pub fn max_lines_for(channel_id: &str) -> Option<usize> {
    match channel_id.to_ascii_lowercase().as_str() {
        "discord" => Some(40),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_channels_have_defaults() {
        assert_eq!(default_limit_for("discord"), Some(2000));
        assert_eq!(default_limit_for("Slack"), Some(4000));
    }

    #[test]
    fn unknown_channel_has_no_default() {
        assert_eq!(default_limit_for("carrier-pigeon"), None);
    }

    #[test]
    fn only_discord_has_a_line_cap() {
        assert_eq!(max_lines_for("discord"), Some(40));
        assert_eq!(max_lines_for("slack"), None);
    }
}
