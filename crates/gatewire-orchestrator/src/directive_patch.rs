use gatewire_directives::{Directive, DirectiveKey};
use gatewire_sessions::{GroupActivation, OnOff, ReasoningLevel, SendPolicy, SessionEntry, ThinkingLevel};

/// Apply one patch directive's effect to a session entry in place.
///
/// `allowed_models` is the configured allow-list `/model` must respect;
/// other directives ignore it.
///
/// Returns the ack line to surface to the user: `Some(line)` whether the
/// directive applied cleanly or was rejected for an unrecognized level or
/// disallowed model, and `None` when `directive.key` isn't a patch directive
/// at all (the control directives handled by [`crate::ack`] never reach
/// here).
pub fn apply(entry: &mut SessionEntry, directive: &Directive, allowed_models: &[String]) -> Option<String> {
    let name = label(directive.key)?;

    let Some(value) = directive.value.as_deref() else {
        let raw = directive.raw_level.as_deref().unwrap_or("");
        return Some(format!("unrecognized {name} level '{raw}'"));
    };

    if directive.key == DirectiveKey::Model && !allowed_models.iter().any(|m| m == value) {
        return Some(format!("model '{value}' is not in the allowed set"));
    }

    match directive.key {
        DirectiveKey::Think => entry.thinking_level = parse_thinking(value),
        DirectiveKey::Verbose => entry.verbose_level = parse_on_off(value),
        DirectiveKey::Reasoning => entry.reasoning_level = parse_reasoning(value),
        DirectiveKey::Elevated => entry.elevated_level = parse_on_off(value),
        DirectiveKey::Usage | DirectiveKey::Cost => entry.response_usage = parse_on_off(value),
        DirectiveKey::Model => entry.model_override = Some(value.to_string()),
        DirectiveKey::Send => entry.send_policy = parse_send_policy(value),
        DirectiveKey::Activation => entry.group_activation = parse_activation(value),
        // No field persists a per-session queue override yet; the directive
        // is acknowledged but has no lasting effect.
        DirectiveKey::Queue => return Some(format!("queue set to {value} (not persisted)")),
        _ => return None,
    }

    Some(format!("{name} set to {value}"))
}

fn label(key: DirectiveKey) -> Option<&'static str> {
    Some(match key {
        DirectiveKey::Think => "thinking",
        DirectiveKey::Verbose => "verbose",
        DirectiveKey::Reasoning => "reasoning",
        DirectiveKey::Elevated => "elevated",
        DirectiveKey::Usage => "usage",
        DirectiveKey::Cost => "cost",
        DirectiveKey::Model => "model",
        DirectiveKey::Send => "send",
        DirectiveKey::Activation => "activation",
        DirectiveKey::Queue => "queue",
        _ => return None,
    })
}

fn parse_thinking(s: &str) -> Option<ThinkingLevel> {
    match s {
        "minimal" => Some(ThinkingLevel::Minimal),
        "low" => Some(ThinkingLevel::Low),
        "medium" => Some(ThinkingLevel::Medium),
        "high" => Some(ThinkingLevel::High),
        _ => None,
    }
}

fn parse_on_off(s: &str) -> Option<OnOff> {
    match s {
        "on" => Some(OnOff::On),
        "off" => Some(OnOff::Off),
        _ => None,
    }
}

fn parse_reasoning(s: &str) -> Option<ReasoningLevel> {
    match s {
        "on" => Some(ReasoningLevel::On),
        "off" => Some(ReasoningLevel::Off),
        "stream" => Some(ReasoningLevel::Stream),
        _ => None,
    }
}

fn parse_send_policy(s: &str) -> Option<SendPolicy> {
    match s {
        "allow" => Some(SendPolicy::Allow),
        "deny" => Some(SendPolicy::Deny),
        _ => None,
    }
}

fn parse_activation(s: &str) -> Option<GroupActivation> {
    match s {
        "mention" => Some(GroupActivation::Mention),
        "always" => Some(GroupActivation::Always),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directive(key: DirectiveKey, value: &str) -> Directive {
        Directive {
            key,
            raw_level: Some(value.to_string()),
            value: Some(value.to_string()),
        }
    }

    fn no_models() -> Vec<String> {
        Vec::new()
    }

    #[test]
    fn think_patches_thinking_level() {
        let mut entry = SessionEntry::new("s1".to_string(), 0);
        let ack = apply(&mut entry, &directive(DirectiveKey::Think, "high"), &no_models());
        assert_eq!(entry.thinking_level, Some(ThinkingLevel::High));
        assert_eq!(ack.as_deref(), Some("thinking set to high"));
    }

    #[test]
    fn reapplying_same_directive_is_idempotent() {
        let mut entry = SessionEntry::new("s1".to_string(), 0);
        apply(&mut entry, &directive(DirectiveKey::Verbose, "on"), &no_models());
        apply(&mut entry, &directive(DirectiveKey::Verbose, "on"), &no_models());
        assert_eq!(entry.verbose_level, Some(OnOff::On));
    }

    #[test]
    fn unrecognized_value_leaves_field_untouched_and_acks_rejection() {
        let mut entry = SessionEntry::new("s1".to_string(), 0);
        entry.thinking_level = Some(ThinkingLevel::Low);
        let directive = Directive {
            key: DirectiveKey::Think,
            raw_level: Some("foo".to_string()),
            value: None,
        };
        let ack = apply(&mut entry, &directive, &no_models());
        assert_eq!(entry.thinking_level, Some(ThinkingLevel::Low));
        assert!(ack.unwrap().contains("unrecognized"));
    }

    #[test]
    fn queue_directive_acks_without_persisting() {
        let mut entry = SessionEntry::new("s1".to_string(), 0);
        let ack = apply(&mut entry, &directive(DirectiveKey::Queue, "5"), &no_models());
        assert!(ack.unwrap().contains("not persisted"));
    }

    #[test]
    fn status_directive_is_not_a_patch() {
        let mut entry = SessionEntry::new("s1".to_string(), 0);
        let directive = Directive { key: DirectiveKey::Status, raw_level: None, value: None };
        assert_eq!(apply(&mut entry, &directive, &no_models()), None);
    }

    #[test]
    fn model_directive_rejected_when_not_allowed() {
        let mut entry = SessionEntry::new("s1".to_string(), 0);
        let ack = apply(&mut entry, &directive(DirectiveKey::Model, "gpt-nonexistent"), &no_models());
        assert!(entry.model_override.is_none());
        assert!(ack.unwrap().contains("allowed set"));
    }

    #[test]
    fn model_directive_applies_when_allowed() {
        let mut entry = SessionEntry::new("s1".to_string(), 0);
        let allowed = vec!["gpt-extra".to_string()];
        let ack = apply(&mut entry, &directive(DirectiveKey::Model, "gpt-extra"), &allowed);
        assert_eq!(entry.model_override.as_deref(), Some("gpt-extra"));
        assert_eq!(ack.as_deref(), Some("model set to gpt-extra"));
    }
}
