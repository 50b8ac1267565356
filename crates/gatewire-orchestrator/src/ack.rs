use gatewire_channels::ReplyPayload;
use gatewire_directives::{Directive, DirectiveKey};

/// Directives resolved with no agent turn involved — the reply is a fixed
/// acknowledgment, not model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastPath {
    Abort,
    Status,
    NewSession,
    Restart,
    Reset,
    Help,
    Commands,
}

/// First no-argument control directive present, if any. When several
/// appear in one message the first one wins and the rest are ignored —
/// combining e.g. `/stop` with a patch directive isn't a supported shape.
pub fn fast_path_for(directives: &[Directive]) -> Option<FastPath> {
    directives.iter().find_map(|d| match d.key {
        DirectiveKey::Stop => Some(FastPath::Abort),
        DirectiveKey::Status => Some(FastPath::Status),
        DirectiveKey::New => Some(FastPath::NewSession),
        DirectiveKey::Restart => Some(FastPath::Restart),
        DirectiveKey::Reset => Some(FastPath::Reset),
        DirectiveKey::Help => Some(FastPath::Help),
        DirectiveKey::Commands => Some(FastPath::Commands),
        _ => None,
    })
}

const COMMANDS_LIST: &str = "think, verbose, reasoning, elevated, model, usage, cost, send, \
activation, queue, status, stop, restart, new, reset, help, commands";

pub fn ack_text(path: FastPath) -> String {
    match path {
        FastPath::Abort => "⚙️ Agent was aborted.".to_string(),
        FastPath::Status => "⚙️ Status.".to_string(),
        FastPath::NewSession => "⚙️ Starting a new session.".to_string(),
        FastPath::Restart => "⚙️ Restarting…".to_string(),
        FastPath::Reset => "⚙️ Session reset.".to_string(),
        FastPath::Help => "⚙️ Send a message to talk to the agent, or a /directive to control \
            the session (e.g. /think high, /new, /stop). Use /commands for the full list."
            .to_string(),
        FastPath::Commands => format!("⚙️ Available directives: {COMMANDS_LIST}."),
    }
}

pub fn ack_payload(path: FastPath) -> ReplyPayload {
    ReplyPayload::text(ack_text(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_control_directive_wins() {
        let directives = vec![
            Directive { key: DirectiveKey::Think, raw_level: Some("high".into()), value: Some("high".into()) },
            Directive { key: DirectiveKey::Stop, raw_level: None, value: None },
        ];
        assert_eq!(fast_path_for(&directives), Some(FastPath::Abort));
    }

    #[test]
    fn no_control_directive_returns_none() {
        let directives = vec![Directive {
            key: DirectiveKey::Verbose,
            raw_level: Some("on".into()),
            value: Some("on".into()),
        }];
        assert_eq!(fast_path_for(&directives), None);
    }
}
