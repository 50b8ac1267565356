use gatewire_channels::{ChatType, MsgContext};
use gatewire_directives::{parse_directives, Directive};
use gatewire_sessions::SessionKey;

/// An inbound message after directive extraction, with its reply-lane key
/// already resolved from `(channel, accountId, chatType, remoteId, agentId)`.
pub struct NormalizedEnvelope {
    pub session_key: SessionKey,
    pub body_clean: String,
    pub directives: Vec<Directive>,
    pub chat_type: ChatType,
}

pub fn normalize(agent_id: &str, msg: &MsgContext) -> NormalizedEnvelope {
    let (body_clean, directives) = parse_directives(&msg.body);
    let session_key = match msg.chat_type {
        ChatType::Group | ChatType::Channel => {
            SessionKey::group(agent_id, &msg.channel, &msg.account_id, &msg.to)
        }
        ChatType::Direct | ChatType::Thread => {
            SessionKey::direct(agent_id, &msg.channel, &msg.account_id, &msg.from)
        }
    };
    NormalizedEnvelope {
        session_key,
        body_clean,
        directives,
        chat_type: msg.chat_type,
    }
}
