//! Well-known RPC method names and their required authorization scope.

// read
pub const HEALTH: &str = "health";
pub const STATUS: &str = "status";
pub const LOGS_TAIL: &str = "logs.tail";
pub const CHANNELS_STATUS: &str = "channels.status";
pub const PROVIDERS_STATUS: &str = "providers.status";
pub const SESSIONS_LIST: &str = "sessions.list";
pub const SESSIONS_PREVIEW: &str = "sessions.preview";
pub const SESSIONS_RESOLVE: &str = "sessions.resolve";
pub const SESSIONS_USAGE: &str = "sessions.usage";
pub const CRON_LIST: &str = "cron.list";
pub const NODE_LIST: &str = "node.list";
pub const NODE_DESCRIBE: &str = "node.describe";
pub const CHAT_HISTORY: &str = "chat.history";
pub const CONFIG_GET: &str = "config.get";

// write
pub const SEND: &str = "send";
pub const POLL: &str = "poll";
pub const AGENT: &str = "agent";
pub const AGENT_WAIT: &str = "agent.wait";
pub const WAKE: &str = "wake";
pub const CHAT_SEND: &str = "chat.send";
pub const CHAT_ABORT: &str = "chat.abort";
pub const NODE_INVOKE: &str = "node.invoke";
pub const BROWSER_REQUEST: &str = "browser.request";
pub const PUSH_TEST: &str = "push.test";

// approvals
pub const EXEC_APPROVAL_REQUEST: &str = "exec.approval.request";
pub const EXEC_APPROVAL_WAIT_DECISION: &str = "exec.approval.waitDecision";
pub const EXEC_APPROVAL_RESOLVE: &str = "exec.approval.resolve";

// pairing
pub const NODE_PAIR_REQUEST: &str = "node.pair.request";
pub const NODE_PAIR_LIST: &str = "node.pair.list";
pub const NODE_PAIR_APPROVE: &str = "node.pair.approve";
pub const NODE_PAIR_REJECT: &str = "node.pair.reject";
pub const DEVICE_PAIR_REQUEST: &str = "device.pair.request";
pub const DEVICE_PAIR_APPROVE: &str = "device.pair.approve";
pub const DEVICE_TOKEN_ROTATE: &str = "device.token.rotate";
pub const DEVICE_TOKEN_REVOKE: &str = "device.token.revoke";
pub const NODE_RENAME: &str = "node.rename";

// admin
pub const SESSIONS_PATCH: &str = "sessions.patch";
pub const SESSIONS_RESET: &str = "sessions.reset";
pub const SESSIONS_DELETE: &str = "sessions.delete";
pub const SESSIONS_COMPACT: &str = "sessions.compact";
pub const CHANNELS_LOGOUT: &str = "channels.logout";
pub const AGENTS_CREATE: &str = "agents.create";
pub const AGENTS_UPDATE: &str = "agents.update";
pub const AGENTS_DELETE: &str = "agents.delete";
pub const SKILLS_INSTALL: &str = "skills.install";
pub const SKILLS_UPDATE: &str = "skills.update";
pub const CRON_ADD: &str = "cron.add";
pub const CRON_UPDATE: &str = "cron.update";
pub const CRON_REMOVE: &str = "cron.remove";
pub const CRON_RUN: &str = "cron.run";
pub const CONNECT: &str = "connect";
pub const CHAT_INJECT: &str = "chat.inject";
pub const CONFIG_SET: &str = "config.set";
pub const CONFIG_APPLY: &str = "config.apply";
pub const CONFIG_PATCH: &str = "config.patch";
pub const CONFIG_SCHEMA: &str = "config.schema";
pub const WIZARD_RUN: &str = "wizard.run";
pub const UPDATE_RUN: &str = "update.run";
pub const EXEC_APPROVALS_GET: &str = "exec.approvals.get";
pub const EXEC_APPROVALS_SET: &str = "exec.approvals.set";

/// Every method name the gateway recognizes, whether or not it has a
/// handler behind it. Used to tell "unknown method" (`METHOD_NOT_FOUND`)
/// apart from "known but unauthorized" (`UNAUTHORIZED`).
pub const ALL_METHODS: &[&str] = &[
    HEALTH, STATUS, LOGS_TAIL, CHANNELS_STATUS, PROVIDERS_STATUS, SESSIONS_LIST,
    SESSIONS_PREVIEW, SESSIONS_RESOLVE, SESSIONS_USAGE, CRON_LIST, NODE_LIST, NODE_DESCRIBE,
    CHAT_HISTORY, CONFIG_GET,
    SEND, POLL, AGENT, AGENT_WAIT, WAKE, CHAT_SEND, CHAT_ABORT, NODE_INVOKE, BROWSER_REQUEST,
    PUSH_TEST,
    EXEC_APPROVAL_REQUEST, EXEC_APPROVAL_WAIT_DECISION, EXEC_APPROVAL_RESOLVE,
    NODE_PAIR_REQUEST, NODE_PAIR_LIST, NODE_PAIR_APPROVE, NODE_PAIR_REJECT, DEVICE_PAIR_REQUEST,
    DEVICE_PAIR_APPROVE, DEVICE_TOKEN_ROTATE, DEVICE_TOKEN_REVOKE, NODE_RENAME,
    SESSIONS_PATCH, SESSIONS_RESET, SESSIONS_DELETE, SESSIONS_COMPACT, CHANNELS_LOGOUT,
    AGENTS_CREATE, AGENTS_UPDATE, AGENTS_DELETE, SKILLS_INSTALL, SKILLS_UPDATE, CRON_ADD,
    CRON_UPDATE, CRON_REMOVE, CRON_RUN, CONNECT, CHAT_INJECT, CONFIG_SET, CONFIG_APPLY,
    CONFIG_PATCH, CONFIG_SCHEMA, WIZARD_RUN, UPDATE_RUN, EXEC_APPROVALS_GET, EXEC_APPROVALS_SET,
];

pub fn is_known_method(method: &str) -> bool {
    ALL_METHODS.contains(&method)
}

/// Authorization scope required to invoke a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Read,
    Write,
    Approvals,
    Pairing,
    Admin,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Read => "operator.read",
            Scope::Write => "operator.write",
            Scope::Approvals => "operator.approvals",
            Scope::Pairing => "operator.pairing",
            Scope::Admin => "operator.admin",
        }
    }
}

/// Looks up the scope required for a method. Unclassified methods deny all
/// non-admin callers, so they resolve to `Scope::Admin`.
pub fn required_scope(method: &str) -> Scope {
    match method {
        HEALTH | STATUS | LOGS_TAIL | CHANNELS_STATUS | PROVIDERS_STATUS | SESSIONS_LIST
        | SESSIONS_PREVIEW | SESSIONS_RESOLVE | SESSIONS_USAGE | CRON_LIST | NODE_LIST
        | NODE_DESCRIBE | CHAT_HISTORY | CONFIG_GET => Scope::Read,

        SEND | POLL | AGENT | AGENT_WAIT | WAKE | CHAT_SEND | CHAT_ABORT | NODE_INVOKE
        | BROWSER_REQUEST | PUSH_TEST => Scope::Write,

        EXEC_APPROVAL_REQUEST | EXEC_APPROVAL_WAIT_DECISION | EXEC_APPROVAL_RESOLVE => {
            Scope::Approvals
        }

        NODE_PAIR_REQUEST | NODE_PAIR_LIST | NODE_PAIR_APPROVE | NODE_PAIR_REJECT
        | DEVICE_PAIR_REQUEST | DEVICE_PAIR_APPROVE | DEVICE_TOKEN_ROTATE
        | DEVICE_TOKEN_REVOKE | NODE_RENAME => Scope::Pairing,

        _ => Scope::Admin,
    }
}

/// True when `scopes` authorizes `method`: `operator.admin` passes every
/// check, otherwise the declared scope for `method` must be present. A
/// read-scoped method is also satisfied by `operator.write`, since writers
/// are a superset of readers.
pub fn is_authorized(method: &str, scopes: &[String]) -> bool {
    if scopes.iter().any(|s| s == Scope::Admin.as_str()) {
        return true;
    }
    let required = required_scope(method);
    if scopes.iter().any(|s| s == required.as_str()) {
        return true;
    }
    required == Scope::Read && scopes.iter().any(|s| s == Scope::Write.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_passes_every_check() {
        let scopes = vec!["operator.admin".to_string()];
        assert!(is_authorized(SEND, &scopes));
        assert!(is_authorized(CONFIG_SET, &scopes));
        assert!(is_authorized(NODE_PAIR_APPROVE, &scopes));
    }

    #[test]
    fn read_scope_denies_write_method() {
        let scopes = vec!["operator.read".to_string()];
        assert!(is_authorized(HEALTH, &scopes));
        assert!(!is_authorized(SEND, &scopes));
    }

    #[test]
    fn write_scope_also_satisfies_read_methods() {
        let scopes = vec!["operator.write".to_string()];
        assert!(is_authorized(HEALTH, &scopes));
        assert!(is_authorized(CHANNELS_STATUS, &scopes));
    }

    #[test]
    fn read_scope_does_not_satisfy_write_methods() {
        let scopes = vec!["operator.read".to_string()];
        assert!(!is_authorized(SEND, &scopes));
    }

    #[test]
    fn no_scope_denies_everything() {
        let scopes: Vec<String> = vec![];
        assert!(!is_authorized(HEALTH, &scopes));
    }

    #[test]
    fn unclassified_method_requires_admin() {
        let scopes = vec!["operator.write".to_string()];
        assert!(!is_authorized("made.up.method", &scopes));
        let admin = vec!["operator.admin".to_string()];
        assert!(is_authorized("made.up.method", &admin));
    }

    #[test]
    fn known_method_table_matches_all_methods() {
        assert!(is_known_method(HEALTH));
        assert!(is_known_method(NODE_PAIR_APPROVE));
        assert!(!is_known_method("made.up.method"));
    }
}
