use std::collections::HashMap;

use tracing::info;

use crate::{channel::ChannelPlugin, types::ChannelStatus};

/// Holds channel plugins keyed by id. Plugins are composed from a built-in
/// set plus a dynamic set registered at runtime; duplicates (same id) are
/// deduped with built-ins winning.
pub struct ChannelRegistry {
    plugins: HashMap<String, Box<dyn ChannelPlugin>>,
    built_in_ids: Vec<String>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
            built_in_ids: Vec::new(),
        }
    }

    /// Register a built-in plugin. Built-ins always win name collisions
    /// against plugins registered later via `register`.
    pub fn register_built_in(&mut self, plugin: Box<dyn ChannelPlugin>) {
        let id = plugin.id().to_string();
        self.built_in_ids.push(id.clone());
        info!(channel = %id, "registering built-in channel plugin");
        self.plugins.insert(id, plugin);
    }

    /// Register a dynamically-loaded plugin. Ignored if a built-in with the
    /// same id is already present.
    pub fn register(&mut self, plugin: Box<dyn ChannelPlugin>) {
        let id = plugin.id().to_string();
        if self.built_in_ids.contains(&id) {
            info!(channel = %id, "ignoring dynamic plugin, built-in already registered");
            return;
        }
        info!(channel = %id, "registering channel plugin");
        self.plugins.insert(id, plugin);
    }

    pub fn unregister(&mut self, id: &str) {
        if self.built_in_ids.iter().any(|b| b == id) {
            return;
        }
        self.plugins.remove(id);
    }

    /// Resolve a raw id or alias to the canonical registered id.
    pub fn normalize_channel_id(&self, raw: &str) -> Option<String> {
        let lower = raw.to_ascii_lowercase();
        if self.plugins.contains_key(&lower) {
            return Some(lower);
        }
        self.plugins
            .iter()
            .find(|(_, p)| p.aliases().iter().any(|a| a.eq_ignore_ascii_case(&lower)))
            .map(|(id, _)| id.clone())
    }

    pub fn get(&self, id: &str) -> Option<&dyn ChannelPlugin> {
        self.plugins.get(id).map(|b| b.as_ref())
    }

    /// Plugins ordered by `order` then `id`.
    pub fn list(&self) -> Vec<&dyn ChannelPlugin> {
        let mut out: Vec<&dyn ChannelPlugin> = self.plugins.values().map(|b| b.as_ref()).collect();
        out.sort_by(|a, b| a.order().cmp(&b.order()).then_with(|| a.id().cmp(b.id())));
        out
    }

    pub fn statuses(&self) -> Vec<(String, ChannelStatus)> {
        let mut result: Vec<(String, ChannelStatus)> = self
            .plugins
            .iter()
            .map(|(id, p)| (id.clone(), p.status()))
            .collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelPlugin;
    use crate::error::ChannelError;
    use crate::types::{CanonicalTarget, Capability, ReplyPayload, SendOpts, SendResult};
    use async_trait::async_trait;

    struct StubPlugin {
        plugin_id: &'static str,
        plugin_aliases: Vec<String>,
    }

    #[async_trait]
    impl ChannelPlugin for StubPlugin {
        fn id(&self) -> &str {
            self.plugin_id
        }
        fn aliases(&self) -> &[String] {
            &self.plugin_aliases
        }
        fn capabilities(&self) -> &[Capability] {
            &[Capability::Send]
        }
        fn max_text_chars(&self) -> usize {
            4000
        }
        async fn connect(&mut self) -> Result<(), ChannelError> {
            Ok(())
        }
        async fn disconnect(&mut self) -> Result<(), ChannelError> {
            Ok(())
        }
        async fn send(
            &self,
            _target: &CanonicalTarget,
            _payload: &ReplyPayload,
            _opts: &SendOpts,
        ) -> Result<SendResult, ChannelError> {
            Ok(SendResult {
                message_id: "1".into(),
                channel_id: self.plugin_id.to_string(),
            })
        }
        fn status(&self) -> ChannelStatus {
            ChannelStatus::Connected
        }
    }

    #[test]
    fn alias_resolves_to_canonical_id() {
        let mut registry = ChannelRegistry::new();
        registry.register_built_in(Box::new(StubPlugin {
            plugin_id: "whatsapp",
            plugin_aliases: vec!["wa".to_string()],
        }));
        assert_eq!(
            registry.normalize_channel_id("WA"),
            Some("whatsapp".to_string())
        );
        assert_eq!(registry.normalize_channel_id("unknown"), None);
    }

    #[test]
    fn built_in_wins_over_dynamic_duplicate() {
        let mut registry = ChannelRegistry::new();
        registry.register_built_in(Box::new(StubPlugin {
            plugin_id: "discord",
            plugin_aliases: vec![],
        }));
        registry.register(Box::new(StubPlugin {
            plugin_id: "discord",
            plugin_aliases: vec![],
        }));
        assert!(registry.get("discord").is_some());
        registry.unregister("discord");
        assert!(registry.get("discord").is_some(), "built-in must survive unregister");
    }

    #[test]
    fn list_is_ordered() {
        let mut registry = ChannelRegistry::new();
        registry.register_built_in(Box::new(StubPlugin {
            plugin_id: "zeta",
            plugin_aliases: vec![],
        }));
        registry.register_built_in(Box::new(StubPlugin {
            plugin_id: "alpha",
            plugin_aliases: vec![],
        }));
        let ids: Vec<&str> = registry.list().iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);
    }
}
