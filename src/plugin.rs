use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, error, info, info_span, Instrument};

use crate::bot::BotContext;
use crate::mention::Mention;

/// A handler reacting to bot lifecycle and mention events.
///
/// All hooks are optional; the defaults do nothing. Plugin state is private
/// to the implementation and lives for the whole process — use interior
/// mutability for anything that changes across mentions.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Stable name; also the key of this plugin's config section.
    fn name(&self) -> &'static str;

    fn version(&self) -> &'static str {
        "0.1.0"
    }

    /// Called once at startup, before the poll loop runs.
    async fn on_load(&self, _ctx: &BotContext) -> Result<()> {
        Ok(())
    }

    /// Called for every surviving inbound mention.
    async fn on_mention(&self, _ctx: &BotContext, _mention: &Mention) -> Result<()> {
        Ok(())
    }

    /// Called once at shutdown, after the poll loop has stopped.
    async fn on_unload(&self, _ctx: &BotContext) -> Result<()> {
        Ok(())
    }
}

/// The ordered set of loaded plugins. Registration order is invocation order.
pub struct PluginSet {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginSet {
    pub fn builder() -> PluginSetBuilder {
        PluginSetBuilder {
            plugins: Vec::new(),
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Runs every plugin's `on_load` hook. A failing hook is logged; the
    /// plugin stays registered and still receives mentions.
    pub async fn load_all(&self, ctx: &BotContext) {
        for plugin in &self.plugins {
            let span = info_span!("plugin", plugin_name = plugin.name());
            async {
                match plugin.on_load(ctx).await {
                    Ok(()) => info!(
                        "Loaded: {name} (v{version})",
                        name = plugin.name(),
                        version = plugin.version()
                    ),
                    Err(err) => error!("Error while loading plugin: {err:#}"),
                }
            }
            .instrument(span)
            .await;
        }
    }

    /// Dispatches one mention to every plugin in registration order. Errors
    /// are trapped per plugin so the rest of the wave still runs and the
    /// poll loop never sees them.
    pub async fn dispatch(&self, ctx: &BotContext, mention: &Mention) {
        for plugin in &self.plugins {
            let span = info_span!("plugin", plugin_name = plugin.name());
            async {
                if let Err(err) = plugin.on_mention(ctx, mention).await {
                    error!(
                        "Error while processing mention {id}: {err:#}",
                        id = mention.id
                    );
                }
            }
            .instrument(span)
            .await;
        }
    }

    /// Runs every plugin's `on_unload` hook with the same isolation as
    /// dispatch.
    pub async fn unload_all(&self, ctx: &BotContext) {
        for plugin in &self.plugins {
            let span = info_span!("plugin", plugin_name = plugin.name());
            async {
                match plugin.on_unload(ctx).await {
                    Ok(()) => info!(
                        "Unloaded: {name} (v{version})",
                        name = plugin.name(),
                        version = plugin.version()
                    ),
                    Err(err) => error!("Error while unloading plugin: {err:#}"),
                }
            }
            .instrument(span)
            .await;
        }
    }
}

/// Assembles the static plugin list at startup.
pub struct PluginSetBuilder {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginSetBuilder {
    /// Registers a plugin at the end of the invocation order.
    pub fn register<P: Plugin + 'static>(mut self, plugin: P) -> Self {
        debug!("Registered plugin: {name}", name = plugin.name());
        self.plugins.push(Arc::new(plugin));
        self
    }

    pub fn build(self) -> PluginSet {
        PluginSet {
            plugins: self.plugins,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::api::testing::{make_status, ScriptedApi};
    use crate::api::Account;
    use crate::config::Config;
    use crate::reply::ReplySender;

    struct RecordingPlugin {
        name: &'static str,
        calls: Arc<Mutex<Vec<(&'static str, u64)>>>,
        fail: bool,
    }

    #[async_trait]
    impl Plugin for RecordingPlugin {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn on_mention(&self, _ctx: &BotContext, mention: &Mention) -> Result<()> {
            self.calls.lock().unwrap().push((self.name, mention.id));
            if self.fail {
                anyhow::bail!("boom");
            }
            Ok(())
        }
    }

    fn test_context() -> BotContext {
        let api = Arc::new(ScriptedApi::new());
        let replies = ReplySender::new(api, Duration::from_secs(1));
        BotContext::new(
            Account {
                id: 1000,
                username: "bot".to_string(),
                name: None,
            },
            Arc::new(Config::default()),
            replies,
        )
    }

    #[tokio::test]
    async fn test_failing_plugin_does_not_stop_the_wave() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let set = PluginSet::builder()
            .register(RecordingPlugin {
                name: "first",
                calls: calls.clone(),
                fail: false,
            })
            .register(RecordingPlugin {
                name: "second",
                calls: calls.clone(),
                fail: true,
            })
            .register(RecordingPlugin {
                name: "third",
                calls: calls.clone(),
                fail: false,
            })
            .build();

        let ctx = test_context();
        let mention = Mention::from_status(make_status(55, 7, "alice", "@bot hi")).unwrap();
        set.dispatch(&ctx, &mention).await;

        assert_eq!(
            *calls.lock().unwrap(),
            vec![("first", 55), ("second", 55), ("third", 55)]
        );
    }

    #[tokio::test]
    async fn test_dispatch_follows_registration_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let set = PluginSet::builder()
            .register(RecordingPlugin {
                name: "a",
                calls: calls.clone(),
                fail: false,
            })
            .register(RecordingPlugin {
                name: "b",
                calls: calls.clone(),
                fail: false,
            })
            .build();

        assert_eq!(set.names(), vec!["a", "b"]);

        let ctx = test_context();
        for id in [1, 2] {
            let mention =
                Mention::from_status(make_status(id, 7, "alice", "@bot hi")).unwrap();
            set.dispatch(&ctx, &mention).await;
        }

        assert_eq!(
            *calls.lock().unwrap(),
            vec![("a", 1), ("b", 1), ("a", 2), ("b", 2)]
        );
    }
}
