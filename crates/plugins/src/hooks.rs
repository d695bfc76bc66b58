//! Hook dispatch: the merged event table and the concurrent runner.

use std::{collections::HashMap, sync::Arc};

use {
    futures::future::join_all,
    serde_json::Value,
    tendril_common::hooks::{HookError, HookRef, merge_context},
    tendril_config::Config,
    tracing::{debug, warn},
};

use crate::{loader::ModuleLoader, plugin::Plugin};

// ── HookDispatcher ──────────────────────────────────────────────────────────

/// Event name → hook references, plus what it takes to run them.
///
/// References for an event are kept in registration order: plugin order
/// first, then declaration order within a plugin. Registrations only ever
/// append.
pub struct HookDispatcher {
    hooks: HashMap<String, Vec<HookRef>>,
    loader: Arc<dyn ModuleLoader>,
    config: Arc<Config>,
}

impl HookDispatcher {
    pub fn new(loader: Arc<dyn ModuleLoader>, config: Arc<Config>) -> Self {
        Self {
            hooks: HashMap::new(),
            loader,
            config,
        }
    }

    /// Append `hooks` to `event`'s sequence.
    pub fn register(&mut self, event: &str, hooks: impl IntoIterator<Item = HookRef>) {
        self.hooks.entry(event.to_string()).or_default().extend(hooks);
    }

    /// Append every hook `plugin` declares.
    pub fn extend_from_plugin(&mut self, plugin: &Plugin) {
        for (event, refs) in &plugin.hooks {
            self.register(event, refs.iter().cloned());
        }
    }

    pub fn has_hooks(&self, event: &str) -> bool {
        self.hooks.get(event).is_some_and(|h| !h.is_empty())
    }

    /// Events with at least one hook, sorted.
    pub fn events(&self) -> Vec<&str> {
        let mut events: Vec<&str> = self
            .hooks
            .iter()
            .filter(|(_, h)| !h.is_empty())
            .map(|(e, _)| e.as_str())
            .collect();
        events.sort_unstable();
        events
    }

    pub fn hooks(&self, event: &str) -> &[HookRef] {
        self.hooks.get(event).map(Vec::as_slice).unwrap_or_default()
    }

    /// Run every hook registered for `event` concurrently.
    ///
    /// Each hook sees the payload merged with the configuration. An exit
    /// request from any hook is returned once all hooks have settled; every
    /// other failure is logged and ignored.
    pub async fn dispatch(&self, event: &str, payload: Value) -> Result<(), HookError> {
        let refs = self.hooks(event);
        debug!(event, count = refs.len(), "starting hook");
        if refs.is_empty() {
            return Ok(());
        }

        let config = serde_json::to_value(&*self.config).unwrap_or_default();
        let context = merge_context(payload, config);

        let runs = refs.iter().map(|hook_ref| {
            let context = &context;
            async move {
                let result = match self.loader.load_hook(hook_ref).await {
                    Ok(hook) => hook.run(context).await,
                    Err(e) => Err(HookError::Failed(e)),
                };
                (hook_ref, result)
            }
        });

        let mut exit = None;
        for (hook_ref, result) in join_all(runs).await {
            match result {
                Ok(()) => {},
                Err(HookError::Exit { code }) => {
                    debug!(event, module = %hook_ref, code, "hook requested exit");
                    exit.get_or_insert(code);
                },
                Err(HookError::Failed(e)) => {
                    warn!(hook = event, module = %hook_ref, error = %e, "hook failed");
                },
            }
        }

        debug!(event, "finished hook");
        match exit {
            Some(code) => Err(HookError::exit(code)),
            None => Ok(()),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{command::Command, entry::PluginsEntry},
        async_trait::async_trait,
        serde_json::json,
        std::{
            path::{Path, PathBuf},
            sync::Mutex,
        },
        tendril_common::hooks::Hook,
        tendril_config::Descriptor,
    };

    /// Hooks keyed by module reference, recording the contexts they saw.
    struct Scripted {
        module: String,
        seen: Arc<Mutex<Vec<(String, Value)>>>,
    }

    #[async_trait]
    impl Hook for Scripted {
        fn name(&self) -> &str {
            &self.module
        }

        async fn run(&self, context: &Value) -> Result<(), HookError> {
            self.seen
                .lock()
                .unwrap()
                .push((self.module.clone(), context.clone()));
            match self.module.as_str() {
                "fail" => Err(anyhow::anyhow!("boom").into()),
                "exit" => Err(HookError::exit(7)),
                _ => Ok(()),
            }
        }
    }

    #[derive(Default)]
    struct ScriptedLoader {
        seen: Arc<Mutex<Vec<(String, Value)>>>,
    }

    #[async_trait]
    impl ModuleLoader for ScriptedLoader {
        async fn load_command(&self, path: &Path) -> anyhow::Result<Box<dyn Command>> {
            anyhow::bail!("no commands here: {}", path.display())
        }

        async fn load_hook(&self, hook: &HookRef) -> anyhow::Result<Arc<dyn Hook>> {
            if hook.module == "missing" {
                anyhow::bail!("cannot resolve {hook}");
            }
            Ok(Arc::new(Scripted {
                module: hook.module.clone(),
                seen: Arc::clone(&self.seen),
            }))
        }

        async fn load_plugins_entry(
            &self,
            path: &Path,
        ) -> anyhow::Result<Arc<dyn PluginsEntry>> {
            anyhow::bail!("no entry points here: {}", path.display())
        }
    }

    fn config() -> Arc<Config> {
        let descriptor: Descriptor =
            toml::from_str("name = \"app\"\nversion = \"1.0.0\"\nroot = \"/app\"\n").unwrap();
        Arc::new(Config::from_descriptor_with(&descriptor, |_| None))
    }

    fn hook_ref(module: &str) -> HookRef {
        HookRef {
            plugin: "app".into(),
            root: PathBuf::from("/app"),
            module: module.into(),
        }
    }

    fn dispatcher(loader: &Arc<ScriptedLoader>, modules: &[&str]) -> HookDispatcher {
        let mut d = HookDispatcher::new(Arc::clone(loader) as Arc<dyn ModuleLoader>, config());
        d.register("init", modules.iter().map(|m| hook_ref(m)));
        d
    }

    #[tokio::test]
    async fn failure_is_isolated() {
        let loader = Arc::new(ScriptedLoader::default());
        let d = dispatcher(&loader, &["first", "fail", "third"]);

        d.dispatch("init", json!({"id": "x"})).await.unwrap();

        let seen = loader.seen.lock().unwrap();
        let mut ran: Vec<&str> = seen.iter().map(|(m, _)| m.as_str()).collect();
        ran.sort_unstable();
        assert_eq!(ran, ["fail", "first", "third"]);
    }

    #[tokio::test]
    async fn unresolvable_hook_is_isolated() {
        let loader = Arc::new(ScriptedLoader::default());
        let d = dispatcher(&loader, &["missing", "ok"]);
        d.dispatch("init", Value::Null).await.unwrap();
        assert_eq!(loader.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn exit_propagates_after_all_settle() {
        let loader = Arc::new(ScriptedLoader::default());
        let d = dispatcher(&loader, &["exit", "fail", "last"]);

        let err = d.dispatch("init", Value::Null).await.unwrap_err();
        assert!(matches!(err, HookError::Exit { code: 7 }));
        assert_eq!(loader.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn context_merges_payload_and_config() {
        let loader = Arc::new(ScriptedLoader::default());
        let d = dispatcher(&loader, &["only"]);
        d.dispatch("init", json!({"argv": ["a"]})).await.unwrap();

        let seen = loader.seen.lock().unwrap();
        let context = &seen[0].1;
        assert_eq!(context["argv"], json!(["a"]));
        assert_eq!(context["config"]["name"], "app");
        assert_eq!(context["config"]["version"], "1.0.0");
    }

    #[tokio::test]
    async fn unknown_event_is_a_no_op() {
        let loader = Arc::new(ScriptedLoader::default());
        let d = dispatcher(&loader, &["only"]);
        d.dispatch("nope", Value::Null).await.unwrap();
        assert!(loader.seen.lock().unwrap().is_empty());
        assert!(!d.has_hooks("nope"));
        assert_eq!(d.events(), ["init"]);
    }

    #[test]
    fn registration_appends() {
        let loader = Arc::new(ScriptedLoader::default());
        let mut d = dispatcher(&loader, &["a"]);
        d.register("init", [hook_ref("b")]);
        let modules: Vec<_> = d.hooks("init").iter().map(|h| h.module.as_str()).collect();
        assert_eq!(modules, ["a", "b"]);
    }
}
