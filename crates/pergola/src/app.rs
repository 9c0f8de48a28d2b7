//! The framework application: wiring and startup.
//!
//! [`App`] owns one Registry, one ConfigStore, one Dispatcher and one
//! Informer, and exposes the declarative configuration calls handler code
//! uses at definition time. Registration and configuration happen before
//! serving begins; [`App::startup`] finalizes the mount table and runs the
//! environment checks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pergola_dispatch::{
    ActionCache, CacheOptions, Clock, ConfigError, ConfigStore, DispatchError, Dispatcher,
    HandlerType, LayoutRef, Registry, Request, TemplateEngine, ValueCache,
};
use pergola_inform::Informer;

use crate::engine::MiniJinjaEngine;

/// Builder for [`App`].
///
/// Defaults: template root `template`, public root `public`, a fresh
/// default [`Informer`], and a [`MiniJinjaEngine`] loading templates from
/// the template root.
pub struct AppBuilder {
    template_root: PathBuf,
    public_root: PathBuf,
    informer: Option<Informer>,
    engine: Option<Arc<dyn TemplateEngine>>,
    clock: Option<Arc<dyn Clock>>,
}

impl AppBuilder {
    /// Where layout and action templates live on disk.
    pub fn template_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_root = path.into();
        self
    }

    /// Where static assets live on disk. The framework core never reads
    /// it; startup only checks it exists.
    pub fn public_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.public_root = path.into();
        self
    }

    pub fn informer(mut self, informer: Informer) -> Self {
        self.informer = Some(informer);
        self
    }

    /// Replaces the default MiniJinja engine.
    pub fn engine(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Replaces the cache clock. For tests driving TTL expiry by hand.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> App {
        let informer = Arc::new(self.informer.unwrap_or_default());
        let engine = self
            .engine
            .unwrap_or_else(|| Arc::new(MiniJinjaEngine::with_root(&self.template_root)));
        let registry = Arc::new(Registry::new(informer.clone()));
        let config = Arc::new(ConfigStore::new());

        let mut dispatcher = Dispatcher::new(
            registry.clone(),
            config.clone(),
            engine,
            informer.clone(),
        );
        let values = match &self.clock {
            Some(clock) => {
                dispatcher = dispatcher.with_clock(clock.clone());
                ValueCache::with_clock(clock.clone())
            }
            None => ValueCache::new(),
        };

        App {
            registry,
            config,
            dispatcher,
            values,
            informer,
            template_root: self.template_root,
            public_root: self.public_root,
        }
    }
}

/// A configured framework instance. One per process, shared across the
/// host server's worker threads.
pub struct App {
    registry: Arc<Registry>,
    config: Arc<ConfigStore>,
    dispatcher: Dispatcher,
    values: ValueCache,
    informer: Arc<Informer>,
    template_root: PathBuf,
    public_root: PathBuf,
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder {
            template_root: PathBuf::from("template"),
            public_root: PathBuf::from("public"),
            informer: None,
            engine: None,
            clock: None,
        }
    }

    // =========================================================================
    // Declarative configuration
    // =========================================================================

    /// Registers a handler type. Automap runs against the configuration as
    /// of this call; an explicit [`map`](Self::map) later always wins.
    pub fn register(&self, handler: HandlerType) -> Arc<HandlerType> {
        self.registry.register(&self.config, handler)
    }

    /// Maps a type to explicit mount paths, replacing its previous
    /// mappings.
    pub fn map(&self, ty: &str, paths: &[&str]) -> Result<(), ConfigError> {
        self.registry.map(ty, paths)
    }

    /// Sets the type-wide default layout.
    pub fn layout(&self, ty: &str, layout: impl Into<LayoutRef>) -> Result<(), ConfigError> {
        self.config.set_layout(ty, layout)
    }

    /// Maps a layout to specific actions only.
    pub fn action_layout(
        &self,
        ty: &str,
        layout: impl Into<LayoutRef>,
        actions: &[&str],
    ) -> Result<(), ConfigError> {
        self.config.set_action_layout(ty, layout, actions)
    }

    /// Excludes actions from layout wrapping.
    pub fn deny_layout(&self, ty: &str, actions: &[&str]) -> Result<(), ConfigError> {
        self.config.deny_layout(ty, actions)
    }

    /// Enables output caching for the named actions.
    pub fn cache_actions(
        &self,
        ty: &str,
        actions: &[&str],
        options: CacheOptions,
    ) -> Result<(), ConfigError> {
        self.config.set_cache(ty, actions, options)
    }

    /// Reroutes an action to another type's action template.
    pub fn template(
        &self,
        ty: &str,
        action: &str,
        from_ty: &str,
        from_action: &str,
    ) -> Result<(), ConfigError> {
        self.config.set_template(ty, action, from_ty, from_action)
    }

    /// Declares a per-type template root, warning when the directory does
    /// not exist (yet).
    pub fn template_root_for(
        &self,
        ty: &str,
        path: impl AsRef<Path>,
    ) -> Result<(), ConfigError> {
        let path = path.as_ref();
        self.check_path(
            path,
            &format!(
                "{} template root {} doesn't exist",
                ty,
                path.display()
            ),
        );
        self.config.set_template_root(ty, path)
    }

    /// Excludes capabilities on a type. Takes effect at
    /// [`startup`](Self::startup), when effective capability sets are
    /// recomputed.
    pub fn exclude_capabilities(&self, ty: &str, caps: &[&str]) -> Result<(), ConfigError> {
        self.config.exclude_capabilities(ty, caps)
    }

    /// Turns automap on or off for a type.
    pub fn set_automap(&self, ty: &str, on: bool) -> Result<(), ConfigError> {
        self.config.set_automap(ty, on)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Finalizes registration and checks the environment. Missing roots
    /// and an empty mount table are warnings, not failures: a server with
    /// zero mappings still serves static assets.
    pub fn startup(&self) {
        self.informer.debug(&format!(
            "found handlers: {}",
            self.registry.handler_names().join(", ")
        ));
        self.registry.finalize(&self.config);

        self.check_path(
            &self.template_root,
            &format!("Template root: {} doesn't exist", self.template_root.display()),
        );
        self.check_path(
            &self.public_root,
            &format!("Public root: {} doesn't exist", self.public_root.display()),
        );

        if self.registry.is_empty() {
            self.informer
                .warn("No handlers mapped, will serve static assets only.");
        } else {
            let mapped: Vec<String> = self
                .registry
                .mounts()
                .into_iter()
                .filter_map(|m| {
                    self.registry
                        .at(&m)
                        .map(|h| format!("{} => {}", m, h.name()))
                })
                .collect();
            self.informer
                .debug(&format!("mapped handlers: {}", mapped.join(", ")));
        }
    }

    fn check_path(&self, path: &Path, message: &str) {
        if !path.is_dir() {
            self.informer.warn(message);
        }
    }

    // =========================================================================
    // Serving
    // =========================================================================

    /// Dispatches one request path. The sole request-time entry point.
    pub fn dispatch(&self, path: &str, request: &Request) -> Result<String, DispatchError> {
        self.dispatcher.dispatch(path, request)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The rendered-output cache, for explicit invalidation.
    pub fn action_cache(&self) -> &ActionCache {
        self.dispatcher.cache()
    }

    /// The plain value cache available to handler code.
    pub fn value_cache(&self) -> &ValueCache {
        &self.values
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    pub fn informer(&self) -> &Arc<Informer> {
        &self.informer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pergola_dispatch::Arity;

    fn quiet_app() -> App {
        App::builder().informer(Informer::silent()).build()
    }

    #[test]
    fn test_register_and_dispatch() {
        let app = quiet_app();
        app.register(
            HandlerType::builder("WidgetsController")
                .action("index", Arity::exactly(0), |_| Ok("widgets!".into()))
                .build(),
        );
        app.startup();

        let out = app.dispatch("/widgets", &Request::new()).unwrap();
        assert_eq!(out, "widgets!");
    }

    #[test]
    fn test_map_overrides_automap() {
        let app = quiet_app();
        app.register(
            HandlerType::builder("WidgetsController")
                .action("index", Arity::exactly(0), |_| Ok("w".into()))
                .build(),
        );
        app.map("WidgetsController", &["/catalog"]).unwrap();
        app.startup();

        assert!(app.dispatch("/catalog", &Request::new()).is_ok());
        assert!(app
            .dispatch("/widgets", &Request::new())
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_value_cache_accessor() {
        let app = quiet_app();
        app.value_cache().put("k", "v", None);
        assert_eq!(app.value_cache().get("k"), Some("v".to_string()));
    }

    #[test]
    fn test_per_type_template_root_is_recorded_and_checked() {
        use pergola_inform::{Sink, Tag};
        use std::io::Write;
        use std::sync::Mutex;

        #[derive(Clone, Default)]
        struct Buf(Arc<Mutex<Vec<u8>>>);
        impl Write for Buf {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let buf = Buf::default();
        let informer = Informer::builder()
            .tags([Tag::Warn])
            .sink(Sink::writer(Box::new(buf.clone())))
            .build();
        let app = App::builder().informer(informer).build();
        app.register(
            HandlerType::builder("WidgetsController")
                .action("index", Arity::exactly(0), |_| Ok("w".into()))
                .build(),
        );

        app.template_root_for("WidgetsController", "no/such/dir")
            .unwrap();

        let logged = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("template root"), "got: {}", logged);
        assert_eq!(
            app.config().template_root("WidgetsController"),
            Some(std::path::PathBuf::from("no/such/dir"))
        );
    }
}
