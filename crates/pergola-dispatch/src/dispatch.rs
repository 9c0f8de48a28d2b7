//! The dispatcher: the core's sole external entry point.
//!
//! One call per inbound request:
//!
//! 1. resolve the path to an [`Action`] (failures propagate),
//! 2. check the action cache - a hit returns immediately, skipping
//!    invocation and layout rendering entirely,
//! 3. on a miss: bind the current action, invoke the method with its
//!    positional arguments, apply any template reroute, render the layout,
//! 4. store the final post-layout output if a cache rule applies.
//!
//! Caching wraps the fully rendered output, not the raw action return
//! value: changing a layout does not invalidate cached pages until an
//! explicit cache clear. That staleness trade-off is part of the contract.
//! Only successful renders are ever stored; errors are never cached.

use std::sync::Arc;

use pergola_inform::Informer;
use serde_json::json;

use crate::cache::{ActionCache, Clock};
use crate::config::ConfigStore;
use crate::current;
use crate::engine::TemplateEngine;
use crate::error::DispatchError;
use crate::handler::InvokeContext;
use crate::layout::LayoutEngine;
use crate::registry::Registry;
use crate::request::Request;
use crate::resolve::{Action, Resolver};

/// Orchestrates resolution, caching, invocation and layout rendering.
///
/// Safe to share across threads; one instance serves all concurrent
/// dispatches.
pub struct Dispatcher {
    registry: Arc<Registry>,
    config: Arc<ConfigStore>,
    resolver: Resolver,
    cache: ActionCache,
    layouts: LayoutEngine,
    engine: Arc<dyn TemplateEngine>,
    informer: Arc<Informer>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<Registry>,
        config: Arc<ConfigStore>,
        engine: Arc<dyn TemplateEngine>,
        informer: Arc<Informer>,
    ) -> Self {
        Self {
            resolver: Resolver::new(registry.clone()),
            cache: ActionCache::new(),
            layouts: LayoutEngine::new(config.clone(), engine.clone()),
            registry,
            config,
            engine,
            informer,
        }
    }

    /// Replaces the cache's clock. For tests driving TTL expiry by hand.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.cache = ActionCache::with_clock(clock);
        self
    }

    /// The rendered-output cache, exposed for explicit invalidation.
    pub fn cache(&self) -> &ActionCache {
        &self.cache
    }

    /// Dispatches one request path and returns the rendered response body.
    pub fn dispatch(&self, path: &str, request: &Request) -> Result<String, DispatchError> {
        let action = self.resolver.resolve(path)?;

        let options = self
            .config
            .cache_options(action.handler().name(), action.method());
        if let Some(options) = &options {
            if let Some(content) = self.cache.lookup(&action, request, options) {
                self.informer.debug(&format!(
                    "cache hit {} for {}",
                    ActionCache::base_key(&action),
                    request
                ));
                return Ok(content);
            }
        }

        let _bound = current::bind(&action);
        self.informer
            .debug(&format!("dispatching {} for {}", action, request));

        let body = action
            .spec()
            .invoke(&InvokeContext {
                args: action.args(),
                request,
            })
            .map_err(|source| DispatchError::ActionInvocation {
                handler: action.handler().name().to_string(),
                action: action.method().to_string(),
                source,
            })?;

        let body = self.apply_reroute(&action, body)?;
        let rendered = self.layouts.render(&action, &body)?;

        if let Some(options) = &options {
            self.cache.store(&action, request, options, &rendered);
            self.informer.debug(&format!(
                "cached {} for {}",
                ActionCache::base_key(&action),
                request
            ));
        }
        Ok(rendered)
    }

    // Template rerouting: render the action's output through another
    // handler type's action template before layouting. Render failures
    // surface unwrapped.
    fn apply_reroute(&self, action: &Action, body: String) -> Result<String, DispatchError> {
        let reroute = match self
            .config
            .reroute(action.handler().name(), action.method())
        {
            Some(reroute) => reroute,
            None => return Ok(body),
        };

        let mount = self
            .registry
            .mount_of(&reroute.handler)
            .unwrap_or_else(|| "/".to_string());
        let name = if mount == "/" {
            reroute.action.clone()
        } else {
            format!("{}/{}", mount.trim_start_matches('/'), reroute.action)
        };
        let bindings = json!({ "content": body });
        Ok(self.engine.render_named(&name, &bindings)?)
    }
}
