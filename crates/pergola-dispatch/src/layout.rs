//! Layout resolution and rendering.
//!
//! A layout is an enclosing template rendered around an action's output,
//! receiving that output under the `content` binding. Which layout applies
//! is the owning handler type's policy (see
//! [`LayoutRules::layout_for`](crate::LayoutRules::layout_for)): denylist
//! first, then per-action override, then the type-wide default, else none.
//!
//! A layout renders as a plain template, never as another dispatched
//! action - so a layout cannot pull in its own layout and chains are
//! impossible by construction.

use std::sync::Arc;

use serde_json::json;

use crate::config::ConfigStore;
use crate::engine::TemplateEngine;
use crate::error::DispatchError;
use crate::resolve::Action;

/// Renders the enclosing layout (if any) around action output.
pub struct LayoutEngine {
    config: Arc<ConfigStore>,
    engine: Arc<dyn TemplateEngine>,
}

impl LayoutEngine {
    pub fn new(config: Arc<ConfigStore>, engine: Arc<dyn TemplateEngine>) -> Self {
        Self { config, engine }
    }

    /// Wraps `body` in the layout configured for the action, or returns it
    /// unchanged when no layout applies.
    ///
    /// A configured layout that cannot be located or rendered is a
    /// [`DispatchError::LayoutResolution`] - deliberately not the same
    /// thing as "no layout configured".
    pub fn render(&self, action: &Action, body: &str) -> Result<String, DispatchError> {
        let rules = self.config.layout_rules(action.handler().name());
        let layout = match rules.layout_for(action.method()) {
            Some(layout) => layout.clone(),
            None => return Ok(body.to_string()),
        };

        let name = layout.resolve(action.mount());
        let bindings = json!({ "content": body });
        self.engine
            .render_named(&name, &bindings)
            .map_err(|source| DispatchError::LayoutResolution {
                handler: action.handler().name().to_string(),
                layout: name,
                source,
            })
    }
}
