//! The render-service seam.
//!
//! The dispatch core does not know how templates are rendered - it only
//! knows that a named template plus a set of bindings can be turned into a
//! string, or fail. [`TemplateEngine`] is that contract; the `pergola` crate
//! provides the MiniJinja-backed implementation with on-disk template lookup.
//!
//! [`SubstitutionEngine`] is a minimal in-memory implementation for tests and
//! embedders that don't want a full template language.

use std::collections::HashMap;

use thiserror::Error;

/// Errors surfaced by a template engine.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The named template does not exist.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// The template exists but failed to render.
    #[error("render error: {0}")]
    Render(String),

    /// The bindings could not be serialized for the engine.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RenderError {
    fn from(e: serde_json::Error) -> Self {
        RenderError::Serialization(e.to_string())
    }
}

/// A service that renders named templates with bindings.
///
/// Bindings are passed as a JSON object; each top-level key becomes a
/// template variable. The [`LayoutEngine`](crate::LayoutEngine) binds the
/// wrapped body as `content`.
pub trait TemplateEngine: Send + Sync {
    /// Renders the template registered under `name`.
    fn render_named(
        &self,
        name: &str,
        bindings: &serde_json::Value,
    ) -> Result<String, RenderError>;

    /// Whether a template with this name can be resolved.
    fn has_template(&self, name: &str) -> bool;
}

/// A pure-std engine that replaces `{{ key }}` with the string form of the
/// binding under `key`. No loops, no conditionals, no escaping.
///
/// # Example
///
/// ```rust
/// use pergola_dispatch::{SubstitutionEngine, TemplateEngine};
/// use serde_json::json;
///
/// let mut engine = SubstitutionEngine::new();
/// engine.add_template("page", "<main>{{ content }}</main>");
/// let out = engine
///     .render_named("page", &json!({"content": "hi"}))
///     .unwrap();
/// assert_eq!(out, "<main>hi</main>");
/// ```
#[derive(Debug, Default)]
pub struct SubstitutionEngine {
    templates: HashMap<String, String>,
}

impl SubstitutionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a template under `name`, replacing any previous one.
    pub fn add_template(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(name.into(), source.into());
    }

    fn binding_text(value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl TemplateEngine for SubstitutionEngine {
    fn render_named(
        &self,
        name: &str,
        bindings: &serde_json::Value,
    ) -> Result<String, RenderError> {
        let source = self
            .templates
            .get(name)
            .ok_or_else(|| RenderError::TemplateNotFound(name.to_string()))?;

        let mut out = source.clone();
        if let Some(map) = bindings.as_object() {
            for (key, value) in map {
                let needle = format!("{{{{ {} }}}}", key);
                out = out.replace(&needle, &Self::binding_text(value));
            }
        }
        Ok(out)
    }

    fn has_template(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }
}
