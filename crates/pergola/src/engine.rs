//! MiniJinja-backed template engine.
//!
//! The default implementation of the core's
//! [`TemplateEngine`](pergola_dispatch::TemplateEngine) seam: Jinja2-style
//! syntax, loops, conditionals, includes, plus on-disk template lookup
//! rooted at the framework's template root.

use std::path::Path;

use minijinja::{path_loader, Environment, ErrorKind, Value};
use serde::Serialize;

use pergola_dispatch::{RenderError, TemplateEngine};

/// Template engine over a [`minijinja::Environment`].
///
/// Templates come from two places: named templates registered with
/// [`add_template`](Self::add_template), and - when built with
/// [`with_root`](Self::with_root) - files loaded lazily from the template
/// root, addressed by relative path.
///
/// # Example
///
/// ```rust
/// use pergola::MiniJinjaEngine;
/// use pergola_dispatch::TemplateEngine;
/// use serde_json::json;
///
/// let mut engine = MiniJinjaEngine::new();
/// engine
///     .add_template("page", "<main>{{ content }}</main>")
///     .unwrap();
/// let out = engine
///     .render_named("page", &json!({"content": "hi"}))
///     .unwrap();
/// assert_eq!(out, "<main>hi</main>");
/// ```
pub struct MiniJinjaEngine {
    env: Environment<'static>,
}

impl MiniJinjaEngine {
    /// An engine with no file lookup; templates must be added by hand.
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
        }
    }

    /// An engine that loads templates from files under `root`.
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let mut env = Environment::new();
        env.set_loader(path_loader(root.as_ref()));
        Self { env }
    }

    /// Registers a named template, compiling it eagerly.
    pub fn add_template(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<(), RenderError> {
        self.env
            .add_template_owned(name.into(), source.into())
            .map_err(|e| RenderError::Render(e.to_string()))
    }

    /// Renders an inline template string with serializable data.
    pub fn render_str<T: Serialize>(&self, source: &str, data: &T) -> Result<String, RenderError> {
        self.env
            .render_str(source, Value::from_serialize(data))
            .map_err(|e| RenderError::Render(e.to_string()))
    }

    /// The underlying environment, for registering filters or functions.
    pub fn environment_mut(&mut self) -> &mut Environment<'static> {
        &mut self.env
    }

    pub fn environment(&self) -> &Environment<'static> {
        &self.env
    }
}

impl Default for MiniJinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for MiniJinjaEngine {
    fn render_named(
        &self,
        name: &str,
        bindings: &serde_json::Value,
    ) -> Result<String, RenderError> {
        let template = self.env.get_template(name).map_err(|e| {
            if e.kind() == ErrorKind::TemplateNotFound {
                RenderError::TemplateNotFound(name.to_string())
            } else {
                RenderError::Render(e.to_string())
            }
        })?;
        template
            .render(Value::from_serialize(bindings))
            .map_err(|e| RenderError::Render(e.to_string()))
    }

    fn has_template(&self, name: &str) -> bool {
        self.env.get_template(name).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_named() {
        let mut engine = MiniJinjaEngine::new();
        engine
            .add_template("greet", "Hello, {{ name }}!")
            .unwrap();
        let out = engine
            .render_named("greet", &json!({"name": "World"}))
            .unwrap();
        assert_eq!(out, "Hello, World!");
    }

    #[test]
    fn test_control_flow() {
        let mut engine = MiniJinjaEngine::new();
        engine
            .add_template("list", "{% for i in items %}{{ i }},{% endfor %}")
            .unwrap();
        let out = engine
            .render_named("list", &json!({"items": ["a", "b"]}))
            .unwrap();
        assert_eq!(out, "a,b,");
    }

    #[test]
    fn test_missing_template_maps_to_not_found() {
        let engine = MiniJinjaEngine::new();
        let err = engine.render_named("ghost", &json!({})).unwrap_err();
        assert!(matches!(err, RenderError::TemplateNotFound(name) if name == "ghost"));
        assert!(!engine.has_template("ghost"));
    }

    #[test]
    fn test_render_str() {
        #[derive(serde::Serialize)]
        struct Data {
            count: usize,
        }
        let engine = MiniJinjaEngine::new();
        let out = engine.render_str("n = {{ count }}", &Data { count: 3 }).unwrap();
        assert_eq!(out, "n = 3");
    }

    #[test]
    fn test_file_lookup_from_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("widgets")).unwrap();
        std::fs::write(
            dir.path().join("widgets/main"),
            "<page>{{ content }}</page>",
        )
        .unwrap();

        let engine = MiniJinjaEngine::with_root(dir.path());
        assert!(engine.has_template("widgets/main"));
        let out = engine
            .render_named("widgets/main", &json!({"content": "x"}))
            .unwrap();
        assert_eq!(out, "<page>x</page>");
    }
}
