//! Error taxonomy for dispatch and configuration.
//!
//! Two families: [`DispatchError`] for failures during a dispatch (request
//! scoped, never fatal to the process) and [`ConfigError`] for misuse of the
//! declarative configuration calls (raised eagerly at definition time, so a
//! misconfigured handler surfaces at startup rather than under request load).

use thiserror::Error;

use crate::engine::RenderError;

/// A failure while dispatching a single request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No handler type is mapped for any prefix of the path. The host should
    /// fall back to not-found / static-asset behavior.
    #[error("no handler mapped for '{path}'")]
    NoMapping {
        /// The (normalized) request path.
        path: String,
    },

    /// The resolved handler type has no action with the requested name.
    /// Request-level 404 equivalent.
    #[error("{handler} has no action '{action}'")]
    ActionNotFound {
        /// Handler type name.
        handler: String,
        /// The action that was requested.
        action: String,
    },

    /// The action exists but rejects the number of positional arguments
    /// extracted from the path. Request-level 404 equivalent.
    #[error("action '{action}' on {handler} expects {expected} argument(s), got {given}")]
    Arity {
        handler: String,
        action: String,
        /// Human-readable rendering of the declared arity.
        expected: String,
        given: usize,
    },

    /// A configured layout could not be located or rendered. Deliberately
    /// distinct from "no layout configured", which is not an error.
    #[error("layout '{layout}' for {handler} could not be resolved")]
    LayoutResolution {
        handler: String,
        /// The resolved template name of the layout.
        layout: String,
        #[source]
        source: RenderError,
    },

    /// A template render failure outside layout resolution, surfaced
    /// unwrapped from the render service.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Handler code failed. The underlying cause is propagated unmodified so
    /// application-level error pages can inspect it.
    #[error("action '{action}' on {handler} failed")]
    ActionInvocation {
        handler: String,
        action: String,
        #[source]
        source: anyhow::Error,
    },
}

impl DispatchError {
    /// True for the errors a host should answer with a 404-style response
    /// rather than a 500-style one.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DispatchError::NoMapping { .. }
                | DispatchError::ActionNotFound { .. }
                | DispatchError::Arity { .. }
        )
    }
}

/// Misuse of a declarative configuration call, raised at definition time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A mount path that cannot be normalized (e.g. empty).
    #[error("invalid mount path '{0}'")]
    InvalidMount(String),

    /// A configuration call referenced a handler type that was never
    /// registered.
    #[error("unknown handler type '{0}'")]
    UnknownType(String),

    /// A per-action layout mapping that names no actions would silently do
    /// nothing; refuse it instead.
    #[error("layout mapping '{layout}' on {handler} names no actions")]
    EmptyLayoutMapping { handler: String, layout: String },

    /// A cache rule that names no actions.
    #[error("cache rule on {0} names no actions")]
    EmptyCacheRule(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        let no_mapping = DispatchError::NoMapping {
            path: "/x".into(),
        };
        let not_found = DispatchError::ActionNotFound {
            handler: "WidgetsController".into(),
            action: "missing".into(),
        };
        let arity = DispatchError::Arity {
            handler: "WidgetsController".into(),
            action: "show".into(),
            expected: "1".into(),
            given: 0,
        };
        assert!(no_mapping.is_not_found());
        assert!(not_found.is_not_found());
        assert!(arity.is_not_found());

        let invocation = DispatchError::ActionInvocation {
            handler: "WidgetsController".into(),
            action: "show".into(),
            source: anyhow::anyhow!("boom"),
        };
        assert!(!invocation.is_not_found());
    }

    #[test]
    fn test_layout_resolution_keeps_source() {
        use std::error::Error as _;

        let err = DispatchError::LayoutResolution {
            handler: "WidgetsController".into(),
            layout: "widgets/main".into(),
            source: RenderError::TemplateNotFound("widgets/main".into()),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("widgets/main"));
    }

    #[test]
    fn test_render_error_passes_through_unwrapped() {
        let err: DispatchError = RenderError::Render("bad syntax".into()).into();
        assert_eq!(err.to_string(), "render error: bad syntax");
    }
}
