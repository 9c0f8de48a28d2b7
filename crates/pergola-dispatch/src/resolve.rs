//! Path resolution: request path → invocation target.
//!
//! The resolver finds the longest registered mount path that prefixes the
//! request path on a segment boundary, splits the remainder into a method
//! name and positional arguments, and validates both against the handler
//! type's method table before anything is invoked.

use std::fmt;
use std::sync::Arc;

use crate::error::DispatchError;
use crate::handler::{ActionSpec, HandlerType};
use crate::registry::Registry;

/// A resolved invocation target. Created per dispatch, consumed
/// immediately, never persisted.
#[derive(Debug, Clone)]
pub struct Action {
    handler: Arc<HandlerType>,
    mount: String,
    spec: ActionSpec,
    args: Vec<String>,
}

impl Action {
    pub fn handler(&self) -> &Arc<HandlerType> {
        &self.handler
    }

    /// The mount path the request matched.
    pub fn mount(&self) -> &str {
        &self.mount
    }

    pub fn method(&self) -> &str {
        self.spec.name()
    }

    /// The resolved method-table entry.
    pub fn spec(&self) -> &ActionSpec {
        &self.spec
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.handler.name(), self.spec.name())
    }
}

/// Resolves request paths against the registry.
pub struct Resolver {
    registry: Arc<Registry>,
}

impl Resolver {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Resolves a request path to an [`Action`].
    ///
    /// The method name defaults to `index` when the path carries nothing
    /// beyond the mount; remaining segments become positional arguments.
    pub fn resolve(&self, path: &str) -> Result<Action, DispatchError> {
        let path = normalize_path(path);

        let mount = self
            .longest_mount_prefix(&path)
            .ok_or_else(|| DispatchError::NoMapping { path: path.clone() })?;
        // Vacated between probe and lookup only if registration races
        // dispatch; treat it the same as never mapped.
        let handler = self
            .registry
            .at(&mount)
            .ok_or_else(|| DispatchError::NoMapping { path: path.clone() })?;

        let remainder = &path[mount.len()..];
        let mut segments = remainder.split('/').filter(|s| !s.is_empty());
        let method = segments.next().unwrap_or("index").to_string();
        let args: Vec<String> = segments.map(str::to_string).collect();

        let spec = handler
            .action(&method)
            .ok_or_else(|| DispatchError::ActionNotFound {
                handler: handler.name().to_string(),
                action: method.clone(),
            })?;

        // Actions contributed by an excluded capability are not reachable.
        if let Some(cap) = spec.capability() {
            if !self
                .registry
                .effective_capabilities(handler.name())
                .contains(cap)
            {
                return Err(DispatchError::ActionNotFound {
                    handler: handler.name().to_string(),
                    action: method,
                });
            }
        }

        if !spec.arity().accepts(args.len()) {
            return Err(DispatchError::Arity {
                handler: handler.name().to_string(),
                action: method,
                expected: spec.arity().to_string(),
                given: args.len(),
            });
        }

        let spec = spec.clone();
        Ok(Action {
            handler,
            mount,
            spec,
            args,
        })
    }

    fn longest_mount_prefix(&self, path: &str) -> Option<String> {
        self.registry
            .mounts()
            .into_iter()
            .find(|mount| is_mount_prefix(mount, path))
    }
}

/// True when `mount` prefixes `path` on a segment boundary: `/foo` matches
/// `/foo` and `/foo/bar` but never `/foobar`. The root mount matches
/// everything.
fn is_mount_prefix(mount: &str, path: &str) -> bool {
    if mount == "/" {
        return true;
    }
    match path.strip_prefix(mount) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Normalizes a request or mount path: ensures the leading slash, strips
/// the trailing one (`/` itself excepted).
pub(crate) fn normalize_path(path: &str) -> String {
    let mut out = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    while out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}
