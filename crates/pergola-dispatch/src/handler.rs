//! Handler types and their method tables.
//!
//! A [`HandlerType`] is a registered class of request handlers: a name, an
//! optional parent type (for ancestral configuration lookup), a set of
//! declared capabilities, and an explicit method table mapping action names
//! to a declared [`Arity`] and an invocation body. Resolution checks the
//! table and the arity up front instead of discovering failures mid-call.
//!
//! # Example
//!
//! ```rust
//! use pergola_dispatch::{Arity, HandlerType};
//!
//! let widgets = HandlerType::builder("WidgetsController")
//!     .action("index", Arity::exactly(0), |_ctx| Ok("all widgets".into()))
//!     .action("show", Arity::exactly(1), |ctx| {
//!         Ok(format!("widget {}", ctx.args[0]))
//!     })
//!     .build();
//!
//! assert_eq!(widgets.derived_mount(), "/widgets");
//! assert!(widgets.action("show").is_some());
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::request::Request;

/// What an action body receives: the positional arguments extracted from the
/// path and the request being served.
pub struct InvokeContext<'a> {
    pub args: &'a [String],
    pub request: &'a Request,
}

/// The callable behind an action. Returns the rendered body or an arbitrary
/// handler-level error.
pub type ActionBody =
    Arc<dyn Fn(&InvokeContext<'_>) -> Result<String, anyhow::Error> + Send + Sync>;

/// Declared parameter count for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    min: usize,
    max: Option<usize>,
}

impl Arity {
    /// Exactly `n` arguments.
    pub fn exactly(n: usize) -> Self {
        Self { min: n, max: Some(n) }
    }

    /// `n` or more arguments (var-args tail).
    pub fn at_least(n: usize) -> Self {
        Self { min: n, max: None }
    }

    /// Between `min` and `max` arguments inclusive (trailing optionals).
    pub fn between(min: usize, max: usize) -> Self {
        debug_assert!(min <= max);
        Self { min, max: Some(max) }
    }

    /// Does this arity accept `n` positional arguments?
    pub fn accepts(&self, n: usize) -> bool {
        n >= self.min && self.max.map_or(true, |max| n <= max)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{}", self.min),
            Some(max) => write!(f, "{} to {}", self.min, max),
            None => write!(f, "at least {}", self.min),
        }
    }
}

/// One entry in a handler type's method table.
#[derive(Clone)]
pub struct ActionSpec {
    name: String,
    arity: Arity,
    capability: Option<String>,
    body: ActionBody,
}

impl ActionSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// The capability that contributed this action, if any. Actions from a
    /// capability excluded on the owning type are not dispatchable.
    pub fn capability(&self) -> Option<&str> {
        self.capability.as_deref()
    }

    /// Runs the action body.
    pub fn invoke(&self, ctx: &InvokeContext<'_>) -> Result<String, anyhow::Error> {
        (self.body)(ctx)
    }
}

// The body is an opaque closure; keep Debug output to the declarative parts.
impl fmt::Debug for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSpec")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

/// A registered class of request handlers.
pub struct HandlerType {
    name: String,
    parent: Option<String>,
    actions: HashMap<String, ActionSpec>,
    capabilities: BTreeSet<String>,
}

impl HandlerType {
    pub fn builder(name: impl Into<String>) -> HandlerTypeBuilder {
        HandlerTypeBuilder {
            name: name.into(),
            parent: None,
            actions: HashMap::new(),
            capabilities: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared parent type for ancestral configuration lookup.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Looks up an action in the method table.
    pub fn action(&self, name: &str) -> Option<&ActionSpec> {
        self.actions.get(name)
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    /// Capabilities this type declares (before exclusions are applied).
    pub fn capabilities(&self) -> &BTreeSet<String> {
        &self.capabilities
    }

    /// The mount path automap derives from the type name: the `Controller`
    /// suffix is stripped and the rest snake-cased; the distinguished `Main`
    /// type derives the root mount.
    pub fn derived_mount(&self) -> String {
        let base = self.name.strip_suffix("Controller").unwrap_or(&self.name);
        if base == "Main" {
            "/".to_string()
        } else {
            format!("/{}", snake_case(base))
        }
    }
}

impl fmt::Debug for HandlerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerType")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("actions", &self.actions.len())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// Builder for [`HandlerType`].
pub struct HandlerTypeBuilder {
    name: String,
    parent: Option<String>,
    actions: HashMap<String, ActionSpec>,
    capabilities: BTreeSet<String>,
}

impl HandlerTypeBuilder {
    /// Declares the parent type. Configuration queries on this type fall
    /// back to the parent's settings where no own override exists.
    pub fn parent(mut self, name: impl Into<String>) -> Self {
        self.parent = Some(name.into());
        self
    }

    /// Adds an action to the method table. A later action with the same name
    /// replaces the earlier one.
    pub fn action<F>(mut self, name: impl Into<String>, arity: Arity, body: F) -> Self
    where
        F: Fn(&InvokeContext<'_>) -> Result<String, anyhow::Error> + Send + Sync + 'static,
    {
        let name = name.into();
        self.actions.insert(
            name.clone(),
            ActionSpec {
                name,
                arity,
                capability: None,
                body: Arc::new(body),
            },
        );
        self
    }

    /// Adds an action contributed by a capability, declaring the capability
    /// as a side effect. If the capability is later excluded for this type,
    /// the action stops being dispatchable.
    pub fn capability_action<F>(
        mut self,
        capability: impl Into<String>,
        name: impl Into<String>,
        arity: Arity,
        body: F,
    ) -> Self
    where
        F: Fn(&InvokeContext<'_>) -> Result<String, anyhow::Error> + Send + Sync + 'static,
    {
        let capability = capability.into();
        let name = name.into();
        self.capabilities.insert(capability.clone());
        self.actions.insert(
            name.clone(),
            ActionSpec {
                name,
                arity,
                capability: Some(capability),
                body: Arc::new(body),
            },
        );
        self
    }

    /// Declares a capability without contributing actions.
    pub fn capability(mut self, name: impl Into<String>) -> Self {
        self.capabilities.insert(name.into());
        self
    }

    pub fn build(self) -> HandlerType {
        HandlerType {
            name: self.name,
            parent: self.parent,
            actions: self.actions,
            capabilities: self.capabilities,
        }
    }
}

/// CamelCase → snake_case for automap mount derivation.
fn snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;
    for c in s.chars() {
        if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    out
}
