//! Request dispatch for the pergola web framework.
//!
//! `pergola-dispatch` is the framework's core: it maps an incoming request
//! path to a registered handler type ("controller"), resolves which action on
//! that handler should run, optionally wraps the result in a layout template,
//! and optionally caches rendered output.
//!
//! # Pipeline
//!
//! ```text
//! path
//!   → Resolver        (mount lookup, method + args extraction, arity check)
//!   → ActionCache     (on hit: return cached output, skip everything below)
//!   → action body     (handler code, opaque to the core)
//!   → template reroute (optional, per-action)
//!   → LayoutEngine    (denylist / per-action / type-default layout)
//!   → ActionCache     (store post-layout output if a cache rule applies)
//! ```
//!
//! # Pieces
//!
//! - [`HandlerType`]: a registered handler with an explicit method table
//!   (action name → arity → body).
//! - [`Registry`]: mount-path → handler table, automap assignment.
//! - [`ConfigStore`]: per-type configuration with ancestral lookup and
//!   copy-on-first-write overrides.
//! - [`Resolver`] / [`Action`]: path → invocation target.
//! - [`ActionCache`]: two-tier rendered-output cache with TTL expiry.
//! - [`LayoutEngine`]: layout resolution and rendering.
//! - [`Dispatcher`]: the sole external entry point, orchestrating the above.
//!
//! Template rendering itself is behind the [`TemplateEngine`] trait; the
//! `pergola` crate supplies the MiniJinja-backed implementation. The core
//! never touches the filesystem.
//!
//! # Lifecycle
//!
//! Registration and configuration happen at startup, before concurrent
//! dispatch begins. After startup the Registry and ConfigStore are read-only
//! in practice, and the Dispatcher is safe to share across threads.

mod cache;
mod config;
mod current;
mod dispatch;
mod engine;
mod error;
mod handler;
mod layout;
mod registry;
mod request;
mod resolve;

pub use cache::{ActionCache, Clock, ManualClock, SystemClock, ValueCache};
pub use config::{CacheOptions, ConfigStore, LayoutRef, LayoutRules, TemplateReroute};
pub use current::{current, BoundAction, CurrentAction};
pub use dispatch::Dispatcher;
pub use engine::{RenderError, SubstitutionEngine, TemplateEngine};
pub use error::{ConfigError, DispatchError};
pub use handler::{ActionBody, ActionSpec, Arity, HandlerType, HandlerTypeBuilder, InvokeContext};
pub use layout::LayoutEngine;
pub use registry::Registry;
pub use request::Request;
pub use resolve::{Action, Resolver};
