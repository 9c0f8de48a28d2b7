//! A small MVC web framework core.
//!
//! pergola maps request paths to registered handler types ("controllers"),
//! resolves and invokes actions, wraps output in layout templates, and
//! caches rendered pages - everything between "the host server parsed a
//! request" and "here is the response body". HTTP transport, sessions and
//! the template language itself live outside this crate.
//!
//! # Quick start
//!
//! ```rust
//! use pergola::{App, Arity, HandlerType, Request};
//! use pergola_inform::Informer;
//!
//! let app = App::builder().informer(Informer::silent()).build();
//! app.register(
//!     HandlerType::builder("WidgetsController")
//!         .action("index", Arity::exactly(0), |_| Ok("all widgets".into()))
//!         .action("show", Arity::exactly(1), |ctx| {
//!             Ok(format!("widget {}", ctx.args[0]))
//!         })
//!         .build(),
//! );
//! app.startup();
//!
//! let body = app.dispatch("/widgets/show/7", &Request::new()).unwrap();
//! assert_eq!(body, "widget 7");
//! ```
//!
//! # Crates
//!
//! - `pergola-dispatch` - the dispatch core (resolution, caching, layouts).
//! - `pergola-inform` - the tag-filtered, multi-sink logger.
//! - `pergola` (this crate) - the MiniJinja template engine and the [`App`]
//!   wiring it all together.

mod app;
mod engine;

pub use app::{App, AppBuilder};
pub use engine::MiniJinjaEngine;

// The core surface, re-exported so applications depend on one crate.
pub use pergola_dispatch::{
    current, Action, ActionCache, ActionSpec, Arity, BoundAction, CacheOptions, Clock,
    ConfigError, ConfigStore, CurrentAction, DispatchError, Dispatcher, HandlerType,
    HandlerTypeBuilder, InvokeContext, LayoutEngine, LayoutRef, LayoutRules, ManualClock, Registry,
    RenderError, Request, Resolver, SubstitutionEngine, SystemClock, TemplateEngine,
    TemplateReroute, ValueCache,
};
pub use pergola_inform::{Informer, InformerBuilder, Sink, Tag};
