//! Tag-filtered, multi-sink logging for the pergola web framework.
//!
//! `pergola-inform` provides the [`Informer`], the logger used throughout the
//! framework. Messages carry a [`Tag`] (`debug`, `info`, `warn`, `error`); the
//! informer holds a set of enabled tags and silently drops everything else.
//! Output fans out to any number of sinks: stdout, stderr, append-mode files,
//! or arbitrary writers.
//!
//! # Line format
//!
//! Every line is produced from a format string with three placeholders:
//!
//! ```text
//! [%time] %prefix  %text
//! ```
//!
//! `%time` is the current timestamp rendered through a strftime mask,
//! `%prefix` is the tag's prefix (`INFO `, `DEBUG`, ...), and `%text` is the
//! message. Both the format string and the timestamp mask are configurable.
//!
//! # Colors
//!
//! When color is enabled, the tag prefix is colorized with ANSI codes - but
//! only on terminal sinks (stdout/stderr). File and writer sinks always
//! receive plain text, so logs on disk stay grep-able.
//!
//! # Example
//!
//! ```rust
//! use pergola_inform::{Informer, Tag};
//!
//! let informer = Informer::builder()
//!     .tags([Tag::Info, Tag::Warn, Tag::Error])
//!     .build();
//!
//! informer.info("server starting");
//! informer.debug("not emitted: the debug tag is disabled");
//! assert!(!informer.enabled(Tag::Debug));
//! ```

mod informer;
mod sink;

pub use informer::{Informer, InformerBuilder, Tag};
pub use sink::Sink;
