//! The informer itself: tag filtering, line formatting, fan-out.

use std::collections::HashSet;
use std::error::Error;

use console::Style;

use crate::sink::Sink;

/// Default line format. `%time`, `%prefix` and `%text` are interpolated.
pub const DEFAULT_FORMAT: &str = "[%time] %prefix  %text";

/// Default strftime mask for `%time`.
pub const DEFAULT_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

/// Message tags. The informer only emits messages whose tag is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Debug,
    Info,
    Warn,
    Error,
}

impl Tag {
    /// All tags, in severity order.
    pub const ALL: [Tag; 4] = [Tag::Debug, Tag::Info, Tag::Warn, Tag::Error];

    /// The prefix interpolated as `%prefix`. Padded so columns line up.
    pub fn prefix(self) -> &'static str {
        match self {
            Tag::Debug => "DEBUG",
            Tag::Info => "INFO ",
            Tag::Warn => "WARN ",
            Tag::Error => "ERROR",
        }
    }

    fn style(self) -> Style {
        match self {
            Tag::Debug => Style::new().yellow(),
            Tag::Info => Style::new().green(),
            Tag::Warn | Tag::Error => Style::new().red(),
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix().trim_end())
    }
}

/// Builder for [`Informer`].
///
/// Defaults: all tags enabled, one stdout sink, no color, the
/// [`DEFAULT_FORMAT`] line format and [`DEFAULT_TIMESTAMP`] mask.
pub struct InformerBuilder {
    tags: HashSet<Tag>,
    format: String,
    timestamp: String,
    color: bool,
    sinks: Vec<Sink>,
}

impl InformerBuilder {
    /// Replaces the enabled tag set.
    pub fn tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }

    /// Enables a single additional tag.
    pub fn tag(mut self, tag: Tag) -> Self {
        self.tags.insert(tag);
        self
    }

    /// Sets the line format. `%time`, `%prefix` and `%text` are interpolated.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Sets the strftime mask used for `%time`.
    pub fn timestamp(mut self, mask: impl Into<String>) -> Self {
        self.timestamp = mask.into();
        self
    }

    /// Enables ANSI colors on terminal sinks.
    pub fn color(mut self, on: bool) -> Self {
        self.color = on;
        self
    }

    /// Adds a sink. The first call replaces the default stdout sink.
    pub fn sink(mut self, sink: Sink) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn build(self) -> Informer {
        let sinks = if self.sinks.is_empty() {
            vec![Sink::stdout()]
        } else {
            self.sinks
        };
        Informer {
            tags: self.tags,
            format: self.format,
            timestamp: self.timestamp,
            color: self.color,
            sinks,
        }
    }
}

/// The framework logger.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
#[derive(Debug)]
pub struct Informer {
    tags: HashSet<Tag>,
    format: String,
    timestamp: String,
    color: bool,
    sinks: Vec<Sink>,
}

impl Default for Informer {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Informer {
    pub fn builder() -> InformerBuilder {
        InformerBuilder {
            tags: Tag::ALL.into_iter().collect(),
            format: DEFAULT_FORMAT.to_string(),
            timestamp: DEFAULT_TIMESTAMP.to_string(),
            color: false,
            sinks: Vec::new(),
        }
    }

    /// An informer that drops everything. Handy as a test default.
    pub fn silent() -> Self {
        Self::builder().tags([]).build()
    }

    /// Is the given tag enabled?
    pub fn enabled(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn debug(&self, text: &str) {
        self.log(Tag::Debug, text);
    }

    pub fn info(&self, text: &str) {
        self.log(Tag::Info, text);
    }

    pub fn warn(&self, text: &str) {
        self.log(Tag::Warn, text);
    }

    pub fn error(&self, text: &str) {
        self.log(Tag::Error, text);
    }

    /// Logs an error together with its source chain, one line per cause.
    pub fn error_with(&self, err: &(dyn Error + 'static)) {
        self.error(&err.to_string());
        let mut cause = err.source();
        while let Some(c) = cause {
            self.error(&format!("  caused by: {}", c));
            cause = c.source();
        }
    }

    /// Flushes every sink.
    pub fn flush(&self) {
        for sink in &self.sinks {
            sink.flush();
        }
    }

    fn log(&self, tag: Tag, text: &str) {
        if !self.enabled(tag) {
            return;
        }
        let time = chrono::Local::now().format(&self.timestamp).to_string();
        for sink in &self.sinks {
            let prefix = if self.color && sink.is_colored() {
                tag.style().apply_to(tag.prefix()).to_string()
            } else {
                tag.prefix().to_string()
            };
            let line = self
                .format
                .replace("%time", &time)
                .replace("%prefix", &prefix)
                .replace("%text", text);
            sink.write_line(&line);
        }
    }
}
