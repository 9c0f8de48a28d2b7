//! Output sinks.
//!
//! A sink is one destination a log line is written to. Terminal sinks
//! (stdout/stderr) are eligible for ANSI colors; file and writer sinks are
//! not, so persisted logs never contain escape codes.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

/// A single log destination.
///
/// Construct sinks with [`Sink::stdout`], [`Sink::stderr`], [`Sink::file`] or
/// [`Sink::writer`] and hand them to the
/// [`InformerBuilder`](crate::InformerBuilder).
pub struct Sink {
    colored: bool,
    writer: Mutex<Target>,
}

enum Target {
    Stdout,
    Stderr,
    Boxed(Box<dyn Write + Send>),
}

impl Sink {
    /// A sink writing to standard output. Eligible for colors.
    pub fn stdout() -> Self {
        Self {
            colored: true,
            writer: Mutex::new(Target::Stdout),
        }
    }

    /// A sink writing to standard error. Eligible for colors.
    pub fn stderr() -> Self {
        Self {
            colored: true,
            writer: Mutex::new(Target::Stderr),
        }
    }

    /// A sink appending to the file at `path`, creating it if absent.
    /// Never colored.
    pub fn file(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::from_file(file))
    }

    /// A sink writing to an already-open file. Never colored.
    pub fn from_file(file: File) -> Self {
        Self {
            colored: false,
            writer: Mutex::new(Target::Boxed(Box::new(file))),
        }
    }

    /// A sink writing to an arbitrary writer. Never colored.
    ///
    /// This is the hook used by tests to capture log output in memory.
    pub fn writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            colored: false,
            writer: Mutex::new(Target::Boxed(writer)),
        }
    }

    /// Whether this sink receives colorized prefixes when color is enabled.
    pub fn is_colored(&self) -> bool {
        self.colored
    }

    /// Writes one finished log line. Write failures are swallowed: logging
    /// must never take the framework down.
    pub(crate) fn write_line(&self, line: &str) {
        let mut target = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = match &mut *target {
            Target::Stdout => writeln!(io::stdout(), "{}", line),
            Target::Stderr => writeln!(io::stderr(), "{}", line),
            Target::Boxed(w) => writeln!(w, "{}", line),
        };
    }

    /// Flushes buffered output, if any.
    pub fn flush(&self) {
        let mut target = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = match &mut *target {
            Target::Stdout => io::stdout().flush(),
            Target::Stderr => io::stderr().flush(),
            Target::Boxed(w) => w.flush(),
        };
    }
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let target = match &*self.writer.lock().unwrap_or_else(|p| p.into_inner()) {
            Target::Stdout => "stdout",
            Target::Stderr => "stderr",
            Target::Boxed(_) => "writer",
        };
        f.debug_struct("Sink")
            .field("target", &target)
            .field("colored", &self.colored)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writer_sink_captures_lines() {
        let buf = SharedBuf::default();
        let sink = Sink::writer(Box::new(buf.clone()));
        sink.write_line("hello");
        sink.write_line("world");

        let captured = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(captured, "hello\nworld\n");
    }

    #[test]
    fn test_terminal_sinks_are_color_eligible() {
        assert!(Sink::stdout().is_colored());
        assert!(Sink::stderr().is_colored());
    }

    #[test]
    fn test_writer_sinks_are_never_colored() {
        let sink = Sink::writer(Box::new(Vec::new()));
        assert!(!sink.is_colored());
    }

    #[test]
    fn test_file_sink_appends() {
        let dir = std::env::temp_dir().join("pergola-inform-sink-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("log.txt");
        let _ = std::fs::remove_file(&path);

        {
            let sink = Sink::file(&path).unwrap();
            sink.write_line("first");
            sink.flush();
        }
        {
            let sink = Sink::file(&path).unwrap();
            sink.write_line("second");
            sink.flush();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first\nsecond\n");
        let _ = std::fs::remove_file(&path);
    }
}
