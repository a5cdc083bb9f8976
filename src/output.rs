//! The process-wide output sink (spec.md §1, §5): every read result,
//! commit/abort notice, and dump line the engine produces flows through one
//! of these.

use std::io::Write;

/// Anything that can receive the engine's output lines, in emission order.
pub trait OutputSink {
    fn emit_line(&mut self, line: String);
}

/// In-memory sink, used by the engine's own tests and by library embedders
/// that want the output as data rather than as bytes on a stream.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Vec<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl OutputSink for MemorySink {
    fn emit_line(&mut self, line: String) {
        self.lines.push(line);
    }
}

/// Sink that writes each line, newline-terminated, to an underlying writer.
/// Used by `main.rs` to stream output to stdout.
pub struct WriterSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> OutputSink for WriterSink<W> {
    fn emit_line(&mut self, line: String) {
        // Best-effort: a closed stdout shouldn't panic the engine.
        let _ = writeln!(self.writer, "{}", line);
    }
}
