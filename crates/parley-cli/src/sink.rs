//! Terminal rendering of streamed replies.

use std::io::Write;

use parley_ai::DisplaySink;

/// Writes text deltas to stdout as they arrive and announces tool calls.
pub struct TerminalSink<W: Write + Send> {
    out: W,
    /// Whether the cursor sits mid-line after streamed text.
    mid_line: bool,
}

impl TerminalSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            mid_line: false,
        }
    }

    /// End the current line if streamed text left one open.
    pub fn finish_line(&mut self) {
        if self.mid_line {
            let _ = writeln!(self.out);
            let _ = self.out.flush();
            self.mid_line = false;
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> DisplaySink for TerminalSink<W> {
    fn on_text(&mut self, chunk: &str) {
        let _ = write!(self.out, "{chunk}");
        let _ = self.out.flush();
        self.mid_line = !chunk.ends_with('\n');
    }

    fn on_tool_call(&mut self, tool_name: &str, formatted_args: &str) {
        self.finish_line();
        let _ = writeln!(self.out, "[tool] {tool_name} {formatted_args}");
        let _ = self.out.flush();
    }
}
