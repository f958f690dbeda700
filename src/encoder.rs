use std::io::Write;

use serde::Serialize;

/// Writes the response envelope
/// `[{"in":[...],"headers":[...],"out":[[...],...]},...]` one fragment at a
/// time, flushing after each so the client sees results as they are produced.
///
/// The opening `[` goes out together with the first line, so nothing reaches
/// the transport until the first line has executed. Until then a failure can
/// still be answered with a clean error status, see [`JsonStream::committed`].
pub struct JsonStream<W: Write> {
    out: W,
    lines: usize,
    rows: usize,
    committed: bool,
}

impl<W: Write> JsonStream<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            lines: 0,
            rows: 0,
            committed: false,
        }
    }

    /// Whether any part of the response has been handed to the transport.
    pub fn committed(&self) -> bool {
        self.committed
    }

    /// Number of lines opened so far.
    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn open_line<S: Serialize>(
        &mut self,
        input: &[S],
        headers: &[String],
    ) -> std::io::Result<()> {
        self.out.write_all(if self.lines == 0 { b"[" } else { b"," })?;
        self.out.write_all(br#"{"in":"#)?;
        serde_json::to_writer(&mut self.out, input)?;
        self.out.write_all(br#","headers":"#)?;
        serde_json::to_writer(&mut self.out, headers)?;
        self.out.write_all(br#","out":["#)?;
        self.lines += 1;
        self.rows = 0;
        self.flush()
    }

    pub fn row<S: Serialize>(&mut self, cells: &[S]) -> std::io::Result<()> {
        if self.rows > 0 {
            self.out.write_all(b",")?;
        }
        serde_json::to_writer(&mut self.out, cells)?;
        self.rows += 1;
        self.flush()
    }

    pub fn close_line(&mut self) -> std::io::Result<()> {
        self.out.write_all(b"]}")?;
        self.flush()
    }

    /// Close the envelope. An empty body produces `[]`.
    pub fn finish(&mut self) -> std::io::Result<()> {
        if self.lines == 0 {
            self.out.write_all(b"[")?;
        }
        self.out.write_all(b"]\n")?;
        self.flush()
    }

    /// Append free text after the response has been committed. The JSON is
    /// left unterminated; this is best effort and errors are returned only
    /// so the caller can log them.
    pub fn append_diagnostic(&mut self, text: &str) -> std::io::Result<()> {
        self.out.write_all(text.as_bytes())?;
        self.flush()
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.out.flush()?;
        self.committed = true;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
