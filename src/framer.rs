//! Reassembles transport chunks into protocol lines.
//!
//! The TLS stream hands out data with arbitrary chunk boundaries. [`LineFramer`]
//! buffers raw bytes and yields only complete lines, terminated by CRLF, a lone
//! LF or a lone CR. Bytes are decoded only once a line is complete, so a UTF-8
//! sequence split across two reads is never mangled.

/// Line reassembly buffer holding the leftover partial line between chunks.
#[derive(Debug, Default)]
pub struct LineFramer {
    pending: Vec<u8>,
}

impl LineFramer {
    /// Creates an empty framer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every line it completed, in arrival order.
    ///
    /// Terminators are stripped. A CR that is the last byte seen so far is held
    /// back until the next chunk shows whether it starts a CRLF pair.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        let mut pos = 0;

        while pos < self.pending.len() {
            match self.pending[pos] {
                b'\n' => {
                    lines.push(decode(&self.pending[start..pos]));
                    pos += 1;
                    start = pos;
                }
                b'\r' => match self.pending.get(pos + 1) {
                    None => break,
                    Some(b'\n') => {
                        lines.push(decode(&self.pending[start..pos]));
                        pos += 2;
                        start = pos;
                    }
                    Some(_) => {
                        lines.push(decode(&self.pending[start..pos]));
                        pos += 1;
                        start = pos;
                    }
                },
                _ => pos += 1,
            }
        }

        self.pending.drain(..start);
        lines
    }

    /// Returns the bytes of the current incomplete line.
    #[must_use]
    pub fn remainder(&self) -> &[u8] {
        &self.pending
    }

    /// Drains the buffer at end of stream.
    ///
    /// Returns the unterminated final line, if any. A trailing lone CR counts as
    /// a terminator here since no LF can follow it anymore.
    pub fn finish(&mut self) -> Option<String> {
        let mut rest = std::mem::take(&mut self.pending);
        if rest.last() == Some(&b'\r') {
            rest.pop();
            return Some(decode(&rest));
        }
        if rest.is_empty() {
            None
        } else {
            Some(decode(&rest))
        }
    }
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
