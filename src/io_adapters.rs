use crate::command::{OutStream, Streams};
use std::cell::RefCell;
use std::io::{Result as IoResult, Write};
use std::process::Stdio;
use std::rc::Rc;

/// Memory-backed writer for capturing output of builtins.
pub struct MemWriter {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl MemWriter {
    pub fn new() -> Self {
        Self {
            buf: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl Default for MemWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

impl OutStream for MemWriter {
    /// Child processes cannot write into memory; their output is discarded.
    fn stdio(&mut self) -> IoResult<Stdio> {
        Ok(Stdio::null())
    }
}

/// Default streams that collect everything the shell prints.
///
/// Clones share the same buffers, so a caller can keep one clone and read
/// back what an [`Interpreter`](crate::Interpreter) wrote through another.
#[derive(Clone, Default)]
pub struct CapturedStreams {
    out: Rc<RefCell<Vec<u8>>>,
    err: Rc<RefCell<Vec<u8>>>,
}

impl CapturedStreams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.out.borrow()).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.err.borrow()).into_owned()
    }
}

impl Streams for CapturedStreams {
    fn stdout(&self) -> Box<dyn OutStream> {
        Box::new(MemWriter {
            buf: self.out.clone(),
        })
    }

    fn stderr(&self) -> Box<dyn OutStream> {
        Box::new(MemWriter {
            buf: self.err.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captured_streams_keep_stdout_and_stderr_apart() {
        let streams = CapturedStreams::new();
        let observer = streams.clone();

        writeln!(streams.stdout(), "out").unwrap();
        writeln!(streams.stderr(), "err").unwrap();

        assert_eq!(observer.stdout_text(), "out\n");
        assert_eq!(observer.stderr_text(), "err\n");
    }
}
