//! Serialized access to the output destination.
//!
//! Completed records are written with a single `write_all` under the writer
//! lock, so records of concurrent calls never interleave. The lock is held for
//! exactly one record; it is never held while a call is in flight.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// The logger's output destination behind a mutex.
pub struct SinkWriter {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl fmt::Debug for SinkWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkWriter").finish_non_exhaustive()
    }
}

impl SinkWriter {
    /// Wraps an output destination.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    /// Writes one complete record and flushes it.
    ///
    /// Errors are returned, never retried.
    pub fn write(&self, record: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(record)?;
        writer.flush()
    }
}

/// Cloneable in-memory output destination.
///
/// All clones append to the same buffer; useful for capturing log output.
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl MemoryWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded as UTF-8.
    pub fn contents(&self) -> String {
        let bytes = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discards everything written so far.
    pub fn clear(&self) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Writes at most one byte per call to expose torn records.
    #[derive(Clone)]
    struct Trickle(MemoryWriter);

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            match buf.first() {
                Some(byte) => {
                    std::thread::yield_now();
                    self.0.write(std::slice::from_ref(byte))
                }
                None => Ok(0),
            }
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_reaches_destination() {
        let out = MemoryWriter::new();
        let sink = SinkWriter::new(out.clone());
        sink.write(b"one\n").unwrap();
        sink.write(b"two\n").unwrap();
        assert_eq!(out.contents(), "one\ntwo\n");
    }

    #[test]
    fn test_write_error_is_returned() {
        let sink = SinkWriter::new(FailingWriter);
        let err = sink.write(b"lost").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_concurrent_records_do_not_interleave() {
        let out = MemoryWriter::new();
        let sink = Arc::new(SinkWriter::new(Trickle(out.clone())));
        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    let line = format!("{}\n", char::from(b'a' + i).to_string().repeat(32));
                    for _ in 0..10 {
                        sink.write(line.as_bytes()).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let contents = out.contents();
        assert_eq!(contents.lines().count(), 40);
        for line in contents.lines() {
            let first = line.chars().next().unwrap();
            assert_eq!(line.len(), 32);
            assert!(line.chars().all(|c| c == first), "torn record: {line}");
        }
    }
}
