/*
 * sink.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Size-capped output sink.

use crate::error::TemplateError;
use crate::options::Encoding;
use std::io::Write;

/// Encodes rendered text into the destination writer and enforces the
/// output cap.
///
/// With `max_size > 0`, a write that would push the total past the cap is
/// refused whole: nothing from it is written, `limit_reached` is set and
/// [`TemplateError::OutputLimitExceeded`] is returned. Output is therefore
/// never silently truncated mid-chunk.
#[derive(Debug)]
pub struct OutputSink<W: Write> {
    inner: W,
    encoding: Encoding,
    max_size: usize,
    bytes_written: usize,
    limit_reached: bool,
}

impl<W: Write> OutputSink<W> {
    pub fn new(inner: W, encoding: Encoding, max_size: usize) -> Self {
        Self {
            inner,
            encoding,
            max_size,
            bytes_written: 0,
            limit_reached: false,
        }
    }

    pub fn write(&mut self, text: &str) -> Result<(), TemplateError> {
        if text.is_empty() {
            return Ok(());
        }
        if self.limit_reached {
            return Err(TemplateError::OutputLimitExceeded {
                limit: self.max_size,
            });
        }
        let len = self.encoding.encoded_len(text);
        if self.max_size > 0 && self.bytes_written + len > self.max_size {
            self.limit_reached = true;
            return Err(TemplateError::OutputLimitExceeded {
                limit: self.max_size,
            });
        }
        match self.encoding {
            Encoding::Utf8 => self.inner.write_all(text.as_bytes())?,
            other => self.inner.write_all(&other.encode(text))?,
        }
        self.bytes_written += len;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), TemplateError> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    pub fn limit_reached(&self) -> bool {
        self.limit_reached
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uncapped() {
        let mut sink = OutputSink::new(Vec::new(), Encoding::Utf8, 0);
        for _ in 0..100 {
            sink.write("0123456789").unwrap();
        }
        assert_eq!(sink.bytes_written(), 1000);
        assert!(!sink.limit_reached());
    }

    #[test]
    fn test_refuses_write_crossing_the_cap() {
        let mut sink = OutputSink::new(Vec::new(), Encoding::Utf8, 8);
        sink.write("abcde").unwrap();
        let err = sink.write("fghij").unwrap_err();
        assert!(matches!(err, TemplateError::OutputLimitExceeded { limit: 8 }));
        assert!(sink.limit_reached());
        // once reached, even writes that would fit are refused
        assert!(sink.write("x").is_err());
        assert_eq!(sink.bytes_written(), 5);
        assert_eq!(sink.into_inner(), b"abcde");
    }

    #[test]
    fn test_exact_fit_is_allowed() {
        let mut sink = OutputSink::new(Vec::new(), Encoding::Utf8, 4);
        sink.write("ab").unwrap();
        sink.write("cd").unwrap();
        assert!(!sink.limit_reached());
        assert_eq!(sink.bytes_written(), 4);
    }

    #[test]
    fn test_cap_counts_encoded_bytes() {
        let mut sink = OutputSink::new(Vec::new(), Encoding::Utf16Le, 4);
        sink.write("ab").unwrap();
        assert!(sink.write("c").is_err());
        assert_eq!(sink.into_inner(), vec![b'a', 0, b'b', 0]);
    }
}
