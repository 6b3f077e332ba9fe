use std::io::{self, Write};

/// Collects program output and hands it to the underlying writer in batches.
///
/// The buffer is written out once it grows past `threshold` bytes, and on
/// [`OutputBuffer::flush`]. Dropping it discards whatever is still pending.
#[derive(Debug)]
pub struct OutputBuffer<W: Write> {
    buffer: Vec<u8>,
    writer: W,
    threshold: usize,
}

impl<W: Write> OutputBuffer<W> {
    pub fn new(writer: W, threshold: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(threshold.saturating_add(1)),
            writer,
            threshold,
        }
    }

    pub fn push(&mut self, byte: u8) -> io::Result<()> {
        self.buffer.push(byte);
        if self.buffer.len() > self.threshold {
            self.flush()?;
        }
        Ok(())
    }

    #[cfg(test)]
    fn pending(&self) -> &[u8] {
        &self.buffer
    }

    pub fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.writer.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        self.writer.flush()
    }
}
