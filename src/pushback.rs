use std::io::{self, BufRead, BufReader, Read};

/// A buffered reader that can hand bytes back to be read again.
///
/// Up to `capacity` bytes can be pushed back at any one time.  Pushed back bytes are always read
/// before anything else from the underlying reader, in the same order they were given to
/// [`unread`](PushbackReader::unread).
pub struct PushbackReader<R> {
    inner: BufReader<R>,
    pushback: Box<[u8]>,
    pos: usize,
}

impl<R: Read> PushbackReader<R> {
    /// Wrap a reader with room for `capacity` pushed back bytes
    pub fn new(inner: R, capacity: usize) -> Self {
        Self {
            inner: BufReader::new(inner),
            pushback: vec![0; capacity].into_boxed_slice(),
            pos: capacity,
        }
    }

    /// The maximum amount of bytes that can be pushed back at once
    pub fn capacity(&self) -> usize {
        self.pushback.len()
    }

    /// Read a single byte, returning `None` at the end of the stream
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if self.pos < self.pushback.len() {
            let byte = self.pushback[self.pos];
            self.pos += 1;
            return Ok(Some(byte));
        }

        let byte = match self.inner.fill_buf()?.first() {
            Some(&byte) => byte,
            None => return Ok(None),
        };

        self.inner.consume(1);

        Ok(Some(byte))
    }

    /// Push bytes back so that the next reads return them, in order, before anything else
    pub fn unread(&mut self, bytes: &[u8]) -> io::Result<()> {
        if bytes.len() > self.pos {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "pushback buffer is full",
            ));
        }

        let start = self.pos - bytes.len();
        self.pushback[start..self.pos].copy_from_slice(bytes);
        self.pos = start;

        Ok(())
    }

    /// Push back a single byte
    pub fn unread_byte(&mut self, byte: u8) -> io::Result<()> {
        self.unread(&[byte])
    }

    /// Discard up to `amount` bytes, returning how many were actually skipped.
    ///
    /// Less than `amount` is only returned if the stream ended.
    pub fn skip(&mut self, amount: usize) -> io::Result<usize> {
        let mut skipped = 0;

        while skipped < amount {
            let available = self.fill_buf()?.len();

            if available == 0 {
                break;
            }

            let step = available.min(amount - skipped);
            self.consume(step);
            skipped += step;
        }

        Ok(skipped)
    }

    /// Get a reference to the underlying reader
    pub fn get_ref(&self) -> &R {
        self.inner.get_ref()
    }
}

impl<R: Read> Read for PushbackReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let read = {
            let mut available = self.fill_buf()?;
            available.read(out)?
        };

        self.consume(read);

        Ok(read)
    }
}

impl<R: Read> BufRead for PushbackReader<R> {
    /// Returns pushed back bytes if there are any, otherwise the inner buffer
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos < self.pushback.len() {
            return Ok(&self.pushback[self.pos..]);
        }

        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        let pushed = self.pushback.len() - self.pos;

        if amt <= pushed {
            self.pos += amt;
        } else {
            self.pos = self.pushback.len();
            self.inner.consume(amt - pushed);
        }
    }
}
