//! Where part bodies get written to.
//!
//! The parser asks a [`Spool`] for a fresh sink for every part, and hands it back once the part is
//! complete.  [`MemorySpool`] keeps everything in memory, while
//! [`DirSpool`](crate::filestream::DirSpool) writes files to a directory.
use std::io::{self, Write};

/// Creates writable sinks for part bodies, and cleans them up again
pub trait Spool {
    /// Where the bytes of a part are written to
    type Sink: Write;
    /// A handle to a finished part, such as a path
    type Location;

    /// Create a new sink.  `extension` is a hint taken from the upload filename (i.e, `txt`)
    fn create(&mut self, extension: &str) -> io::Result<Self::Sink>;

    /// Close a sink after its part was completely written
    fn finish(&mut self, sink: Self::Sink) -> io::Result<Self::Location>;

    /// Throw away a sink whose part could not be completely read
    fn abort(&mut self, sink: Self::Sink) -> io::Result<()> {
        drop(sink);
        Ok(())
    }

    /// Remove a finished part from storage
    fn discard(&mut self, location: Self::Location) -> io::Result<()>;
}

/// A part body stored in a [`MemorySpool`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryEntry {
    /// The extension hint the sink was created with
    pub extension: String,
    /// The part body
    pub bytes: Vec<u8>,
}

/// A sink created by [`MemorySpool`]
#[derive(Debug)]
pub struct MemorySink {
    extension: String,
    bytes: Vec<u8>,
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A [`Spool`] which keeps each part in memory, with its index as the location
#[derive(Debug, Default)]
pub struct MemorySpool {
    entries: Vec<Option<MemoryEntry>>,
    opened: usize,
}

impl MemorySpool {
    /// Get a finished part, if it hasn't been discarded
    pub fn get(&self, location: usize) -> Option<&MemoryEntry> {
        self.entries.get(location).and_then(Option::as_ref)
    }

    /// Remove a finished part, taking its contents
    pub fn take(&mut self, location: usize) -> Option<MemoryEntry> {
        self.entries.get_mut(location).and_then(Option::take)
    }

    /// How many sinks have been created
    pub fn opened(&self) -> usize {
        self.opened
    }

    /// How many finished parts are currently stored
    pub fn stored(&self) -> usize {
        self.entries.iter().flatten().count()
    }
}

impl Spool for MemorySpool {
    type Sink = MemorySink;
    type Location = usize;

    fn create(&mut self, extension: &str) -> io::Result<MemorySink> {
        self.opened += 1;

        Ok(MemorySink {
            extension: extension.to_owned(),
            bytes: Vec::new(),
        })
    }

    fn finish(&mut self, sink: MemorySink) -> io::Result<usize> {
        self.entries.push(Some(MemoryEntry {
            extension: sink.extension,
            bytes: sink.bytes,
        }));

        Ok(self.entries.len() - 1)
    }

    fn discard(&mut self, location: usize) -> io::Result<()> {
        match self.take(location) {
            Some(_) => Ok(()),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no spooled part at {location}"),
            )),
        }
    }
}
