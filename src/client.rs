use bytes::{Buf, Bytes, BytesMut};
use log::debug;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use std::collections::VecDeque;
use std::io::{self, Read};

/// The main `MultipartRequest` struct for writing Multipart submissions to servers.
///
/// The encoded body is produced by its [`Read`] implementation, pulling from any added streams as it goes
pub struct MultipartRequest<R> {
    boundary: String,
    items: VecDeque<MultipartItems<R>>,
    state: Option<State<R>>,
    started: bool,
    pending: Bytes,
    written: usize,
}

enum State<R> {
    WritingField(MultipartField),
    WritingStream(MultipartStream<R>),
    WritingStreamHeader(MultipartStream<R>),
    Finished,
}

/// The enum for multipart items which is either a field or a stream
pub enum MultipartItems<R> {
    /// MultipartField variant
    Field(MultipartField),
    /// MultipartStream variant
    Stream(MultipartStream<R>),
}

/// A stream which is part of a `MultipartRequest` and used to read out bytes
pub struct MultipartStream<R> {
    name: String,
    filename: String,
    content_type: String,
    stream: R,
}

/// A MultipartField which is part of a `MultipartRequest` and used to add a standard text field
pub struct MultipartField {
    name: String,
    value: String,
}

impl<R> MultipartStream<R> {
    /// Construct a new MultipartStream providing name, filename & content_type
    pub fn new<I: Into<String>>(name: I, filename: I, content_type: I, stream: R) -> Self {
        MultipartStream {
            name: name.into(),
            filename: filename.into(),
            content_type: content_type.into(),
            stream,
        }
    }

    fn write_header(&self, boundary: &str) -> Bytes {
        let mut buf = BytesMut::new();

        buf.extend_from_slice(b"--");
        buf.extend_from_slice(boundary.as_bytes());
        buf.extend_from_slice(b"\r\n");

        buf.extend_from_slice(b"Content-Disposition: form-data; name=\"");
        buf.extend_from_slice(self.name.as_bytes());
        buf.extend_from_slice(b"\"; filename=\"");
        buf.extend_from_slice(self.filename.as_bytes());
        buf.extend_from_slice(b"\"\r\n");
        buf.extend_from_slice(b"Content-Type: ");
        buf.extend_from_slice(self.content_type.as_bytes());
        buf.extend_from_slice(b"\r\n");

        buf.extend_from_slice(b"\r\n");

        buf.freeze()
    }
}

impl MultipartField {
    /// Construct a new MultipartField given a name and value
    pub fn new<I: Into<String>>(name: I, value: I) -> Self {
        MultipartField {
            name: name.into(),
            value: value.into(),
        }
    }

    fn get_bytes(&self, boundary: &str) -> Bytes {
        let mut buf = BytesMut::new();

        buf.extend_from_slice(b"--");
        buf.extend_from_slice(boundary.as_bytes());
        buf.extend_from_slice(b"\r\n");

        buf.extend_from_slice(b"Content-Disposition: form-data; name=\"");
        buf.extend_from_slice(self.name.as_bytes());
        buf.extend_from_slice(b"\"\r\n");

        buf.extend_from_slice(b"\r\n");

        buf.extend_from_slice(self.value.as_bytes());

        buf.extend_from_slice(b"\r\n");

        buf.freeze()
    }
}

impl<R: Read> MultipartRequest<R> {
    /// Construct a new MultipartRequest with a given Boundary
    ///
    /// If you want a boundary generated automatically, then you can use `MultipartRequest::default()`
    pub fn new<I: Into<String>>(boundary: I) -> Self {
        MultipartRequest {
            boundary: boundary.into(),
            items: VecDeque::new(),
            state: None,
            started: false,
            pending: Bytes::new(),
            written: 0,
        }
    }

    fn next_item(&mut self) -> State<R> {
        match self.items.pop_front() {
            Some(MultipartItems::Field(new_field)) => State::WritingField(new_field),
            Some(MultipartItems::Stream(new_stream)) => State::WritingStreamHeader(new_stream),
            None => State::Finished,
        }
    }

    /// Add a raw reader to the Multipart request
    pub fn add_stream<I: Into<String>>(
        &mut self,
        name: I,
        filename: I,
        content_type: I,
        stream: R,
    ) {
        let stream = MultipartStream::new(name, filename, content_type, stream);

        self.items.push_back(MultipartItems::Stream(stream));
    }

    /// Add a Field to the Multipart request
    pub fn add_field<I: Into<String>>(&mut self, name: I, value: I) {
        let field = MultipartField::new(name, value);

        self.items.push_back(MultipartItems::Field(field));
    }

    /// Gets the boundary for the MultipartRequest
    pub fn get_boundary(&self) -> &str {
        &self.boundary
    }

    /// The value for the `Content-Type` header to send along with this request
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    fn write_ending(&self) -> Bytes {
        let mut buf = BytesMut::new();

        buf.extend_from_slice(b"--");
        buf.extend_from_slice(self.boundary.as_bytes());

        buf.extend_from_slice(b"--\r\n");

        buf.freeze()
    }
}

#[cfg(feature = "filestream")]
use crate::filestream::FileStream;
#[cfg(feature = "filestream")]
use std::path::PathBuf;

#[cfg(feature = "filestream")]
impl MultipartRequest<FileStream> {
    /// Add a FileStream to a MultipartRequest given a path to a file
    ///
    /// This will guess the Content Type based upon the path (i.e, .jpg will be `image/jpeg`)
    pub fn add_file<I: Into<String>, P: Into<PathBuf>>(&mut self, name: I, path: P) {
        let buf = path.into();

        let name = name.into();

        let filename = buf
            .file_name()
            .map(|filename| filename.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = mime_guess::MimeGuess::from_path(&buf)
            .first_or_octet_stream()
            .to_string();
        let stream = FileStream::new(buf);

        self.add_stream(name, filename, content_type, stream);
    }
}

impl<R: Read> Default for MultipartRequest<R> {
    fn default() -> Self {
        let mut rng = thread_rng();

        let boundary: String = (&mut rng)
            .sample_iter(Alphanumeric)
            .take(60)
            .map(char::from)
            .collect();

        MultipartRequest::new(boundary)
    }
}

impl<R: Read> Read for MultipartRequest<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if !self.started {
            self.started = true;
            self.state = Some(self.next_item());
        }

        loop {
            if self.pending.has_remaining() {
                let amt = self.pending.len().min(buf.len());
                self.pending.copy_to_slice(&mut buf[..amt]);
                self.written += amt;
                return Ok(amt);
            }

            match self.state.take() {
                Some(State::WritingStreamHeader(stream)) => {
                    debug!("Writing Stream Header for:{}", &stream.filename);
                    self.pending = stream.write_header(&self.boundary);
                    self.state = Some(State::WritingStream(stream));
                }
                Some(State::WritingStream(mut stream)) => {
                    let read = match stream.stream.read(buf) {
                        Ok(read) => read,
                        Err(err) => {
                            self.state = Some(State::WritingStream(stream));
                            return Err(err);
                        }
                    };

                    if read > 0 {
                        self.written += read;
                        self.state = Some(State::WritingStream(stream));
                        return Ok(read);
                    }

                    debug!("Writing Stream Body Finished");

                    //The body needs a line break before whatever boundary comes next
                    self.pending = Bytes::from_static(b"\r\n");
                    self.state = Some(self.next_item());
                }
                Some(State::WritingField(field)) => {
                    debug!("Writing Field: {}", &field.name);
                    self.pending = field.get_bytes(&self.boundary);
                    self.state = Some(self.next_item());
                }
                Some(State::Finished) => {
                    debug!("Writing Stream Finished");
                    self.pending = self.write_ending();
                }
                None => {
                    debug!("Finished request, total bytes:{}", self.written);
                    return Ok(0);
                }
            }
        }
    }
}
