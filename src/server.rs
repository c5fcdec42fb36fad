use bytes::{Bytes, BytesMut};
use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use log::{debug, warn};
use std::io::{self, Read};
use thiserror::Error;

use crate::disposition::ContentDisposition;
use crate::pushback::PushbackReader;
use crate::scan::{copy_to_boundary, read_line};
use crate::spool::Spool;

/// The extension suggested to the [`Spool`] when the upload name doesn't have one
pub const DEFAULT_EXTENSION: &str = "unknown";

const MULTIPART_FORM_DATA: &str = "multipart/form-data";
const CRLF: &[u8] = b"\r\n";

#[derive(Error, Debug)]
/// The Standard Error Type
pub enum MultipartError {
    /// Given if there is no `Content-Type` header at all
    #[error("Missing Content-Type header")]
    ContentTypeMissing,
    /// Given if the `Content-Type` is something other than `multipart/form-data`
    #[error("Content-Type is not multipart/form-data")]
    ContentTypeMismatch,
    /// Given if the `Content-Type` has no `boundary` parameter
    #[error("No boundary found in Content-Type")]
    BoundaryMissing,
    /// Given if the stream ends before a boundary or line ending could be read
    #[error("Unexpected end of stream")]
    UnexpectedEndOfStream,
    /// Given if there is an error reading the request or writing to the spool
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A single part of a multipart request, with its content already spooled.
///
/// The item owns the spooled content: once returned from [`parse`], removing it from storage is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item<L> {
    location: L,
    name: Option<String>,
    filename: Option<String>,
}

impl<L> Item<L> {
    /// Where the content of this part was spooled to
    pub fn location(&self) -> &L {
        &self.location
    }

    /// Take the location out of the item
    pub fn into_location(self) -> L {
        self.location
    }

    /// The form field name, percent-decoded
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The original filename from the client machine, percent-decoded
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }
}

/// Get the `Content-Type` header out of a header map, if it is present & valid ascii
pub fn content_type_of(headers: &HeaderMap<HeaderValue>) -> Option<&str> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
}

/// Extract the boundary from a `multipart/form-data` content type.
///
/// Quotes around the boundary are removed.  If there is more than one `boundary` parameter, the last one wins.
pub fn parse_boundary(content_type: Option<&str>) -> Result<String, MultipartError> {
    let content_type = content_type.ok_or(MultipartError::ContentTypeMissing)?;

    let is_form_data = content_type
        .get(..MULTIPART_FORM_DATA.len())
        .map_or(false, |mime| mime.eq_ignore_ascii_case(MULTIPART_FORM_DATA));

    if !is_form_data {
        return Err(MultipartError::ContentTypeMismatch);
    }

    content_type
        .split(';')
        .filter_map(|param| param.trim().strip_prefix("boundary="))
        .last()
        .map(|boundary| {
            boundary
                .strip_prefix('"')
                .and_then(|unquoted| unquoted.strip_suffix('"'))
                .unwrap_or(boundary)
        })
        .filter(|boundary| !boundary.is_empty())
        .map(str::to_owned)
        .ok_or(MultipartError::BoundaryMissing)
}

/// The lower cased text after the last `.` of the filename, or [`DEFAULT_EXTENSION`]
pub fn extension_hint(filename: Option<&str>) -> String {
    filename
        .and_then(|filename| filename.rsplit_once('.'))
        .map(|(_, extension)| extension.to_lowercase())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_owned())
}

/// Parse a whole multipart request, spooling each part with the given [`Spool`].
///
/// Nothing is read from `reader` if the content type is missing, isn't `multipart/form-data` or doesn't have a boundary.
///
/// This is all or nothing: if any error occurs, every part spooled so far is discarded before the error is returned.
pub fn parse<S, R>(
    spool: &mut S,
    reader: R,
    content_type: Option<&str>,
) -> Result<Vec<Item<S::Location>>, MultipartError>
where
    S: Spool,
    R: Read,
{
    MultipartParser::from_content_type(content_type)?.parse(spool, reader)
}

/// A blocking parser for a single boundary.
///
/// You normally want [`parse`], unless the boundary has been extracted some other way.
#[derive(Debug, Clone)]
pub struct MultipartParser {
    delimiter: Bytes,
}

impl MultipartParser {
    /// Construct a parser given the boundary from the content type (without any leading `--`)
    pub fn new<I: AsRef<[u8]>>(boundary: I) -> Self {
        let boundary = boundary.as_ref();

        let mut delimiter = BytesMut::with_capacity(boundary.len() + 4);

        delimiter.extend_from_slice(b"\r\n--");
        delimiter.extend_from_slice(boundary);

        Self {
            delimiter: delimiter.freeze(),
        }
    }

    /// Construct a parser from a `Content-Type` header value
    pub fn from_content_type(content_type: Option<&str>) -> Result<Self, MultipartError> {
        parse_boundary(content_type).map(Self::new)
    }

    /// The bytes separating parts, i.e `\r\n--<boundary>`
    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }

    /// Read every part from the reader.  See [`parse`].
    pub fn parse<S, R>(
        &self,
        spool: &mut S,
        reader: R,
    ) -> Result<Vec<Item<S::Location>>, MultipartError>
    where
        S: Spool,
        R: Read,
    {
        let mut reader = PushbackReader::new(reader, self.delimiter.len());
        let mut items = Vec::new();

        match self.read_parts(spool, &mut reader, &mut items) {
            Ok(()) => Ok(items),
            Err(error) => {
                debug!("Parsing failed, discarding {} item(s): {error}", items.len());

                for item in items {
                    if let Err(discard_error) = spool.discard(item.location) {
                        warn!("Could not discard spooled item: {discard_error}");
                    }
                }

                Err(error)
            }
        }
    }

    fn read_parts<S, R>(
        &self,
        spool: &mut S,
        reader: &mut PushbackReader<R>,
        items: &mut Vec<Item<S::Location>>,
    ) -> Result<(), MultipartError>
    where
        S: Spool,
        R: Read,
    {
        //The first boundary has no line break in front, so give it one and skip the preamble like a body
        reader.unread(CRLF)?;
        copy_to_boundary(reader, &mut io::sink(), &self.delimiter)?;
        self.skip_delimiter(reader)?;

        loop {
            if at_close_delimiter(reader)? {
                debug!("Close delimiter found after {} part(s)", items.len());
                return Ok(());
            }

            //Anything else up to the line break is transport padding
            read_line(reader)?;

            let disposition = match read_headers(reader)? {
                Some(disposition) => disposition,
                None => {
                    debug!("Terminal marker found after {} part(s)", items.len());
                    return Ok(());
                }
            };

            let item = self.spool_part(spool, reader, disposition)?;
            items.push(item);

            self.skip_delimiter(reader)?;
        }
    }

    fn spool_part<S, R>(
        &self,
        spool: &mut S,
        reader: &mut PushbackReader<R>,
        disposition: ContentDisposition,
    ) -> Result<Item<S::Location>, MultipartError>
    where
        S: Spool,
        R: Read,
    {
        let extension = extension_hint(disposition.filename.as_deref());
        let mut sink = spool.create(&extension)?;

        let written = match copy_to_boundary(reader, &mut sink, &self.delimiter) {
            Ok(written) => written,
            Err(error) => {
                if let Err(abort_error) = spool.abort(sink) {
                    warn!("Could not abort spooled part: {abort_error}");
                }
                return Err(error);
            }
        };

        let location = spool.finish(sink)?;

        debug!(
            "Spooled field:{:?}, filename:{:?}, bytes:{written}",
            disposition.name, disposition.filename
        );

        Ok(Item {
            location,
            name: disposition.name,
            filename: disposition.filename,
        })
    }

    fn skip_delimiter<R: Read>(&self, reader: &mut PushbackReader<R>) -> Result<(), MultipartError> {
        if reader.skip(self.delimiter.len())? != self.delimiter.len() {
            return Err(MultipartError::UnexpectedEndOfStream);
        }

        Ok(())
    }
}

/// Checks for the `--` that turns a delimiter into the close delimiter, leaving the stream untouched otherwise
fn at_close_delimiter<R: Read>(reader: &mut PushbackReader<R>) -> Result<bool, MultipartError> {
    let mut next = [0; 2];

    for byte in next.iter_mut() {
        *byte = reader
            .read_byte()?
            .ok_or(MultipartError::UnexpectedEndOfStream)?;
    }

    if &next == b"--" {
        return Ok(true);
    }

    reader.unread(&next)?;

    Ok(false)
}

/// Reads header lines up to the blank line, returning `None` if the terminal `--` marker is found instead
fn read_headers<R: Read>(
    reader: &mut PushbackReader<R>,
) -> Result<Option<ContentDisposition>, MultipartError> {
    let mut disposition = ContentDisposition::default();

    loop {
        let line = read_line(reader)?;

        if line == "--" {
            return Ok(None);
        }

        if line.is_empty() {
            return Ok(Some(disposition));
        }

        if let Some(parsed) = ContentDisposition::parse(&line) {
            disposition.name = parsed.name.or(disposition.name);
            disposition.filename = parsed.filename.or(disposition.filename);
        }
    }
}
