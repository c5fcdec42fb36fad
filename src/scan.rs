//! Byte level scanning used by the parser: reading header lines and copying a body up to the
//! next boundary.
use std::io::{self, BufRead, Read, Write};

use memchr::memchr;

use crate::pushback::PushbackReader;
use crate::server::MultipartError;

/// Copy everything before the next occurrence of `boundary` into `out`.
///
/// The boundary itself is pushed back onto the reader, so the next read starts with it.  The
/// reader must be able to push back at least `boundary.len()` bytes.
///
/// Every byte is either written to `out` once or left in the reader, never both.  Running out of
/// input before the boundary is found is an [`UnexpectedEndOfStream`](MultipartError::UnexpectedEndOfStream).
///
/// Returns the amount of bytes written.
pub fn copy_to_boundary<R, W>(
    reader: &mut PushbackReader<R>,
    out: &mut W,
    boundary: &[u8],
) -> Result<u64, MultipartError>
where
    R: Read,
    W: Write + ?Sized,
{
    let first = match boundary.first() {
        Some(&first) => first,
        None => {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty boundary").into());
        }
    };

    if boundary.len() > reader.capacity() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "boundary is longer than the pushback capacity",
        )
        .into());
    }

    let mut written = 0;

    'scan: loop {
        //Nothing before the first boundary byte can start a match, so copy it all in one go
        let copied = {
            let available = reader.fill_buf()?;
            let end = memchr(first, available).unwrap_or(available.len());
            out.write_all(&available[..end])?;
            end
        };
        reader.consume(copied);
        written += copied as u64;

        for (matched, &expected) in boundary.iter().enumerate() {
            let byte = reader
                .read_byte()?
                .ok_or(MultipartError::UnexpectedEndOfStream)?;

            if byte == expected {
                continue;
            }

            //Give back the mismatch and the partial match, then move forward a single byte
            reader.unread_byte(byte)?;
            reader.unread(&boundary[..matched])?;

            let next = reader
                .read_byte()?
                .ok_or(MultipartError::UnexpectedEndOfStream)?;
            out.write_all(&[next])?;
            written += 1;

            continue 'scan;
        }

        reader.unread(boundary)?;

        return Ok(written);
    }
}

/// Read a `\r\n` terminated line, without the terminator.
///
/// Bytes outside of ASCII are replaced with `U+FFFD`.
pub fn read_line<R: Read>(reader: &mut PushbackReader<R>) -> Result<String, MultipartError> {
    let mut line = String::new();
    let mut previous: Option<u8> = None;

    loop {
        let byte = reader
            .read_byte()?
            .ok_or(MultipartError::UnexpectedEndOfStream)?;

        if previous == Some(b'\r') && byte == b'\n' {
            return Ok(line);
        }

        if let Some(previous) = previous {
            line.push(ascii_char(previous));
        }

        previous = Some(byte);
    }
}

fn ascii_char(byte: u8) -> char {
    if byte.is_ascii() {
        char::from(byte)
    } else {
        char::REPLACEMENT_CHARACTER
    }
}
