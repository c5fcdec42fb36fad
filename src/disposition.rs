use http::header::CONTENT_DISPOSITION;
use log::debug;
use percent_encoding::percent_decode_str;

/// The `name` and `filename` parameters of a `Content-Disposition` header line
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// The form field name
    pub name: Option<String>,
    /// The original filename from the client machine
    pub filename: Option<String>,
}

impl ContentDisposition {
    /// Parse a raw header line such as `Content-Disposition: form-data; name="file"`.
    ///
    /// Returns `None` if the line is some other header.  Values are unquoted & utf8 percent-decoded.
    pub fn parse(line: &str) -> Option<Self> {
        let (header_name, _) = line.split_once(':')?;

        if !header_name
            .trim()
            .eq_ignore_ascii_case(CONTENT_DISPOSITION.as_str())
        {
            return None;
        }

        debug!("Content disposition:{line}");

        let mut disposition = ContentDisposition::default();
        let mut extended_filename = None;

        for segment in line.split(';').map(str::trim) {
            if segment.starts_with("name=") {
                disposition.name = param_value(segment);
            } else if segment.starts_with("filename=") {
                disposition.filename = param_value(segment);
            } else if segment.starts_with("filename*=") {
                extended_filename = param_value(segment).map(strip_utf8_prefix);
            }
        }

        if disposition.filename.is_none() {
            disposition.filename = extended_filename;
        }

        Some(disposition)
    }
}

/// Given `key=value` or `key="value"`, return the decoded value
fn param_value(segment: &str) -> Option<String> {
    let (_, value) = segment.split_once('=')?;

    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|unquoted| unquoted.strip_suffix('"'))
        .unwrap_or(value);

    Some(percent_decode_str(value).decode_utf8_lossy().into_owned())
}

fn strip_utf8_prefix(value: String) -> String {
    if value.starts_with("UTF-8''") || value.starts_with("utf-8''") {
        return value[7..].to_owned();
    }

    value
}
