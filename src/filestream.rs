use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::debug;
use mime::Mime;
use rand::{distributions::Alphanumeric, thread_rng, Rng};

use crate::server::Item;
use crate::spool::Spool;

const NAME_LENGTH: usize = 16;
const CREATE_ATTEMPTS: usize = 8;

/// Convenience wrapper around streaming out files.  The file is only opened on the first read
pub struct FileStream {
    path: PathBuf,
    inner: Option<BufReader<File>>,
}

impl FileStream {
    /// Construct a FileStream given a path
    pub fn new<P: Into<PathBuf>>(file: P) -> Self {
        FileStream {
            path: file.into(),
            inner: None,
        }
    }
}

impl Read for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.inner.is_none() {
            debug!("Opening file:{}", self.path.display());
            self.inner = Some(BufReader::new(File::open(&self.path)?));
        }

        match self.inner.as_mut() {
            Some(inner) => inner.read(buf),
            None => Ok(0),
        }
    }
}

/// A [`Spool`] which writes every part to a new file in a directory.
///
/// Files are named `<prefix><random>.<extension>`, and are never overwritten.
#[derive(Debug, Clone)]
pub struct DirSpool {
    dir: PathBuf,
    prefix: String,
}

impl DirSpool {
    /// Spool into `dir`, which must already exist
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        DirSpool {
            dir: dir.into(),
            prefix: "upload-".into(),
        }
    }

    /// Set the prefix of created files (default `upload-`)
    pub fn prefix<I: Into<String>>(mut self, prefix: I) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// The directory files are created in
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(&self, extension: &str) -> String {
        let random: String = thread_rng()
            .sample_iter(Alphanumeric)
            .take(NAME_LENGTH)
            .map(char::from)
            .collect();

        //The extension comes from the client, so don't let it turn into a path
        let extension: String = extension
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();

        format!("{}{}.{}", self.prefix, random, extension)
    }
}

/// A file being written by [`DirSpool`]
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: BufWriter<File>,
}

impl FileSink {
    /// The path of the file being written
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.file.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Spool for DirSpool {
    type Sink = FileSink;
    type Location = PathBuf;

    fn create(&mut self, extension: &str) -> io::Result<FileSink> {
        for _ in 0..CREATE_ATTEMPTS {
            let path = self.dir.join(self.file_name(extension));

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    debug!("Created spool file:{}", path.display());
                    return Ok(FileSink {
                        path,
                        file: BufWriter::new(file),
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "could not find an unused file name",
        ))
    }

    fn finish(&mut self, sink: FileSink) -> io::Result<PathBuf> {
        let FileSink { path, file } = sink;

        if let Err(err) = file.into_inner().map_err(|err| err.into_error()) {
            fs::remove_file(&path)?;
            return Err(err);
        }

        Ok(path)
    }

    fn abort(&mut self, sink: FileSink) -> io::Result<()> {
        let FileSink { path, file } = sink;

        //Nothing buffered is worth keeping
        drop(file);

        fs::remove_file(path)
    }

    fn discard(&mut self, location: PathBuf) -> io::Result<()> {
        fs::remove_file(location)
    }
}

impl<L> Item<L> {
    /// Guess the mime type from the upload filename (i.e, .jpg will be `image/jpeg`)
    ///
    /// Returns `application/octet-stream` if there is no filename or it is unknown
    pub fn mime_type(&self) -> Mime {
        self.filename()
            .map(|filename| mime_guess::from_path(filename).first_or_octet_stream())
            .unwrap_or(mime::APPLICATION_OCTET_STREAM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::parse;

    fn files_in(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    #[test]
    fn creates_unique_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut spool = DirSpool::new(dir.path()).prefix("test-");

        let mut first = spool.create("txt").unwrap();
        first.write_all(b"first").unwrap();
        let first = spool.finish(first).unwrap();

        let second = spool.create("txt").unwrap();
        let second = spool.finish(second).unwrap();

        assert_ne!(first, second);
        assert_eq!(fs::read(&first).unwrap(), b"first");
        assert_eq!(fs::read(&second).unwrap(), b"");

        let name = first.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("test-"));
        assert!(name.ends_with(".txt"));
        assert_eq!(name.len(), "test-".len() + NAME_LENGTH + ".txt".len());
    }

    #[test]
    fn extension_cannot_escape_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut spool = DirSpool::new(dir.path());

        let sink = spool.create("/../../etc").unwrap();

        assert_eq!(sink.path().parent(), Some(dir.path()));
        assert!(sink.path().to_string_lossy().ends_with(".etc"));
    }

    #[test]
    fn abort_and_discard_remove_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut spool = DirSpool::new(dir.path());

        let aborted = spool.create("bin").unwrap();
        spool.abort(aborted).unwrap();

        let finished = spool.create("bin").unwrap();
        let location = spool.finish(finished).unwrap();
        assert_eq!(files_in(dir.path()).len(), 1);

        spool.discard(location).unwrap();
        assert!(files_in(dir.path()).is_empty());
    }

    #[test]
    fn parses_into_directory() {
        let input: &[u8] = b"--AaB03x\r\n\
                Content-Disposition: form-data; name=\"file\"; filename=\"Photo.JPG\"\r\n\
                Content-Type: image/jpeg\r\n\
                \r\n\
                not really a jpeg\r\n\
                --AaB03x--\r\n";

        let dir = tempfile::tempdir().unwrap();
        let mut spool = DirSpool::new(dir.path());

        let items = parse(
            &mut spool,
            input,
            Some("multipart/form-data; boundary=AaB03x"),
        )
        .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].mime_type(), mime::IMAGE_JPEG);

        let path = items[0].location();
        assert_eq!(path.extension().unwrap(), "jpg");
        assert_eq!(fs::read(path).unwrap(), b"not really a jpeg");
    }

    #[test]
    fn failed_parse_leaves_no_files() {
        let input: &[u8] = b"--AaB03x\r\n\
                Content-Disposition: form-data; name=\"name1\"\r\n\
                \r\n\
                value1\r\n\
                --AaB03x\r\n\
                Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\
                \r\n\
                cut short";

        let dir = tempfile::tempdir().unwrap();
        let mut spool = DirSpool::new(dir.path());

        let res = parse(
            &mut spool,
            input,
            Some("multipart/form-data; boundary=AaB03x"),
        );

        assert!(res.is_err());
        assert!(files_in(dir.path()).is_empty());
    }

    #[test]
    fn streams_file_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lazy.txt");

        let mut stream = FileStream::new(&path);
        fs::write(&path, b"created after the stream").unwrap();

        let mut contents = String::new();
        stream.read_to_string(&mut contents).unwrap();

        assert_eq!(contents, "created after the stream");
    }

    #[test]
    fn mime_defaults_to_octet_stream() {
        let dir = tempfile::tempdir().unwrap();
        let mut spool = DirSpool::new(dir.path());

        let input: &[u8] = b"--AaB03x\r\n\
                Content-Disposition: form-data; name=\"field\"\r\n\
                \r\n\
                value\r\n\
                --AaB03x--\r\n";

        let items = parse(
            &mut spool,
            input,
            Some("multipart/form-data; boundary=AaB03x"),
        )
        .unwrap();

        assert_eq!(items[0].mime_type(), mime::APPLICATION_OCTET_STREAM);
        assert_eq!(items[0].location().extension().unwrap(), "unknown");
    }
}
