#![cfg(feature = "filestream")]
use std::fs;
use std::io::{self, Cursor, Read};

use mpart_spool::client::MultipartRequest;
use mpart_spool::filestream::DirSpool;
use mpart_spool::spool::MemorySpool;
use mpart_spool::{parse, MultipartError};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn random_bytes(rng: &mut StdRng) -> Vec<u8> {
    let len = rng.gen_range(100..5100);
    (0..len).map(|_| rng.gen()).collect()
}

/// Hands out a single byte per read
struct OneByOne<R>(R);

impl<R: Read> Read for OneByOne<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len().min(1);
        self.0.read(&mut buf[..len])
    }
}

#[test]
fn random_uploads_survive_roundtrip() {
    let mut rng = StdRng::seed_from_u64(42);

    let data: Vec<Vec<u8>> = (0..4).map(|_| random_bytes(&mut rng)).collect();

    let mut req: MultipartRequest<Cursor<Vec<u8>>> = MultipartRequest::default();
    let content_type = req.content_type();

    for (idx, bytes) in data.iter().enumerate() {
        req.add_stream(
            format!("file{}", idx),
            format!("test{}.X", idx),
            "application/octet-stream".to_owned(),
            Cursor::new(bytes.clone()),
        );
    }

    let mut spool = MemorySpool::default();
    let items = parse(&mut spool, req, Some(content_type.as_str())).unwrap();

    assert_eq!(items.len(), data.len());

    for (idx, (item, bytes)) in items.iter().zip(&data).enumerate() {
        let entry = spool.get(*item.location()).unwrap();

        assert_eq!(item.name(), Some(format!("file{}", idx).as_str()));
        assert_eq!(item.filename(), Some(format!("test{}.X", idx).as_str()));
        assert_eq!(entry.extension, "x");
        assert_eq!(&entry.bytes, bytes);
    }
}

#[test]
fn byte_at_a_time() {
    let mut req: MultipartRequest<Cursor<&[u8]>> = MultipartRequest::new("X-BOUNDARY");
    req.add_field("My Field", "abcd");
    req.add_stream(
        "File Field",
        "a-text-file.txt",
        "text/plain",
        Cursor::new(&b"Hello world\nHello\r\nWorld\rAgain\r\n--X-BOUNDAR"[..]),
    );

    let mut spool = MemorySpool::default();
    let items = parse(
        &mut spool,
        OneByOne(req),
        Some("multipart/form-data; boundary=X-BOUNDARY"),
    )
    .unwrap();

    assert_eq!(items.len(), 2);

    assert_eq!(items[0].name(), Some("My Field"));
    assert_eq!(items[0].filename(), None);
    assert_eq!(spool.get(0).unwrap().bytes, b"abcd");

    assert_eq!(items[1].name(), Some("File Field"));
    assert_eq!(items[1].filename(), Some("a-text-file.txt"));
    assert_eq!(
        spool.get(1).unwrap().bytes,
        b"Hello world\nHello\r\nWorld\rAgain\r\n--X-BOUNDAR"
    );
}

#[test]
fn uploads_to_directory() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    let data = random_bytes(&mut rng);

    let mut req: MultipartRequest<Cursor<Vec<u8>>> = MultipartRequest::default();
    let content_type = req.content_type();
    req.add_field("comment", "some text");
    req.add_stream("upload", "data.BIN", "application/octet-stream", Cursor::new(data.clone()));

    let mut spool = DirSpool::new(dir.path());
    let items = parse(&mut spool, req, Some(content_type.as_str())).unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(fs::read(items[0].location()).unwrap(), b"some text");
    assert_eq!(fs::read(items[1].location()).unwrap(), data);
    assert_eq!(items[1].location().extension().unwrap(), "bin");

    for item in items {
        fs::remove_file(item.into_location()).unwrap();
    }

    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn truncated_upload_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();

    let mut req: MultipartRequest<Cursor<&[u8]>> = MultipartRequest::new("AaB03x");
    req.add_field("first", "value");
    req.add_stream("upload", "data.txt", "text/plain", Cursor::new(&b"contents"[..]));

    let mut body = Vec::new();
    req.read_to_end(&mut body).unwrap();

    //Cut off the close delimiter
    body.truncate(body.len() - "--\r\n".len());

    let mut spool = DirSpool::new(dir.path());
    let res = parse(
        &mut spool,
        &body[..],
        Some("multipart/form-data; boundary=AaB03x"),
    );

    assert!(matches!(res, Err(MultipartError::UnexpectedEndOfStream)));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn content_type_errors_open_nothing() {
    let mut spool = MemorySpool::default();

    assert!(matches!(
        parse(&mut spool, &b""[..], None),
        Err(MultipartError::ContentTypeMissing)
    ));
    assert!(matches!(
        parse(&mut spool, &b""[..], Some("application/json")),
        Err(MultipartError::ContentTypeMismatch)
    ));
    assert!(matches!(
        parse(&mut spool, &b""[..], Some("multipart/form-data; charset=utf-8")),
        Err(MultipartError::BoundaryMissing)
    ));

    assert_eq!(spool.opened(), 0);
}
