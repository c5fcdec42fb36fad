#![warn(missing_docs)]
//! # Blocking Multipart Requests for Rust
//!
//! Parses `multipart/form-data` request bodies from any [`Read`](std::io::Read), writing the body
//! of each part straight into a [`Spool`](spool::Spool) rather than holding the request in memory.
//!
//! The parser only ever keeps a few bytes of lookback (the length of the boundary), so it can cope
//! with uploads of any size.  Parsing is all or nothing: if the request is malformed or the stream
//! fails, every part spooled so far is discarded before the error is returned.
//!
//! ```
//! use mpart_spool::{parse, spool::MemorySpool};
//!
//! let body: &[u8] = b"--AaB03x\r\n\
//!     Content-Disposition: form-data; name=\"field\"\r\n\
//!     \r\n\
//!     value\r\n\
//!     --AaB03x--\r\n";
//!
//! let mut spool = MemorySpool::default();
//! let items = parse(&mut spool, body, Some("multipart/form-data; boundary=AaB03x")).unwrap();
//!
//! assert_eq!(items[0].name(), Some("field"));
//! assert_eq!(spool.get(*items[0].location()).unwrap().bytes, b"value");
//! ```
//!
//! With the `filestream` feature (on by default), [`DirSpool`](filestream::DirSpool) writes each part
//! to its own file in a directory instead.
//!
//! There is also a [`MultipartRequest`](client::MultipartRequest) for writing requests.

/// Writing multipart requests
pub mod client;
/// Parsing of `Content-Disposition` header lines
pub mod disposition;
#[cfg(feature = "filestream")]
/// Spooling to & streaming from files
pub mod filestream;
/// A reader that can push bytes back
pub mod pushback;
pub mod scan;
/// Parsing multipart requests
pub mod server;
pub mod spool;

pub use server::{parse, Item, MultipartError, MultipartParser};
