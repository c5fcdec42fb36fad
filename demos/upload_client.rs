use std::io::{Read, Write};
use std::net::TcpStream;

use mpart_spool::client::MultipartRequest;
use mpart_spool::filestream::FileStream;

fn main() {
    // Sends `Cargo.toml` to the `upload_server` demo
    let mut mpart: MultipartRequest<FileStream> = MultipartRequest::default();
    mpart.add_field("comment", "hello");
    mpart.add_file("files", "Cargo.toml");

    let mut body = Vec::new();
    mpart.read_to_end(&mut body).expect("read request body");

    let mut stream = TcpStream::connect("localhost:8000").expect("connect to server");

    write!(
        stream,
        "POST / HTTP/1.1\r\nHost: localhost\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        mpart.content_type(),
        body.len()
    )
    .expect("write request head");
    stream.write_all(&body).expect("write request body");

    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .expect("read response");

    println!("Response: {}", response);
}
