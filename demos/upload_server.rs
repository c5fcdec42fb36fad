use std::fs;

use mpart_spool::filestream::DirSpool;
use mpart_spool::parse;
use tiny_http::{Header, Method, Response, Server};

const FORM: &str = "<!doctype html>\
    <form method=\"post\" enctype=\"multipart/form-data\">\
    <input type=\"text\" name=\"comment\">\
    <input type=\"file\" name=\"files\" multiple>\
    <input type=\"submit\">\
    </form>";

fn main() {
    fs::create_dir_all("temp").expect("create temp dir");

    let server = Server::http("localhost:8000").expect("bind server");
    println!("Listening on http://localhost:8000");

    for mut request in server.incoming_requests() {
        let content_type = request
            .headers()
            .iter()
            .find(|header| header.field.equiv("Content-Type"))
            .map(|header| header.value.as_str().to_owned());

        let method = request.method().clone();

        let response = match method {
            Method::Get => Response::from_string(FORM).with_header(
                Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..])
                    .expect("valid header"),
            ),
            Method::Post => {
                let mut spool = DirSpool::new("temp");

                match parse(&mut spool, request.as_reader(), content_type.as_deref()) {
                    Ok(items) => {
                        for item in &items {
                            println!(
                                "Field:{:?}, filename:{:?}, stored at:{}",
                                item.name(),
                                item.filename(),
                                item.location().display()
                            );
                        }
                        Response::from_string(format!("Received {} part(s)\n", items.len()))
                    }
                    Err(err) => {
                        println!("Bad upload: {}", err);
                        Response::from_string(format!("{}\n", err)).with_status_code(400)
                    }
                }
            }
            _ => Response::from_string("404 Not Found\n").with_status_code(404),
        };

        if let Err(err) = request.respond(response) {
            println!("Could not respond: {}", err);
        }
    }
}
