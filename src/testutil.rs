// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

//! One-shot HTTP server for exercising the network clients.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

/// Serve a single request with `status` and `body`.  Returns the base URL and
/// a handle yielding the raw request (head and body) once it has been served.
pub(crate) fn serve_once(status: u16, body: Vec<u8>) -> (String, JoinHandle<Vec<u8>>) {
    let (url, h) = serve(vec![(status, body)]);

    (url, thread::spawn(move || h.join().unwrap().remove(0)))
}

/// Serve one request per response, in order, over separate connections
pub(crate) fn serve(responses: Vec<(u16, Vec<u8>)>) -> (String, JoinHandle<Vec<Vec<u8>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let h = thread::spawn(move || {
        responses
            .into_iter()
            .map(|(status, body)| {
                let (stream, _) = listener.accept().unwrap();
                handle(stream, status, &body)
            })
            .collect()
    });

    (url, h)
}

fn handle(stream: TcpStream, status: u16, body: &[u8]) -> Vec<u8> {
    let mut rd = BufReader::new(stream);

    let mut req = vec![];
    let mut content_length = 0;

    loop {
        let mut line = String::new();
        rd.read_line(&mut line).unwrap();
        req.extend_from_slice(line.as_bytes());

        if line == "\r\n" || line.is_empty() {
            break;
        }

        if let Some((k, v)) = line.split_once(':') {
            if k.eq_ignore_ascii_case("content-length") {
                content_length = v.trim().parse().unwrap();
            }
        }
    }

    let mut payload = vec![0; content_length];
    rd.read_exact(&mut payload).unwrap();
    req.extend_from_slice(&payload);

    let mut stream = rd.into_inner();
    write!(
        stream,
        "HTTP/1.1 {status} Test\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .unwrap();
    stream.write_all(body).unwrap();
    stream.flush().unwrap();

    req
}

/// A URL nothing listens on
pub(crate) fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    url
}

/// Split the raw request returned by [`serve_once`] into head and body
pub(crate) fn split_request(req: &[u8]) -> (String, Vec<u8>) {
    let pos = req
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|p| p + 4)
        .unwrap_or(req.len());

    (
        String::from_utf8_lossy(&req[..pos]).into_owned(),
        req[pos..].to_vec(),
    )
}
