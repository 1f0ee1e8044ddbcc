//! Minimal HTTP/1.1 listener in front of the [`Router`].
//!
//! GET only, one thread per connection, `Connection: close`.  Long-poll
//! requests are held in slices; between slices the socket is peeked and a
//! closed peer drops the parked request.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::web::{LongPoll, Response, Router, WebContext};

/// How long a parked request waits before checking its peer.
pub const LONG_POLL_SLICE: Duration = Duration::from_secs(15);

const MAX_REQUEST_BYTES: usize = 8192;

/// Accept connections forever.
pub fn serve(listener: TcpListener, ctx: Arc<WebContext>, router: Arc<Router>) -> io::Result<()> {
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!("http accept failed: {e}");
                continue;
            }
        };
        let ctx = ctx.clone();
        let router = router.clone();
        std::thread::Builder::new()
            .name("http-conn".into())
            .spawn(move || {
                if let Err(e) = handle_connection(stream, &ctx, &router) {
                    debug!("http connection ended: {e}");
                }
            })?;
    }
    Ok(())
}

fn handle_connection(mut stream: TcpStream, ctx: &WebContext, router: &Router) -> io::Result<()> {
    let Some(first_line) = read_request_line(&mut stream)? else {
        return Ok(());
    };
    let mut parts = first_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();

    if method != "GET" {
        return write_raw(&mut stream, 405, "text/plain", "Method Not Allowed");
    }

    let response = match router.handle_target(ctx, target) {
        Response::Pending(poll) => match hold(&stream, ctx, poll) {
            Some(r) => r,
            None => return Ok(()),
        },
        other => other,
    };
    write_raw(
        &mut stream,
        response.status(),
        response.content_type(),
        response.body(),
    )
}

/// Read until the end of the request line, EOF or the size cap.  `None`
/// if the peer closed before sending anything.
fn read_request_line(reader: &mut impl Read) -> io::Result<Option<String>> {
    let mut buf = Vec::with_capacity(512);
    let mut chunk = [0u8; 1024];
    while !buf.contains(&b'\n') && buf.len() < MAX_REQUEST_BYTES {
        let size = reader.read(&mut chunk)?;
        if size == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..size]);
    }
    if buf.is_empty() {
        return Ok(None);
    }
    buf.truncate(MAX_REQUEST_BYTES);
    let text = String::from_utf8_lossy(&buf);
    Ok(Some(text.lines().next().unwrap_or_default().to_string()))
}

/// Wait for the parked request to resolve; `None` if the peer went away.
fn hold(stream: &TcpStream, ctx: &WebContext, mut poll: LongPoll) -> Option<Response> {
    loop {
        match poll.wait(ctx, LONG_POLL_SLICE) {
            Ok(resp) => return Some(resp),
            Err(still_parked) => {
                if peer_closed(stream) {
                    debug!("long-poll client left (watermark {})", still_parked.watermark());
                    return None;
                }
                poll = still_parked;
            }
        }
    }
}

fn peer_closed(stream: &TcpStream) -> bool {
    if stream.set_nonblocking(true).is_err() {
        return true;
    }
    let mut probe = [0u8; 1];
    let closed = match stream.peek(&mut probe) {
        Ok(0) => true,
        Ok(_) => false,
        Err(e) => e.kind() != io::ErrorKind::WouldBlock,
    };
    let _ = stream.set_nonblocking(false);
    closed
}

fn write_raw(stream: &mut TcpStream, status: u16, content_type: &str, body: &str) -> io::Result<()> {
    let response = format!(
        "HTTP/1.1 {status} {}\r\nContent-Type: {content_type}; charset=utf-8\r\nContent-Length: {}\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n{body}",
        reason(status),
        body.len(),
    );
    stream.write_all(response.as_bytes())?;
    stream.flush()
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        429 => "Too Many Requests",
        503 => "Service Unavailable",
        _ => "",
    }
}
