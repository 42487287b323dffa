// Copyright (c) Microsoft. All rights reserved.

//! Blocking HTTP/1.1 over TCP, wrapped in TLS with a client certificate for `https` URLs.
//!
//! One connection per request, closed afterwards. A single deadline bounds connect, handshake,
//! write and read; there are no retries.

use std::io::{Read, Write};

use crate::TransportError;

/// Upper bound on the size of a KME response, headers included.
const MAX_RESPONSE_LEN: usize = 1024 * 1024;

/// Sends `request` and returns the body of a `200 OK` response.
pub fn send(
    config: &kme_common::EndpointConfig,
    request: &crate::KeyRequest,
) -> Result<Vec<u8>, TransportError> {
    // Credentials are loaded before connecting, for every scheme.
    let connector = build_connector(config.credentials(), config.trust_bundle())?;
    if config.debug() {
        log::debug!("loaded client certificate and private key");
    }

    let url = url::Url::parse(&request.url).map_err(|err| {
        TransportError::Network(std::io::Error::new(std::io::ErrorKind::InvalidInput, err))
    })?;
    let host = match url.host() {
        Some(url::Host::Domain(domain)) => domain.to_owned(),
        Some(url::Host::Ipv4(addr)) => addr.to_string(),
        Some(url::Host::Ipv6(addr)) => addr.to_string(),
        None => {
            return Err(TransportError::Network(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "KME URL does not have a host",
            )))
        }
    };
    let port = url.port_or_known_default().ok_or_else(|| {
        TransportError::Network(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "KME URL does not have a port",
        ))
    })?;

    let deadline = Deadline::new(config.timeout());

    let tcp = connect(&host, port, &deadline)?;
    let mut stream = if url.scheme() == "https" {
        set_timeouts(&tcp, &deadline)?;
        let tls = connector
            .connect(&host, tcp)
            .map_err(|err| handshake_error(err, &deadline))?;
        Stream::Tls(Box::new(tls))
    } else {
        Stream::Plain(tcp)
    };

    write_request(&mut stream, &url, request.body.as_deref(), &deadline)?;
    let (status, body) = read_response(&mut stream, &deadline)?;

    if config.debug() {
        log::debug!("KME response status: {}", status);
        log::debug!("KME response body: {}", String::from_utf8_lossy(&body));
    }

    if status != 200 {
        return Err(TransportError::BadStatus(status));
    }

    Ok(body)
}

fn build_connector(
    credentials: &kme_common::Credentials,
    trust_bundle: Option<&std::path::Path>,
) -> Result<openssl::ssl::SslConnector, TransportError> {
    let invalid =
        |err: openssl::error::ErrorStack| TransportError::InvalidCredential(Box::new(err));

    let (cert, key) = match credentials {
        kme_common::Credentials::Files { cert, key } => (
            std::borrow::Cow::Owned(read_credential(cert)?),
            std::borrow::Cow::Owned(read_credential(key)?),
        ),
        kme_common::Credentials::Pem { cert, key } => (
            std::borrow::Cow::Borrowed(&cert[..]),
            std::borrow::Cow::Borrowed(&key[..]),
        ),
    };

    let mut chain = openssl::x509::X509::stack_from_pem(&cert)
        .map_err(invalid)?
        .into_iter();
    let leaf = chain.next().ok_or_else(|| {
        TransportError::InvalidCredential("client certificate file contains no certificates".into())
    })?;
    let key = openssl::pkey::PKey::private_key_from_pem(&key).map_err(invalid)?;

    let mut builder = openssl::ssl::SslConnector::builder(openssl::ssl::SslMethod::tls_client())
        .map_err(|err| {
            TransportError::Network(std::io::Error::new(std::io::ErrorKind::Other, err))
        })?;
    builder.set_certificate(&leaf).map_err(invalid)?;
    for cert in chain {
        builder.add_extra_chain_cert(cert).map_err(invalid)?;
    }
    builder.set_private_key(&key).map_err(invalid)?;
    builder.check_private_key().map_err(invalid)?;

    if let Some(trust_bundle) = trust_bundle {
        builder
            .set_ca_file(trust_bundle)
            .map_err(|err| TransportError::InvalidTrustBundle(trust_bundle.to_owned(), err))?;
    }

    Ok(builder.build())
}

fn read_credential(path: &std::path::Path) -> Result<Vec<u8>, TransportError> {
    std::fs::read(path).map_err(|err| {
        TransportError::InvalidCredential(
            format!("could not read {}: {}", path.display(), err).into(),
        )
    })
}

struct Deadline {
    timeout: std::time::Duration,
    at: std::time::Instant,
}

impl Deadline {
    fn new(timeout: std::time::Duration) -> Self {
        Deadline {
            timeout,
            at: std::time::Instant::now() + timeout,
        }
    }

    fn remaining(&self) -> Result<std::time::Duration, TransportError> {
        let remaining = self.at.saturating_duration_since(std::time::Instant::now());
        if remaining.is_zero() {
            Err(TransportError::Timeout(self.timeout))
        } else {
            Ok(remaining)
        }
    }

    fn io_error(&self, err: std::io::Error) -> TransportError {
        match err.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => {
                TransportError::Timeout(self.timeout)
            }
            _ => TransportError::Network(err),
        }
    }
}

fn connect(
    host: &str,
    port: u16,
    deadline: &Deadline,
) -> Result<std::net::TcpStream, TransportError> {
    let addrs = std::net::ToSocketAddrs::to_socket_addrs(&(host, port))
        .map_err(TransportError::Network)?;

    let mut last_err = None;
    for addr in addrs {
        match std::net::TcpStream::connect_timeout(&addr, deadline.remaining()?) {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                log::debug!("could not connect to {}: {}", addr, err);
                last_err = Some(err);
            }
        }
    }

    Err(deadline.io_error(last_err.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} did not resolve to any address", host),
        )
    })))
}

fn handshake_error(
    err: openssl::ssl::HandshakeError<std::net::TcpStream>,
    deadline: &Deadline,
) -> TransportError {
    match err {
        openssl::ssl::HandshakeError::SetupFailure(err) => {
            TransportError::Network(std::io::Error::new(std::io::ErrorKind::Other, err))
        }
        openssl::ssl::HandshakeError::WouldBlock(_) => TransportError::Timeout(deadline.timeout),
        openssl::ssl::HandshakeError::Failure(stream) => match stream.into_error().into_io_error() {
            Ok(err) => deadline.io_error(err),
            Err(err) => {
                TransportError::Network(std::io::Error::new(std::io::ErrorKind::Other, err))
            }
        },
    }
}

enum Stream {
    Plain(std::net::TcpStream),
    Tls(Box<openssl::ssl::SslStream<std::net::TcpStream>>),
}

impl Stream {
    fn tcp(&self) -> &std::net::TcpStream {
        match self {
            Stream::Plain(stream) => stream,
            Stream::Tls(stream) => stream.get_ref(),
        }
    }

    fn refresh_timeouts(&self, deadline: &Deadline) -> Result<(), TransportError> {
        set_timeouts(self.tcp(), deadline)
    }
}

/// Shrinks the socket timeouts to whatever is left of the deadline.
fn set_timeouts(tcp: &std::net::TcpStream, deadline: &Deadline) -> Result<(), TransportError> {
    let remaining = deadline.remaining()?;
    tcp.set_read_timeout(Some(remaining))
        .map_err(TransportError::Network)?;
    tcp.set_write_timeout(Some(remaining))
        .map_err(TransportError::Network)?;
    Ok(())
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Stream::Plain(stream) => stream.read(buf),
            Stream::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Stream::Plain(stream) => stream.write(buf),
            Stream::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Stream::Plain(stream) => stream.flush(),
            Stream::Tls(stream) => stream.flush(),
        }
    }
}

fn write_request(
    stream: &mut Stream,
    url: &url::Url,
    body: Option<&[u8]>,
    deadline: &Deadline,
) -> Result<(), TransportError> {
    let mut target = url.path().to_owned();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    let host = url.host_str().unwrap_or_default();
    let host = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_owned(),
    };

    let body = body.unwrap_or_default();

    let mut message = format!(
        "\
        POST {target} HTTP/1.1\r\n\
        host: {host}\r\n\
        content-type: application/json\r\n\
        accept-encoding: identity\r\n\
        connection: close\r\n\
        content-length: {body_len}\r\n\
        \r\n",
        target = target,
        host = host,
        body_len = body.len(),
    )
    .into_bytes();
    message.extend_from_slice(body);

    stream.refresh_timeouts(deadline)?;
    stream
        .write_all(&message)
        .and_then(|()| stream.flush())
        .map_err(|err| deadline.io_error(err))
}

fn read_response(
    stream: &mut Stream,
    deadline: &Deadline,
) -> Result<(u16, Vec<u8>), TransportError> {
    // Stop at the announced length even if the KME keeps the connection open.
    let mut buf = vec![0_u8; 512];
    let mut read_so_far = 0;

    loop {
        if read_so_far == buf.len() {
            if buf.len() >= MAX_RESPONSE_LEN {
                return Err(malformed("response is too large"));
            }
            buf.resize(buf.len() * 2, 0_u8);
        }

        stream.refresh_timeouts(deadline)?;
        let new_read = loop {
            match stream.read(&mut buf[read_so_far..]) {
                Ok(new_read) => break new_read,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => (),
                Err(err) => return Err(deadline.io_error(err)),
            }
        };
        read_so_far += new_read;

        if let Some(response) = try_parse_response(&buf[..read_so_far], new_read == 0)? {
            return Ok(response);
        }
    }
}

/// Returns `Ok(None)` if more bytes are needed. Never returns `Ok(None)` when `eof` is set.
fn try_parse_response(buf: &[u8], eof: bool) -> Result<Option<(u16, Vec<u8>)>, TransportError> {
    let mut headers = [httparse::EMPTY_HEADER; 32];
    let mut res = httparse::Response::new(&mut headers);

    let body_start_pos = match res.parse(buf) {
        Ok(httparse::Status::Complete(body_start_pos)) => body_start_pos,
        Ok(httparse::Status::Partial) if eof => {
            return Err(malformed(
                "connection closed before the response headers were complete",
            ))
        }
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(err) => return Err(TransportError::MalformedResponse(Box::new(err))),
    };

    let status = res
        .code
        .ok_or_else(|| malformed("response has no status code"))?;

    let mut content_length = None;
    let mut chunked = false;
    for header in res.headers.iter() {
        if header.name.eq_ignore_ascii_case("content-length") {
            let value = std::str::from_utf8(header.value)
                .map_err(|err| TransportError::MalformedResponse(Box::new(err)))?;
            let value: usize = value
                .trim()
                .parse()
                .map_err(|err| TransportError::MalformedResponse(Box::new(err)))?;
            content_length = Some(value);
        } else if header.name.eq_ignore_ascii_case("transfer-encoding") {
            let value = std::str::from_utf8(header.value)
                .map_err(|err| TransportError::MalformedResponse(Box::new(err)))?;
            chunked = value
                .split(',')
                .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"));
        }
    }

    let body = &buf[body_start_pos..];

    if chunked {
        return match decode_chunked(body)? {
            Some(body) => Ok(Some((status, body))),
            None if eof => Err(malformed(
                "connection closed in the middle of a chunked response body",
            )),
            None => Ok(None),
        };
    }

    match content_length {
        Some(content_length) if body.len() >= content_length => {
            Ok(Some((status, body[..content_length].to_vec())))
        }
        Some(_) if eof => Err(malformed(
            "connection closed before the response body was complete",
        )),
        Some(_) => Ok(None),

        // Without a content-length, the body runs until the KME closes the connection.
        None if eof => Ok(Some((status, body.to_vec()))),
        None => Ok(None),
    }
}

/// Returns `Ok(None)` if the final zero-length chunk has not arrived yet. Trailers are ignored.
fn decode_chunked(mut raw: &[u8]) -> Result<Option<Vec<u8>>, TransportError> {
    let mut body = vec![];

    loop {
        let (consumed, chunk_len) = match httparse::parse_chunk_size(raw) {
            Ok(httparse::Status::Complete(parsed)) => parsed,
            Ok(httparse::Status::Partial) => return Ok(None),
            Err(_) => return Err(malformed("invalid chunk size")),
        };
        raw = &raw[consumed..];

        let chunk_len =
            usize::try_from(chunk_len).map_err(|_| malformed("chunk is too large"))?;
        if chunk_len == 0 {
            return Ok(Some(body));
        }

        if raw.len() < chunk_len + 2 {
            return Ok(None);
        }
        if &raw[chunk_len..chunk_len + 2] != b"\r\n" {
            return Err(malformed("chunk is not terminated by CRLF"));
        }

        body.extend_from_slice(&raw[..chunk_len]);
        raw = &raw[chunk_len + 2..];
    }
}

fn malformed(message: &'static str) -> TransportError {
    TransportError::MalformedResponse(message.into())
}

#[cfg(test)]
mod tests {
    use crate::TransportError;

    #[test]
    fn content_length_response() {
        let raw = b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 11\r\n\r\n{\"keys\":[]}";

        // Headers not complete yet.
        assert!(super::try_parse_response(&raw[..20], false).unwrap().is_none());
        // Body not complete yet.
        assert!(super::try_parse_response(&raw[..raw.len() - 1], false)
            .unwrap()
            .is_none());

        let (status, body) = super::try_parse_response(raw, false).unwrap().unwrap();
        assert_eq!(status, 200);
        assert_eq!(body, b"{\"keys\":[]}");
    }

    #[test]
    fn trailing_bytes_after_content_length_are_ignored() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n{}garbage";
        let (_, body) = super::try_parse_response(raw, false).unwrap().unwrap();
        assert_eq!(body, b"{}");
    }

    #[test]
    fn read_to_eof_response() {
        let raw = b"HTTP/1.1 503 Service Unavailable\r\n\r\nbusy";
        assert!(super::try_parse_response(raw, false).unwrap().is_none());

        let (status, body) = super::try_parse_response(raw, true).unwrap().unwrap();
        assert_eq!(status, 503);
        assert_eq!(body, b"busy");
    }

    #[test]
    fn chunked_response() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\n{\"ke\r\n7\r\nys\":[]}\r\n0\r\n\r\n";

        assert!(super::try_parse_response(&raw[..raw.len() - 6], false)
            .unwrap()
            .is_none());

        let (status, body) = super::try_parse_response(raw, false).unwrap().unwrap();
        assert_eq!(status, 200);
        assert_eq!(body, b"{\"keys\":[]}");
    }

    #[test]
    fn truncated_responses_are_malformed() {
        for raw in [
            &b"HTTP/1.1 200 OK\r\ncontent-len"[..],
            &b"HTTP/1.1 200 OK\r\ncontent-length: 10\r\n\r\n{}"[..],
            &b"HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\n\r\n4\r\n{}"[..],
        ] {
            assert!(matches!(
                super::try_parse_response(raw, true),
                Err(TransportError::MalformedResponse(_))
            ));
        }
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            super::try_parse_response(b"\x00\x01\x02 not http\r\n\r\n", false),
            Err(TransportError::MalformedResponse(_))
        ));
        assert!(matches!(
            super::try_parse_response(b"HTTP/1.1 200 OK\r\ncontent-length: ten\r\n\r\n", false),
            Err(TransportError::MalformedResponse(_))
        ));
        assert!(matches!(
            super::decode_chunked(b"zz\r\nabc\r\n"),
            Err(TransportError::MalformedResponse(_))
        ));
        assert!(matches!(
            super::decode_chunked(b"3\r\nabcX\r\n0\r\n\r\n"),
            Err(TransportError::MalformedResponse(_))
        ));
    }

    #[test]
    fn deadline_maps_timeouts() {
        let deadline = super::Deadline::new(std::time::Duration::from_secs(4));
        assert!(matches!(
            deadline.io_error(std::io::ErrorKind::WouldBlock.into()),
            TransportError::Timeout(_)
        ));
        assert!(matches!(
            deadline.io_error(std::io::ErrorKind::TimedOut.into()),
            TransportError::Timeout(_)
        ));
        assert!(matches!(
            deadline.io_error(std::io::ErrorKind::ConnectionReset.into()),
            TransportError::Network(_)
        ));

        let expired = super::Deadline {
            timeout: std::time::Duration::from_millis(1),
            at: std::time::Instant::now(),
        };
        assert!(matches!(expired.remaining(), Err(TransportError::Timeout(_))));
    }
}
