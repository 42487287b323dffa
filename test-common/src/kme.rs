// Copyright (c) Microsoft. All rights reserved.

//! A scripted KME that accepts a single connection on localhost, records the request,
//! and answers with a canned reply.
//!
//! [`MockKme::start`] speaks plain HTTP. [`MockKme::start_tls`] speaks HTTPS and requires a client
//! certificate, like a real KME.

/// What the mock KME does after reading the request.
pub enum Reply {
    /// Respond with the given status and JSON body, framed by `content-length`.
    Json { status: u16, body: String },

    /// Respond with the given status and JSON body, framed with `transfer-encoding: chunked`.
    Chunked { status: u16, body: String },

    /// Never respond. The connection is held open until [`MockKme::finish`] is called.
    Silent,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Reply::Json {
            status: 200,
            body: body.into(),
        }
    }
}

#[derive(Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,

    /// CN of the client certificate presented during the TLS handshake.
    pub client_common_name: Option<String>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header_name, _)| header_name.eq_ignore_ascii_case(name))
            .map(|(_, value)| &**value)
    }
}

pub struct MockKme {
    url: String,
    release: Option<std::sync::mpsc::Sender<()>>,
    handle: Option<std::thread::JoinHandle<Option<RecordedRequest>>>,
}

impl MockKme {
    pub fn start(reply: Reply) -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());

        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let handle = std::thread::spawn(move || {
            let mut stream = accept(&listener)?;
            serve(&mut stream, reply, &release_rx, None)
        });

        MockKme {
            url,
            release: Some(release_tx),
            handle: Some(handle),
        }
    }

    /// Serves HTTPS for `localhost` with `server`'s cert, and only accepts clients that present
    /// `client_cert` (PEM).
    pub fn start_tls(
        reply: Reply,
        server: &crate::credential::ServerCredentials,
        client_cert: &[u8],
    ) -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!(
            "https://localhost:{}/",
            listener.local_addr().unwrap().port()
        );

        let acceptor = tls_acceptor(server, client_cert);

        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let handle = std::thread::spawn(move || {
            let stream = accept(&listener)?;
            let mut stream = acceptor.accept(stream).ok()?;

            let client_common_name = stream.ssl().peer_certificate().and_then(|cert| {
                cert.subject_name()
                    .entries_by_nid(openssl::nid::Nid::COMMONNAME)
                    .next()
                    .and_then(|entry| entry.data().as_utf8().ok())
                    .map(|common_name| common_name.to_string())
            });

            serve(&mut stream, reply, &release_rx, client_common_name)
        });

        MockKme {
            url,
            release: Some(release_tx),
            handle: Some(handle),
        }
    }

    /// The base URL of the mock, with a trailing slash.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Waits for the mock to finish and returns the request it received.
    pub fn finish(self) -> RecordedRequest {
        self.try_finish()
            .expect("mock KME did not receive a complete request")
    }

    /// Waits for the mock to finish and returns the request it received, if any.
    /// A connection that failed the TLS handshake yields `None`.
    pub fn try_finish(mut self) -> Option<RecordedRequest> {
        drop(self.release.take());

        self.handle.take().unwrap().join().unwrap()
    }
}

fn accept(listener: &std::net::TcpListener) -> Option<std::net::TcpStream> {
    let (stream, _) = listener.accept().ok()?;
    stream
        .set_read_timeout(Some(std::time::Duration::from_secs(10)))
        .ok()?;
    Some(stream)
}

fn tls_acceptor(
    server: &crate::credential::ServerCredentials,
    client_cert: &[u8],
) -> openssl::ssl::SslAcceptor {
    let cert = openssl::x509::X509::from_pem(&server.cert).unwrap();
    let key = openssl::pkey::PKey::private_key_from_pem(&server.key).unwrap();
    let client_cert = openssl::x509::X509::from_pem(client_cert).unwrap();

    let mut builder =
        openssl::ssl::SslAcceptor::mozilla_intermediate_v5(openssl::ssl::SslMethod::tls())
            .unwrap();
    builder.set_certificate(&cert).unwrap();
    builder.set_private_key(&key).unwrap();
    builder.check_private_key().unwrap();

    builder.set_verify(
        openssl::ssl::SslVerifyMode::PEER | openssl::ssl::SslVerifyMode::FAIL_IF_NO_PEER_CERT,
    );
    builder.cert_store_mut().add_cert(client_cert).unwrap();

    builder.build()
}

fn serve(
    stream: &mut (impl std::io::Read + std::io::Write),
    reply: Reply,
    release_rx: &std::sync::mpsc::Receiver<()>,
    client_common_name: Option<String>,
) -> Option<RecordedRequest> {
    let mut request = read_request(stream)?;
    request.client_common_name = client_common_name;

    match reply {
        Reply::Json { status, body } => {
            let response = format!(
                "HTTP/1.1 {} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                reason(status),
                body.len(),
                body,
            );
            stream.write_all(response.as_bytes()).ok()?;
        }

        Reply::Chunked { status, body } => {
            let mut response = format!(
                "HTTP/1.1 {} {}\r\ncontent-type: application/json\r\ntransfer-encoding: chunked\r\nconnection: close\r\n\r\n",
                status,
                reason(status),
            );
            let (first, second) = body.split_at(body.len() / 2);
            for chunk in [first, second] {
                if !chunk.is_empty() {
                    response.push_str(&format!("{:x}\r\n{}\r\n", chunk.len(), chunk));
                }
            }
            response.push_str("0\r\n\r\n");
            stream.write_all(response.as_bytes()).ok()?;
        }

        Reply::Silent => {
            let _ = release_rx.recv_timeout(std::time::Duration::from_secs(30));
        }
    }

    stream.flush().ok()?;

    Some(request)
}

fn read_request(stream: &mut impl std::io::Read) -> Option<RecordedRequest> {
    let mut buf = vec![0_u8; 4096];
    let mut read_so_far = 0;

    loop {
        if read_so_far == buf.len() {
            buf.resize(buf.len() * 2, 0_u8);
        }

        let new_read = stream.read(&mut buf[read_so_far..]).ok()?;
        read_so_far += new_read;

        let mut headers = [httparse::EMPTY_HEADER; 32];
        let mut req = httparse::Request::new(&mut headers);
        let body_start_pos = match req.parse(&buf[..read_so_far]).ok()? {
            httparse::Status::Complete(body_start_pos) => body_start_pos,
            httparse::Status::Partial if new_read == 0 => return None,
            httparse::Status::Partial => continue,
        };

        let headers: Vec<(String, String)> = req
            .headers
            .iter()
            .map(|header| {
                (
                    header.name.to_owned(),
                    String::from_utf8_lossy(header.value).into_owned(),
                )
            })
            .collect();

        let content_length: usize = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .map_or(Some(0), |(_, value)| value.trim().parse().ok())?;

        let body = &buf[body_start_pos..read_so_far];
        if body.len() < content_length {
            if new_read == 0 {
                return None;
            }
            continue;
        }

        return Some(RecordedRequest {
            method: req.method?.to_owned(),
            path: req.path?.to_owned(),
            headers,
            body: body[..content_length].to_vec(),
            client_common_name: None,
        });
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
