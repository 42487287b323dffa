// Copyright (c) Microsoft. All rights reserved.

use test_common::kme::{MockKme, Reply};
use test_common::{SAMPLE_KEY, SAMPLE_KEY_ID};

fn pem_credentials() -> kme_common::Credentials {
    let credentials = test_common::credential::client_credentials("CONS_TIM_UPT");
    kme_common::Credentials::Pem {
        cert: credentials.cert,
        key: credentials.key,
    }
}

fn client(url: &str, key_id: Option<&str>) -> kme_client::Client {
    let config = kme_common::EndpointConfig::new(url, "CONS_TIM_UPT", pem_credentials(), key_id)
        .unwrap()
        .with_debug(true);
    kme_client::Client::new(config)
}

#[test]
fn encryption_mode_posts_without_body() {
    let kme = MockKme::start(Reply::ok(test_common::keys_response(
        SAMPLE_KEY_ID,
        SAMPLE_KEY,
    )));

    let key = client(kme.url(), None).retrieve().unwrap();
    assert_eq!(key.key_id, SAMPLE_KEY_ID);
    assert_eq!(key.key, SAMPLE_KEY);

    let request = kme.finish();
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/api/v1/keys/CONS_TIM_UPT/enc_keys");
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert_eq!(request.header("accept-encoding"), Some("identity"));
    assert!(request.body.is_empty());
}

#[test]
fn decryption_mode_sends_key_id() {
    let kme = MockKme::start(Reply::ok(test_common::keys_response(
        SAMPLE_KEY_ID,
        SAMPLE_KEY,
    )));

    let key = client(kme.url(), Some(SAMPLE_KEY_ID)).retrieve().unwrap();
    assert_eq!(key.key_id, SAMPLE_KEY_ID);

    let request = kme.finish();
    assert_eq!(request.path, "/api/v1/keys/CONS_TIM_UPT/dec_keys");
    assert_eq!(
        request.body,
        format!(r#"{{"key_IDs":[{{"key_ID":"{}"}}]}}"#, SAMPLE_KEY_ID).into_bytes()
    );
}

#[test]
fn decryption_mode_rejects_other_key_id() {
    let kme = MockKme::start(Reply::ok(test_common::keys_response(
        SAMPLE_KEY_ID,
        SAMPLE_KEY,
    )));

    let err = client(kme.url(), Some("other-id")).retrieve().unwrap_err();
    match &err {
        kme_client::RetrievalError::Protocol(kme_client::ProtocolError::KeyIdMismatch {
            expected,
            got,
        }) => {
            assert_eq!(expected, "other-id");
            assert_eq!(got, SAMPLE_KEY_ID);
        }
        other => panic!("expected KeyIdMismatch, got {other:?}"),
    }
    assert_eq!(err.category(), kme_common::ErrorCategory::Protocol);

    let _ = kme.finish();
}

#[test]
fn chunked_response() {
    let kme = MockKme::start(Reply::Chunked {
        status: 200,
        body: test_common::keys_response(SAMPLE_KEY_ID, SAMPLE_KEY),
    });

    let key = client(kme.url(), None).retrieve().unwrap();
    assert_eq!(key.key, SAMPLE_KEY);

    let _ = kme.finish();
}

#[test]
fn non_200_status_is_rejected() {
    let kme = MockKme::start(Reply::Json {
        status: 404,
        body: r#"{"message":"unknown SAE"}"#.to_owned(),
    });

    let err = client(kme.url(), None).retrieve().unwrap_err();
    assert!(matches!(
        err,
        kme_client::RetrievalError::Transport(kme_client::TransportError::BadStatus(404))
    ));
    assert_eq!(err.category(), kme_common::ErrorCategory::Protocol);

    let _ = kme.finish();
}

#[test]
fn empty_key_list_is_malformed() {
    let kme = MockKme::start(Reply::ok(r#"{"keys":[]}"#));

    let err = client(kme.url(), None).retrieve().unwrap_err();
    assert!(matches!(
        err,
        kme_client::RetrievalError::Protocol(kme_client::ProtocolError::Malformed(_))
    ));

    let _ = kme.finish();
}

#[test]
fn silent_kme_times_out() {
    let kme = MockKme::start(Reply::Silent);

    let config = kme_common::EndpointConfig::new(kme.url(), "CONS_TIM_UPT", pem_credentials(), None)
        .unwrap()
        .with_timeout(std::time::Duration::from_millis(300))
        .unwrap();

    let started = std::time::Instant::now();
    let err = kme_client::Client::new(config).retrieve().unwrap_err();
    assert!(
        matches!(
            err,
            kme_client::RetrievalError::Transport(kme_client::TransportError::Timeout(_))
        ),
        "{err:?}"
    );
    assert_eq!(err.category(), kme_common::ErrorCategory::Transport);
    assert!(started.elapsed() < std::time::Duration::from_secs(3));

    let _ = kme.finish();
}

#[test]
fn refused_connection_is_a_network_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let err = client(&format!("http://127.0.0.1:{port}"), None)
        .retrieve()
        .unwrap_err();
    assert!(
        matches!(
            err,
            kme_client::RetrievalError::Transport(kme_client::TransportError::Network(_))
        ),
        "{err:?}"
    );
}

#[test]
fn mismatched_credentials_are_rejected_before_connecting() {
    let credentials = test_common::credential::mismatched_credentials();
    let config = kme_common::EndpointConfig::new(
        "https://kme.invalid/",
        "CONS_TIM_UPT",
        kme_common::Credentials::Pem {
            cert: credentials.cert,
            key: credentials.key,
        },
        None,
    )
    .unwrap();

    let err = kme_client::Client::new(config).retrieve().unwrap_err();
    assert!(matches!(
        err,
        kme_client::RetrievalError::Transport(kme_client::TransportError::InvalidCredential(_))
    ));
}

#[test]
fn credentials_can_be_loaded_from_files() {
    let credentials = test_common::credential::client_credentials("CONS_TIM_UPT");
    let files = test_common::credential::write_credentials(&credentials);

    let kme = MockKme::start(Reply::ok(test_common::keys_response(
        SAMPLE_KEY_ID,
        SAMPLE_KEY,
    )));

    let config = kme_common::EndpointConfig::new(
        kme.url(),
        "CONS_TIM_UPT",
        kme_common::Credentials::Files {
            cert: files.cert.clone(),
            key: files.key.clone(),
        },
        None,
    )
    .unwrap();
    let key = kme_client::Client::new(config).retrieve().unwrap();
    assert_eq!(key.key_id, SAMPLE_KEY_ID);

    let _ = kme.finish();
}

#[test]
fn missing_credential_file_is_rejected() {
    let config = kme_common::EndpointConfig::new(
        "https://kme.invalid/",
        "CONS_TIM_UPT",
        kme_common::Credentials::Files {
            cert: "/nonexistent/client.crt".into(),
            key: "/nonexistent/client.key".into(),
        },
        None,
    )
    .unwrap();

    let err = kme_client::Client::new(config).retrieve().unwrap_err();
    assert!(matches!(
        err,
        kme_client::RetrievalError::Transport(kme_client::TransportError::InvalidCredential(_))
    ));
}

fn tls_client(
    url: &str,
    credentials: &test_common::credential::ClientCredentials,
    trust_bundle: Option<&std::path::Path>,
) -> kme_client::Client {
    let mut config = kme_common::EndpointConfig::new(
        url,
        "CONS_TIM_UPT",
        kme_common::Credentials::Pem {
            cert: credentials.cert.clone(),
            key: credentials.key.clone(),
        },
        None,
    )
    .unwrap();
    if let Some(trust_bundle) = trust_bundle {
        config = config.with_trust_bundle(trust_bundle.to_owned());
    }
    kme_client::Client::new(config)
}

#[test]
fn mutual_tls_with_trust_bundle() {
    let server = test_common::credential::server_credentials("localhost");
    let trust_bundle = test_common::credential::write_trust_bundle(&server.ca_cert);
    let credentials = test_common::credential::client_credentials("CONS_TIM_UPT");

    let kme = MockKme::start_tls(
        Reply::ok(test_common::keys_response(SAMPLE_KEY_ID, SAMPLE_KEY)),
        &server,
        &credentials.cert,
    );
    assert!(kme.url().starts_with("https://localhost:"));

    let key = tls_client(kme.url(), &credentials, Some(&trust_bundle.path))
        .retrieve()
        .unwrap();
    assert_eq!(key.key_id, SAMPLE_KEY_ID);
    assert_eq!(key.key, SAMPLE_KEY);

    let request = kme.finish();
    assert_eq!(request.path, "/api/v1/keys/CONS_TIM_UPT/enc_keys");
    assert_eq!(request.client_common_name.as_deref(), Some("CONS_TIM_UPT"));
}

#[test]
fn untrusted_server_fails_the_handshake() {
    let server = test_common::credential::server_credentials("localhost");
    let credentials = test_common::credential::client_credentials("CONS_TIM_UPT");

    let kme = MockKme::start_tls(
        Reply::ok(test_common::keys_response(SAMPLE_KEY_ID, SAMPLE_KEY)),
        &server,
        &credentials.cert,
    );

    let err = tls_client(kme.url(), &credentials, None)
        .retrieve()
        .unwrap_err();
    assert!(
        matches!(
            err,
            kme_client::RetrievalError::Transport(kme_client::TransportError::Network(_))
        ),
        "{err:?}"
    );
    assert_eq!(err.category(), kme_common::ErrorCategory::Transport);

    assert!(kme.try_finish().is_none());
}

#[test]
fn unknown_client_certificate_is_refused() {
    let server = test_common::credential::server_credentials("localhost");
    let trust_bundle = test_common::credential::write_trust_bundle(&server.ca_cert);
    let trusted = test_common::credential::client_credentials("CONS_TIM_UPT");
    let other = test_common::credential::client_credentials("CONS_TIM_UPT");

    let kme = MockKme::start_tls(
        Reply::ok(test_common::keys_response(SAMPLE_KEY_ID, SAMPLE_KEY)),
        &server,
        &trusted.cert,
    );

    let result = tls_client(kme.url(), &other, Some(&trust_bundle.path)).retrieve();
    assert!(result.is_err(), "{result:?}");

    assert!(kme.try_finish().is_none());
}
