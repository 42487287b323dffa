// Copyright (c) Microsoft. All rights reserved.

/// One outbound call to the KME, fully derived from an [`kme_common::EndpointConfig`].
#[derive(Debug, Eq, PartialEq)]
pub struct KeyRequest {
    pub url: String,

    /// The JSON body. `None` for `enc_keys`, which is sent without a body.
    pub body: Option<Vec<u8>>,
}

pub fn build(config: &kme_common::EndpointConfig) -> KeyRequest {
    match config.key_mode() {
        kme_common::KeyMode::Encryption => KeyRequest {
            url: format!(
                "{}{}",
                config.base_url(),
                kme_common_http::enc_keys_path(config.sae())
            ),
            body: None,
        },

        kme_common::KeyMode::Decryption { key_id } => {
            let body = kme_common_http::dec_keys::Request {
                key_ids: vec![kme_common_http::dec_keys::KeyIdEntry {
                    key_id: key_id.clone(),
                }],
            };
            let body =
                serde_json::to_vec(&body).expect("serializing request body to JSON cannot fail");

            KeyRequest {
                url: format!(
                    "{}{}",
                    config.base_url(),
                    kme_common_http::dec_keys_path(config.sae())
                ),
                body: Some(body),
            }
        }
    }
}
