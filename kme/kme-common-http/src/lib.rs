// Copyright (c) Microsoft. All rights reserved.

//! Wire types of the KME key-delivery API.
//!
//! Both endpoints answer with the same [`keys::Response`] shape.

#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic)]

pub fn enc_keys_path(sae: &str) -> String {
    format!("/api/v1/keys/{}/enc_keys", sae)
}

pub fn dec_keys_path(sae: &str) -> String {
    format!("/api/v1/keys/{}/dec_keys", sae)
}

pub mod dec_keys {
    #[derive(Debug, serde::Deserialize, serde::Serialize)]
    pub struct Request {
        #[serde(rename = "key_IDs")]
        pub key_ids: Vec<KeyIdEntry>,
    }

    #[derive(Debug, serde::Deserialize, serde::Serialize)]
    pub struct KeyIdEntry {
        #[serde(rename = "key_ID")]
        pub key_id: String,
    }
}

pub mod keys {
    #[derive(Debug, serde::Deserialize, serde::Serialize)]
    pub struct Response {
        pub keys: Vec<Key>,
    }

    #[derive(Debug, serde::Deserialize, serde::Serialize)]
    pub struct Key {
        #[serde(rename = "key_ID")]
        pub key_id: String,

        pub key: String,
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn dec_keys_request_shape() {
        let request = super::dec_keys::Request {
            key_ids: vec![super::dec_keys::KeyIdEntry {
                key_id: "3db4bb3f-0f51-49af-9531-7fb9bc08d1e0".to_owned(),
            }],
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"key_IDs":[{"key_ID":"3db4bb3f-0f51-49af-9531-7fb9bc08d1e0"}]}"#
        );
    }

    #[test]
    fn keys_response_ignores_extra_fields() {
        let response: super::keys::Response = serde_json::from_str(
            r#"{"keys":[{"key_ID":"abc","key":"AAAA","key_ID_extension":{}}],"key_container_extension":null}"#,
        )
        .unwrap();
        assert_eq!(response.keys.len(), 1);
        assert_eq!(response.keys[0].key_id, "abc");
        assert_eq!(response.keys[0].key, "AAAA");
    }

    #[test]
    fn paths() {
        assert_eq!(super::enc_keys_path("SAE_1"), "/api/v1/keys/SAE_1/enc_keys");
        assert_eq!(super::dec_keys_path("SAE_1"), "/api/v1/keys/SAE_1/dec_keys");
    }
}
