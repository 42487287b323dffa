// Copyright (c) Microsoft. All rights reserved.

#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate
)]

pub mod credential;
pub mod kme;

/// The key ID and key used in the KME examples throughout the tests.
pub const SAMPLE_KEY_ID: &str = "3db4bb3f-0f51-49af-9531-7fb9bc08d1e0";
pub const SAMPLE_KEY: &str = "NiXDkmgcAztCFzyhO8XI+COj1Y1pEMDR8H0LzxZxoFo=";

/// A `{"keys":[...]}` body holding a single key.
pub fn keys_response(key_id: &str, key: &str) -> String {
    format!(r#"{{"keys":[{{"key_ID":"{}","key":"{}"}}]}}"#, key_id, key)
}
