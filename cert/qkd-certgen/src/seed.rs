// Copyright (c) Microsoft. All rights reserved.

/// Length in bytes of an Ed25519 private key seed.
pub const ED25519_SEED_LEN: usize = 32;

/// Key material that is known to be a usable Ed25519 seed. The bytes are wiped on drop.
#[derive(Clone, zeroize::Zeroize, zeroize::ZeroizeOnDrop)]
pub struct ValidatedSeed([u8; ED25519_SEED_LEN]);

impl ValidatedSeed {
    pub fn as_bytes(&self) -> &[u8; ED25519_SEED_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for ValidatedSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ValidatedSeed(<redacted>)")
    }
}

pub fn validate(bytes: &[u8]) -> Result<ValidatedSeed, crate::SeedError> {
    let seed: [u8; ED25519_SEED_LEN] =
        bytes.try_into().map_err(|_| crate::SeedError::WrongLength {
            expected: ED25519_SEED_LEN,
            actual: bytes.len(),
        })?;
    Ok(ValidatedSeed(seed))
}

#[cfg(test)]
mod tests {
    use super::{validate, ED25519_SEED_LEN};
    use crate::SeedError;

    #[test]
    fn exact_length_is_accepted() {
        let bytes: Vec<u8> = (0..32).collect();
        let seed = validate(&bytes).unwrap();
        assert_eq!(&seed.as_bytes()[..], &bytes[..]);
    }

    #[test]
    fn wrong_lengths_are_rejected() {
        for len in [0, 1, 16, 31, 33, 64] {
            match validate(&vec![0x5a; len]) {
                Err(SeedError::WrongLength { expected, actual }) => {
                    assert_eq!(expected, ED25519_SEED_LEN);
                    assert_eq!(actual, len);
                }
                Ok(_) => panic!("{len}-byte seed was accepted"),
            }
        }
    }

    #[test]
    fn debug_is_redacted() {
        let seed = validate(&[0xab; 32]).unwrap();
        let debug = format!("{seed:?}");
        assert!(!debug.contains("171"));
        assert!(!debug.to_lowercase().contains("ab"));
    }
}
