// Copyright (c) Microsoft. All rights reserved.

//! Distinguished names in the compact `/C=RO/ST=TM/L=Timisoara/O=InnoQube/OU=Quantum Division/CN=quantum-app-1`
//! notation used by `openssl req -subj`.

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DistinguishedName {
    pub country: Option<String>,
    pub state: Option<String>,
    pub locality: Option<String>,
    pub organization: Option<String>,
    pub organizational_unit: Option<String>,
    pub common_name: Option<String>,
}

impl DistinguishedName {
    /// The subject used when the caller does not supply one.
    pub fn default_subject() -> Self {
        DistinguishedName {
            country: Some("RO".to_owned()),
            state: Some("TM".to_owned()),
            locality: Some("Timisoara".to_owned()),
            organization: Some("InnoQube".to_owned()),
            organizational_unit: Some("Quantum Division".to_owned()),
            common_name: Some("quantum app 1".to_owned()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.attributes().all(|(_, _, value)| value.is_none())
    }

    /// Builds the equivalent X.509 name, with attributes in C, ST, L, O, OU, CN order.
    ///
    /// Values are stored with an explicit string type, so OpenSSL's per-attribute length limits
    /// (eg exactly two characters for C, at most 64 for CN) do not apply.
    pub fn to_x509_name(&self) -> Result<openssl::x509::X509Name, openssl::error::ErrorStack> {
        let mut name = openssl::x509::X509Name::builder()?;
        for (_, nid, value) in self.attributes() {
            if let Some(value) = value {
                name.append_entry_by_nid_with_type(nid, value, string_type(nid, value))?;
            }
        }
        Ok(name.build())
    }

    fn attributes(
        &self,
    ) -> impl Iterator<Item = (&'static str, openssl::nid::Nid, Option<&str>)> {
        [
            ("C", openssl::nid::Nid::COUNTRYNAME, self.country.as_deref()),
            ("ST", openssl::nid::Nid::STATEORPROVINCENAME, self.state.as_deref()),
            ("L", openssl::nid::Nid::LOCALITYNAME, self.locality.as_deref()),
            ("O", openssl::nid::Nid::ORGANIZATIONNAME, self.organization.as_deref()),
            (
                "OU",
                openssl::nid::Nid::ORGANIZATIONALUNITNAME,
                self.organizational_unit.as_deref(),
            ),
            ("CN", openssl::nid::Nid::COMMONNAME, self.common_name.as_deref()),
        ]
        .into_iter()
    }

    fn slot(&mut self, key: &str) -> Option<&mut Option<String>> {
        match key {
            "C" => Some(&mut self.country),
            "ST" => Some(&mut self.state),
            "L" => Some(&mut self.locality),
            "O" => Some(&mut self.organization),
            "OU" => Some(&mut self.organizational_unit),
            "CN" => Some(&mut self.common_name),
            _ => None,
        }
    }
}

/// PrintableString for a printable country code, UTF8String for everything else.
fn string_type(nid: openssl::nid::Nid, value: &str) -> openssl::asn1::Asn1Type {
    let printable = value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b" '()+,-./:=?".contains(&b));

    if nid == openssl::nid::Nid::COUNTRYNAME && printable {
        openssl::asn1::Asn1Type::PRINTABLESTRING
    } else {
        openssl::asn1::Asn1Type::UTF8STRING
    }
}

impl std::fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (key, _, value) in self.attributes() {
            if let Some(value) = value {
                write!(f, "/{}={}", key, value)?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for DistinguishedName {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(parse(s))
    }
}

/// Parses the compact notation. Never fails.
///
/// Each `/KEY=value` segment whose key is one or more uppercase ASCII letters and whose value is
/// non-empty is recognized; the value runs up to the next `/`. Fragments that do not match are skipped.
/// Of the recognized keys, `C`, `ST`, `L`, `O`, `OU` and `CN` are kept (last one wins) and the rest are ignored.
/// Values are trimmed, and values that are blank after trimming are dropped.
pub fn parse(dn: &str) -> DistinguishedName {
    let mut name = DistinguishedName::default();

    let bytes = dn.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        match match_segment(dn, pos) {
            Some((key, value, end)) => {
                let value = value.trim();
                if !value.is_empty() {
                    if let Some(slot) = name.slot(key) {
                        *slot = Some(value.to_owned());
                    }
                }
                pos = end;
            }
            None => pos += 1,
        }
    }

    name
}

/// Matches `/[A-Z]+=[^/]+` starting exactly at `start`. Returns the key, the value and the end offset.
fn match_segment(dn: &str, start: usize) -> Option<(&str, &str, usize)> {
    let bytes = dn.as_bytes();
    if bytes.get(start) != Some(&b'/') {
        return None;
    }

    let key_start = start + 1;
    let key_end = key_start
        + bytes[key_start..]
            .iter()
            .take_while(|b| b.is_ascii_uppercase())
            .count();
    if key_end == key_start || bytes.get(key_end) != Some(&b'=') {
        return None;
    }

    let value_start = key_end + 1;
    let value_end = bytes[value_start..]
        .iter()
        .position(|&b| b == b'/')
        .map_or(bytes.len(), |offset| value_start + offset);
    if value_end == value_start {
        return None;
    }

    // All delimiters are ASCII, so every offset here is a char boundary.
    Some((
        &dn[key_start..key_end],
        &dn[value_start..value_end],
        value_end,
    ))
}
