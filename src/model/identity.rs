use std::fmt::{Display, Formatter};
use std::ops::Deref;

use hmac::{digest::Output, Hmac, Mac};
use rocket::http::{
    impl_from_uri_param_identity,
    uri::fmt::{Formatter as UriFormatter, Path, UriDisplay},
};
use rocket::request::FromParam;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

pub type HmacSha256 = Hmac<Sha256>;

/// An external account identity: the key a voter or administrator is known by.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for Identity {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(identity: &str) -> Self {
        Self::new(identity)
    }
}

impl From<String> for Identity {
    fn from(identity: String) -> Self {
        Self(identity)
    }
}

/// Empty path segments never reach us, so this only rejects whitespace-only identities.
impl<'a> FromParam<'a> for Identity {
    type Error = &'a str;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        if param.trim().is_empty() {
            Err(param)
        } else {
            Ok(Self::new(param))
        }
    }
}

impl UriDisplay<Path> for Identity {
    fn fmt(&self, f: &mut UriFormatter<'_, Path>) -> std::fmt::Result {
        f.write_value(&self.0)
    }
}

impl_from_uri_param_identity!([Path] Identity);

/// Keyed digest of a voter's external identity token.
///
/// The token itself is never stored; only this digest is kept, and verification
/// digests the presented token with the same key and compares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenDigest(Output<HmacSha256>);

/// Secret key used to digest identity tokens.
#[derive(Clone)]
pub struct TokenKey(Vec<u8>);

impl TokenKey {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self(secret.as_ref().to_vec())
    }

    /// Digest an identity token under this key.
    pub fn digest(&self, token: &str) -> TokenDigest {
        let mut hmac =
            HmacSha256::new_from_slice(&self.0).expect("HMAC can take key of any size");
        hmac.update(token.as_bytes());
        TokenDigest(hmac.finalize().into_bytes())
    }
}
