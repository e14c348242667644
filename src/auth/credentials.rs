use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::HeaderMap;
use base64ct::{Base64, Encoding};

/// Cookie name prefix under which capability tokens are sent
pub const CAPABILITY_COOKIE_PREFIX: &str = "macaroon-";

/// Decoded HTTP basic-auth pair
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Decode the base64 part of a `Basic` authorization header
    pub fn decode(encoded: &str) -> Option<Self> {
        let bytes = Base64::decode_vec(encoded.trim()).ok()?;
        let text = String::from_utf8(bytes).ok()?;
        let (username, password) = text.split_once(':')?;
        Some(Self::new(username, password))
    }

    /// Value for an `Authorization` header
    pub fn header_value(&self) -> String {
        let pair = format!("{}:{}", self.username, self.password);
        format!("Basic {}", Base64::encode_string(pair.as_bytes()))
    }
}

/// A basic-auth header as presented by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BasicCredential {
    Decoded(BasicAuth),
    Malformed,
}

/// Every credential found on a request, not yet verified
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub basic: Option<BasicCredential>,

    /// Capability tokens from bearer headers and capability cookies
    pub capabilities: Vec<String>,
}

impl Credentials {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_basic(mut self, auth: BasicAuth) -> Self {
        self.basic = Some(BasicCredential::Decoded(auth));
        self
    }

    pub fn with_capability(mut self, token: impl Into<String>) -> Self {
        self.capabilities.push(token.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.basic.is_none() && self.capabilities.is_empty()
    }

    /// Collect credentials from `Authorization` and `Cookie` headers
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut credentials = Self::none();

        for value in headers.get_all(AUTHORIZATION) {
            let Ok(value) = value.to_str() else {
                credentials.basic.get_or_insert(BasicCredential::Malformed);
                continue;
            };
            let (scheme, rest) = value.split_once(' ').unwrap_or((value, ""));
            if scheme.eq_ignore_ascii_case("basic") {
                if credentials.basic.is_none() {
                    credentials.basic = Some(match BasicAuth::decode(rest) {
                        Some(auth) => BasicCredential::Decoded(auth),
                        None => BasicCredential::Malformed,
                    });
                }
            } else if scheme.eq_ignore_ascii_case("bearer") && !rest.trim().is_empty() {
                credentials.capabilities.push(rest.trim().to_string());
            }
        }

        for value in headers.get_all(COOKIE) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            for cookie in value.split(';') {
                if let Some((name, token)) = cookie.trim().split_once('=') {
                    if name.starts_with(CAPABILITY_COOKIE_PREFIX) && !token.is_empty() {
                        credentials.capabilities.push(token.to_string());
                    }
                }
            }
        }

        credentials
    }
}
