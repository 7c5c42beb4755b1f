//! Client side of the HTTP/1.1 upgrade handshake (RFC 6455 Section 4).

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::error::{Error, Result};

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version this client speaks.
pub const WS_VERSION: &str = "13";

/// Computes the Sec-WebSocket-Accept value for a Sec-WebSocket-Key.
///
/// ```
/// use wsbook::protocol::handshake::compute_accept_key;
///
/// let accept = compute_accept_key("dGhlIHNhbXBsZSBub25jZQ==");
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Ordered HTTP header fields with case-insensitive names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFields {
    entries: Vec<(String, String)>,
}

impl HeaderFields {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Value of `name`, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.entries[i].1.as_str())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Set `name`, replacing an existing value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Add `name`; a repeated field is joined to the earlier value with `"; "`.
    pub fn append(&mut self, name: impl Into<String>, value: &str) {
        let name = name.into();
        match self.position(&name) {
            Some(i) => {
                let existing = &mut self.entries[i].1;
                existing.push_str("; ");
                existing.push_str(value);
            }
            None => self.entries.push((name, value.to_string())),
        }
    }

    /// Fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The upgrade request sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHandshake {
    resource: String,
    fields: HeaderFields,
}

impl ClientHandshake {
    /// Build a request for `resource` on `host` with a fresh random key.
    ///
    /// # Errors
    ///
    /// Returns `Error::Random` if no key could be generated.
    pub fn new(host: &str, resource: &str) -> Result<Self> {
        let mut nonce = [0u8; 16];
        getrandom::getrandom(&mut nonce)?;
        Ok(Self::with_key(host, resource, &BASE64.encode(nonce)))
    }

    /// Build a request with a caller-chosen key.
    #[must_use]
    pub fn with_key(host: &str, resource: &str, key: &str) -> Self {
        let mut fields = HeaderFields::new();
        fields.insert("Host", host);
        fields.insert("Upgrade", "websocket");
        fields.insert("Connection", "Upgrade");
        fields.insert("Sec-WebSocket-Key", key);
        fields.insert("Sec-WebSocket-Version", WS_VERSION);
        let resource = if resource.is_empty() { "/" } else { resource };
        Self {
            resource: resource.to_string(),
            fields,
        }
    }

    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    #[must_use]
    pub fn key(&self) -> &str {
        self.fields.get("Sec-WebSocket-Key").unwrap_or_default()
    }

    #[must_use]
    pub fn fields(&self) -> &HeaderFields {
        &self.fields
    }

    /// Add or replace a request header, e.g. `Origin`.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name, value);
    }

    /// Serialize as an HTTP request with CRLF line endings.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!("GET {} HTTP/1.1\r\n", self.resource);
        for (name, value) in self.fields.iter() {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out.into_bytes()
    }
}

/// The server's upgrade response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHandshake {
    status: u16,
    status_text: String,
    fields: HeaderFields,
}

/// Next line of `data` starting at `*pos`, without its line ending.
fn read_line<'a>(data: &'a [u8], pos: &mut usize) -> Result<Option<&'a str>> {
    let rest = &data[*pos..];
    let Some(end) = rest.iter().position(|&b| b == b'\n') else {
        return Ok(None);
    };
    *pos += end + 1;
    let line = rest[..end].strip_suffix(b"\r").unwrap_or(&rest[..end]);
    std::str::from_utf8(line)
        .map(Some)
        .map_err(|_| Error::InvalidHandshake("Invalid UTF-8 in handshake".into()))
}

impl ServerHandshake {
    /// Parse a response from the front of `data`.
    ///
    /// Returns the handshake and the number of bytes it occupied; anything
    /// after that belongs to the frame stream.
    ///
    /// # Errors
    ///
    /// - `Error::IncompleteHandshake` if the blank line ending the headers
    ///   has not arrived yet
    /// - `Error::InvalidHandshake` for a status line other than
    ///   `HTTP/1.1 101 <reason>` or a header line without a colon
    pub fn parse(data: &[u8]) -> Result<(Self, usize)> {
        let mut pos = 0;
        let status_line = read_line(data, &mut pos)?.ok_or(Error::IncompleteHandshake)?;

        let tokens: Vec<&str> = status_line.splitn(3, ' ').collect();
        let [version, code, reason] = tokens[..] else {
            return Err(Error::InvalidHandshake(format!(
                "Malformed status line: {status_line}"
            )));
        };
        if code != "101" {
            return Err(Error::InvalidHandshake(format!(
                "Invalid status code received: {code} Status line: {status_line}"
            )));
        }
        if !version.eq_ignore_ascii_case("HTTP/1.1") {
            return Err(Error::InvalidHandshake(format!(
                "Invalid status line received: {version} Status line: {status_line}"
            )));
        }

        let mut fields = HeaderFields::new();
        loop {
            let line = read_line(data, &mut pos)?.ok_or(Error::IncompleteHandshake)?;
            if line.is_empty() {
                break;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::InvalidHandshake("not an http header".into()))?;
            fields.append(name, value.trim_start_matches(' '));
        }

        Ok((
            Self {
                status: 101,
                status_text: reason.to_string(),
                fields,
            },
            pos,
        ))
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    #[must_use]
    pub fn fields(&self) -> &HeaderFields {
        &self.fields
    }
}

/// Outcome of checking a server response against the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Matched,
    NotMatched,
}

/// Check the upgrade headers and the accept-key challenge.
#[must_use]
pub fn validate_response(request: &ClientHandshake, response: &ServerHandshake) -> HandshakeState {
    let fields = response.fields();
    let upgrade_ok = fields
        .get("Upgrade")
        .is_some_and(|v| v.to_ascii_lowercase().contains("websocket"));
    let connection_ok = fields
        .get("Connection")
        .is_some_and(|v| v.to_ascii_lowercase().contains("upgrade"));
    if !upgrade_ok || !connection_ok {
        debug!("upgrade headers missing or wrong");
        return HandshakeState::NotMatched;
    }

    let (Some(key), Some(accept)) = (
        request.fields().get("Sec-WebSocket-Key"),
        fields.get("Sec-WebSocket-Accept"),
    ) else {
        debug!("missing Sec-WebSocket-Key or Sec-WebSocket-Accept");
        return HandshakeState::NotMatched;
    };

    if compute_accept_key(key.trim()) == accept {
        HandshakeState::Matched
    } else {
        debug!(accept, "Sec-WebSocket-Accept does not match");
        HandshakeState::NotMatched
    }
}
