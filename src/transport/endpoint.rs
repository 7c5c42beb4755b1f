//! `ws://` and `wss://` URL handling.

use url::Url;

use crate::error::{Error, Result};

/// Where to connect and what to ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    secure: bool,
    host: String,
    port: u16,
    resource: String,
}

impl Endpoint {
    /// Parse a WebSocket URL.
    ///
    /// The resource is the URL path (`/` when empty) followed by `?query`
    /// when one is present.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` for unparsable URLs, schemes other than
    /// `ws`/`wss`, or URLs without a host.
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input)?;
        let secure = match url.scheme() {
            "ws" => false,
            "wss" => true,
            other => return Err(Error::InvalidUrl(format!("unsupported scheme: {other}"))),
        };
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::InvalidUrl(format!("missing host: {input}")))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = url
            .port_or_known_default()
            .unwrap_or(if secure { 443 } else { 80 });

        let mut resource = match url.path() {
            "" => "/".to_string(),
            path => path.to_string(),
        };
        if let Some(query) = url.query() {
            resource.push('?');
            resource.push_str(query);
        }

        Ok(Self {
            secure,
            host,
            port,
            resource,
        })
    }

    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Host name or address, without IPv6 brackets.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    #[must_use]
    pub fn default_port(&self) -> u16 {
        if self.secure { 443 } else { 80 }
    }

    /// Value for the `Host` request header; the port is omitted when it is
    /// the scheme default.
    #[must_use]
    pub fn host_header(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == self.default_port() {
            host
        } else {
            format!("{host}:{}", self.port)
        }
    }
}
