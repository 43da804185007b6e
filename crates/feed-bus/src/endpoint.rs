//! Endpoint strings such as `tcp://localhost:5555` or `tcp://*:5555`.

use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};

use crate::BusError;

const TCP_SCHEME: &str = "tcp://";

/// A host/port pair parsed from an endpoint string.
///
/// The `tcp://` scheme is optional and `*` stands for all interfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn parse(endpoint: &str) -> Result<Self, BusError> {
        let invalid = |reason| BusError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason,
        };

        let trimmed = endpoint.trim();
        let address = match trimmed.split_once("://") {
            Some(_) => trimmed
                .strip_prefix(TCP_SCHEME)
                .ok_or_else(|| invalid("only tcp:// endpoints are supported"))?,
            None => trimmed,
        };

        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| invalid("missing port"))?;
        let port = port.parse::<u16>().map_err(|_| invalid("invalid port"))?;

        let host = host.trim_start_matches('[').trim_end_matches(']');
        let host = match host {
            "" => return Err(invalid("missing host")),
            "*" => "0.0.0.0",
            other => other,
        };

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Resolves the endpoint to socket addresses.
    pub fn socket_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        Ok((self.host.as_str(), self.port).to_socket_addrs()?.collect())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
