//! Development server settings.

use super::defaults;
use educe::Educe;
use std::net::{IpAddr, SocketAddr};

/// Where the dev server listens and whether it opens a browser.
#[derive(Debug, Clone, Educe)]
#[educe(Default)]
pub struct ServeConfig {
    /// Network interface to bind (localhost only).
    #[educe(Default = defaults::serve::interface())]
    pub interface: String,

    /// HTTP port, also used by the live-reload socket.
    #[educe(Default = defaults::serve::port())]
    pub port: u16,

    /// Open the default browser once the server is listening.
    #[educe(Default = true)]
    pub open: bool,
}

impl ServeConfig {
    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        let interface: IpAddr = self.interface.parse()?;
        Ok(SocketAddr::new(interface, self.port))
    }

    /// Browser-facing URL, always `localhost` for the loopback interface.
    pub fn url(&self) -> String {
        let host = match self.interface.as_str() {
            "127.0.0.1" | "::1" => "localhost",
            other => other,
        };
        format!("http://{host}:{}", self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_config_defaults() {
        let config = ServeConfig::default();
        assert_eq!(config.interface, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert!(config.open);
    }

    #[test]
    fn test_serve_addr_and_url() {
        let config = ServeConfig::default();
        assert_eq!(config.addr().unwrap().to_string(), "127.0.0.1:8080");
        assert_eq!(config.url(), "http://localhost:8080");
    }

    #[test]
    fn test_serve_addr_rejects_bad_interface() {
        let config = ServeConfig {
            interface: "not-an-ip".into(),
            ..ServeConfig::default()
        };
        assert!(config.addr().is_err());
    }
}
