//! Server info advertised to the coordination service.

use serde::{Deserialize, Serialize};

/// The address every interface listens on; never a reachable advertisement.
pub const UNSPECIFIED_IP: &str = "0.0.0.0";

/// What a server publishes about itself when it registers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Address peers should connect to.
    pub ip: String,
    /// Listening port.
    pub port: u16,
    /// Address used for registration when it differs from `ip`.
    #[serde(rename = "registerip", default)]
    pub register_ip: String,
    /// Host name of the machine.
    #[serde(default)]
    pub hostname: String,
    /// `http` or `https`.
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Server version string.
    #[serde(default)]
    pub version: String,
    /// Process id.
    #[serde(default)]
    pub pid: u32,
    /// Unique id of this server instance.
    #[serde(default)]
    pub uuid: String,
}

fn default_scheme() -> String {
    "http".to_string()
}

impl ServerInfo {
    /// Server info for `ip:port` in the current process.
    #[must_use]
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        let ip = ip.into();
        Self {
            register_ip: ip.clone(),
            ip,
            port,
            hostname: String::new(),
            scheme: default_scheme(),
            version: String::new(),
            pid: std::process::id(),
            uuid: String::new(),
        }
    }

    /// Set the host name.
    #[must_use]
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Set the version string.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the scheme.
    #[must_use]
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Set the instance id.
    #[must_use]
    pub fn uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = uuid.into();
        self
    }

    /// `scheme://ip:port`
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_info_wire_names() {
        let info = ServerInfo::new("10.0.0.5", 9000)
            .hostname("node-1")
            .version("1.2.0")
            .uuid("abc");
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["ip"], "10.0.0.5");
        assert_eq!(value["port"], 9000);
        assert_eq!(value["registerip"], "10.0.0.5");
        assert_eq!(value["hostname"], "node-1");
        assert_eq!(value["scheme"], "http");
        assert_eq!(value["uuid"], "abc");
    }

    #[test]
    fn test_server_info_address() {
        let info = ServerInfo::new("10.0.0.5", 9000).scheme("https");
        assert_eq!(info.address(), "https://10.0.0.5:9000");
    }

    #[test]
    fn test_server_info_defaults_on_decode() {
        let info: ServerInfo = serde_json::from_str(r#"{"ip": "10.0.0.5", "port": 80}"#).unwrap();
        assert_eq!(info.scheme, "http");
        assert!(info.hostname.is_empty());
    }
}
