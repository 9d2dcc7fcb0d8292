use serde::{Deserialize, Serialize};

use super::error::{LinkError, LinkResult};

/// Default read/write buffer size handed to the engine (bytes)
pub const DEFAULT_MSG_LEN: usize = 1024;
/// Default per-request timeout handed to the engine
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 2000;
/// Default keep-alive interval handed to the engine
pub const DEFAULT_KEEPALIVE_INTERVAL_MS: u64 = 60_000;

/// Validated connection parameters for one engine client
///
/// Either supplied explicitly by the caller or derived from device
/// identity by the credential signer. `host`, `client_id`, `username` and
/// `password` must be non-empty and `port` non-zero before the engine
/// ever sees them; [`ConnectParams::validate`] is the single gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub request_timeout_ms: u64,
    pub keep_alive_interval_ms: u64,
    pub clean_session: bool,
    pub read_buf_size: usize,
    pub write_buf_size: usize,
}

impl ConnectParams {
    /// Create a new builder for constructing `ConnectParams`
    ///
    /// # Example
    /// ```no_run
    /// use iotlink::mqtt_api::opts::ConnectParams;
    ///
    /// let params = ConnectParams::builder()
    ///     .host("broker.example.com")
    ///     .port(1883)
    ///     .client_id("dev-01")
    ///     .username("dev-01&pk")
    ///     .password("secret")
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn builder() -> ConnectParamsBuilder {
        ConnectParamsBuilder::new()
    }

    /// Check the parameter set is complete enough to hand to the engine
    pub fn validate(&self) -> LinkResult<()> {
        if self.host.is_empty() {
            return Err(LinkError::empty_field("host"));
        }
        if self.port == 0 {
            return Err(LinkError::InvalidArgument {
                field: "port".to_string(),
                reason: "must be non-zero".to_string(),
            });
        }
        if self.client_id.is_empty() {
            return Err(LinkError::empty_field("client_id"));
        }
        if self.username.is_empty() {
            return Err(LinkError::empty_field("username"));
        }
        if self.password.is_empty() {
            return Err(LinkError::empty_field("password"));
        }
        Ok(())
    }
}

/// Builder for `ConnectParams`
///
/// Timeouts and buffer sizes default to the values the original device
/// stack ships with; identity fields default to empty and are caught by
/// `build()`.
#[derive(Debug, Default)]
pub struct ConnectParamsBuilder {
    host: String,
    port: u16,
    client_id: String,
    username: String,
    password: String,
    request_timeout_ms: Option<u64>,
    keep_alive_interval_ms: Option<u64>,
    clean_session: bool,
    read_buf_size: Option<usize>,
    write_buf_size: Option<usize>,
}

impl ConnectParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.request_timeout_ms = Some(ms);
        self
    }

    pub fn keep_alive_interval_ms(mut self, ms: u64) -> Self {
        self.keep_alive_interval_ms = Some(ms);
        self
    }

    pub fn clean_session(mut self, clean: bool) -> Self {
        self.clean_session = clean;
        self
    }

    pub fn read_buf_size(mut self, size: usize) -> Self {
        self.read_buf_size = Some(size);
        self
    }

    pub fn write_buf_size(mut self, size: usize) -> Self {
        self.write_buf_size = Some(size);
        self
    }

    pub fn build(self) -> LinkResult<ConnectParams> {
        let params = ConnectParams {
            host: self.host,
            port: self.port,
            client_id: self.client_id,
            username: self.username,
            password: self.password,
            request_timeout_ms: self.request_timeout_ms.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
            keep_alive_interval_ms: self
                .keep_alive_interval_ms
                .unwrap_or(DEFAULT_KEEPALIVE_INTERVAL_MS),
            clean_session: self.clean_session,
            read_buf_size: self.read_buf_size.unwrap_or(DEFAULT_MSG_LEN),
            write_buf_size: self.write_buf_size.unwrap_or(DEFAULT_MSG_LEN),
        };
        params.validate()?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_builder() -> ConnectParamsBuilder {
        ConnectParams::builder()
            .host("broker.example.com")
            .port(1883)
            .client_id("pk.dn|securemode=3|")
            .username("dn&pk")
            .password("deadbeef")
    }

    #[test]
    fn test_build_applies_defaults() {
        let params = full_builder().build().unwrap();
        assert_eq!(params.request_timeout_ms, DEFAULT_REQUEST_TIMEOUT_MS);
        assert_eq!(params.keep_alive_interval_ms, DEFAULT_KEEPALIVE_INTERVAL_MS);
        assert_eq!(params.read_buf_size, DEFAULT_MSG_LEN);
        assert_eq!(params.write_buf_size, DEFAULT_MSG_LEN);
        assert!(!params.clean_session);
    }

    #[test]
    fn test_build_rejects_empty_host() {
        let err = full_builder().host("").build().unwrap_err();
        match err {
            LinkError::InvalidArgument { field, .. } => assert_eq!(field, "host"),
            other => panic!("Expected InvalidArgument, got {:?}", other),
        }
    }

    #[test]
    fn test_build_rejects_zero_port() {
        let err = full_builder().port(0).build().unwrap_err();
        match err {
            LinkError::InvalidArgument { field, .. } => assert_eq!(field, "port"),
            other => panic!("Expected InvalidArgument, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_missing_credentials() {
        for strip in ["client_id", "username", "password"] {
            let mut params = full_builder().build().unwrap();
            match strip {
                "client_id" => params.client_id.clear(),
                "username" => params.username.clear(),
                _ => params.password.clear(),
            }
            let err = params.validate().unwrap_err();
            match err {
                LinkError::InvalidArgument { field, .. } => assert_eq!(field, strip),
                other => panic!("Expected InvalidArgument, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_explicit_overrides_win() {
        let params = full_builder()
            .request_timeout_ms(500)
            .keep_alive_interval_ms(30_000)
            .clean_session(true)
            .read_buf_size(4096)
            .build()
            .unwrap();
        assert_eq!(params.request_timeout_ms, 500);
        assert_eq!(params.keep_alive_interval_ms, 30_000);
        assert!(params.clean_session);
        assert_eq!(params.read_buf_size, 4096);
        assert_eq!(params.write_buf_size, DEFAULT_MSG_LEN);
    }
}
