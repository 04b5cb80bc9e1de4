//! JSON-RPC 2.0 over websocket
//!
//! Xen Orchestra serves its API at `<base>/api/`. Every request carries an
//! increasing numeric id; messages without our id (event notifications) are
//! skipped while waiting for a response.

use crate::error::{Result, XoError};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

/// How the server certificate is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    #[default]
    Verify,
    /// Accept any certificate. Only for self-signed lab endpoints, and only
    /// when the operator asked for it.
    AcceptInvalidCerts,
}

/// A JSON-RPC connection to the control API
#[async_trait]
pub trait RpcTransport: Send {
    async fn connect(&mut self) -> Result<()>;

    /// Send one request and wait for its response
    async fn call(&mut self, method: &str, params: Value) -> Result<Value>;

    /// Release the connection. Safe to call when never connected.
    async fn close(&mut self) -> Result<()>;
}

/// Hands out a fresh, unconnected transport per session
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> Box<dyn RpcTransport>;
}

/// `https://xo.lab/anything` -> `wss://xo.lab/api/`
pub fn api_endpoint(base_url: &str) -> Result<String> {
    let mut url = Url::parse(base_url.trim())
        .map_err(|e| XoError::InvalidConfig(format!("invalid URL '{}': {}", base_url, e)))?;

    let ws_scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(XoError::InvalidConfig(format!(
                "unsupported URL scheme '{}' in {}",
                other, base_url
            )));
        }
    };
    if url.host_str().is_none_or(str::is_empty) {
        return Err(XoError::InvalidConfig(format!("missing host in {}", base_url)));
    }

    url.set_scheme(ws_scheme)
        .map_err(|_| XoError::InvalidConfig(format!("cannot use {} for {}", ws_scheme, base_url)))?;
    url.set_path("/api/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Websocket transport built on tokio-tungstenite
pub struct WsTransport {
    endpoint: String,
    tls: TlsMode,
    stream: Option<WsStream>,
    next_id: u64,
}

impl WsTransport {
    pub fn new(endpoint: impl Into<String>, tls: TlsMode) -> Self {
        Self {
            endpoint: endpoint.into(),
            tls,
            stream: None,
            next_id: 1,
        }
    }

    fn connector(&self) -> Option<Connector> {
        match self.tls {
            TlsMode::Verify => None,
            TlsMode::AcceptInvalidCerts => {
                let config = rustls::ClientConfig::builder()
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(danger::AcceptAnyServerCert))
                    .with_no_client_auth();
                Some(Connector::Rustls(Arc::new(config)))
            }
        }
    }
}

#[async_trait]
impl RpcTransport for WsTransport {
    async fn connect(&mut self) -> Result<()> {
        let _ = rustls::crypto::ring::default_provider().install_default();

        if self.tls == TlsMode::AcceptInvalidCerts {
            warn!(endpoint = %self.endpoint, "TLS certificate verification disabled");
        }

        let (stream, _response) = tokio_tungstenite::connect_async_tls_with_config(
            self.endpoint.as_str(),
            None,
            false,
            self.connector(),
        )
        .await
        .map_err(|e| XoError::Connect(format!("{}: {}", self.endpoint, e)))?;

        debug!(endpoint = %self.endpoint, "Websocket connected");
        self.stream = Some(stream);
        Ok(())
    }

    async fn call(&mut self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| XoError::Connect("not connected".to_string()))?;

        let payload = serde_json::to_string(&RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        })?;
        stream
            .send(Message::text(payload))
            .await
            .map_err(|e| XoError::Connect(e.to_string()))?;
        debug!(method, id, "JSON-RPC request sent");

        while let Some(message) = stream.next().await {
            let message = message.map_err(|e| XoError::Connect(e.to_string()))?;
            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            let response: RpcResponse = serde_json::from_str(text.as_str())?;
            if response.id.as_ref().and_then(Value::as_u64) != Some(id) {
                continue;
            }

            if let Some(error) = response.error {
                return Err(XoError::Rpc {
                    code: error.code,
                    message: error.message,
                });
            }
            return Ok(response.result.unwrap_or(Value::Null));
        }

        Err(XoError::Connect(format!(
            "connection closed while waiting for {}",
            method
        )))
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        match stream.close(None).await {
            Ok(())
            | Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
            | Err(tokio_tungstenite::tungstenite::Error::AlreadyClosed) => {
                debug!(endpoint = %self.endpoint, "Websocket closed");
                Ok(())
            }
            Err(e) => Err(XoError::Connect(format!("close failed: {}", e))),
        }
    }
}

/// Creates [`WsTransport`]s for one endpoint
#[derive(Debug, Clone)]
pub struct WsTransportFactory {
    endpoint: String,
    tls: TlsMode,
}

impl WsTransportFactory {
    /// `base_url` is the Xen Orchestra URL as configured (https://...)
    pub fn new(base_url: &str, tls: TlsMode) -> Result<Self> {
        Ok(Self {
            endpoint: api_endpoint(base_url)?,
            tls,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl TransportFactory for WsTransportFactory {
    fn create(&self) -> Box<dyn RpcTransport> {
        Box::new(WsTransport::new(self.endpoint.clone(), self.tls))
    }
}

mod danger {
    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use rustls::{DigitallySignedStruct, Error, SignatureScheme};

    #[derive(Debug)]
    pub(super) struct AcceptAnyServerCert;

    impl ServerCertVerifier for AcceptAnyServerCert {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            vec![
                SignatureScheme::ECDSA_NISTP256_SHA256,
                SignatureScheme::ECDSA_NISTP384_SHA384,
                SignatureScheme::ED25519,
                SignatureScheme::RSA_PSS_SHA256,
                SignatureScheme::RSA_PSS_SHA384,
                SignatureScheme::RSA_PSS_SHA512,
                SignatureScheme::RSA_PKCS1_SHA256,
                SignatureScheme::RSA_PKCS1_SHA384,
                SignatureScheme::RSA_PKCS1_SHA512,
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_endpoint() {
        assert_eq!(api_endpoint("https://xo.lab").unwrap(), "wss://xo.lab/api/");
        assert_eq!(api_endpoint("https://xo.lab/").unwrap(), "wss://xo.lab/api/");
        assert_eq!(
            api_endpoint("http://10.0.0.5:8080/ui/#/home").unwrap(),
            "ws://10.0.0.5:8080/api/"
        );
        assert_eq!(api_endpoint("wss://xo.lab/api/").unwrap(), "wss://xo.lab/api/");
        assert_eq!(api_endpoint("https://xo.lab:8443?x=1").unwrap(), "wss://xo.lab:8443/api/");
        assert_eq!(api_endpoint("https://[::1]:8443").unwrap(), "wss://[::1]:8443/api/");
    }

    #[test]
    fn test_api_endpoint_rejects_bad_urls() {
        assert!(matches!(api_endpoint("xo.lab"), Err(XoError::InvalidConfig(_))));
        assert!(matches!(api_endpoint("ftp://xo.lab"), Err(XoError::InvalidConfig(_))));
        assert!(matches!(api_endpoint("https://"), Err(XoError::InvalidConfig(_))));
        assert!(matches!(api_endpoint("https://xo lab"), Err(XoError::InvalidConfig(_))));
        assert!(matches!(api_endpoint("https://:443"), Err(XoError::InvalidConfig(_))));
        assert!(matches!(api_endpoint("https://[::1"), Err(XoError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_call_before_connect() {
        let mut transport = WsTransport::new("ws://127.0.0.1:1/api/", TlsMode::Verify);
        assert!(matches!(
            transport.call("session.signInWithToken", Value::Null).await,
            Err(XoError::Connect(_))
        ));
        assert!(transport.close().await.is_ok());
    }
}
