//! Connection settings read from the `xenorchestra` config namespace

use crate::error::Result;
use crate::rpc::{TlsMode, WsTransportFactory};
use std::time::Duration;
use xenflow_config::{Secret, StackConfig};

pub const CONFIG_NAMESPACE: &str = "xenorchestra";

/// Wait for the first cloud-init run before fixing memory
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(90);

/// Upper bound for the remediation once the settle delay is over
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct XoSettings {
    /// Base URL, e.g. `https://xo.internal.domain`
    pub url: String,
    pub token: Secret,
    pub tls: TlsMode,
    pub settle_delay: Duration,
    pub timeout: Duration,
}

impl XoSettings {
    /// Keys: `url`, `token` (secret), `insecure`, `settleDelaySecs`, `timeoutSecs`
    pub fn from_config(config: &StackConfig) -> Result<Self> {
        let xo = config.namespace(CONFIG_NAMESPACE);

        let tls = if xo.get_bool("insecure")?.unwrap_or(false) {
            TlsMode::AcceptInvalidCerts
        } else {
            TlsMode::Verify
        };

        Ok(Self {
            url: xo.require("url")?,
            token: xo.require_secret("token")?,
            tls,
            settle_delay: xo
                .get_u64("settleDelaySecs")?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_SETTLE_DELAY),
            timeout: xo
                .get_u64("timeoutSecs")?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
        })
    }

    pub fn transport_factory(&self) -> Result<WsTransportFactory> {
        WsTransportFactory::new(&self.url, self.tls)
    }
}
