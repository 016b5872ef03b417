//! Network and process capabilities used by alert checks
//!
//! Every check reaches the outside world through one of these traits so the
//! evaluators can be driven by mocks in tests and by real sockets, HTTP and
//! child processes in the agent.

pub mod curl;
pub mod script;
pub mod tcp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::{context::Platform, Result};

pub use curl::HttpClient;
pub use script::ProcessScriptRunner;
pub use tcp::TcpConnector;

/// Outcome of a single HTTP request. A `status_code` of 0 means no response.
#[derive(Debug, Clone, PartialEq)]
pub struct WebResponse {
    pub status_code: u16,
    pub elapsed: Duration,
    pub error: Option<String>,
}

impl WebResponse {
    pub fn no_response(error: impl Into<String>) -> Self {
        Self {
            status_code: 0,
            elapsed: Duration::ZERO,
            error: Some(error.into()),
        }
    }
}

/// Everything a script needs to evaluate one check.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptInvocation {
    pub configurations: HashMap<String, String>,
    pub parameters: BTreeMap<String, Value>,
    pub host_name: String,
    #[serde(skip)]
    pub timeout: Duration,
}

/// Raw `(state, [args])` pair reported by a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptOutput {
    pub state: String,
    pub text: Vec<Value>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PortConnector: Send + Sync {
    /// Open a TCP connection and return how long the connect took.
    async fn connect(&self, host: &str, port: u16, timeout: Duration) -> std::io::Result<Duration>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebClient: Send + Sync {
    /// Issue a GET. Never fails; transport errors come back as status 0.
    async fn get(&self, url: &str, timeout: Duration) -> WebResponse;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JmxLoader: Send + Sync {
    /// Read `object/attribute` properties from the JMX servlet under `base_url`.
    async fn load(&self, base_url: &str, properties: &[String], timeout: Duration) -> Result<Vec<Value>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, script: &Path, invocation: &ScriptInvocation) -> Result<ScriptOutput>;
}

/// The set of capabilities handed to every alert.
#[derive(Clone)]
pub struct Toolbox {
    pub connector: Arc<dyn PortConnector>,
    pub web: Arc<dyn WebClient>,
    pub jmx: Arc<dyn JmxLoader>,
    pub scripts: Arc<dyn ScriptRunner>,
}

impl Toolbox {
    /// Production tools for the given platform.
    pub fn for_platform(platform: Platform, python: impl Into<String>) -> Result<Self> {
        let http = Arc::new(HttpClient::new()?);
        Ok(Self {
            connector: Arc::new(TcpConnector),
            web: http.clone(),
            jmx: http,
            scripts: Arc::new(ProcessScriptRunner::for_platform(platform, python)),
        })
    }

    pub fn with_connector(mut self, connector: Arc<dyn PortConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_web(mut self, web: Arc<dyn WebClient>) -> Self {
        self.web = web;
        self
    }

    pub fn with_jmx(mut self, jmx: Arc<dyn JmxLoader>) -> Self {
        self.jmx = jmx;
        self
    }

    pub fn with_scripts(mut self, scripts: Arc<dyn ScriptRunner>) -> Self {
        self.scripts = scripts;
        self
    }
}
