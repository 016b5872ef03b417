//! HTTP probes: plain GET for web checks and the JMX servlet for metric checks.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

use super::{JmxLoader, WebClient, WebResponse};
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("alert-agent/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_bean(&self, base_url: &str, object: &str, timeout: Duration) -> Result<(String, Value)> {
        let mut url = Url::parse(base_url)
            .map_err(|e| Error::Transport(format!("Invalid JMX base URL {}: {}", base_url, e)))?;
        url.set_path("/jmx");
        url.query_pairs_mut().clear().append_pair("qry", object);

        let document: Value = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let bean = document
            .get("beans")
            .and_then(|beans| beans.get(0))
            .cloned()
            .ok_or_else(|| Error::Transport(format!("No JMX beans returned from {}", url)))?;

        Ok((url.to_string(), bean))
    }
}

#[async_trait]
impl WebClient for HttpClient {
    async fn get(&self, url: &str, timeout: Duration) -> WebResponse {
        let started = Instant::now();
        match self.client.get(url).timeout(timeout).send().await {
            Ok(response) => WebResponse {
                status_code: response.status().as_u16(),
                elapsed: started.elapsed(),
                error: None,
            },
            Err(e) => {
                debug!(url = %url, error = %e, "web request failed");
                WebResponse::no_response(e.to_string())
            }
        }
    }
}

#[async_trait]
impl JmxLoader for HttpClient {
    async fn load(&self, base_url: &str, properties: &[String], timeout: Duration) -> Result<Vec<Value>> {
        let mut beans: HashMap<String, (String, Value)> = HashMap::new();
        let mut values = Vec::with_capacity(properties.len());

        for property in properties {
            let (object, attribute) = property.rsplit_once('/').ok_or_else(|| {
                Error::Definition(format!(
                    "JMX property '{}' must be of the form object/attribute",
                    property
                ))
            })?;

            if !beans.contains_key(object) {
                let fetched = self.fetch_bean(base_url, object, timeout).await?;
                beans.insert(object.to_string(), fetched);
            }

            if let Some((url, bean)) = beans.get(object) {
                let value = bean.get(attribute).cloned().ok_or_else(|| {
                    Error::Transport(format!("Unable to find {} in JSON from {}", attribute, url))
                })?;
                values.push(value);
            }
        }

        Ok(values)
    }
}
