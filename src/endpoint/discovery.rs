//
// Copyright (c) 2020-2022 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

use std::time::Duration;

use anyhow::anyhow;
use anyhow::Context;
use anyhow::Result;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::DiscoveryConfig;
use crate::config::Endpoint;

/// Background resolution of the runtime endpoint from a key-value registry.
///
/// Runs until the process exits. The watch channel is single-writer (this
/// task) and multi-reader (every pipeline invocation snapshots it at
/// dispatch time).
pub struct DiscoveryTask {
    client: reqwest::Client,
    registry: String,
    key: String,
    interval: Duration,
    tx: watch::Sender<Option<Endpoint>>,
}

impl DiscoveryTask {
    pub fn new(config: &DiscoveryConfig, tx: watch::Sender<Option<Endpoint>>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .context("Building HTTP client for endpoint discovery")?;

        Ok(DiscoveryTask {
            client,
            registry: config.registry().trim_end_matches('/').to_string(),
            key: config.key().clone(),
            interval: Duration::from_secs(config.refresh_interval_seconds()),
            tx,
        })
    }

    pub async fn run(self) {
        loop {
            publish(&self.tx, self.fetch().await);
            tokio::time::sleep(self.interval).await;
        }
    }

    async fn fetch(&self) -> Result<Endpoint> {
        let url = format!("{}/v1/kv/{}?raw", self.registry, self.key);
        debug!("Looking up runtime endpoint at {}", url);

        let body = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| anyhow!("Querying registry at {}", url))?
            .error_for_status()
            .with_context(|| anyhow!("Registry at {} returned an error", url))?
            .text()
            .await
            .with_context(|| anyhow!("Reading registry response from {}", url))?;

        let address = body.trim();
        if address.is_empty() {
            return Err(anyhow!("Registry returned an empty value for key {}", self.key));
        }

        Ok(normalize_address(address))
    }
}

/// Publish a lookup result. A failed lookup keeps the previously published
/// address; a known-good endpoint is never cleared over a transient error.
fn publish(tx: &watch::Sender<Option<Endpoint>>, fetched: Result<Endpoint>) {
    match fetched {
        Ok(endpoint) => {
            if tx.borrow().as_ref() != Some(&endpoint) {
                info!("Runtime endpoint is now {}", endpoint.uri());
            }
            tx.send_replace(Some(endpoint));
        }
        Err(e) => warn!("Endpoint discovery failed, keeping the previous address: {:#}", e),
    }
}

/// The registry stores bare "host:port" values; docker endpoints are
/// addressed with a tcp:// URI.
fn normalize_address(address: &str) -> Endpoint {
    if address.contains("://") {
        Endpoint::http(address.to_string())
    } else {
        Endpoint::http(format!("tcp://{}", address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_addresses_get_a_tcp_scheme() {
        assert_eq!(normalize_address("192.168.64.2:2375").uri(), "tcp://192.168.64.2:2375");
        assert_eq!(normalize_address("http://10.0.0.1:2375").uri(), "http://10.0.0.1:2375");
    }

    #[test]
    fn successful_lookup_replaces_the_published_endpoint() {
        let (tx, rx) = watch::channel(Some(Endpoint::http(String::from("tcp://old:2375"))));

        publish(&tx, Ok(Endpoint::http(String::from("tcp://new:2375"))));

        assert_eq!(rx.borrow().as_ref().unwrap().uri(), "tcp://new:2375");
    }

    #[test]
    fn failed_lookup_keeps_the_published_endpoint() {
        let (tx, rx) = watch::channel(Some(Endpoint::http(String::from("tcp://old:2375"))));

        publish(&tx, Err(anyhow!("registry unreachable")));

        assert_eq!(rx.borrow().as_ref().unwrap().uri(), "tcp://old:2375");
    }

    #[test]
    fn lookup_can_set_the_initial_endpoint() {
        let (tx, rx) = watch::channel(None);

        publish(&tx, Ok(Endpoint::http(String::from("tcp://first:2375"))));

        assert!(rx.borrow().is_some());
    }
}
