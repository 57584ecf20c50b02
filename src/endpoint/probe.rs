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

use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
use tracing::info;
use tracing::warn;

use crate::config::ContainerConfig;

/// HTTP correctness check against a running container.
#[async_trait]
pub trait EndpointProber: Send + Sync {
    async fn probe(&self, ip: &str, port: u16, path: &str) -> bool;
}

pub struct HttpProber {
    client: reqwest::Client,
    retries: usize,
    backoff: Duration,
    placeholder: String,
}

impl HttpProber {
    pub fn new(config: &ContainerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .context("Building HTTP client for endpoint probing")?;

        Ok(HttpProber {
            client,
            retries: config.probe_retries(),
            backoff: Duration::from_secs(config.probe_backoff_seconds()),
            placeholder: config.placeholder_body().clone(),
        })
    }
}

#[async_trait]
impl EndpointProber for HttpProber {
    async fn probe(&self, ip: &str, port: u16, path: &str) -> bool {
        let url = format!("http://{}:{}{}", ip, port, path);
        info!("Testing endpoint {}", url);

        for attempt in 1..=self.retries {
            match self.client.get(&url).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    match response.text().await {
                        Ok(body) => match classify(status, &body, &self.placeholder) {
                            ProbeOutcome::Pass => {
                                info!("{} passed validation", url);
                                return true;
                            }
                            ProbeOutcome::Fail => {
                                info!("{} failed validation (status {})", url, status);
                                return false;
                            }
                            ProbeOutcome::Retry => {
                                warn!("{} returned {} (attempt {}/{})", url, status, attempt, self.retries);
                            }
                        },
                        // reading the body can hit a connection reset as well
                        Err(e) => warn!("Reading response from {} failed (attempt {}/{}): {}", url, attempt, self.retries, e),
                    }
                }
                Err(e) => warn!("Connecting to {} failed (attempt {}/{}): {}", url, attempt, self.retries, e),
            }

            if attempt < self.retries {
                tokio::time::sleep(self.backoff).await;
            }
        }

        false
    }
}

#[derive(Debug, Eq, PartialEq)]
pub(crate) enum ProbeOutcome {
    Pass,
    Fail,
    Retry,
}

/// A 200 whose body still equals the starter-kit placeholder means the
/// service was never implemented; liveness alone does not pass.
pub(crate) fn classify(status: u16, body: &str, placeholder: &str) -> ProbeOutcome {
    if (500..600).contains(&status) {
        ProbeOutcome::Retry
    } else if status != 200 {
        ProbeOutcome::Fail
    } else if body == placeholder {
        ProbeOutcome::Fail
    } else {
        ProbeOutcome::Pass
    }
}
