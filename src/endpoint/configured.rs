//
// Copyright (c) 2020-2022 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
use getset::Getters;
use shiplift::ContainerConnectionOptions;
use shiplift::ContainerOptions;
use shiplift::Docker;
use shiplift::PullOptions;
use tokio_stream::StreamExt;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use typed_builder::TypedBuilder;

use crate::config::Configuration;
use crate::config::EndpointType;
use crate::endpoint::ValidationError;
use crate::util::docker::ContainerHash;
use crate::util::docker::ImageName;

/// One attempt's container, always cleaned up by the pipeline invocation
/// that created it.
#[derive(Clone, Debug, Getters)]
pub struct ContainerHandle {
    #[getset(get = "pub")]
    id: ContainerHash,

    ip: Option<String>,
}

impl ContainerHandle {
    pub fn new(id: ContainerHash, ip: Option<String>) -> Self {
        ContainerHandle { id, ip }
    }

    /// The container's address on the configured network, if it got one.
    /// An absent address means "do not probe".
    pub fn ip(&self) -> Option<&str> {
        self.ip.as_deref()
    }
}

/// The operations the pipeline drives against a container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Resolve whether the image exists in the registry, then pull it.
    ///
    /// `Ok(false)` covers both "not found" and "pull reported an error in
    /// its trailing status"; the two are distinguished in the logs. An
    /// `Err` means the runtime itself misbehaved.
    async fn download_image(&self, image: &ImageName) -> Result<bool, ValidationError>;

    /// Create, attach to the network, start and inspect a container.
    async fn run_container(&self, image: &ImageName) -> Result<ContainerHandle, ValidationError>;

    /// Stop and remove the container, and remove the image if given.
    async fn clean_container(&self, container: &ContainerHash, image: Option<&ImageName>) -> Result<()>;
}

/// Creates a [ContainerRuntime] for the runtime endpoint that is current at
/// dispatch time.
#[async_trait]
pub trait RuntimeConnector: Send + Sync {
    async fn connect(&self, endpoint: &crate::config::Endpoint) -> Result<Arc<dyn ContainerRuntime>>;
}

pub struct DockerConnector {
    network: String,
    probe_port: u16,
    stop_timeout: Duration,
}

impl DockerConnector {
    pub fn new(config: &Configuration) -> Self {
        DockerConnector {
            network: config.docker().network().clone(),
            probe_port: config.containers().probe_port(),
            stop_timeout: Duration::from_secs(config.containers().stop_timeout_seconds()),
        }
    }
}

#[async_trait]
impl RuntimeConnector for DockerConnector {
    async fn connect(&self, endpoint: &crate::config::Endpoint) -> Result<Arc<dyn ContainerRuntime>> {
        Endpoint::setup(endpoint, self.network.clone(), self.probe_port, self.stop_timeout)
            .map(|ep| Arc::new(ep) as Arc<dyn ContainerRuntime>)
    }
}

#[derive(Getters, TypedBuilder)]
pub struct Endpoint {
    #[getset(get = "pub")]
    uri: String,

    #[getset(get = "pub")]
    docker: Docker,

    #[getset(get = "pub")]
    network: String,

    probe_port: u16,

    stop_timeout: Duration,
}

impl Debug for Endpoint {
    fn fmt(&self, f: &mut Formatter) -> std::result::Result<(), std::fmt::Error> {
        write!(f, "Endpoint({}, network: {})", self.uri, self.network)
    }
}

impl Endpoint {
    pub fn setup(
        ep: &crate::config::Endpoint,
        network: String,
        probe_port: u16,
        stop_timeout: Duration,
    ) -> Result<Self> {
        match ep.endpoint_type() {
            EndpointType::Http => shiplift::Uri::from_str(ep.uri())
                .map(shiplift::Docker::host)
                .with_context(|| anyhow!("Connecting to {}", ep.uri()))
                .map(|docker| {
                    Endpoint::builder()
                        .uri(ep.uri().clone())
                        .docker(docker)
                        .network(network)
                        .probe_port(probe_port)
                        .stop_timeout(stop_timeout)
                        .build()
                }),

            EndpointType::Socket => Ok({
                Endpoint::builder()
                    .uri(ep.uri().clone())
                    .docker(shiplift::Docker::unix(ep.uri()))
                    .network(network)
                    .probe_port(probe_port)
                    .stop_timeout(stop_timeout)
                    .build()
            }),
        }
    }

    fn infra(&self, e: impl std::fmt::Display, what: impl std::fmt::Display) -> ValidationError {
        ValidationError::infrastructure(format!("{} on '{}': {}", what, self.uri, e))
    }
}

#[async_trait]
impl ContainerRuntime for Endpoint {
    async fn download_image(&self, image: &ImageName) -> Result<bool, ValidationError> {
        let term = image.repository();
        debug!("Searching registry for {}", term);
        let results = self
            .docker
            .images()
            .search(term)
            .await
            .map_err(|e| self.infra(e, format_args!("Searching registry for {}", term)))?;
        debug!("Search returned {} result(s)", results.len());

        if results.is_empty() {
            warn!("Image {} not found in registry", image);
            return Ok(false);
        }

        info!("Downloading image {}", image);
        let mut pull = self
            .docker
            .images()
            .pull(&PullOptions::builder().image(image.as_ref()).build());

        // The last line of the pull stream carries either a final status
        // ("Downloaded newer image for ...", "Image is up to date for ...")
        // or an error.
        let mut last = None;
        while let Some(chunk) = pull.next().await {
            let chunk = chunk.map_err(|e| self.infra(e, format_args!("Pulling image {}", image)))?;
            last = Some(chunk);
        }

        match last {
            Some(msg) => {
                if let Some(pull_error) = msg.get("error").and_then(serde_json::Value::as_str) {
                    warn!("Pull of {} failed: {}", image, pull_error);
                    Ok(false)
                } else {
                    if let Some(status) = msg.get("status").and_then(serde_json::Value::as_str) {
                        debug!("Pull of {}: {}", image, status);
                    }
                    Ok(true)
                }
            }
            None => {
                warn!("Pull of {} produced no status output", image);
                Ok(false)
            }
        }
    }

    async fn run_container(&self, image: &ImageName) -> Result<ContainerHandle, ValidationError> {
        let builder_opts = create_options(image, self.probe_port);
        let create_info = self
            .docker
            .containers()
            .create(&builder_opts)
            .await
            .map_err(|e| {
                ValidationError::submitter(format!("Runtime rejected container for image {}: {}", image, e))
            })?;

        if let Some(warnings) = create_info.warnings.as_ref() {
            for warning in warnings {
                warn!("{}", warning);
            }
        }
        let container_id = create_info.id;
        debug!("Created container {} for image {}", container_id, image);

        let networks = self
            .docker
            .networks()
            .list(&Default::default())
            .await
            .map_err(|e| self.infra(e, "Listing networks"))?;
        let network = networks
            .into_iter()
            .find(|n| n.name == self.network)
            .ok_or_else(|| {
                ValidationError::infrastructure(format!("Network '{}' not found on '{}'", self.network, self.uri))
            })?;

        self.docker
            .networks()
            .get(&network.id)
            .connect(&ContainerConnectionOptions::builder(&container_id).build())
            .await
            .map_err(|e| {
                self.infra(e, format_args!("Connecting container {} to network {}", container_id, self.network))
            })?;

        let container = self.docker.containers().get(&container_id);
        container
            .start()
            .await
            .map_err(|e| self.infra(e, format_args!("Starting container {}", container_id)))?;

        let details = container
            .inspect()
            .await
            .map_err(|e| self.infra(e, format_args!("Inspecting container {}", container_id)))?;

        let id = ContainerHash::from(container_id);
        if !details.state.running {
            error!("Container for image {} died too soon", image);
            return Ok(ContainerHandle::new(id, None));
        }

        let ip = details
            .network_settings
            .networks
            .get(&self.network)
            .map(|n| n.ip_address.clone())
            .filter(|ip| !ip.is_empty());
        if ip.is_none() {
            error!("Container {} has no address on network {}", id, self.network);
        }

        Ok(ContainerHandle::new(id, ip))
    }

    async fn clean_container(&self, container: &ContainerHash, image: Option<&ImageName>) -> Result<()> {
        let handle = self.docker.containers().get(container.as_ref());

        info!("Stopping container {}", container);
        handle
            .stop(Some(self.stop_timeout))
            .await
            .with_context(|| anyhow!("Stopping container {}", container))?;

        info!("Removing container {}", container);
        handle
            .delete()
            .await
            .with_context(|| anyhow!("Removing container {}", container))?;

        if let Some(image) = image {
            info!("Removing image {}", image);
            if let Err(e) = self.docker.images().get(image.as_ref()).delete().await {
                // another pipeline instance may have removed the image already
                warn!("Removing image {} failed: {}", image, e);
            }
        }

        Ok(())
    }
}

/// The service inside a submitted container must listen on the probe port;
/// the container is created with that port declared.
fn create_options(image: &ImageName, probe_port: u16) -> ContainerOptions {
    ContainerOptions::builder(image.as_ref())
        .expose(u32::from(probe_port), "tcp", 0)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containers_are_created_with_the_probe_port_declared() {
        let opts = create_options(&ImageName::from("example/votingapp"), 80);
        let body = opts.serialize().unwrap();
        assert!(body.contains("80/tcp"), "create options missing the probe port: {}", body);
    }

    #[test]
    fn socket_endpoints_carry_the_probe_port() {
        let ep = Endpoint::setup(
            &crate::config::Endpoint::socket(String::from("/var/run/docker.sock")),
            String::from("compose_default"),
            8080,
            Duration::from_secs(20),
        )
        .unwrap();

        assert_eq!(ep.probe_port, 8080);
        assert_eq!(ep.network(), "compose_default");
    }
}
