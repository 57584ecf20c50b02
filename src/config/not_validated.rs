//
// Copyright (c) 2020-2022 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

use anyhow::anyhow;
use anyhow::Context;
use anyhow::Result;
use getset::CopyGetters;
use getset::Getters;
use serde::Deserialize;
use url::Url;

use crate::config::Configuration;
use crate::config::ContainerConfig;
use crate::config::DiscoveryConfig;
use crate::config::DockerConfig;
use crate::config::GeocodingConfig;
use crate::config::WorkerConfig;

#[derive(Debug, CopyGetters, Getters, Deserialize)]
pub struct NotValidatedConfiguration {
    #[getset(get = "pub")]
    database_host: String,

    #[getset(get_copy = "pub")]
    database_port: u16,

    #[getset(get = "pub")]
    database_user: String,

    #[getset(get = "pub")]
    database_password: String,

    #[getset(get = "pub")]
    database_name: String,

    #[getset(get_copy = "pub")]
    #[serde(default)]
    database_connection_timeout: Option<u16>,

    #[getset(get = "pub")]
    docker: DockerConfig,

    #[getset(get = "pub")]
    containers: ContainerConfig,

    #[getset(get = "pub")]
    #[serde(default)]
    discovery: Option<DiscoveryConfig>,

    #[getset(get = "pub")]
    #[serde(default)]
    geocoding: Option<GeocodingConfig>,

    #[getset(get = "pub")]
    #[serde(default)]
    worker: WorkerConfig,
}

impl NotValidatedConfiguration {
    pub fn validate(self) -> Result<Configuration> {
        if self.docker.endpoint().is_none() && self.discovery.is_none() {
            return Err(anyhow!(
                "Neither 'docker.endpoint' nor a 'discovery' section is configured, the worker would never find a runtime"
            ));
        }

        if self.docker.network().is_empty() {
            return Err(anyhow!("'docker.network' must not be empty"));
        }

        if self.worker.max_concurrency() == 0 {
            return Err(anyhow!("'worker.max_concurrency' must be at least 1"));
        }

        // zero attempts would fail every submission without ever probing
        if self.containers.probe_retries() == 0 {
            return Err(anyhow!("'containers.probe_retries' must be at least 1"));
        }

        if !self.containers.probe_path().starts_with('/') {
            return Err(anyhow!(
                "'containers.probe_path' must be absolute: {:?}",
                self.containers.probe_path()
            ));
        }

        if let Some(discovery) = self.discovery.as_ref() {
            let _ = Url::parse(discovery.registry())
                .with_context(|| anyhow!("Parsing 'discovery.registry': {}", discovery.registry()))?;
        }

        if let Some(geocoding) = self.geocoding.as_ref() {
            let _ = Url::parse(geocoding.base_url())
                .with_context(|| anyhow!("Parsing 'geocoding.base_url': {}", geocoding.base_url()))?;
        }

        Ok(Configuration { inner: self })
    }
}
