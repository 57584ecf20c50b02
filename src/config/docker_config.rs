//
// Copyright (c) 2020-2022 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

use getset::Getters;
use serde::Deserialize;

use crate::config::Endpoint;

#[derive(Debug, Getters, Deserialize)]
pub struct DockerConfig {
    /// The statically configured runtime endpoint.
    ///
    /// May be omitted when endpoint discovery is configured; the worker then
    /// waits for the first discovered address before dispatching work.
    #[getset(get = "pub")]
    #[serde(default)]
    endpoint: Option<Endpoint>,

    /// Name of the docker network the submitted containers are attached to.
    /// The probe reaches the containers via their address on this network.
    #[getset(get = "pub")]
    network: String,
}
