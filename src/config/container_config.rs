//
// Copyright (c) 2020-2022 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

use getset::CopyGetters;
use getset::Getters;
use serde::Deserialize;

use crate::config::util::*;
use crate::util::docker::ImageName;

/// The configuration for the submitted containers and their validation
#[derive(Debug, Clone, CopyGetters, Getters, Deserialize)]
pub struct ContainerConfig {
    /// Port the service inside a submitted container must listen on
    #[serde(default = "default_probe_port")]
    #[getset(get_copy = "pub")]
    probe_port: u16,

    /// Path of the HTTP endpoint that is probed for correctness
    #[serde(default = "default_probe_path")]
    #[getset(get = "pub")]
    probe_path: String,

    /// The response body the starter kit ships with.
    ///
    /// A container that still answers with this exact payload never replaced
    /// the template response, so a 200 carrying it does not count as passing.
    #[getset(get = "pub")]
    placeholder_body: String,

    /// Image reference that short-circuits validation to "successful".
    ///
    /// Used by support staff for demos and manual interventions. Unset
    /// disables the bypass.
    #[getset(get = "pub")]
    #[serde(default)]
    bypass_image: Option<ImageName>,

    /// Seconds to wait after container start before probing, so the service
    /// inside has a chance to finish initializing
    #[serde(default = "default_startup_delay")]
    #[getset(get_copy = "pub")]
    startup_delay_seconds: u64,

    /// Seconds a container is given to stop before it is killed
    #[serde(default = "default_stop_timeout")]
    #[getset(get_copy = "pub")]
    stop_timeout_seconds: u64,

    /// How often the probe is attempted before giving up
    #[serde(default = "default_probe_retries")]
    #[getset(get_copy = "pub")]
    probe_retries: usize,

    /// Fixed backoff in seconds between probe attempts
    #[serde(default = "default_probe_backoff")]
    #[getset(get_copy = "pub")]
    probe_backoff_seconds: u64,
}
