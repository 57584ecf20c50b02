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

/// Configuration for discovering the runtime endpoint from a key-value
/// registry (consul-style HTTP API) instead of configuring it statically.
#[derive(Debug, Clone, CopyGetters, Getters, Deserialize)]
pub struct DiscoveryConfig {
    /// Base URL of the registry, e.g. "http://consul:8500"
    #[getset(get = "pub")]
    registry: String,

    /// The key holding the current runtime address, e.g. "docker/swarm/leader"
    #[getset(get = "pub")]
    key: String,

    /// Seconds between registry lookups
    #[serde(default = "default_refresh_interval")]
    #[getset(get_copy = "pub")]
    refresh_interval_seconds: u64,
}
