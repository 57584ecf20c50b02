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
use serde::Deserialize;

use crate::config::util::*;

#[derive(Debug, Clone, CopyGetters, Deserialize)]
pub struct WorkerConfig {
    /// Maximum number of submissions validated concurrently
    #[serde(default = "default_max_concurrency")]
    #[getset(get_copy = "pub")]
    max_concurrency: usize,

    /// Base seconds between dispatch cycles; the effective sleep shrinks
    /// while the worker pool is busy
    #[serde(default = "default_interval")]
    #[getset(get_copy = "pub")]
    interval_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            max_concurrency: default_max_concurrency(),
            interval_seconds: default_interval(),
        }
    }
}
