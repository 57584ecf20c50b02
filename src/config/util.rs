//
// Copyright (c) 2020-2022 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

pub fn default_probe_port() -> u16 {
    80
}

pub fn default_probe_path() -> String {
    String::from("/getconfig")
}

pub fn default_startup_delay() -> u64 {
    3
}

pub fn default_stop_timeout() -> u64 {
    20
}

pub fn default_probe_retries() -> usize {
    3
}

pub fn default_probe_backoff() -> u64 {
    2
}

pub fn default_refresh_interval() -> u64 {
    15
}

pub fn default_max_concurrency() -> usize {
    5
}

pub fn default_interval() -> u64 {
    10
}
