//
// Copyright (c) 2020-2022 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

mod configuration;
pub use configuration::*;

mod container_config;
pub use container_config::*;

mod discovery_config;
pub use discovery_config::*;

mod docker_config;
pub use docker_config::*;

mod endpoint_config;
pub use endpoint_config::*;

mod geocode_config;
pub use geocode_config::*;

mod not_validated;
pub use not_validated::*;

mod worker_config;
pub use worker_config::*;

pub(crate) mod util;
