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

/// Address of a docker runtime endpoint.
///
/// Either statically configured or published by the discovery task; pipeline
/// invocations take a snapshot of the current value at dispatch time.
#[derive(Clone, Debug, Eq, Getters, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Endpoint {
    /// The URI where the endpoint is reachable
    #[getset(get = "pub")]
    uri: String,

    /// The type of the endpoint (either "socket" or "http")
    #[getset(get = "pub")]
    endpoint_type: EndpointType,
}

impl Endpoint {
    pub fn http(uri: String) -> Self {
        Endpoint {
            uri,
            endpoint_type: EndpointType::Http,
        }
    }

    #[cfg(test)]
    pub fn socket(uri: String) -> Self {
        Endpoint {
            uri,
            endpoint_type: EndpointType::Socket,
        }
    }
}

/// The type of an endpoint
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub enum EndpointType {
    #[serde(rename = "socket")]
    Socket,
    #[serde(rename = "http")]
    Http,
}
