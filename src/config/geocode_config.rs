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

/// Configuration of the geocoding service used to resolve the free-text
/// location of a submission to coordinates for the map view.
#[derive(Debug, Clone, Getters, Deserialize)]
pub struct GeocodingConfig {
    /// Base URL of a nominatim-compatible search API
    #[getset(get = "pub")]
    base_url: String,
}
