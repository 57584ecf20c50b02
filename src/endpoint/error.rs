//
// Copyright (c) 2020-2022 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

use thiserror::Error as ThisError;

/// The closed set of validation failure kinds.
///
/// The orchestrator branches on the kind: `Submitter` and `Dependency` are
/// terminal for the submission, `Infrastructure` re-queues it.
#[derive(ThisError, Debug)]
pub enum ValidationError {
    /// The submitted image or container is at fault
    #[error("{0}")]
    Submitter(String),

    /// The runtime or the surrounding infrastructure failed
    #[error("{0}")]
    Infrastructure(String),

    /// An external collaborator (e.g. the geocoder) failed
    #[error("{0}")]
    Dependency(String),
}

impl ValidationError {
    pub fn submitter(msg: impl Into<String>) -> Self {
        ValidationError::Submitter(msg.into())
    }

    pub fn infrastructure(msg: impl Into<String>) -> Self {
        ValidationError::Infrastructure(msg.into())
    }

    pub fn dependency(msg: impl Into<String>) -> Self {
        ValidationError::Dependency(msg.into())
    }
}
