//
// Copyright (c) 2020-2022 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use crate::schema::submissions;
use crate::util::docker::ImageName;

/// Lifecycle of a submission.
///
/// `Submitted` is the only insertable state. `Pending` is entered exactly
/// once via the atomic claim. `Successful` and `Failed` are terminal, except
/// that the orchestrator may move a record back to `Submitted` when a
/// transient infrastructure fault prevented validation.
#[derive(
    parse_display::Display,
    parse_display::FromStr,
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
)]
#[display(style = "lowercase")]
pub enum Status {
    Submitted,
    Pending,
    Successful,
    Failed,
}

#[derive(Clone, Debug, Queryable, QueryableByName)]
#[table_name = "submissions"]
pub struct Submission {
    pub id: i32,
    pub uuid: Uuid,
    pub name: String,
    pub images: Vec<String>,
    pub location: Option<String>,
    pub status: String,
    pub status_message: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub submitted_at: DateTime<Utc>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl Submission {
    /// The candidate images in the order the participant submitted them.
    pub fn candidate_images(&self) -> Vec<ImageName> {
        self.images.iter().cloned().map(ImageName::from).collect()
    }
}

#[derive(Debug, Insertable)]
#[table_name = "submissions"]
pub struct NewSubmission {
    pub uuid: Uuid,
    pub name: String,
    pub images: Vec<String>,
    pub location: Option<String>,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
}

impl NewSubmission {
    pub fn new(name: String, images: Vec<String>, location: Option<String>) -> Self {
        NewSubmission {
            uuid: Uuid::new_v4(),
            name,
            images,
            location,
            status: Status::Submitted.to_string(),
            submitted_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_string_mapping_roundtrips() {
        for status in [Status::Submitted, Status::Pending, Status::Successful, Status::Failed] {
            assert_eq!(status.to_string().parse::<Status>().unwrap(), status);
        }
        assert_eq!("submitted".parse::<Status>().unwrap(), Status::Submitted);
        assert!("done".parse::<Status>().is_err());
    }

    #[test]
    fn new_submissions_start_in_submitted() {
        let s = NewSubmission::new(
            String::from("Gordon"),
            vec![String::from("example/votingapp")],
            None,
        );
        assert_eq!(s.status, Status::Submitted.to_string());
    }
}
