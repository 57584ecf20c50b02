//
// Copyright (c) 2020-2022 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

use anyhow::anyhow;
use anyhow::Context;
use anyhow::Error;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use diesel::sql_types::BigInt;
use diesel::sql_types::Double;
use diesel::sql_types::Text;
use rand::Rng;
use tracing::debug;
use uuid::Uuid;

use crate::db::models::NewSubmission;
use crate::db::models::Status;
use crate::db::models::Submission;

/// The persistent queue of submissions.
///
/// The claim operation is the only mutual-exclusion mechanism in the whole
/// worker: there is no in-process lock around submissions, so correctness
/// depends on the atomicity of `claim_next`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Atomically claim one `submitted` record by transitioning it to
    /// `pending`. No two concurrent callers can receive the same record.
    async fn claim_next(&self) -> Result<Option<Submission>>;

    /// Set status and optional message, bumping the last-modified timestamp.
    async fn update_status(&self, id: Uuid, status: Status, message: Option<String>) -> Result<()>;

    /// Number of records still waiting in `submitted`.
    async fn pending_count(&self) -> Result<usize>;

    /// Attach geocoded coordinates to a record.
    async fn update_location(&self, id: Uuid, latitude: f64, longitude: f64) -> Result<()>;

    /// Insert a new record; `submitted` is the only insertable state.
    async fn insert_record(&self, record: NewSubmission) -> Result<Submission>;
}

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<ConnectionManager<PgConnection>>,
}

impl PgStore {
    pub fn new(pool: Pool<ConnectionManager<PgConnection>>) -> Self {
        PgStore { pool }
    }

    /// Run a diesel operation on a blocking thread, so slow queries do not
    /// stall unrelated pipeline invocations.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&PgConnection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().context("Getting database connection from pool")?;
            f(&conn)
        })
        .await
        .context("Database task panicked")?
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn claim_next(&self) -> Result<Option<Submission>> {
        self.blocking(|conn| {
            diesel::sql_query(
                "UPDATE submissions \
                 SET status = $1, last_modified = NOW() \
                 WHERE id = ( \
                     SELECT id FROM submissions \
                     WHERE status = $2 \
                     ORDER BY submitted_at ASC \
                     LIMIT 1 \
                     FOR UPDATE SKIP LOCKED \
                 ) \
                 RETURNING *",
            )
            .bind::<Text, _>(Status::Pending.to_string())
            .bind::<Text, _>(Status::Submitted.to_string())
            .get_result::<Submission>(conn)
            .optional()
            .map_err(Error::from)
        })
        .await
        .context("Claiming the next submission")
    }

    async fn update_status(&self, id: Uuid, new_status: Status, message: Option<String>) -> Result<()> {
        use crate::schema::submissions::dsl;

        debug!("Setting status of {} to {}", id, new_status);
        self.blocking(move |conn| {
            let n = diesel::update(dsl::submissions.filter(dsl::uuid.eq(id)))
                .set((
                    dsl::status.eq(new_status.to_string()),
                    dsl::status_message.eq(message),
                    dsl::last_modified.eq(Some(Utc::now())),
                ))
                .execute(conn)?;

            if n == 0 {
                Err(anyhow!("No submission with id {}", id))
            } else {
                Ok(())
            }
        })
        .await
        .with_context(|| anyhow!("Updating status of submission {} to {}", id, new_status))
    }

    async fn pending_count(&self) -> Result<usize> {
        use crate::schema::submissions::dsl;

        self.blocking(|conn| {
            dsl::submissions
                .filter(dsl::status.eq(Status::Submitted.to_string()))
                .count()
                .get_result::<i64>(conn)
                .map(|n| n as usize)
                .map_err(Error::from)
        })
        .await
        .context("Counting pending submissions")
    }

    async fn update_location(&self, id: Uuid, latitude: f64, longitude: f64) -> Result<()> {
        use crate::schema::submissions::dsl;

        self.blocking(move |conn| {
            let collisions: CollisionCount = diesel::sql_query(
                "SELECT COUNT(*) AS collisions FROM submissions \
                 WHERE uuid <> $1 \
                 AND latitude IS NOT NULL AND longitude IS NOT NULL \
                 AND abs(latitude - $2) < 0.0001 AND abs(longitude - $3) < 0.0001",
            )
            .bind::<diesel::sql_types::Uuid, _>(id)
            .bind::<Double, _>(latitude)
            .bind::<Double, _>(longitude)
            .get_result(conn)?;

            // Two submissions from the same city would cover each other on
            // the map, so colliding coordinates get nudged apart. Cosmetic
            // only, no uniqueness guarantee.
            let (latitude, longitude) = if collisions.collisions > 0 {
                jitter(latitude, longitude)
            } else {
                (latitude, longitude)
            };

            diesel::update(dsl::submissions.filter(dsl::uuid.eq(id)))
                .set((
                    dsl::latitude.eq(Some(latitude)),
                    dsl::longitude.eq(Some(longitude)),
                ))
                .execute(conn)
                .map(|_| ())
                .map_err(Error::from)
        })
        .await
        .with_context(|| anyhow!("Updating location of submission {}", id))
    }

    async fn insert_record(&self, record: NewSubmission) -> Result<Submission> {
        use crate::schema::submissions::dsl;

        self.blocking(move |conn| {
            diesel::insert_into(dsl::submissions)
                .values(&record)
                .get_result::<Submission>(conn)
                .map_err(Error::from)
        })
        .await
        .context("Inserting new submission")
    }
}

#[derive(QueryableByName)]
struct CollisionCount {
    #[sql_type = "BigInt"]
    collisions: i64,
}

const MAX_JITTER_DEGREES: f64 = 0.0005;

fn jitter(latitude: f64, longitude: f64) -> (f64, f64) {
    let mut rng = rand::thread_rng();
    (
        latitude + rng.gen_range(-MAX_JITTER_DEGREES..=MAX_JITTER_DEGREES),
        longitude + rng.gen_range(-MAX_JITTER_DEGREES..=MAX_JITTER_DEGREES),
    )
}
