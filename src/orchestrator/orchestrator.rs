//
// Copyright (c) 2020-2022 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use typed_builder::TypedBuilder;

use crate::config::Configuration;
use crate::config::Endpoint as RuntimeEndpoint;
use crate::db::RecordStore;
use crate::db::Status;
use crate::db::Submission;
use crate::endpoint::ContainerRuntime;
use crate::endpoint::EndpointProber;
use crate::endpoint::RuntimeConnector;
use crate::endpoint::ValidationError;
use crate::geocode::Geocoder;
use crate::util::docker::ImageName;

/// The per-submission knobs of the validation pipeline.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub probe_port: u16,
    pub probe_path: String,
    pub startup_delay: Duration,
    pub bypass_image: Option<ImageName>,
}

impl PipelineConfig {
    pub fn new(config: &Configuration) -> Self {
        PipelineConfig {
            probe_port: config.containers().probe_port(),
            probe_path: config.containers().probe_path().clone(),
            startup_delay: Duration::from_secs(config.containers().startup_delay_seconds()),
            bypass_image: config.containers().bypass_image().clone(),
        }
    }
}

/// Claims submissions and drives each through download, run, probe and
/// cleanup with bounded concurrency.
#[derive(TypedBuilder)]
pub struct Orchestrator {
    store: Arc<dyn RecordStore>,
    connector: Arc<dyn RuntimeConnector>,
    prober: Arc<dyn EndpointProber>,
    #[builder(default)]
    geocoder: Option<Arc<dyn Geocoder>>,
    endpoint: watch::Receiver<Option<RuntimeEndpoint>>,
    pipeline: PipelineConfig,
    max_concurrency: usize,
    base_interval: Duration,
}

impl Orchestrator {
    /// The controller loop. Returns after `shutdown` flips to true and all
    /// in-flight validations have drained; a running attempt is never
    /// aborted.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut in_flight: JoinSet<()> = JoinSet::new();
        info!("Orchestrator started, max concurrency: {}", self.max_concurrency);

        loop {
            if *shutdown.borrow() {
                break;
            }

            while in_flight.try_join_next().is_some() {}

            let free_slots = self.max_concurrency.saturating_sub(in_flight.len());
            if free_slots > 0 {
                let pending = match self.store.pending_count().await {
                    Ok(n) => n,
                    Err(e) => {
                        error!("Could not determine backlog size: {:#}", e);
                        0
                    }
                };
                let batch = std::cmp::min(pending, free_slots);
                let endpoint = self.endpoint.borrow().clone();

                match endpoint {
                    Some(endpoint) => {
                        if batch > 0 {
                            debug!("Dispatching {} of {} pending submission(s)", batch, pending);
                        }
                        for _ in 0..batch {
                            in_flight.spawn(process_submission(
                                self.store.clone(),
                                self.connector.clone(),
                                self.prober.clone(),
                                self.geocoder.clone(),
                                endpoint.clone(),
                                self.pipeline.clone(),
                            ));
                        }
                    }
                    None if batch > 0 => {
                        warn!("{} submission(s) pending, but no runtime endpoint is known yet", pending)
                    }
                    None => {}
                }
            }

            let delay = next_interval(self.base_interval, in_flight.len(), self.max_concurrency);
            debug!("Waiting {:?} until the next dispatch cycle", delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                res = shutdown.changed() => {
                    if res.is_err() {
                        warn!("Shutdown channel closed, stopping dispatch");
                        break;
                    }
                }
            }
        }

        if !in_flight.is_empty() {
            info!("Draining {} in-flight validation(s)", in_flight.len());
        }
        while in_flight.join_next().await.is_some() {}
        info!("Orchestrator stopped");
        Ok(())
    }
}

/// One pool slot's unit of work: claim a submission and resolve it to a
/// terminal status (or re-queue it). Never panics the slot; every error is
/// translated into a record-status outcome.
async fn process_submission(
    store: Arc<dyn RecordStore>,
    connector: Arc<dyn RuntimeConnector>,
    prober: Arc<dyn EndpointProber>,
    geocoder: Option<Arc<dyn Geocoder>>,
    endpoint: RuntimeEndpoint,
    pipeline: PipelineConfig,
) {
    let record = match store.claim_next().await {
        Ok(Some(record)) => record,
        Ok(None) => {
            debug!("No new submission");
            return;
        }
        Err(e) => {
            error!("Claiming a submission failed: {:#}", e);
            return;
        }
    };

    info!("Processing submission {} ({})", record.name, record.uuid);
    let runtime = match connector.connect(&endpoint).await {
        Ok(runtime) => runtime,
        Err(e) => {
            warn!("Runtime endpoint {} unusable, re-queueing {}: {:#}", endpoint.uri(), record.name, e);
            requeue(&*store, &record, "runtime endpoint unreachable").await;
            return;
        }
    };

    if let Err(e) = validate_submission(
        &record,
        &*store,
        &*runtime,
        &*prober,
        geocoder.as_deref(),
        &pipeline,
    )
    .await
    {
        error!("Validation of {} aborted: {:#}", record.name, e);
        requeue(&*store, &record, "internal error during validation").await;
    }
}

async fn requeue(store: &dyn RecordStore, record: &Submission, reason: &str) {
    if let Err(e) = store
        .update_status(record.uuid, Status::Submitted, Some(format!("re-queued: {}", reason)))
        .await
    {
        error!("Re-queueing {} failed: {:#}", record.name, e);
    }
}

/// The validation state machine for one claimed submission.
pub(crate) async fn validate_submission(
    record: &Submission,
    store: &dyn RecordStore,
    runtime: &dyn ContainerRuntime,
    prober: &dyn EndpointProber,
    geocoder: Option<&dyn Geocoder>,
    pipeline: &PipelineConfig,
) -> Result<()> {
    if let (Some(location), Some(geocoder)) = (record.location.as_deref(), geocoder) {
        match geocoder.geocode(location).await {
            Ok(Some((latitude, longitude))) => {
                debug!("Resolved location {:?} of {} to ({}, {})", location, record.name, latitude, longitude);
                store.update_location(record.uuid, latitude, longitude).await?;
            }
            Ok(None) => {
                store
                    .update_status(
                        record.uuid,
                        Status::Failed,
                        Some(format!("location {:?} could not be resolved", location)),
                    )
                    .await?;
                return Ok(());
            }
            Err(e) => {
                store
                    .update_status(record.uuid, Status::Failed, Some(format!("geocoding failed: {}", e)))
                    .await?;
                return Ok(());
            }
        }
    }

    for image in record.candidate_images() {
        if pipeline.bypass_image.as_ref() == Some(&image) {
            // support/demo bypass, see the configuration documentation
            info!("Submission {} uses the bypass image", record.name);
            store
                .update_status(
                    record.uuid,
                    Status::Successful,
                    Some(format!("validated via bypass image {}", image)),
                )
                .await?;
            return Ok(());
        }

        info!("Downloading image {} for {}", image, record.name);
        match runtime.download_image(&image).await {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                // an infrastructure fault at download time must not burn
                // this candidate or the remaining attempts
                warn!("Download of {} hit an infrastructure fault, re-queueing {}: {}", image, record.name, e);
                store
                    .update_status(record.uuid, Status::Submitted, Some(format!("re-queued: {}", e)))
                    .await?;
                return Ok(());
            }
        }

        info!("Starting container {} for {}", image, record.name);
        let handle = match runtime.run_container(&image).await {
            Ok(handle) => handle,
            Err(e @ (ValidationError::Submitter(_) | ValidationError::Dependency(_))) => {
                store
                    .update_status(record.uuid, Status::Failed, Some(e.to_string()))
                    .await?;
                return Ok(());
            }
            Err(e @ ValidationError::Infrastructure(_)) => {
                warn!("Running {} hit an infrastructure fault, re-queueing {}: {}", image, record.name, e);
                store
                    .update_status(record.uuid, Status::Submitted, Some(format!("re-queued: {}", e)))
                    .await?;
                return Ok(());
            }
        };

        let passed = match handle.ip() {
            Some(ip) => {
                // give the service inside the container a moment to come up
                tokio::time::sleep(pipeline.startup_delay).await;
                prober.probe(ip, pipeline.probe_port, &pipeline.probe_path).await
            }
            None => false,
        };

        if let Err(e) = runtime.clean_container(handle.id(), Some(&image)).await {
            warn!("Cleaning up container {} failed: {:#}", handle.id(), e);
        }

        if passed {
            info!("Submission SUCCESSFUL for {}", record.name);
            store
                .update_status(
                    record.uuid,
                    Status::Successful,
                    Some(format!("validated with image {}", image)),
                )
                .await?;
            return Ok(());
        }
    }

    info!("Submission FAILED for {}", record.name);
    store
        .update_status(
            record.uuid,
            Status::Failed,
            Some(String::from("none of the submitted images passed validation")),
        )
        .await?;
    Ok(())
}

/// The controller polls faster while the pool is busy and backs off when
/// idle, so throughput scales with backlog without hammering the store.
pub(crate) fn next_interval(base: Duration, in_flight: usize, max_concurrency: usize) -> Duration {
    let utilization = if max_concurrency == 0 {
        0.0
    } else {
        in_flight as f64 / max_concurrency as f64
    };
    std::cmp::max(base.div_f64(2_f64.powf(3.0 * utilization)), Duration::from_secs(1))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::db::NewSubmission;
    use crate::endpoint::ContainerHandle;
    use crate::geocode::Coordinates;
    use crate::util::docker::ContainerHash;

    fn submission(images: &[&str], location: Option<&str>) -> Submission {
        Submission {
            id: 1,
            uuid: Uuid::new_v4(),
            name: String::from("tester"),
            images: images.iter().map(ToString::to_string).collect(),
            location: location.map(String::from),
            status: Status::Submitted.to_string(),
            status_message: None,
            latitude: None,
            longitude: None,
            submitted_at: Utc::now(),
            last_modified: None,
        }
    }

    fn pipeline_config(bypass: Option<&str>) -> PipelineConfig {
        PipelineConfig {
            probe_port: 80,
            probe_path: String::from("/getconfig"),
            startup_delay: Duration::from_millis(0),
            bypass_image: bypass.map(ImageName::from),
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        records: Mutex<Vec<Submission>>,
        locations: Mutex<Vec<(Uuid, f64, f64)>>,
    }

    impl MemoryStore {
        fn with(records: Vec<Submission>) -> Self {
            MemoryStore {
                records: Mutex::new(records),
                locations: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, id: Uuid) -> Submission {
            self.records
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.uuid == id)
                .cloned()
                .unwrap()
        }
    }

    #[async_trait]
    impl RecordStore for MemoryStore {
        async fn claim_next(&self) -> Result<Option<Submission>> {
            let mut records = self.records.lock().unwrap();
            for record in records.iter_mut() {
                if record.status == Status::Submitted.to_string() {
                    record.status = Status::Pending.to_string();
                    return Ok(Some(record.clone()));
                }
            }
            Ok(None)
        }

        async fn update_status(&self, id: Uuid, status: Status, message: Option<String>) -> Result<()> {
            let mut records = self.records.lock().unwrap();
            let record = records
                .iter_mut()
                .find(|r| r.uuid == id)
                .ok_or_else(|| anyhow!("no submission with id {}", id))?;
            record.status = status.to_string();
            record.status_message = message;
            record.last_modified = Some(Utc::now());
            Ok(())
        }

        async fn pending_count(&self) -> Result<usize> {
            let records = self.records.lock().unwrap();
            Ok(records
                .iter()
                .filter(|r| r.status == Status::Submitted.to_string())
                .count())
        }

        async fn update_location(&self, id: Uuid, latitude: f64, longitude: f64) -> Result<()> {
            self.locations.lock().unwrap().push((id, latitude, longitude));
            Ok(())
        }

        async fn insert_record(&self, record: NewSubmission) -> Result<Submission> {
            let mut records = self.records.lock().unwrap();
            let submission = Submission {
                id: records.len() as i32 + 1,
                uuid: record.uuid,
                name: record.name,
                images: record.images,
                location: record.location,
                status: record.status,
                status_message: None,
                latitude: None,
                longitude: None,
                submitted_at: record.submitted_at,
                last_modified: None,
            };
            records.push(submission.clone());
            Ok(submission)
        }
    }

    /// Per-image behavior of the fake runtime.
    #[derive(Clone, Copy)]
    enum ImageScript {
        /// registry search finds nothing
        Missing,
        /// download hits an infrastructure fault
        DownloadFault,
        /// container creation is rejected
        RejectedByRuntime,
        /// the docker network is gone
        InfraFault,
        /// container starts but dies before getting an address
        DiesEarly,
        /// container runs; the prober decides the rest
        Runs,
    }

    #[derive(Default)]
    struct FakeRuntime {
        scripts: HashMap<String, ImageScript>,
        events: Mutex<Vec<String>>,
    }

    impl FakeRuntime {
        fn with(scripts: &[(&str, ImageScript)]) -> Self {
            FakeRuntime {
                scripts: scripts
                    .iter()
                    .map(|(image, script)| (image.to_string(), *script))
                    .collect(),
                events: Mutex::new(Vec::new()),
            }
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn log(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }

        fn script(&self, image: &ImageName) -> ImageScript {
            *self.scripts.get(image.as_ref()).unwrap_or(&ImageScript::Runs)
        }
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn download_image(&self, image: &ImageName) -> Result<bool, ValidationError> {
            self.log(format!("download:{}", image));
            match self.script(image) {
                ImageScript::Missing => Ok(false),
                ImageScript::DownloadFault => {
                    Err(ValidationError::infrastructure("registry unreachable"))
                }
                _ => Ok(true),
            }
        }

        async fn run_container(&self, image: &ImageName) -> Result<ContainerHandle, ValidationError> {
            self.log(format!("run:{}", image));
            let id = ContainerHash::from(format!("container-{}", image));
            match self.script(image) {
                ImageScript::RejectedByRuntime => {
                    Err(ValidationError::submitter("runtime rejected container"))
                }
                ImageScript::InfraFault => {
                    Err(ValidationError::infrastructure("network 'compose_default' not found"))
                }
                ImageScript::DiesEarly => Ok(ContainerHandle::new(id, None)),
                _ => Ok(ContainerHandle::new(id, Some(format!("ip-{}", image)))),
            }
        }

        async fn clean_container(&self, container: &ContainerHash, _image: Option<&ImageName>) -> Result<()> {
            self.log(format!("clean:{}", container));
            Ok(())
        }
    }

    /// Passes exactly the ips listed; records every probe call.
    #[derive(Default)]
    struct FakeProber {
        passing: Vec<String>,
        probed: Mutex<Vec<String>>,
    }

    impl FakeProber {
        fn passing(ips: &[&str]) -> Self {
            FakeProber {
                passing: ips.iter().map(ToString::to_string).collect(),
                probed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EndpointProber for FakeProber {
        async fn probe(&self, ip: &str, _port: u16, _path: &str) -> bool {
            self.probed.lock().unwrap().push(ip.to_string());
            self.passing.iter().any(|p| p == ip)
        }
    }

    enum GeoScript {
        Resolves(Coordinates),
        Unknown,
        Fails,
    }

    struct FakeGeocoder(GeoScript);

    #[async_trait]
    impl Geocoder for FakeGeocoder {
        async fn geocode(&self, _location: &str) -> Result<Option<Coordinates>, ValidationError> {
            match self.0 {
                GeoScript::Resolves(coords) => Ok(Some(coords)),
                GeoScript::Unknown => Ok(None),
                GeoScript::Fails => Err(ValidationError::dependency("geocoder unreachable")),
            }
        }
    }

    async fn validate(
        record: &Submission,
        store: &MemoryStore,
        runtime: &FakeRuntime,
        prober: &FakeProber,
        geocoder: Option<&FakeGeocoder>,
        pipeline: &PipelineConfig,
    ) {
        validate_submission(
            record,
            store,
            runtime,
            prober,
            geocoder.map(|g| g as &dyn Geocoder),
            pipeline,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn candidates_are_exhausted_in_order_until_one_passes() {
        let record = submission(&["a", "b", "c"], None);
        let store = MemoryStore::with(vec![record.clone()]);
        let runtime = FakeRuntime::with(&[("a", ImageScript::Missing)]);
        let prober = FakeProber::passing(&["ip-c"]);

        validate(&record, &store, &runtime, &prober, None, &pipeline_config(None)).await;

        let result = store.record(record.uuid);
        assert_eq!(result.status, Status::Successful.to_string());
        assert!(result.status_message.unwrap().contains('c'));
        assert_eq!(
            runtime.events(),
            vec![
                "download:a",
                "download:b",
                "run:b",
                "clean:container-b",
                "download:c",
                "run:c",
                "clean:container-c",
            ]
        );
    }

    #[tokio::test]
    async fn exhausted_candidate_list_fails() {
        let record = submission(&["a"], None);
        let store = MemoryStore::with(vec![record.clone()]);
        let runtime = FakeRuntime::with(&[("a", ImageScript::Missing)]);
        let prober = FakeProber::default();

        validate(&record, &store, &runtime, &prober, None, &pipeline_config(None)).await;

        let result = store.record(record.uuid);
        assert_eq!(result.status, Status::Failed.to_string());
        assert!(result.status_message.unwrap().contains("passed validation"));
    }

    #[tokio::test]
    async fn bypass_image_short_circuits_without_runtime_calls() {
        let record = submission(&["demo/bypass", "a"], None);
        let store = MemoryStore::with(vec![record.clone()]);
        let runtime = FakeRuntime::default();
        let prober = FakeProber::default();

        validate(&record, &store, &runtime, &prober, None, &pipeline_config(Some("demo/bypass"))).await;

        assert_eq!(store.record(record.uuid).status, Status::Successful.to_string());
        assert!(runtime.events().is_empty());
        assert!(prober.probed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn download_fault_requeues_and_stops_iterating() {
        let record = submission(&["a", "b"], None);
        let store = MemoryStore::with(vec![record.clone()]);
        let runtime = FakeRuntime::with(&[("a", ImageScript::DownloadFault)]);
        let prober = FakeProber::default();

        validate(&record, &store, &runtime, &prober, None, &pipeline_config(None)).await;

        let result = store.record(record.uuid);
        assert_eq!(result.status, Status::Submitted.to_string());
        assert!(result.status_message.unwrap().starts_with("re-queued"));
        assert_eq!(runtime.events(), vec!["download:a"]);
    }

    #[tokio::test]
    async fn rejected_container_fails_terminally_without_trying_more_images() {
        let record = submission(&["a", "b"], None);
        let store = MemoryStore::with(vec![record.clone()]);
        let runtime = FakeRuntime::with(&[("a", ImageScript::RejectedByRuntime)]);
        let prober = FakeProber::default();

        validate(&record, &store, &runtime, &prober, None, &pipeline_config(None)).await;

        let result = store.record(record.uuid);
        assert_eq!(result.status, Status::Failed.to_string());
        assert!(result.status_message.unwrap().contains("rejected"));
        assert_eq!(runtime.events(), vec!["download:a", "run:a"]);
    }

    #[tokio::test]
    async fn infrastructure_fault_at_run_time_requeues() {
        let record = submission(&["a", "b"], None);
        let store = MemoryStore::with(vec![record.clone()]);
        let runtime = FakeRuntime::with(&[("a", ImageScript::InfraFault)]);
        let prober = FakeProber::default();

        validate(&record, &store, &runtime, &prober, None, &pipeline_config(None)).await;

        assert_eq!(store.record(record.uuid).status, Status::Submitted.to_string());
        assert_eq!(runtime.events(), vec!["download:a", "run:a"]);
    }

    #[tokio::test]
    async fn dead_container_is_cleaned_but_never_probed() {
        let record = submission(&["a"], None);
        let store = MemoryStore::with(vec![record.clone()]);
        let runtime = FakeRuntime::with(&[("a", ImageScript::DiesEarly)]);
        let prober = FakeProber::default();

        validate(&record, &store, &runtime, &prober, None, &pipeline_config(None)).await;

        assert_eq!(store.record(record.uuid).status, Status::Failed.to_string());
        assert!(prober.probed.lock().unwrap().is_empty());
        assert_eq!(runtime.events(), vec!["download:a", "run:a", "clean:container-a"]);
    }

    #[tokio::test]
    async fn cleanup_happens_exactly_once_even_when_the_probe_fails() {
        let record = submission(&["a"], None);
        let store = MemoryStore::with(vec![record.clone()]);
        let runtime = FakeRuntime::default();
        let prober = FakeProber::default(); // passes nothing

        validate(&record, &store, &runtime, &prober, None, &pipeline_config(None)).await;

        let cleanups = runtime
            .events()
            .iter()
            .filter(|e| e.as_str() == "clean:container-a")
            .count();
        assert_eq!(cleanups, 1);
        assert_eq!(store.record(record.uuid).status, Status::Failed.to_string());
    }

    #[tokio::test]
    async fn failing_geocode_gates_the_whole_pipeline() {
        let record = submission(&["a"], Some("Atlantis"));
        let store = MemoryStore::with(vec![record.clone()]);
        let runtime = FakeRuntime::default();
        let prober = FakeProber::default();
        let geocoder = FakeGeocoder(GeoScript::Fails);

        validate(&record, &store, &runtime, &prober, Some(&geocoder), &pipeline_config(None)).await;

        let result = store.record(record.uuid);
        assert_eq!(result.status, Status::Failed.to_string());
        assert!(result.status_message.unwrap().contains("geocoding failed"));
        assert!(runtime.events().is_empty());
    }

    #[tokio::test]
    async fn unknown_location_fails_before_any_image_attempt() {
        let record = submission(&["a"], Some("Nowhere"));
        let store = MemoryStore::with(vec![record.clone()]);
        let runtime = FakeRuntime::default();
        let prober = FakeProber::default();
        let geocoder = FakeGeocoder(GeoScript::Unknown);

        validate(&record, &store, &runtime, &prober, Some(&geocoder), &pipeline_config(None)).await;

        assert_eq!(store.record(record.uuid).status, Status::Failed.to_string());
        assert!(runtime.events().is_empty());
    }

    #[tokio::test]
    async fn resolved_location_is_persisted_and_validation_continues() {
        let record = submission(&["a"], Some("Paris"));
        let store = MemoryStore::with(vec![record.clone()]);
        let runtime = FakeRuntime::default();
        let prober = FakeProber::passing(&["ip-a"]);
        let geocoder = FakeGeocoder(GeoScript::Resolves((48.8566, 2.3522)));

        validate(&record, &store, &runtime, &prober, Some(&geocoder), &pipeline_config(None)).await;

        assert_eq!(store.locations.lock().unwrap().as_slice(), &[(record.uuid, 48.8566, 2.3522)]);
        assert_eq!(store.record(record.uuid).status, Status::Successful.to_string());
    }

    #[tokio::test]
    async fn terminal_records_are_never_claimed_again() {
        let mut done = submission(&["a"], None);
        done.status = Status::Successful.to_string();
        let mut burned = submission(&["a"], None);
        burned.status = Status::Failed.to_string();
        let store = MemoryStore::with(vec![done.clone(), burned.clone()]);

        assert!(store.claim_next().await.unwrap().is_none());
        assert_eq!(store.pending_count().await.unwrap(), 0);
        assert_eq!(store.record(done.uuid).status, Status::Successful.to_string());
        assert_eq!(store.record(burned.uuid).status, Status::Failed.to_string());
    }

    #[tokio::test]
    async fn concurrent_claims_never_hand_out_the_same_record() {
        let records: Vec<_> = (0..16).map(|_| submission(&["a"], None)).collect();
        let store = Arc::new(MemoryStore::with(records));

        let mut tasks = JoinSet::new();
        for _ in 0..32 {
            let store = store.clone();
            tasks.spawn(async move { store.claim_next().await.unwrap() });
        }

        let mut claimed = Vec::new();
        while let Some(result) = tasks.join_next().await {
            if let Some(record) = result.unwrap() {
                claimed.push(record.uuid);
            }
        }

        assert_eq!(claimed.len(), 16);
        claimed.sort();
        claimed.dedup();
        assert_eq!(claimed.len(), 16);
    }

    #[tokio::test]
    async fn dispatch_uses_the_endpoint_current_at_dispatch_time() {
        struct RecordingConnector {
            seen: Mutex<Vec<String>>,
            runtime: Arc<FakeRuntime>,
        }

        #[async_trait]
        impl RuntimeConnector for RecordingConnector {
            async fn connect(&self, endpoint: &RuntimeEndpoint) -> Result<Arc<dyn ContainerRuntime>> {
                self.seen.lock().unwrap().push(endpoint.uri().clone());
                Ok(self.runtime.clone() as Arc<dyn ContainerRuntime>)
            }
        }

        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::with(vec![
            submission(&["a"], None),
            submission(&["a"], None),
        ]));
        let connector = Arc::new(RecordingConnector {
            seen: Mutex::new(Vec::new()),
            runtime: Arc::new(FakeRuntime::default()),
        });
        let prober: Arc<dyn EndpointProber> = Arc::new(FakeProber::default());

        for uri in ["tcp://old:2375", "tcp://new:2375"] {
            process_submission(
                store.clone(),
                connector.clone(),
                prober.clone(),
                None,
                RuntimeEndpoint::http(String::from(uri)),
                pipeline_config(None),
            )
            .await;
        }

        assert_eq!(
            connector.seen.lock().unwrap().as_slice(),
            &["tcp://old:2375", "tcp://new:2375"]
        );
    }

    #[test]
    fn interval_shrinks_with_pool_utilization() {
        let base = Duration::from_secs(10);
        let idle = next_interval(base, 0, 5);
        let half = next_interval(base, 3, 5);
        let full = next_interval(base, 5, 5);

        assert_eq!(idle, base);
        assert!(half < idle);
        assert!(full < half);
        assert!(full >= Duration::from_secs(1));
    }

    #[test]
    fn interval_never_drops_below_one_second() {
        assert_eq!(next_interval(Duration::from_secs(2), 5, 5), Duration::from_secs(1));
    }
}
