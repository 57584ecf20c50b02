//
// Copyright (c) 2020-2022 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

#[macro_use]
extern crate diesel;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use clap::ArgMatches;
use tokio::sync::watch;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod db;
mod endpoint;
mod geocode;
mod orchestrator;
mod schema;
mod util;

use crate::config::Configuration;
use crate::config::NotValidatedConfiguration;
use crate::db::DbConnectionConfig;
use crate::db::PgStore;
use crate::db::RecordStore;
use crate::endpoint::DiscoveryTask;
use crate::endpoint::DockerConnector;
use crate::endpoint::EndpointProber;
use crate::endpoint::HttpProber;
use crate::endpoint::RuntimeConnector;
use crate::geocode::Geocoder;
use crate::geocode::HttpGeocoder;
use crate::orchestrator::Orchestrator;
use crate::orchestrator::PipelineConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    debug!("Debugging enabled");

    let cli = cli::cli();
    let cli = cli.get_matches();

    let config_name = cli
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config");
    let mut config = ::config::Config::default();
    config
        .merge(::config::File::with_name(config_name))
        .context("Loading configuration file")?
        .merge(::config::Environment::with_prefix("VERIDOCK"))
        .context("Loading environment variables")?;
    let config: Configuration = config
        .try_into::<NotValidatedConfiguration>()
        .context("Deserializing configuration")?
        .validate()
        .context("Validating configuration")?;

    // no useful degraded mode exists without a store, so a connection
    // failure here takes the process down
    let pool = DbConnectionConfig::parse(&config, &cli)?
        .establish_pool()
        .context("Connecting to the submission store")?;
    let store: Arc<dyn RecordStore> = Arc::new(PgStore::new(pool));

    let (endpoint_tx, endpoint_rx) = watch::channel(config.docker().endpoint().clone());
    if let Some(discovery) = config.discovery() {
        info!("Endpoint discovery enabled, registry: {}", discovery.registry());
        let task = DiscoveryTask::new(discovery, endpoint_tx)?;
        tokio::spawn(task.run());
    }

    let geocoder = config
        .geocoding()
        .as_ref()
        .map(|geocoding| HttpGeocoder::new(geocoding).map(|g| Arc::new(g) as Arc<dyn Geocoder>))
        .transpose()?;

    let (max_concurrency, base_interval) = worker_parameters(&config, &cli)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("Installing SIGTERM handler")?;
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        info!("Shutdown signal received, draining in-flight validations");
        if shutdown_tx.send(true).is_err() {
            error!("Orchestrator already gone");
        }
    });

    Orchestrator::builder()
        .store(store)
        .connector(Arc::new(DockerConnector::new(&config)) as Arc<dyn RuntimeConnector>)
        .prober(Arc::new(HttpProber::new(config.containers())?) as Arc<dyn EndpointProber>)
        .geocoder(geocoder)
        .endpoint(endpoint_rx)
        .pipeline(PipelineConfig::new(&config))
        .max_concurrency(max_concurrency)
        .base_interval(base_interval)
        .build()
        .run(shutdown_rx)
        .await
}

fn worker_parameters(config: &Configuration, cli: &ArgMatches) -> Result<(usize, Duration)> {
    let max_concurrency = cli
        .get_one::<String>("max_concurrency")
        .map(|s| s.parse::<usize>())
        .transpose()
        .context("Parsing --submissions")?
        .unwrap_or_else(|| config.worker().max_concurrency());
    if max_concurrency == 0 {
        return Err(anyhow::anyhow!("--submissions must be at least 1"));
    }

    let interval = cli
        .get_one::<String>("interval")
        .map(|s| s.parse::<u64>())
        .transpose()
        .context("Parsing --interval")?
        .unwrap_or_else(|| config.worker().interval_seconds());

    Ok((max_concurrency, Duration::from_secs(interval)))
}
