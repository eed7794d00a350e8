//! Server assembly and run loop
//!
//! Builds the topology, connection pools and workers from config, starts the
//! HTTP ingress and the reporter, then waits for ctrl-c and unwinds in
//! order: cancel tasks, await them, destroy the pools.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use relay_config::Config;
use relay_ingress::{HttpIngress, HttpState};
use relay_pipeline::{
    DispatchWorker, PipelineMetrics, ProbeSet, Reporter, Router, Topology, WorkerConfig,
};
use relay_pool::{PoolRegistry, ProcSource};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::transport::{line_factory, LineConn, LineTransport};

/// Build everything and run until ctrl-c.
pub async fn run(config: Config) -> Result<()> {
    let cancel = CancellationToken::new();

    let topology = Arc::new(Topology::from_config(&config));
    let metrics = Arc::new(PipelineMetrics::new());
    let probes = Arc::new(ProbeSet::new());
    let router = Arc::new(Router::new(
        Arc::clone(&topology),
        Arc::clone(&probes),
        Arc::clone(&metrics),
    ));

    let worker_config = WorkerConfig {
        batch: config.global.dispatch_batch,
        idle: Duration::from_millis(config.global.worker_idle_ms),
        ..WorkerConfig::default()
    };

    let transport = Arc::new(LineTransport);
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();
    let mut registries: Vec<Arc<PoolRegistry<LineConn>>> = Vec::new();
    let mut pools_by_family: HashMap<&'static str, Arc<dyn ProcSource>> = HashMap::new();

    // alerting family: one worker per node queue, pools per node address
    if let Some(family) = topology.alert.as_ref() {
        let addresses: Vec<String> = config.alert.cluster.values().cloned().collect();
        let conn_timeout = Duration::from_millis(config.alert.conn_timeout_ms);
        let call_timeout = Duration::from_millis(config.alert.call_timeout_ms);
        let registry = Arc::new(PoolRegistry::new(
            &addresses,
            config.alert.max_conns,
            config.alert.max_idle,
            |addr| line_factory(addr, conn_timeout, call_timeout),
        ));

        for (node, queue) in &family.queues {
            let addr = config
                .alert
                .cluster
                .get(node)
                .with_context(|| format!("alert node '{node}' missing from cluster"))?;
            let pool = Arc::clone(
                registry
                    .get(addr)
                    .with_context(|| format!("no pool for alert address '{addr}'"))?,
            );
            let worker = DispatchWorker::<_, LineTransport>::new(
                format!("alert/{node}"),
                Arc::clone(queue),
                pool,
                Arc::clone(&transport),
                worker_config.clone(),
            );
            tasks.push(tokio::spawn(worker.run(cancel.clone())));
        }

        info!(
            nodes = family.queues.len(),
            pools = registry.len(),
            "alert family up"
        );
        pools_by_family.insert("alert", Arc::clone(&registry) as Arc<dyn ProcSource>);
        registries.push(registry);
    }

    // storage family: one worker per (node, address) queue, pools shared by
    // deduplicated address
    if let Some(family) = topology.store.as_ref() {
        let addresses = config.store.distinct_addrs();
        let conn_timeout = Duration::from_millis(config.store.conn_timeout_ms);
        let call_timeout = Duration::from_millis(config.store.call_timeout_ms);
        let registry = Arc::new(PoolRegistry::new(
            &addresses,
            config.store.max_conns,
            config.store.max_idle,
            |addr| line_factory(addr, conn_timeout, call_timeout),
        ));

        let mut worker_count = 0usize;
        for (node, dests) in &family.nodes {
            for dest in dests {
                let pool = Arc::clone(
                    registry
                        .get(&dest.addr)
                        .with_context(|| format!("no pool for store address '{}'", dest.addr))?,
                );
                let worker = DispatchWorker::<_, LineTransport>::new(
                    format!("store/{node}/{}", dest.addr),
                    Arc::clone(&dest.queue),
                    pool,
                    Arc::clone(&transport),
                    worker_config.clone(),
                );
                tasks.push(tokio::spawn(worker.run(cancel.clone())));
                worker_count += 1;
            }
        }

        info!(
            nodes = family.nodes.len(),
            workers = worker_count,
            pools = registry.len(),
            "store family up"
        );
        pools_by_family.insert("store", Arc::clone(&registry) as Arc<dyn ProcSource>);
        registries.push(registry);
    }

    // time-series family: one shared queue, one worker
    if let Some(family) = topology.tsdb.as_ref() {
        let addresses = vec![family.address.clone()];
        let conn_timeout = Duration::from_millis(config.tsdb.conn_timeout_ms);
        let call_timeout = Duration::from_millis(config.tsdb.call_timeout_ms);
        let registry = Arc::new(PoolRegistry::new(
            &addresses,
            config.tsdb.max_conns,
            config.tsdb.max_idle,
            |addr| line_factory(addr, conn_timeout, call_timeout),
        ));

        let pool = Arc::clone(
            registry
                .get(&family.address)
                .with_context(|| format!("no pool for tsdb address '{}'", family.address))?,
        );
        let worker = DispatchWorker::<_, LineTransport>::new(
            format!("tsdb/{}", family.address),
            Arc::clone(&family.queue),
            pool,
            Arc::clone(&transport),
            worker_config.clone(),
        );
        tasks.push(tokio::spawn(worker.run(cancel.clone())));

        info!(address = %family.address, "tsdb family up");
        pools_by_family.insert("tsdb", Arc::clone(&registry) as Arc<dyn ProcSource>);
        registries.push(registry);
    }

    // periodic reporter: fast backlog gauges, slow pool dumps
    let mut reporter = Reporter::new(
        Arc::clone(&topology),
        Arc::clone(&metrics),
        Duration::from_secs(config.global.backlog_interval_secs),
        Duration::from_secs(config.global.pool_log_interval_secs),
    );
    for (&family, pools) in &pools_by_family {
        reporter = reporter.with_pools(family, Arc::clone(pools));
    }
    tasks.push(tokio::spawn(reporter.run(cancel.clone())));

    // http ingress + debug endpoints
    if config.http.enabled {
        let ingress = HttpIngress::new(
            config.http.clone(),
            HttpState {
                router: Arc::clone(&router),
                pools: pools_by_family.clone(),
                max_body_bytes: config.http.max_body_bytes,
            },
        );
        let ingress_cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = ingress.run(ingress_cancel).await {
                error!(error = %e, "http ingress failed");
            }
        }));
    } else {
        warn!("http ingress disabled, only the rpc path can submit");
    }

    info!("relayd running, ctrl-c to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    info!("shutdown requested");
    cancel.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "task ended abnormally during shutdown");
        }
    }

    for registry in &registries {
        registry.destroy();
    }

    info!("all pools destroyed");
    Ok(())
}
