//! Log replay: decoded flows are fanned out to a pool of workers that record
//! them against the compiled access lists.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::access_group::AccessGroup;
use crate::compile::AccessList;
use crate::error::{AuditError, Result};
use crate::objects::DEFAULT_CACHE_SIZE;
use crate::route::RoutingTable;
use crate::syslog;
use crate::types::Flow;

/// Default number of replay workers
pub const DEFAULT_WORKERS: usize = 4;

/// Default depth of the flow queue between producer and workers
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Audit options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditOptions {
    /// Number of replay workers (at least 1)
    pub workers: usize,
    /// Bounded flow queue size (at least 1)
    pub queue_capacity: usize,
    /// LRU cache size for resolved objects and groups
    pub cache_size: usize,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl AuditOptions {
    /// Create new audit options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the flow queue size.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set cache size.
    pub fn with_cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }
}

/// Counters of one replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Log lines read
    pub records: usize,
    /// Lines that decoded to a flow
    pub flows: usize,
    /// Flows recorded by at least one access list entry
    pub matched: usize,
}

impl ReplayStats {
    fn merge(&mut self, other: ReplayStats) {
        self.records += other.records;
        self.flows += other.flows;
        self.matched += other.matched;
    }
}

/// Compiled access lists, their bindings and the routing tree, ready to
/// replay traffic logs.
#[derive(Debug, Clone)]
pub struct Auditor {
    access_lists: Arc<Vec<AccessList>>,
    access_groups: Arc<Vec<AccessGroup>>,
    routing_table: Arc<RoutingTable>,
    options: AuditOptions,
}

impl Auditor {
    pub fn new(
        access_lists: Vec<AccessList>,
        access_groups: Vec<AccessGroup>,
        routing_table: RoutingTable,
        options: AuditOptions,
    ) -> Self {
        Self {
            access_lists: Arc::new(access_lists),
            access_groups: Arc::new(access_groups),
            routing_table: Arc::new(routing_table),
            options,
        }
    }

    pub fn access_lists(&self) -> &[AccessList] {
        &self.access_lists
    }

    pub fn access_groups(&self) -> &[AccessGroup] {
        &self.access_groups
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.routing_table
    }

    pub fn options(&self) -> &AuditOptions {
        &self.options
    }

    /// Record a flow against every access list bound to its interfaces.
    ///
    /// Returns whether any list had an entry admitting it.
    pub fn record_flow(&self, flow: &Flow) -> bool {
        record_flow(&self.access_lists, &self.access_groups, flow)
    }

    /// Replay log lines held in memory.
    pub async fn replay_records<I>(&self, records: I) -> Result<ReplayStats>
    where
        I: IntoIterator + Send + 'static,
        I::IntoIter: Send,
        I::Item: AsRef<str> + Send,
    {
        let routes = Arc::clone(&self.routing_table);
        self.run(move |tx| async move {
            let mut stats = ReplayStats::default();
            for (idx, record) in records.into_iter().enumerate() {
                forward(record.as_ref(), idx + 1, &routes, &tx, &mut stats).await?;
            }
            Ok(stats)
        })
        .await
    }

    /// Replay a log file line by line.
    pub async fn replay_file(&self, path: impl AsRef<Path>) -> Result<ReplayStats> {
        let file = File::open(path.as_ref()).await?;
        let routes = Arc::clone(&self.routing_table);
        self.run(move |tx| async move {
            let mut stats = ReplayStats::default();
            let mut lines = BufReader::new(file).lines();
            let mut number = 0;
            while let Some(line) = lines.next_line().await? {
                number += 1;
                forward(&line, number, &routes, &tx, &mut stats).await?;
            }
            Ok(stats)
        })
        .await
    }

    async fn run<F, P>(&self, producer: F) -> Result<ReplayStats>
    where
        F: FnOnce(mpsc::Sender<Flow>) -> P,
        P: Future<Output = Result<ReplayStats>> + Send + 'static,
    {
        let workers = self.options.workers.max(1);
        let (tx, rx) = mpsc::channel(self.options.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        info!(workers, queue = self.options.queue_capacity, "replaying log records");

        let mut tasks = JoinSet::new();
        tasks.spawn(producer(tx));
        for worker in 0..workers {
            let rx = Arc::clone(&rx);
            let lists = Arc::clone(&self.access_lists);
            let groups = Arc::clone(&self.access_groups);
            tasks.spawn(async move {
                let mut stats = ReplayStats::default();
                loop {
                    // The lock is held only while waiting for the next flow.
                    let next = rx.lock().await.recv().await;
                    let Some(flow) = next else { break };
                    if record_flow(&lists, &groups, &flow) {
                        stats.matched += 1;
                    }
                }
                debug!(worker, matched = stats.matched, "replay worker finished");
                Ok(stats)
            });
        }
        drop(rx);

        let mut total = ReplayStats::default();
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined
                .map_err(|e| AuditError::Pipeline(format!("replay task failed: {}", e)))
                .and_then(|result| result);
            match outcome {
                Ok(stats) => total.merge(stats),
                Err(e) => {
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }

        info!(
            records = total.records,
            flows = total.flows,
            matched = total.matched,
            "replay finished"
        );
        Ok(total)
    }
}

// Decode one record and queue its flow, if any.
async fn forward(
    line: &str,
    number: usize,
    routes: &RoutingTable,
    tx: &mpsc::Sender<Flow>,
    stats: &mut ReplayStats,
) -> Result<()> {
    stats.records += 1;
    let Some(flow) = syslog::decode(line, routes).map_err(|e| e.at_line(number))? else {
        return Ok(());
    };
    stats.flows += 1;
    tx.send(flow)
        .await
        .map_err(|_| AuditError::Pipeline("flow queue closed before replay finished".to_string()))
}

fn record_flow(lists: &[AccessList], groups: &[AccessGroup], flow: &Flow) -> bool {
    let mut matched = false;
    let mut seen: Vec<&str> = Vec::new();

    for group in groups.iter().filter(|g| g.applies_to(flow)) {
        // a list bound on both sides of the flow still sees it once
        if seen.contains(&group.acl_name.as_str()) {
            continue;
        }
        seen.push(&group.acl_name);

        if let Some(list) = lists.iter().find(|l| l.name() == group.acl_name) {
            debug!(acl = list.name(), binding = %group, %flow, "checking flow");
            matched |= list.record_flow(flow).is_some();
        }
    }

    matched
}
