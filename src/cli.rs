//! Command line front end.

use std::io;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::access_group::parse_access_groups;
use crate::compile::compile_access_lists;
use crate::error::Result;
use crate::pipeline::{AuditOptions, Auditor, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};
use crate::report::AuditReport;
use crate::resolver::SystemResolver;
use crate::route::{interface_names, RoutingTable};
use crate::text::TextIndex;

/// excessive-acl command line arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "excessive-acl",
    version,
    about = "Determines excessive ACEs from firewall syslog messages"
)]
pub struct Args {
    /// File with "show running-config" output.
    #[arg(short = 'r', long = "sh-run")]
    pub sh_run: PathBuf,

    /// File with "show route" output.
    #[arg(short = 'i', long = "sh-ip-route")]
    pub sh_ip_route: PathBuf,

    /// Syslog file to replay.
    #[arg(short, long)]
    pub syslog: PathBuf,

    /// Number of replay workers.
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Depth of the flow queue.
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn options(&self) -> AuditOptions {
        AuditOptions::new()
            .with_workers(self.workers)
            .with_queue_capacity(self.queue_capacity)
    }
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

/// Run the whole audit and print the report to stdout.
pub async fn run(args: Args) -> Result<()> {
    let options = args.options();
    let config = TextIndex::from_file(&args.sh_run)?;

    let groups = parse_access_groups(&config);
    if groups.is_empty() {
        println!("no access-group found");
        return Ok(());
    }
    println!("--- Access-groups");
    for group in &groups {
        println!("{}", group);
    }

    let started = Instant::now();
    let lists = compile_access_lists(&config, &groups, &SystemResolver::new(), &options)?;
    info!(elapsed = ?started.elapsed(), "access lists ready");

    let interfaces = interface_names(&config)?;
    let routes = RoutingTable::from_file(&args.sh_ip_route, &interfaces)?;

    let auditor = Auditor::new(lists, groups, routes, options);
    let started = Instant::now();
    let stats = auditor.replay_file(&args.syslog).await?;
    info!(
        elapsed = ?started.elapsed(),
        records = stats.records,
        flows = stats.flows,
        "syslog replayed"
    );

    let report = AuditReport::build(auditor.access_lists())?;
    println!("--- Analysis");
    print!("{}", report);
    Ok(())
}
