use clap::Parser;
use mongo2sql::migrations::{apply_migrations, load_migrations};
use mongo2sql::sink::{PgSink, Sink};
use mongo2sql::state::new_store;
use mongo2sql::transform::Registry;
use mongo2sql::{Connection, SqlSyncer, SyncOptions, SyncerConfig};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, author, about)]
struct Opts {
    /// configuration file path.
    #[arg(short, long, default_value = "config.toml")]
    conf: PathBuf,
    /// log file path, if not specified, all log information will be output to stdout.
    #[arg(long)]
    log_path: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts: Opts = Opts::parse();
    let (non_blocking, guard) = match &opts.log_path {
        Some(path) => {
            let dir_name = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| format!("invalid log path {:?}", path))?;
            let file_appender = tracing_appender::rolling::daily(dir_name, file_name);
            tracing_appender::non_blocking(file_appender)
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .init();

    let result = run(&opts);
    if let Err(e) = &result {
        error!(error = %e, "Sync stopped with error, restart to resume from the last checkpoint.");
    }
    // flush pending logs before exit.
    drop(guard);
    if result.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

fn run(opts: &Opts) -> mongo2sql::Result<()> {
    let conf = SyncerConfig::from_file(&opts.conf)?;
    info!(conf = %opts.conf.display(), "Load configuration.");
    let sink_url = conf.get_sink_url();

    if let Some(dir) = conf.get_migrations_dir() {
        let migrations = load_migrations(dir)?;
        let mut client = postgres::Client::connect(sink_url, postgres::NoTls)?;
        let applied = apply_migrations(&mut client, &migrations)?;
        info!(total = migrations.len(), applied, "Sink migrations are up to date.");
    }

    let registry = Registry::load_dir(conf.get_converters_dir(), || {
        Ok(Box::new(PgSink::connect(sink_url)?) as Box<dyn Sink>)
    })?;
    let store = new_store(conf.get_state_driver(), conf.get_state_url())?;
    let conn = Connection::with_oplog_coll(
        conf.get_src_url(),
        conf.get_oplog_coll(),
        conf.get_tail_start(),
    )?;
    conn.check_permissions(&registry.names())?;

    info!(namespaces = ?registry.names(), "Begin to sync.");
    let syncer = SqlSyncer::new(conn, store, registry, SyncOptions::from(&conf));
    let shutdown = syncer.shutdown_handle();
    // SIGINT and SIGTERM, the second one exits without waiting for the current oplog.
    ctrlc::set_handler(move || {
        if shutdown.swap(true, Ordering::SeqCst) {
            warn!("Interrupted again, exit now.");
            std::process::exit(130);
        }
        info!("Interrupted, stop after the current oplog is applied.");
    })?;
    syncer.sync()
}
