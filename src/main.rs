use anyhow::{bail, Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use std::fs::{self, File, OpenOptions};
use std::io::BufWriter;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use abx_client::capture::write_report;
use abx_client::export::write_json;
use abx_client::{Session, SessionConfig, SessionReport};

#[derive(Debug, Parser)]
#[command(version, about = "ABX exchange feed client: stream, backfill gaps, export JSON")]
struct Args {
    /// Exchange server host
    #[arg(long, env = "ABX_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Exchange server port
    #[arg(long, env = "ABX_PORT", default_value_t = 3000)]
    port: u16,

    /// JSON output path
    #[arg(long, env = "ABX_OUTPUT", default_value = "output.json")]
    out: PathBuf,

    /// Also write a binary capture to this path
    #[arg(long, env = "ABX_CAPTURE")]
    capture: Option<PathBuf>,

    /// Write a capture to captures/abx_YYYY_MM_DD.bin when --capture is not set
    #[arg(long, default_value_t = false)]
    capture_default: bool,

    /// TCP connect timeout in milliseconds
    #[arg(long, env = "ABX_CONNECT_TIMEOUT_MS", default_value_t = 5_000)]
    connect_timeout_ms: u64,

    /// Socket read timeout in milliseconds (0 = block forever)
    #[arg(long, env = "ABX_READ_TIMEOUT_MS", default_value_t = 10_000)]
    read_timeout_ms: u64,

    /// Backfill passes over the remaining gaps
    #[arg(long, env = "ABX_BACKFILL_PASSES", default_value_t = 1,
          value_parser = clap::value_parser!(u32).range(1..))]
    backfill_passes: u32,

    /// Exit with an error when any sequence number stays unrecovered
    #[arg(long, default_value_t = false)]
    fail_on_gaps: bool,
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("resolving {host}:{port}"))?
        .next()
        .with_context(|| format!("no address for {host}:{port}"))
}

fn connect(args: &Args) -> Result<TcpStream> {
    let addr = resolve(&args.host, args.port)?;
    let stream = TcpStream::connect_timeout(&addr, Duration::from_millis(args.connect_timeout_ms))
        .with_context(|| format!("connecting to {addr}"))?;
    let read_timeout =
        (args.read_timeout_ms > 0).then(|| Duration::from_millis(args.read_timeout_ms));
    stream.set_read_timeout(read_timeout)?;
    stream.set_nodelay(true)?;
    info!(%addr, "connected to ABX exchange server");
    Ok(stream)
}

fn create_file(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn default_capture_path() -> PathBuf {
    let date = time::OffsetDateTime::now_local()
        .unwrap_or_else(|_| time::OffsetDateTime::now_utc())
        .date();
    let fname = format!("abx_{}_{:02}_{:02}.bin", date.year(), date.month() as u8, date.day());
    let mut p = PathBuf::from("captures");
    p.push(fname);
    p
}

fn write_outputs(args: &Args, report: &SessionReport) -> Result<()> {
    let w = create_file(&args.out)?;
    write_json(&report.records, w).with_context(|| format!("writing {}", args.out.display()))?;
    info!(path = %args.out.display(), records = report.records.len(), "JSON written");

    let capture = args.capture.clone().or_else(|| args.capture_default.then(default_capture_path));
    if let Some(path) = capture {
        let mut w = create_file(&path)?;
        let server = format!("{}:{}", args.host, args.port);
        write_report(&mut w, &server, report)
            .with_context(|| format!("writing capture {}", path.display()))?;
        info!(path = %path.display(), "capture written");
    }
    Ok(())
}

fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let stream = connect(&args)?;
    let mut session = Session::new(stream, SessionConfig { backfill_passes: args.backfill_passes });
    let report = match session.run() {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, stored = session.collector().len(), "session aborted");
            return Err(e).context("ABX session failed");
        }
    };
    // closes the socket
    drop(session);

    for seq in &report.unexpected_sequences {
        warn!(seq, "record with non-positive sequence number kept in output");
    }
    for f in &report.unrecovered {
        warn!(seq = f.sequence, cause = %f.cause, "sequence not recovered");
    }

    write_outputs(&args, &report)?;

    if args.fail_on_gaps && !report.is_complete() {
        bail!(
            "{} sequence number(s) unrecovered: {:?}",
            report.unrecovered.len(),
            report.missing()
        );
    }
    Ok(())
}
