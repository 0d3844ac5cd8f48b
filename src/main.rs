use std::env;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context};
use fastboot_build::{BuildConfig, FastbootConfig, HtmlWriter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct Args {
    input_dir: PathBuf,
    out_dir: PathBuf,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fastboot_build=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    if let Err(err) = run() {
        eprintln!("[fastboot-build] {err:#}");
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = parse_args()?;

    let mut stdin_payload = String::new();
    io::stdin()
        .read_to_string(&mut stdin_payload)
        .context("failed to read stdin")?;
    if stdin_payload.trim().is_empty() {
        bail!("stdin payload is empty");
    }

    let config = BuildConfig::from_json(&stdin_payload).context("invalid build config JSON")?;
    let extensions = config.extensions();
    let builder = FastbootConfig::new(
        config.app_config,
        config.output_paths.clone(),
        config.project,
        extensions,
    );

    let report = builder
        .build(&args.out_dir)
        .context("manifest stage failed")?;
    for diagnostic in &report.diagnostics {
        tracing::debug!(?diagnostic.level, "{}", diagnostic.message);
    }

    let writer = HtmlWriter::from_prepared(&report.prepared, &config.output_paths);
    let tree = writer
        .build(&args.input_dir, &args.out_dir)
        .context("html stage failed")?;

    tracing::info!(
        descriptor_written = report.written,
        copied = tree.copied.len(),
        dropped = tree.dropped.len(),
        "build complete"
    );
    Ok(())
}

fn parse_args() -> anyhow::Result<Args> {
    let mut input_dir: Option<PathBuf> = None;
    let mut out_dir: Option<PathBuf> = None;
    let mut args = env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--input-dir" => {
                let value = args.next().context("--input-dir requires a value")?;
                input_dir = Some(PathBuf::from(value));
            }
            "--out-dir" => {
                let value = args.next().context("--out-dir requires a value")?;
                out_dir = Some(PathBuf::from(value));
            }
            other => bail!("unknown argument '{other}'"),
        }
    }

    Ok(Args {
        input_dir: input_dir.context("--input-dir is required")?,
        out_dir: out_dir.context("--out-dir is required")?,
    })
}
