use anyhow::Result;
use clap::Parser;
use indicatif::MultiProgress;
use std::io::Write;
use std::process;
use std::sync::{Arc, Mutex};
use tenant_groups_report::cli::{self, Cli, Commands, ProgressReporter};
use tenant_groups_report::config::Config;
use tenant_groups_report::error::ReportError;
use tenant_groups_report::graph::install_crypto_provider;
use tenant_groups_report::interactive;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Log sink that prints above any active progress bars
#[derive(Clone)]
struct MultiProgressWriter {
    multi: MultiProgress,
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MultiProgressWriter {
    fn new(multi: MultiProgress) -> Self {
        Self {
            multi,
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

fn poisoned<T>(_: T) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, "log buffer poisoned")
}

impl Write for MultiProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().map_err(poisoned)?.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut buffer = self.buffer.lock().map_err(poisoned)?;
        if !buffer.is_empty() {
            let msg = String::from_utf8_lossy(&buffer);
            let msg = msg.trim_end_matches('\n');
            if !msg.is_empty() {
                self.multi.println(msg)?;
            }
            buffer.clear();
        }
        Ok(())
    }
}

impl Drop for MultiProgressWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[derive(Clone)]
struct MultiProgressMakeWriter {
    multi: MultiProgress,
}

impl<'a> MakeWriter<'a> for MultiProgressMakeWriter {
    type Writer = MultiProgressWriter;

    fn make_writer(&'a self) -> Self::Writer {
        MultiProgressWriter::new(self.multi.clone())
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        display_error(&e);
        eprintln!("\nFor help, run: groups-report --help");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    install_crypto_provider();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("tenant_groups_report=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("tenant_groups_report=info,warn"))
    };

    let multi_progress = MultiProgress::new();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(MultiProgressMakeWriter {
            multi: multi_progress.clone(),
        })
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    match &cli.command {
        Commands::Report(args) => {
            let table = cli::run_report(&cli, args, multi_progress).await?;
            tracing::info!("Report finished with {} rows", table.len());
        }

        Commands::Interactive => {
            let config = cli.load_config().await?;
            interactive::run_interactive(config, ProgressReporter::new(multi_progress)).await?;
        }

        Commands::InitConfig { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at {:?}. Use --force to overwrite.",
                    output
                );
            }

            Config::create_example(output).await?;
            println!("Created example configuration at {:?}", output);
            println!("Set identity.client_id to your app registration's client id before signing in.");
        }
    }

    Ok(())
}

/// Print the error chain plus a hint for the common failure kinds
fn display_error(error: &anyhow::Error) {
    eprintln!("Error: {}", error);

    let mut cause = error.source();
    while let Some(e) = cause {
        eprintln!("  Caused by: {}", e);
        cause = e.source();
    }

    if let Some(report_err) = error.downcast_ref::<ReportError>() {
        match report_err {
            ReportError::AuthRequired | ReportError::AuthFailure(_) => {
                eprintln!("\nHint: Check identity.client_id and identity.tenant_id, and that");
                eprintln!("      the redirect URI http://localhost:<redirect_port> is registered.");
            }
            ReportError::ApiError { status: 403, .. } => {
                eprintln!("\nHint: The signed-in account needs consent for Group.Read.All and Mail.Send.");
            }
            ReportError::ConfigError(_) => {
                eprintln!("\nHint: Check your configuration file for errors.");
                eprintln!("      Run: groups-report init-config --force");
            }
            _ => {}
        }
    }
}
