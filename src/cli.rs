//! Command-line interface

use clap::{Args, Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::auth::{AuthSession, OAuthIdentityProvider};
use crate::config::Config;
use crate::error::Result;
use crate::export;
use crate::graph::{GraphClient, HttpGraphClient};
use crate::models::{FilterCriteria, GroupTypeFilter, MailEnabledFilter};
use crate::pipeline::ProgressCallback;
use crate::state::ReportState;
use crate::table::ReportTable;

#[derive(Parser, Debug)]
#[command(name = "groups-report")]
#[command(version)]
#[command(about = "Report on the directory groups of a Microsoft 365 tenant", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: PathBuf,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Application (client) id, overrides config and environment
    #[arg(long, global = true)]
    pub client_id: Option<String>,

    /// Tenant id or domain, overrides config and environment
    #[arg(long, global = true)]
    pub tenant_id: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in, fetch groups, print the filtered table and optionally export it
    Report(ReportArgs),

    /// Menu-driven session: login, fetch, filter, export, logout
    Interactive,

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ReportArgs {
    /// Case-insensitive text matched against group name or mail
    #[arg(short, long)]
    pub search: Option<String>,

    /// Restrict to security or distribution groups
    #[arg(long, value_enum, default_value = "any")]
    pub group_type: GroupTypeFilter,

    /// Restrict by the mail-enabled flag
    #[arg(long, value_enum, default_value = "any")]
    pub mail_enabled: MailEnabledFilter,

    /// Write the table to this CSV file
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Mail the table to this address
    #[arg(long)]
    pub mail: Option<String>,
}

impl ReportArgs {
    pub fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            search: self.search.clone().filter(|s| !s.is_empty()),
            group_type: self.group_type,
            mail_enabled: self.mail_enabled,
        }
    }
}

impl Cli {
    /// Load the config file, then layer the command-line overrides on top
    pub async fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(&self.config).await?;
        self.apply_overrides(&mut config);
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(client_id) = self.client_id.as_ref().filter(|s| !s.is_empty()) {
            config.identity.client_id = client_id.clone();
        }
        if let Some(tenant_id) = self.tenant_id.as_ref().filter(|s| !s.is_empty()) {
            config.identity.tenant_id = tenant_id.clone();
        }
    }
}

/// Progress reporter using indicatif
pub struct ProgressReporter {
    multi: MultiProgress,
    spinner_style: ProgressStyle,
    counter_style: ProgressStyle,
}

impl ProgressReporter {
    pub fn new(multi: MultiProgress) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed:>6}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        let counter_style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} [{elapsed:>6}] {pos:>5} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        Self {
            multi,
            spinner_style,
            counter_style,
        }
    }

    pub fn add_spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(self.spinner_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Spinner showing a running count, for work whose total is not known up front
    pub fn add_counter(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(self.counter_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Finish a spinner and clear it from the multi-progress display
    pub fn finish_spinner(&self, pb: &ProgressBar, msg: &str) {
        pb.finish_and_clear();
        println!("  ✓ {}", msg);
    }

    pub fn fail_spinner(&self, pb: &ProgressBar, msg: &str) {
        pb.finish_and_clear();
        println!("  ✗ {}", msg);
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(MultiProgress::new())
    }
}

/// Session and Graph client for `config`, sharing one [`AuthSession`]
pub fn build_client(config: &Config) -> HttpGraphClient {
    let provider = OAuthIdentityProvider::new(config.identity.clone());
    let session = Arc::new(AuthSession::new(Box::new(provider)));
    HttpGraphClient::new(session, config.graph.base_url.clone())
}

/// Refresh `state`, ticking a counter for every member lookup
pub async fn refresh_with_progress(
    state: &mut ReportState,
    client: &dyn GraphClient,
    reporter: &ProgressReporter,
) -> Result<usize> {
    let counter = reporter.add_counter("member lookups");
    let counter_clone = counter.clone();
    let on_progress: ProgressCallback = Arc::new(move || counter_clone.inc(1));

    match state.refresh(client, Some(on_progress)).await {
        Ok(count) => {
            reporter.finish_spinner(&counter, &format!("Fetched {} groups", count));
            Ok(count)
        }
        Err(e) => {
            reporter.fail_spinner(&counter, "Fetching groups failed");
            Err(e)
        }
    }
}

/// Run whichever exports `args` asks for
pub async fn export_requested(
    client: &dyn GraphClient,
    table: &ReportTable,
    args: &ReportArgs,
    config: &Config,
    reporter: &ProgressReporter,
) -> Result<()> {
    if let Some(path) = &args.csv {
        export::download_report_as_csv(table, path).await?;
        println!("  ✓ CSV written to {:?}", path);
    }

    if let Some(address) = &args.mail {
        let spinner = reporter.add_spinner(&format!("Sending report to {}...", address.trim()));
        match export::send_report_as_mail(client, table, address, &config.report.mail_subject).await {
            Ok(()) => reporter.finish_spinner(&spinner, "Report sent successfully!"),
            Err(e) => {
                reporter.fail_spinner(&spinner, "Sending report failed");
                return Err(e);
            }
        }
    }

    Ok(())
}

/// One-shot report: sign in, fetch, filter, print, export
pub async fn run_report(cli: &Cli, args: &ReportArgs, multi: MultiProgress) -> Result<ReportTable> {
    let reporter = ProgressReporter::new(multi);

    let config = cli.load_config().await?;
    config.validate_for_login()?;

    let client = build_client(&config);

    let login_spinner = reporter.add_spinner("Waiting for sign-in in the browser...");
    let account = match client.session().login().await {
        Ok(account) => account,
        Err(e) => {
            reporter.fail_spinner(&login_spinner, "Sign-in failed");
            return Err(e);
        }
    };
    reporter.finish_spinner(&login_spinner, &format!("Signed in as {}", account.username));

    let mut state = ReportState::new();
    refresh_with_progress(&mut state, &client, &reporter).await?;

    let criteria = args.criteria();
    if !criteria.is_empty() {
        let kept = state.apply_filters(criteria);
        info!("{} groups match the filter", kept);
    }

    let table = state.table();
    println!();
    print!("{}", table.render_text());
    println!();

    export_requested(&client, &table, args, &config, &reporter).await?;
    Ok(table)
}
