//! Menu-driven terminal session
//!
//! Each menu entry maps to one action. An action that fails is logged and
//! reported on a single line; the loop and the loaded groups carry on.

use crossterm::style::Stylize;
use inquire::InquireError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use crate::auth::AuthSession;
use crate::cli::{build_client, refresh_with_progress, ProgressReporter};
use crate::config::Config;
use crate::error::{ReportError, Result};
use crate::export;
use crate::graph::GraphClient;
use crate::models::{FilterCriteria, GroupTypeFilter, MailEnabledFilter};
use crate::state::ReportState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Login,
    FetchGroups,
    Filter,
    ShowTable,
    DownloadCsv,
    SendReport,
    Logout,
    Quit,
}

impl MenuAction {
    pub const ALL: [MenuAction; 8] = [
        MenuAction::Login,
        MenuAction::FetchGroups,
        MenuAction::Filter,
        MenuAction::ShowTable,
        MenuAction::DownloadCsv,
        MenuAction::SendReport,
        MenuAction::Logout,
        MenuAction::Quit,
    ];
}

impl std::fmt::Display for MenuAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MenuAction::Login => "Login",
            MenuAction::FetchGroups => "Fetch groups",
            MenuAction::Filter => "Filter",
            MenuAction::ShowTable => "Show table",
            MenuAction::DownloadCsv => "Download CSV",
            MenuAction::SendReport => "Send report",
            MenuAction::Logout => "Logout",
            MenuAction::Quit => "Quit",
        };
        write!(f, "{}", label)
    }
}

/// Prompt outcome: `None` when the user backed out with Esc
fn prompted<T>(result: std::result::Result<T, InquireError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled) => Ok(None),
        Err(InquireError::IO(e)) => Err(ReportError::IoError(e)),
        Err(e) => Err(ReportError::ValidationError(e.to_string())),
    }
}

/// State of one interactive run
pub struct InteractiveApp {
    session: Arc<AuthSession>,
    client: Arc<dyn GraphClient>,
    config: Config,
    state: ReportState,
    reporter: ProgressReporter,
}

impl InteractiveApp {
    pub fn new(
        session: Arc<AuthSession>,
        client: Arc<dyn GraphClient>,
        config: Config,
        reporter: ProgressReporter,
    ) -> Self {
        Self {
            session,
            client,
            config,
            state: ReportState::new(),
            reporter,
        }
    }

    pub fn state(&self) -> &ReportState {
        &self.state
    }

    /// Sign in, then fetch the group list
    ///
    /// A failed fetch is returned as the error, but the sign-in stands and the
    /// previously loaded groups are kept.
    pub async fn login(&mut self) -> Result<String> {
        self.config.validate_for_login()?;
        let spinner = self.reporter.add_spinner("Waiting for sign-in in the browser...");
        let result = self.session.login().await;
        spinner.finish_and_clear();
        let account = result?;
        println!("{} Signed in as {}", "✓".green(), account.display_label());

        self.fetch_groups().await
    }

    pub async fn logout(&mut self) -> Result<String> {
        match self.session.logout().await? {
            Some(account) => Ok(format!("Signed out {}", account.username)),
            None => Ok("No account was signed in".to_string()),
        }
    }

    pub async fn fetch_groups(&mut self) -> Result<String> {
        let count = refresh_with_progress(&mut self.state, self.client.as_ref(), &self.reporter).await?;
        Ok(format!("Loaded {} groups", count))
    }

    pub fn filter(&mut self, criteria: FilterCriteria) -> Result<String> {
        let kept = self.state.apply_filters(criteria);
        Ok(format!(
            "{} of {} groups match",
            kept,
            self.state.all_groups().len()
        ))
    }

    pub fn show_table(&self) -> Result<String> {
        let table = self.state.table();
        println!();
        print!("{}", table.render_text());
        Ok(format!(
            "Showing {} of {} groups",
            table.len(),
            self.state.all_groups().len()
        ))
    }

    pub async fn download_csv(&self, path: &Path) -> Result<String> {
        export::download_report_as_csv(&self.state.table(), path).await?;
        Ok(format!("CSV written to {:?}", path))
    }

    pub async fn send_report(&self, address: &str) -> Result<String> {
        export::send_report_as_mail(
            self.client.as_ref(),
            &self.state.table(),
            address,
            &self.config.report.mail_subject,
        )
        .await?;
        Ok("Report sent successfully!".to_string())
    }

    fn prompt_criteria(&self) -> Result<Option<FilterCriteria>> {
        let current = self.state.criteria();

        let Some(search) = prompted(
            inquire::Text::new("Search name or mail:")
                .with_default(current.search.as_deref().unwrap_or_default())
                .with_help_message("Leave empty to match every group")
                .prompt(),
        )?
        else {
            return Ok(None);
        };

        let Some(group_type) = prompted(
            inquire::Select::new(
                "Group type:",
                vec![
                    GroupTypeFilter::Any,
                    GroupTypeFilter::Security,
                    GroupTypeFilter::Distribution,
                ],
            )
            .prompt(),
        )?
        else {
            return Ok(None);
        };

        let Some(mail_enabled) = prompted(
            inquire::Select::new(
                "Mail enabled:",
                vec![MailEnabledFilter::Any, MailEnabledFilter::Yes, MailEnabledFilter::No],
            )
            .prompt(),
        )?
        else {
            return Ok(None);
        };

        let search = search.trim().to_string();
        Ok(Some(FilterCriteria {
            search: (!search.is_empty()).then_some(search),
            group_type,
            mail_enabled,
        }))
    }

    /// Run one menu action; `Ok(None)` when a prompt was cancelled
    async fn dispatch(&mut self, action: MenuAction) -> Result<Option<String>> {
        match action {
            MenuAction::Login => self.login().await.map(Some),
            MenuAction::FetchGroups => self.fetch_groups().await.map(Some),
            MenuAction::Filter => match self.prompt_criteria()? {
                Some(criteria) => self.filter(criteria).map(Some),
                None => Ok(None),
            },
            MenuAction::ShowTable => self.show_table().map(Some),
            MenuAction::DownloadCsv => {
                let Some(path) = prompted(
                    inquire::Text::new("Save CSV as:")
                        .with_default(&self.config.report.csv_filename)
                        .prompt(),
                )?
                else {
                    return Ok(None);
                };
                self.download_csv(&PathBuf::from(path)).await.map(Some)
            }
            MenuAction::SendReport => {
                let Some(address) = prompted(inquire::Text::new("Admin email:").prompt())? else {
                    return Ok(None);
                };
                let spinner = self.reporter.add_spinner("Sending report...");
                let result = self.send_report(&address).await;
                spinner.finish_and_clear();
                result.map(Some)
            }
            MenuAction::Logout => self.logout().await.map(Some),
            MenuAction::Quit => Ok(None),
        }
    }

    /// Menu loop until Quit or Ctrl-C
    pub async fn run(&mut self) -> Result<()> {
        loop {
            let account = self.session.active_account().await;
            let status = match &account {
                Some(account) => format!("signed in as {}", account.username),
                None => "not signed in".to_string(),
            };
            let groups = if self.state.is_loaded() {
                format!(
                    "{} of {} groups",
                    self.state.filtered_groups().len(),
                    self.state.all_groups().len()
                )
            } else {
                "no groups fetched".to_string()
            };
            let prompt = format!("[{} | {}] Choose an action:", status, groups);

            let action = match inquire::Select::new(&prompt, MenuAction::ALL.to_vec())
                .with_page_size(MenuAction::ALL.len())
                .prompt()
            {
                Ok(action) => action,
                Err(InquireError::OperationCanceled) => continue,
                Err(InquireError::OperationInterrupted) => break,
                Err(e) => return Err(ReportError::ValidationError(e.to_string())),
            };

            if action == MenuAction::Quit {
                break;
            }

            match self.dispatch(action).await {
                Ok(Some(message)) => println!("{} {}", "✓".green(), message),
                Ok(None) => {}
                Err(e) => {
                    error!("{} failed: {:?}", action, e);
                    println!("{} {}", "✗".red(), e);
                    if e.requires_login() {
                        println!("  Choose Login to sign in again.");
                    }
                }
            }
        }

        info!("Leaving interactive session");
        Ok(())
    }
}

/// Build the app for `config` and run the menu loop
pub async fn run_interactive(config: Config, reporter: ProgressReporter) -> Result<()> {
    let client = build_client(&config);
    let session = Arc::clone(client.session());
    let mut app = InteractiveApp::new(session, Arc::new(client), config, reporter);
    app.run().await
}
