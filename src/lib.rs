//! Tenant Groups Report
//!
//! Signs an administrator into a Microsoft 365 tenant, lists the directory
//! groups with their user member counts, and lets the result be searched,
//! filtered, saved as CSV, or mailed as an HTML table.
//!
//! # Overview
//!
//! - **Authentication**: interactive sign-in with silent token reacquisition
//! - **Graph access**: authenticated JSON calls against Microsoft Graph
//! - **Fetch pipeline**: group listing, exclusion rules, concurrent member counts
//! - **Filtering**: search text, group type and mail-enabled selectors
//! - **Export**: CSV download and HTML report mail
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use tenant_groups_report::{auth, config::Config, graph::HttpGraphClient, state::ReportState};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!
//!     let provider = auth::OAuthIdentityProvider::new(config.identity.clone());
//!     let session = Arc::new(auth::AuthSession::new(Box::new(provider)));
//!     session.login().await?;
//!
//!     let client = HttpGraphClient::new(session, config.graph.base_url.clone());
//!     let mut state = ReportState::new();
//!     state.refresh(&client, None).await?;
//!     print!("{}", state.table().render_text());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - Sign-in session and identity providers
//! - [`graph`] - Microsoft Graph client
//! - [`pipeline`] - Group fetch and member counting
//! - [`filter`] - Search and filter predicates
//! - [`table`] - Tabular projection of groups
//! - [`export`] - CSV and mail export
//! - [`state`] - Fetched and filtered group lists
//! - [`cli`] - Command-line interface
//! - [`interactive`] - Menu-driven session
//! - [`config`] - Configuration management
//! - [`error`] - Error types and result aliases
//! - [`models`] - Core data structures

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod graph;
pub mod interactive;
pub mod models;
pub mod pipeline;
pub mod state;
pub mod table;

pub use error::{ReportError, Result};

pub use models::{DirectoryObject, FilterCriteria, Group, GroupTypeFilter, MailEnabledFilter};

pub use auth::{Account, AuthSession, Credential, IdentityProvider, OAuthIdentityProvider};

pub use graph::{GraphClient, HttpGraphClient};

pub use config::Config;

pub use state::ReportState;

pub use table::{populate_table, ReportRow, ReportTable};

pub use cli::{Cli, Commands, ProgressReporter};
