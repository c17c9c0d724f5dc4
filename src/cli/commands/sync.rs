//! The synchronization loop.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::{error, info};

use crate::cli::output::{join_or_dash, list_table, output, CommandOutput};
use crate::domain::errors::DomainResult;
use crate::domain::models::Config;
use crate::services::triggerable::{SyncReport, Triggerable};

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Run a single pass and exit
    #[arg(long)]
    pub once: bool,

    /// Triggerable configuration (overrides `triggerable_config`)
    #[arg(short, long)]
    pub triggerable: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct UpdateOutput {
    pub id: u64,
    pub status: String,
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SyncPassOutput {
    pub submitted: Vec<u64>,
    pub updates: Vec<UpdateOutput>,
    pub failed_builders: Vec<String>,
}

impl From<&SyncReport> for SyncPassOutput {
    fn from(report: &SyncReport) -> Self {
        Self {
            submitted: report.submitted.clone(),
            updates: report
                .updates
                .iter()
                .map(|(id, update)| UpdateOutput {
                    id: *id,
                    status: update.status.to_string(),
                    url: update.url.clone(),
                })
                .collect(),
            failed_builders: report.failed_builders.clone(),
        }
    }
}

impl CommandOutput for SyncPassOutput {
    fn to_human(&self) -> String {
        let summary = format!(
            "Submitted: {}\nUnreachable builders: {}",
            join_or_dash(&self.submitted),
            join_or_dash(&self.failed_builders)
        );
        if self.updates.is_empty() {
            return format!("{summary}\nNo build request updates.");
        }

        let mut table = list_table(&["request", "status", "url"]);
        for update in &self.updates {
            table.add_row(vec![
                update.id.to_string(),
                update.status.clone(),
                update.url.clone().unwrap_or_else(|| "-".to_string()),
            ]);
        }
        format!("{summary}\n{table}")
    }
}

/// Run one full pass: refresh the configuration against the manifest,
/// register the triggerable, then synchronize.
pub async fn run_pass(triggerable: &mut Triggerable) -> DomainResult<SyncReport> {
    triggerable.init_syncers().await?;
    triggerable.update_triggerable().await?;
    triggerable.sync_once().await
}

pub async fn execute(args: SyncArgs, config: &Config, json_mode: bool) -> Result<()> {
    let path = args.triggerable.as_ref().unwrap_or(&config.triggerable_config);
    let mut triggerable = super::connect(config, path)?;
    let once = args.once || config.sync.run_once;
    let pause = Duration::from_secs(config.sync.seconds_to_sleep);

    loop {
        match run_pass(&mut triggerable).await {
            Ok(report) if once => {
                output(&SyncPassOutput::from(&report), json_mode);
                return Ok(());
            }
            Ok(report) => info!(
                submitted = report.submitted.len(),
                updates = report.updates.len(),
                "synchronization pass finished"
            ),
            Err(err) if once => return Err(err).context("Synchronization pass failed"),
            Err(err) => error!(error = %err, "synchronization pass failed"),
        }

        info!(seconds = pause.as_secs(), "sleeping until the next pass");
        tokio::select! {
            () = tokio::time::sleep(pause) => {}
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for shutdown signal")?;
                info!("shutdown requested");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{BuildRequestStatus, BuildRequestUpdate};
    use std::collections::BTreeMap;

    #[test]
    fn test_pass_output_lists_updates() {
        let report = SyncReport {
            updates: BTreeMap::from([(
                702,
                BuildRequestUpdate {
                    status: BuildRequestStatus::Scheduled,
                    url: Some("http://build.webkit.org/builders/some%20tester/".to_string()),
                    build_number: None,
                },
            )]),
            submitted: vec![702],
            failed_builders: vec!["other builder".to_string()],
        };

        let rendered = SyncPassOutput::from(&report);
        let human = rendered.to_human();
        assert!(human.contains("Submitted: 702"));
        assert!(human.contains("Unreachable builders: other builder"));
        assert!(human.contains("REQUEST"));
        assert!(human.contains("scheduled"));
        assert_eq!(rendered.to_json()["updates"][0]["status"], "scheduled");
    }

    #[test]
    fn test_empty_pass_output() {
        let human = SyncPassOutput::from(&SyncReport::default()).to_human();
        assert!(human.contains("Submitted: -"));
        assert!(human.contains("No build request updates."));
    }
}
