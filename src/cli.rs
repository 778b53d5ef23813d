//! Command-line interface.

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use dlhub_core::config::AppConfig;
use dlhub_core::error::AppError;
use dlhub_core::result::AppResult;
use dlhub_service::SubmitRequest;

use crate::app::App;

/// DLHub: batch download job engine
#[derive(Debug, Parser)]
#[command(name = "dlhub", version, about = "Batch download job engine")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the worker pool until interrupted
    Run(RunArgs),
    /// Submit a batch download
    Submit {
        /// File ids, comma or space separated
        #[arg(required = true, value_delimiter = ',')]
        file_ids: Vec<i64>,
        /// Requester identity
        #[arg(long)]
        user: Option<String>,
        /// URL to POST the final status to
        #[arg(long)]
        webhook: Option<String>,
    },
    /// Show the status record of a job
    Status {
        /// Job id returned by `submit`
        job_id: String,
    },
    /// List every live status record
    List,
    /// Show queue statistics
    QueueStats,
}

/// Options for `run`
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Worker identifier (random if omitted)
    #[arg(long)]
    pub worker_id: Option<String>,
    /// Submit a batch before starting, e.g. `--submit 70000,70001`; repeatable
    #[arg(long = "submit", value_name = "FILE_IDS")]
    pub seed: Vec<String>,
    /// Stop once no job is waiting, delayed, or active
    #[arg(long)]
    pub exit_when_idle: bool,
}

impl Cli {
    /// Execute the selected subcommand
    pub async fn execute(self, config: AppConfig) -> AppResult<()> {
        let app = App::build(config).await?;

        if app.is_ephemeral() && !matches!(self.command, Command::Run(_)) {
            tracing::warn!(
                "backend.provider is 'memory'; state does not outlive this process. \
                 Set DLHUB__BACKEND__PROVIDER=redis to share state with a running worker."
            );
        }

        match self.command {
            Command::Run(args) => {
                let seed = args
                    .seed
                    .iter()
                    .map(|list| parse_file_ids(list))
                    .collect::<AppResult<Vec<_>>>()?;
                app.run_worker(args.worker_id, &seed, args.exit_when_idle)
                    .await
            }
            Command::Submit {
                file_ids,
                user,
                webhook,
            } => {
                let request = SubmitRequest {
                    file_ids,
                    user_id: user,
                    webhook_url: webhook,
                };
                print_json(&app.downloads.submit(request).await?)
            }
            Command::Status { job_id } => print_json(&app.downloads.get_status(&job_id).await?),
            Command::List => print_json(&app.downloads.list_all().await?),
            Command::QueueStats => print_json(&app.downloads.queue_stats().await?),
        }
    }
}

/// Parse `"1,2,3"` into file ids.
fn parse_file_ids(list: &str) -> AppResult<Vec<i64>> {
    list.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .map_err(|_| AppError::validation(format!("Invalid file id '{part}'")))
        })
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_ids() {
        assert_eq!(parse_file_ids("70000, 70001,").unwrap(), vec![70000, 70001]);
        assert!(parse_file_ids("1,x").is_err());
        assert!(parse_file_ids("").unwrap().is_empty());
    }

    #[test]
    fn test_cli_parses_submit() {
        let cli = Cli::try_parse_from(["dlhub", "submit", "1,2", "3", "--user", "u1"]).unwrap();
        match cli.command {
            Command::Submit { file_ids, user, .. } => {
                assert_eq!(file_ids, vec![1, 2, 3]);
                assert_eq!(user.as_deref(), Some("u1"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses_run_seed() {
        let cli =
            Cli::try_parse_from(["dlhub", "run", "--submit", "1,2", "--exit-when-idle"]).unwrap();
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.seed, vec!["1,2".to_string()]);
                assert!(args.exit_when_idle);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
