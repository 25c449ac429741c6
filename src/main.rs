//! testgen-jira - JIRA integration for a test-generation tool
//!
//! Runs the HTTP facade, or browses tracker data through a running facade.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use testgen_jira::api::Credentials;
use testgen_jira::config::Settings;
use testgen_jira::error::AppError;
use testgen_jira::remote::{FacadeClient, API_BASE_URL_ENV};
use testgen_jira::{logging, server};

/// testgen-jira - JIRA integration for a test-generation tool
#[derive(Parser, Debug)]
#[command(name = "testgen-jira")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP facade
    Serve {
        /// Address to listen on (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Connect through a running facade and print tracker data as JSON
    Browse {
        /// Facade API base URL
        #[arg(long, env = API_BASE_URL_ENV)]
        api_base: Option<String>,

        /// Jira base URL (e.g. https://company.atlassian.net)
        #[arg(long, env = "JIRA_BASE_URL")]
        base_url: String,

        /// Jira account email
        #[arg(long, env = "JIRA_EMAIL")]
        email: String,

        /// Jira API token
        #[arg(long, env = "JIRA_API_TOKEN", hide_env_values = true)]
        token: String,

        /// List the sprints of this project
        #[arg(long)]
        project: Option<String>,

        /// List the stories of this sprint
        #[arg(long)]
        sprint: Option<String>,

        /// Show the details of this story
        #[arg(long)]
        story: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => return report(AppError::from(e)),
    };

    match cli.command {
        Commands::Serve { bind } => {
            let _guard = match logging::init(&settings.logging) {
                Ok(guard) => guard,
                Err(e) => {
                    eprintln!("Failed to initialize logging: {:#}", e);
                    return ExitCode::FAILURE;
                }
            };

            let mut settings = settings;
            if let Some(bind) = bind {
                settings.server.bind = bind;
            }
            let addr = match settings.bind_addr() {
                Ok(addr) => addr,
                Err(e) => return report(AppError::from(e)),
            };

            let result = server::serve(&settings, addr).await;
            logging::shutdown();
            match result {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Browse {
            api_base,
            base_url,
            email,
            token,
            project,
            sprint,
            story,
        } => {
            let mut client = match api_base {
                Some(base) => FacadeClient::new(&base),
                None => FacadeClient::from_env(),
            };
            let credentials = Credentials::new(base_url, email, token);
            match browse(&mut client, &credentials, project, sprint, story).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => report(e),
            }
        }
    }
}

async fn browse(
    client: &mut FacadeClient,
    credentials: &Credentials,
    project: Option<String>,
    sprint: Option<String>,
    story: Option<String>,
) -> Result<(), AppError> {
    client.connect(credentials).await?;

    let printed = fetch(client, project, sprint, story).await;
    let disconnected = client.disconnect().await;
    printed?;
    disconnected.map_err(AppError::from)
}

/// Print the selected listing. The session is left open for the caller to end.
async fn fetch(
    client: &FacadeClient,
    project: Option<String>,
    sprint: Option<String>,
    story: Option<String>,
) -> Result<(), AppError> {
    if let Some(id) = story {
        print_json(&client.story_details(&id).await?)
    } else if let Some(id) = sprint {
        print_json(&client.stories(&id).await?)
    } else if let Some(key) = project {
        print_json(&client.sprints(&key).await?)
    } else {
        print_json(&client.projects().await?)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Io(std::io::Error::other(e)))?;
    println!("{}", text);
    Ok(())
}

fn report(err: AppError) -> ExitCode {
    eprintln!("Error: {}", err.user_message());
    if let Some(action) = err.suggested_action() {
        eprintln!("Hint: {}", action);
    }
    ExitCode::FAILURE
}
