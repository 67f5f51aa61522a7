use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, ClientSettings, ImageFile, InMemoryPreviewStore, OutcomeDisposition,
    PredictionClient, SessionController, SessionPhase,
};
use shared::domain::RoastCatalog;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod render;

use render::{OutputFormat, SessionRenderer};

#[derive(Parser, Debug)]
#[command(name = "roastcheck", about = "Classify the roast level of coffee beans from a photo")]
struct Cli {
    /// Origin of the prediction service; `/predict` is appended.
    #[arg(long, global = true)]
    api_base_url: Option<String>,
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    #[arg(long, global = true)]
    log_filter: Option<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Select, submit and report a single image.
    Classify { path: PathBuf },
    /// Interactive session reading commands from stdin.
    Session,
    /// List the roast levels the model can report.
    Profiles,
}

#[derive(Debug, PartialEq, Eq)]
enum SessionCommand {
    Select(PathBuf),
    Submit,
    Reset,
    Show,
    Profiles,
    Help,
    Quit,
}

const SESSION_HELP: &str =
    "commands: select <path>, submit, reset, show, profiles, help, quit";

fn parse_session_command(line: &str) -> Option<Result<SessionCommand, String>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (verb, rest) = line
        .split_once(char::is_whitespace)
        .map(|(verb, rest)| (verb, rest.trim()))
        .unwrap_or((line, ""));

    let command = match verb.to_ascii_lowercase().as_str() {
        "select" | "open" if rest.is_empty() => Err("select needs a file path".to_string()),
        "select" | "open" => Ok(SessionCommand::Select(PathBuf::from(rest))),
        "submit" | "analyze" => Ok(SessionCommand::Submit),
        "reset" => Ok(SessionCommand::Reset),
        "show" | "status" => Ok(SessionCommand::Show),
        "profiles" => Ok(SessionCommand::Profiles),
        "help" | "?" => Ok(SessionCommand::Help),
        "quit" | "exit" => Ok(SessionCommand::Quit),
        other => Err(format!("unknown command '{other}'")),
    };
    Some(command)
}

fn apply_cli_overrides(settings: &mut ClientSettings, cli: &Cli) {
    if let Some(v) = &cli.api_base_url {
        settings.api_base_url = Some(v.clone());
    }
    if let Some(v) = cli.timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = &cli.log_filter {
        settings.log_filter = v.clone();
    }
}

fn init_tracing(cli_filter: Option<&str>, settings: &ClientSettings) {
    let filter = cli_filter
        .map(EnvFilter::new)
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_controller(settings: &ClientSettings) -> Result<SessionController> {
    let client = PredictionClient::from_settings(settings)
        .context("failed to configure prediction client")?;
    info!(endpoint = %client.endpoint(), "roastcheck: prediction endpoint configured");
    Ok(SessionController::new(
        Arc::new(client),
        Arc::new(InMemoryPreviewStore::new()),
    ))
}

async fn classify(
    mut controller: SessionController,
    path: PathBuf,
    renderer: &mut dyn SessionRenderer,
) -> Result<ExitCode> {
    let file = ImageFile::read(&path).await?;
    controller.select_image(file)?;
    renderer.render(&controller.view())?;

    controller.submit()?;
    renderer.render(&controller.view())?;

    controller.next_outcome().await;
    renderer.render(&controller.view())?;

    Ok(if controller.phase() == SessionPhase::Resolved {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn show_outcome(
    controller: &SessionController,
    disposition: OutcomeDisposition,
    renderer: &mut dyn SessionRenderer,
) -> Result<()> {
    match disposition {
        OutcomeDisposition::Applied(_) => renderer.render(&controller.view())?,
        OutcomeDisposition::Stale => debug!("roastcheck: stale prediction ignored"),
    }
    Ok(())
}

/// At end of input, pending predictions are still awaited and rendered.
async fn run_session<R>(
    mut controller: SessionController,
    input: R,
    renderer: &mut dyn SessionRenderer,
) -> Result<ExitCode>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    renderer.notice(SESSION_HELP)?;
    renderer.render(&controller.view())?;

    loop {
        tokio::select! {
            Some(disposition) = controller.next_outcome() => {
                show_outcome(&controller, disposition, renderer)?;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read session input")? else {
                    break;
                };
                let command = match parse_session_command(&line) {
                    None => continue,
                    Some(Ok(command)) => command,
                    Some(Err(message)) => {
                        renderer.notice(&message)?;
                        continue;
                    }
                };

                match command {
                    SessionCommand::Select(path) => {
                        let selected = match ImageFile::read(&path).await {
                            Ok(file) => controller.select_image(file).map(|_| ()),
                            Err(err) => Err(err),
                        };
                        match selected {
                            Ok(()) => renderer.render(&controller.view())?,
                            Err(err) => renderer.notice(&format!("selection rejected: {err}"))?,
                        }
                    }
                    SessionCommand::Submit => match controller.submit() {
                        Ok(_) => renderer.render(&controller.view())?,
                        Err(err) => renderer.notice(&err.to_string())?,
                    },
                    SessionCommand::Reset => {
                        controller.reset();
                        renderer.render(&controller.view())?;
                    }
                    SessionCommand::Show => renderer.render(&controller.view())?,
                    SessionCommand::Profiles => renderer.profiles(RoastCatalog::all())?,
                    SessionCommand::Help => renderer.notice(SESSION_HELP)?,
                    SessionCommand::Quit => return Ok(ExitCode::SUCCESS),
                }
            }
        }
    }

    debug!(in_flight = controller.in_flight(), "roastcheck: input closed");
    while let Some(disposition) = controller.next_outcome().await {
        show_outcome(&controller, disposition, renderer)?;
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut settings = load_settings().context("failed to load settings")?;
    apply_cli_overrides(&mut settings, &cli);
    init_tracing(cli.log_filter.as_deref(), &settings);

    let mut renderer = render::renderer(cli.format, std::io::stdout());

    match cli.command {
        Command::Profiles => {
            renderer.profiles(RoastCatalog::all())?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Classify { path } => {
            classify(build_controller(&settings)?, path, renderer.as_mut()).await
        }
        Command::Session => {
            let stdin = BufReader::new(tokio::io::stdin());
            run_session(build_controller(&settings)?, stdin, renderer.as_mut()).await
        }
    }
}
