use crate::demo::{run_demo, run_template_check, DemoArgs, TemplateCheckArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use fieldaudit::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "FieldAudit Service",
    about = "Run the audit execution and scoring service from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect checklist templates without starting the service
    Template {
        #[command(subcommand)]
        command: TemplateCommand,
    },
    /// Run an end-to-end CLI demo covering the full audit lifecycle
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum TemplateCommand {
    /// Validate a template CSV and print its item and category layout
    Check(TemplateCheckArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Template {
            command: TemplateCommand::Check(args),
        } => run_template_check(args),
        Command::Demo(args) => run_demo(args),
    }
}
