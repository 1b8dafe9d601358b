use clap::Parser;
use lambda_deployer::{
    cli::{Cli, Commands, ConfigCommands, DeployCommands},
    consts::DEFAULT_LOG_FILTER,
    main_actions::{self, AwsSettings},
};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", DEFAULT_LOG_FILTER);
    }

    tracing_subscriber::fmt()
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_level(true)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let settings = AwsSettings {
        profile: cli.profile,
        region: cli.region,
    };

    let result = match cli.command {
        Commands::Deploy { command } => match command {
            DeployCommands::Create { source, details } => {
                main_actions::create_lambda(settings, source, details).await
            }
            DeployCommands::Update {
                source,
                details,
                code_only,
            } => main_actions::update_lambda(settings, source, details, code_only).await,
            DeployCommands::Configuration { details } => {
                main_actions::update_configuration(settings, details).await
            }
        },
        Commands::Config { command } => match command {
            ConfigCommands::Print { details } => main_actions::print_configuration(details).await,
            ConfigCommands::Write { details, file } => {
                main_actions::write_configuration_to_file(file, details).await
            }
        },
    };

    if let Err(error) = result {
        let error = format!("{error:#}");
        tracing::error!(%error, "Exiting.");
        std::process::exit(1);
    }
}
