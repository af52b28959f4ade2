use check::check_entities;
use clap::Parser;
use cli::{Args, Commands};
use describe::describe_entities;
use error::CliResult;
use logging::setup_logging;
use quarry_config::{
    config::{config_path, generate_default_config, Config},
    paths::resolve_path,
};
use render::render_query;
use session::Session;
use tracing::{debug, info};
use utils::set_color;

mod check;
mod cli;
mod describe;
mod error;
mod logging;
mod render;
mod session;
mod utils;

async fn handle_cli() -> CliResult<()> {
    let args = Args::parse();

    setup_logging(&args);
    set_color(!args.no_color);
    debug!("starting quarry");

    match &args.command {
        Commands::DefConfig => {
            let path = match &args.config {
                Some(path) => resolve_path(path)?,
                None => config_path(),
            };
            generate_default_config(&path)?;
            info!("Default config written to {}", path.display());
        }
        Commands::Config {
            default: true,
        } => {
            let document = Config::default_config().to_annotated_document()?;
            info!("{}", document);
        }
        command => {
            let session = Session::load(&args)?;

            match command {
                Commands::Describe {
                    entities,
                } => describe_entities(&session, entities)?,
                Commands::Check => check_entities(&session)?,
                Commands::Render(render) => render_query(&session, render)?,
                Commands::Config {
                    ..
                } => {
                    let mut config = session.config.clone();
                    config.dialect = Some(session.dialect);
                    config.entities_path = Some(session.entities_path.display().to_string());
                    info!("{}", config.to_annotated_document()?);
                }
                Commands::DefConfig => unreachable!(),
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    if let Err(err) = handle_cli().await {
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(1);
    }
}
