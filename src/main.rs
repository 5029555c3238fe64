mod cli;
mod db;
mod error;
mod fmt;
mod loader;
mod logging;
mod models;
mod pipeline;
mod router;
mod scanner;
mod schema;
mod settings;
mod store;
mod table;
mod validator;
mod warehouse;

use clap::Parser;

use cli::init::InitArgs;
use cli::{Cli, Commands};
use settings::resolve_settings;

fn main() {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let settings_path = cli.settings_path();
    let settings = || resolve_settings(&settings_path);
    let result = match cli.command {
        Commands::Init {
            storage_root,
            bucket,
            project,
            table,
            warehouse,
            validation,
            write_disposition,
        } => cli::init::run(
            &settings_path,
            InitArgs {
                storage_root,
                bucket,
                project,
                table,
                warehouse,
                validation,
                write_disposition,
            },
        ),
        Commands::Put { files } => settings().and_then(|s| cli::put::run(&s, &files)),
        Commands::Run { phase, json } => settings().and_then(|s| cli::run::run(&s, phase, json)),
        Commands::Validate { file, strict, json } => {
            settings().and_then(|s| cli::validate::run(&s, &file, strict, json))
        }
        Commands::Recover => settings().and_then(|s| cli::recover::run(&s)),
        Commands::Status => settings().and_then(|s| cli::status::run(&s)),
        Commands::Rows { limit } => settings().and_then(|s| cli::rows::run(&s, limit)),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
