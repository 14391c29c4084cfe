mod args;
mod commands;
mod error;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up API keys and pipeline knobs from a local .env if present.
    dotenvy::dotenv().ok();

    let cli = args::Cli::parse();
    murmur_core::set_verbose(cli.verbose);

    let result = match cli.command {
        args::Commands::Transcribe {
            file,
            provider,
            language,
            prompt,
            output,
            workdir,
        } => commands::transcribe::run(file, provider, language, prompt, output, workdir).await,
        args::Commands::Providers => commands::providers::run(),
    };

    if let Err(err) = result {
        error::display_error(&err);
        std::process::exit(1);
    }
    Ok(())
}
