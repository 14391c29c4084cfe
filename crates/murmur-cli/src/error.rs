//! CLI error display with helpful hints and actionable messages

use anyhow::Error;
use murmur_core::{PipelineError, ProviderError};

/// Display an error to stderr with contextual hints for resolution.
pub fn display_error(err: &Error) {
    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::Provider(ProviderError::MissingApiKey { provider, env_var })) => {
            eprintln!("Error: No API key configured for {provider}");
            eprintln!();
            eprintln!("Hint: export {env_var}=<your key> or add it to a .env file");
        }

        Some(PipelineError::Provider(ProviderError::Auth { status, message })) => {
            eprintln!("Error: The provider rejected the API key (HTTP {status})");
            eprintln!("{message}");
            eprintln!();
            eprintln!("Hint: Check the key in your provider's console");
        }

        Some(PipelineError::Provider(ProviderError::QuotaExceeded(message))) => {
            eprintln!("Error: Provider quota exhausted");
            eprintln!("{message}");
            eprintln!();
            eprintln!("Hint: Check your provider's billing settings");
        }

        Some(PipelineError::Audio(audio)) => {
            eprintln!("Error: Could not read the input audio");
            eprintln!("{audio}");
            eprintln!();
            eprintln!("Hint: Common causes:");
            eprintln!("  - The file is not an audio/video container murmur supports");
            eprintln!("  - ffmpeg is not installed or not in PATH");
        }

        Some(PipelineError::Config(message)) => {
            eprintln!("Error: Invalid configuration");
            eprintln!("{message}");
        }

        _ => {
            eprintln!("Error: {err}");
            for cause in err.chain().skip(1) {
                eprintln!("  caused by: {cause}");
            }
        }
    }
}
