use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "murmur",
    about = "Batch speech-to-text transcription pipeline",
    version
)]
pub struct Cli {
    /// Print verbose progress information
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transcribe a local audio or video file end-to-end
    Transcribe {
        /// Path to the audio/video file
        file: PathBuf,

        /// Transcription provider (openai, groq, mistral, deepgram)
        #[arg(short, long, default_value = "openai")]
        provider: String,

        /// BCP-47 language tag of the spoken language
        #[arg(short, long, default_value = "en")]
        language: String,

        /// Optional vocabulary/style prompt forwarded to the provider
        #[arg(long)]
        prompt: Option<String>,

        /// Write the transcript JSON here instead of printing the text
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep working files (blob tree) in this directory
        #[arg(long)]
        workdir: Option<PathBuf>,
    },

    /// List the registered transcription providers
    Providers,
}
