use anyhow::Result;
use clap::Parser;
use concept_video::config::Config;
use concept_video::init;
use concept_video::orchestrator::ChapterOutcome;
use concept_video::VideoPipeline;
use std::path::PathBuf;

const EXIT_NOTHING_PRODUCED: i32 = 2;

#[derive(Debug, Parser)]
#[command(name = "concept-video", about = "Turn a short concept into an explanatory video")]
struct Cli {
    /// Concept to explain, e.g. "area of a square".
    concept: String,

    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Overrides `output_path` from the config file.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let mut cfg = Config::load(&cli.config).await?;
    if let Some(output) = cli.output {
        cfg.output_path = output;
    }

    init::ensure_directories(&cfg).await?;
    if !init::check_manim(&cfg).await {
        eprintln!("[WARNING] {} not runnable. Please install Manim.", cfg.manim_command.join(" "));
    }
    if !init::check_ffmpeg(&cfg).await {
        eprintln!("[WARNING] FFmpeg not found in PATH. Please install FFmpeg.");
    }

    let pipeline = VideoPipeline::from_config(&cfg)?;
    let report = pipeline.generate_video(&cli.concept).await?;

    println!("{}", report.title);
    for chapter in &report.chapters {
        match &chapter.outcome {
            ChapterOutcome::Rendered(path) => {
                println!("  {}. {}: rendered {}", chapter.index + 1, chapter.title, path.display());
            }
            ChapterOutcome::Skipped(reason) => {
                println!("  {}. {}: skipped: {}", chapter.index + 1, chapter.title, reason);
            }
        }
    }

    match &report.final_video {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => {
            println!("no video produced");
            std::process::exit(EXIT_NOTHING_PRODUCED);
        }
    }
}
