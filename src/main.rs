// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::PathBuf;

use yastdub::app_config::{self, Config};
use yastdub::app_controller::{Controller, RunOutcome};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

/// Options shared by every command that loads the configuration
#[derive(Parser, Debug, Clone)]
struct ConfigArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

#[derive(Parser, Debug, Clone)]
struct DubArgs {
    /// Subtitle file (SRT) providing the text and timing
    #[arg(value_name = "SUBTITLE")]
    subtitle: PathBuf,

    /// Source video to dub
    #[arg(value_name = "VIDEO")]
    video: PathBuf,

    /// Final output path (default: <work-dir>/final_video.mp4)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Force overwrite of an existing output file
    #[arg(short, long)]
    force_overwrite: bool,

    /// Voice identifier for speech synthesis
    #[arg(long)]
    voice: Option<String>,

    /// Tempo multiplier applied to synthesized speech
    #[arg(long)]
    tempo: Option<f64>,

    /// Directory holding intermediate artifacts
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Keep intermediate artifacts after a successful run
    #[arg(long)]
    keep_intermediates: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dub a video from a subtitle file (default command)
    Dub(DubArgs),

    /// Verify that the media tool and the speech API are reachable
    Check,

    /// Generate shell completions for yastdub
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// YASTdub - Yet Another Subtitle Dubber
///
/// Turns a subtitle file into spoken audio and rebuilds the video around it, one
/// subtitle line at a time.
#[derive(Parser, Debug)]
#[command(name = "yastdub")]
#[command(version)]
#[command(about = "Subtitle-driven video dubbing tool")]
#[command(long_about = "YASTdub synthesizes speech for every subtitle line, fits the matching video \
segment to the speech duration, and concatenates the dubbed segments into one video.

EXAMPLES:
    yastdub subs.srt movie.mp4                      # Dub using the default config
    yastdub subs.srt movie.mp4 -o dubbed.mp4 -f     # Choose the output, overwrite it
    yastdub dub subs.srt movie.mp4 --tempo 1.1      # Slower speech than the default
    yastdub check                                   # Verify ffmpeg and the speech API
    yastdub completions bash > yastdub.bash         # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    config: ConfigArgs,

    /// Subtitle file (SRT) providing the text and timing
    #[arg(value_name = "SUBTITLE")]
    subtitle: Option<PathBuf>,

    /// Source video to dub
    #[arg(value_name = "VIDEO")]
    video: Option<PathBuf>,

    /// Final output path (default: <work-dir>/final_video.mp4)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Force overwrite of an existing output file
    #[arg(short, long)]
    force_overwrite: bool,

    /// Voice identifier for speech synthesis
    #[arg(long)]
    voice: Option<String>,

    /// Tempo multiplier applied to synthesized speech
    #[arg(long)]
    tempo: Option<f64>,

    /// Directory holding intermediate artifacts
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Keep intermediate artifacts after a successful run
    #[arg(long)]
    keep_intermediates: bool,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger::new(LevelFilter::Trace)))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI colour and tag for a level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "ERROR"),
            Level::Warn => ("\x1B[1;33m", "WARN "),
            Level::Info => ("\x1B[1;32m", "INFO "),
            Level::Debug => ("\x1B[1;36m", "DEBUG"),
            Level::Trace => ("\x1B[1;35m", "TRACE"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (colour, tag) = Self::style_for_level(record.level());
            let _ = writeln!(
                std::io::stderr(),
                "{}{} {} {}\x1B[0m",
                colour, now, tag, record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info until the configuration says otherwise
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "yastdub", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Check) => {
            let config = load_config(&cli.config)?;
            let controller = Controller::with_config(config)?;
            controller.check().await
        }
        Some(Commands::Dub(args)) => run_dub(&cli.config, args).await,
        None => {
            // Default behaviour: top-level positional arguments
            let subtitle = cli.subtitle.ok_or_else(|| {
                anyhow!("SUBTITLE and VIDEO are required when no subcommand is specified")
            })?;
            let video = cli.video.ok_or_else(|| anyhow!("VIDEO is required"))?;

            let args = DubArgs {
                subtitle,
                video,
                output: cli.output,
                force_overwrite: cli.force_overwrite,
                voice: cli.voice,
                tempo: cli.tempo,
                work_dir: cli.work_dir,
                keep_intermediates: cli.keep_intermediates,
            };
            run_dub(&cli.config, args).await
        }
    }
}

/// Load (or create) the configuration and apply the log level
fn load_config(options: &ConfigArgs) -> Result<Config> {
    if let Some(level) = &options.log_level {
        log::set_max_level(level_filter(&level.clone().into()));
    }

    let (mut config, created) = Config::load_or_create(&options.config_path)?;
    if created {
        warn!("Config file not found at '{}', created a default one.", options.config_path);
    }

    match &options.log_level {
        Some(level) => config.log_level = level.clone().into(),
        None => log::set_max_level(level_filter(&config.log_level)),
    }

    Ok(config)
}

async fn run_dub(config_args: &ConfigArgs, args: DubArgs) -> Result<()> {
    let mut config = load_config(config_args)?;

    if let Some(voice) = args.voice {
        config.synthesis.voice = voice;
    }
    if let Some(tempo) = args.tempo {
        config.synthesis.tempo = tempo;
    }
    if let Some(work_dir) = args.work_dir {
        config.workspace.work_dir = work_dir;
    }
    if args.keep_intermediates {
        config.workspace.keep_intermediates = true;
    }

    let controller = Controller::with_config(config).context("Invalid configuration")?;
    match controller
        .run(args.subtitle, args.video, args.output, args.force_overwrite)
        .await?
    {
        RunOutcome::Completed(report) => info!("Success: {:?}", report.output),
        RunOutcome::Skipped(path) => info!("Nothing to do, {:?} already exists", path),
    }

    Ok(())
}
