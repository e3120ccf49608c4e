//! CLI tool for zipmerge archive operations.

mod commands;
mod exit_codes;
mod output;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use exit_codes::ExitCode;

/// Merge files and directories into ZIP archives
#[derive(Parser)]
#[command(name = "zipmerge")]
#[command(author, version, about = "Merge files and directories into ZIP archives", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value = "human", global = true)]
    format: OutputFormat,

    /// Suppress summary output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Number of threads (0 = auto)
    #[arg(long, short = 't', default_value = "0", global = true)]
    threads: usize,
}

#[derive(clap::Args)]
struct UpdateArgs {
    /// Archive to create or update
    archive: PathBuf,

    /// Compression level (1-9)
    #[arg(short = 'l', long, default_value = "6", allow_negative_numbers = true)]
    level: i64,

    /// Directory under which staging directories are created
    #[arg(long, env = "ZIPMERGE_STAGING_ROOT")]
    staging_root: Option<PathBuf>,

    /// Write to a temporary file and rename it over the archive
    #[arg(long)]
    atomic: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge a single file into an archive
    #[command(alias = "f")]
    AddFile {
        /// File to add
        source: PathBuf,

        #[command(flatten)]
        update: UpdateArgs,
    },

    /// Merge a directory's contents into an archive
    #[command(alias = "d")]
    AddDir {
        /// Directory to merge
        source: PathBuf,

        #[command(flatten)]
        update: UpdateArgs,
    },

    /// Extract an archive (alias: x)
    #[command(alias = "x")]
    Extract {
        /// Archive file to extract
        archive: PathBuf,

        /// Output directory
        #[arg(short = 'o', long, default_value = ".")]
        output: PathBuf,

        /// Skip restoring permissions and timestamps
        #[arg(long)]
        no_preserve_metadata: bool,
    },

    /// List archive contents (alias: l)
    #[command(alias = "l")]
    List {
        /// Archive file to list
        archive: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

fn main() {
    // The first Ctrl+C lets the running operation finish so its staging
    // directory is released. A second one exits at once.
    ctrlc::set_handler(move || {
        if INTERRUPTED.swap(true, Ordering::SeqCst) {
            std::process::exit(exit_codes::USER_INTERRUPT);
        }
        eprintln!("\nInterrupted, finishing the current operation");
    })
    .ok();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::AddFile { source, update } => commands::update(&commands::UpdateConfig {
            kind: zipmerge::SourceKind::File,
            source: &source,
            archive_path: &update.archive,
            level: update.level,
            staging_root: update.staging_root.as_deref(),
            atomic: update.atomic,
            format: cli.format,
            quiet: cli.quiet,
            thread_count: cli.threads,
        }),

        Commands::AddDir { source, update } => commands::update(&commands::UpdateConfig {
            kind: zipmerge::SourceKind::Directory,
            source: &source,
            archive_path: &update.archive,
            level: update.level,
            staging_root: update.staging_root.as_deref(),
            atomic: update.atomic,
            format: cli.format,
            quiet: cli.quiet,
            thread_count: cli.threads,
        }),

        Commands::Extract {
            archive,
            output,
            no_preserve_metadata,
        } => commands::extract(&commands::ExtractConfig {
            archive_path: &archive,
            output_dir: &output,
            preserve_metadata: !no_preserve_metadata,
            format: cli.format,
            quiet: cli.quiet,
            thread_count: cli.threads,
        }),

        Commands::List { archive } => commands::list(&archive, cli.format),

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut std::io::stdout());
            ExitCode::Success
        }
    };

    if INTERRUPTED.load(Ordering::SeqCst) {
        std::process::exit(exit_codes::USER_INTERRUPT);
    }
    std::process::exit(exit_code.code());
}
