use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "rollcall")]
#[command(about = "Webcam attendance capture with voice check-in", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Print version information
    Version,
    /// Inspect or configure the face classifier
    Classifier(ClassifierCliArgs),
    /// Search and view attendance history
    History(HistoryCliArgs),
    /// Show service logs and recent records
    Logs(LogsCliArgs),
}

#[derive(ClapArgs, Debug)]
pub struct ClassifierCliArgs {
    #[command(subcommand)]
    pub command: ClassifierCommand,
}

#[derive(Subcommand, Debug)]
pub enum ClassifierCommand {
    /// Show the current classifier configuration
    Show,
    /// Run the interactive classifier configuration wizard
    Configure,
    /// Validate the configured classifier, optionally against an image file
    Test {
        /// Image file to classify (JPEG)
        #[arg(short, long)]
        image: Option<std::path::PathBuf>,
    },
}

#[derive(ClapArgs, Debug)]
pub struct HistoryCliArgs {
    /// Search query to filter records by person name
    #[arg(short, long)]
    pub query: Option<String>,
    /// Filter by start date (YYYY-MM-DD format)
    #[arg(long)]
    pub from: Option<String>,
    /// Filter by end date (YYYY-MM-DD format)
    #[arg(long)]
    pub to: Option<String>,
    /// Maximum number of results to show
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
    /// ID of a specific record whose name is copied to the clipboard
    #[arg(short, long)]
    pub copy: Option<i64>,
}

#[derive(ClapArgs, Debug)]
pub struct LogsCliArgs {
    /// Number of log lines to show
    #[arg(short, long, default_value = "30")]
    pub lines: usize,
}
