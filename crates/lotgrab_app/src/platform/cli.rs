use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use lotgrab_engine::ConvertFormat;

use super::persistence::DEFAULT_CONFIG_PATH;

#[derive(Debug, Parser)]
#[command(name = "lotgrab", version)]
#[command(about = "Download lot images from an auction seller dashboard", long_about = None)]
pub struct Cli {
    /// More log detail (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Settings file remembering the last used options
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scrape a dashboard page and download the images of its lots
    Download(DownloadArgs),
    /// Convert a single image to PNG or JPEG
    Convert(ConvertArgs),
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Dashboard URL or a saved copy of the page
    #[arg(required_unless_present = "lots")]
    pub page: Option<String>,

    /// Read lot records from a JSON file instead of scraping a page
    #[arg(long, value_name = "FILE.json", conflicts_with = "page")]
    pub lots: Option<PathBuf>,

    /// Folder below the output directory (defaults to the auction name)
    #[arg(long)]
    pub folder: Option<String>,

    /// Leave out lots whose status is Pending
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub skip_pending: Option<bool>,

    /// Put each lot in its own folder
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub subfolders: Option<bool>,

    /// Look up every image of a lot, not only the thumbnail
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub all_images: Option<bool>,

    /// Download root
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Scrape a URL even if it is not a seller dashboard
    #[arg(long)]
    pub allow_any_page: bool,
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    pub url: String,

    #[arg(long, value_enum, default_value_t = FormatArg::Png)]
    pub format: FormatArg,

    /// Write the converted image here instead of printing a data URL
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Png,
    Jpeg,
}

impl From<FormatArg> for ConvertFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Png => ConvertFormat::Png,
            FormatArg::Jpeg => ConvertFormat::Jpeg,
        }
    }
}
