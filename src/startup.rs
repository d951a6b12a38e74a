use clap::Parser;
use std::path::PathBuf;

/// Browses the first pages of the PDF files in a folder.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "pdf-shelf", version)]
pub struct StartupOptions {
    /// Folder to open; the last folder is restored when absent.
    pub folder: Option<PathBuf>,

    /// Only show documents whose name contains TEXT (case-insensitive).
    #[arg(short, long, value_name = "TEXT")]
    pub search: Option<String>,

    /// Only show favorited documents.
    #[arg(short, long)]
    pub favorites: bool,

    /// Viewport width used to lay out the grid.
    #[arg(short, long, value_name = "PX", default_value_t = 800)]
    pub width: u32,

    /// Keep running and reload when the folder changes.
    #[arg(long)]
    pub watch: bool,
}
