use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "docscore",
    version,
    about = "Accuracy evaluation of identity-document recognizers against ground truth"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Evaluate(EvaluateArgs),
    Inventory(InventoryArgs),
    Status(StatusArgs),
}

/// Where recognizer outputs live below the result directory.
#[derive(Args, Debug, Clone)]
pub struct LayoutArgs {
    #[arg(long)]
    pub ground_truth_path: Option<PathBuf>,

    #[arg(long, default_value = "good")]
    pub dataset: String,

    #[arg(long, default_value = "se")]
    pub se_dir: String,

    #[arg(long, default_value = "pv")]
    pub pv_dir: String,

    #[arg(long, default_value = "gm")]
    pub metadata_dir: String,

    #[arg(long, default_value_t = false)]
    pub has_header: bool,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[arg(default_value = "data/")]
    pub data_dir: PathBuf,

    #[arg(default_value = "result/")]
    pub result_dir: PathBuf,

    pub feature_path: Option<PathBuf>,

    #[command(flatten)]
    pub layout: LayoutArgs,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub allow_partial: bool,
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[arg(default_value = "data/")]
    pub data_dir: PathBuf,

    #[arg(default_value = "result/")]
    pub result_dir: PathBuf,

    #[command(flatten)]
    pub layout: LayoutArgs,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(default_value = "result/")]
    pub result_dir: PathBuf,

    #[arg(long)]
    pub report_path: Option<PathBuf>,
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Evaluate(_) => "evaluate",
            Self::Inventory(_) => "inventory",
            Self::Status(_) => "status",
        }
    }
}

impl LayoutArgs {
    pub fn ground_truth_path(&self, data_dir: &std::path::Path) -> PathBuf {
        self.ground_truth_path
            .clone()
            .unwrap_or_else(|| data_dir.join("good.csv"))
    }
}

pub fn default_report_path(result_dir: &std::path::Path) -> PathBuf {
    result_dir.join("evaluation_report.json")
}

pub fn default_inventory_path(result_dir: &std::path::Path) -> PathBuf {
    result_dir.join("manifests").join("dataset_inventory.json")
}
