use clap::{Args, Parser, Subcommand, ValueEnum};
use fitgraph::core::convolution::ZeroSumPolicy;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "fitgraph CLI - evaluate refinement expression graphs on sampled profiles.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Broaden a profile with a resolution kernel, preserving its position and total intensity.
    Broaden(BroadenArgs),
}

/// Arguments for the `broaden` subcommand.
#[derive(Args, Debug)]
pub struct BroadenArgs {
    /// CSV file with the profile to broaden (one `y` column or `x,y` columns).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub profile: PathBuf,

    /// CSV file with the resolution kernel (one `y` column or `x,y` columns).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub kernel: PathBuf,

    /// Path for the broadened profile.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Graph configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the zero-sum policy from the config file.
    #[arg(long, value_enum, value_name = "POLICY", ignore_case = true)]
    pub zero_sum_policy: Option<ZeroSumPolicyArg>,
}

/// Command-line spelling of [`ZeroSumPolicy`].
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroSumPolicyArg {
    /// Fail the evaluation.
    Error,
    /// Write a NaN-filled profile and keep going.
    Nan,
}

impl From<ZeroSumPolicyArg> for ZeroSumPolicy {
    fn from(arg: ZeroSumPolicyArg) -> Self {
        match arg {
            ZeroSumPolicyArg::Error => ZeroSumPolicy::Error,
            ZeroSumPolicyArg::Nan => ZeroSumPolicy::Nan,
        }
    }
}
