use clap::{Args, Parser, Subcommand, ValueEnum};
use codetext_core::OutputKind;
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct ProjectConfigOpts {
    #[arg(
        short,
        long,
        help = "Directory to convert, or a GitHub repository URL (default: current dir).",
        value_name = "PATH_OR_URL",
        help_heading = "Project Setup"
    )]
    pub input: Option<String>,

    #[arg(
        long,
        help = "Path of the TOML config file (default: <input>/codetext.toml).",
        value_name = "CONFIG_FILE",
        conflicts_with = "no_config",
        help_heading = "Project Setup"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        help = "Disable loading any TOML config file.",
        conflicts_with = "config",
        help_heading = "Project Setup"
    )]
    pub no_config: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ExclusionOpts {
    #[arg(
        short,
        long,
        help = "Exclusion pattern; repeatable or comma-separated (e.g. '*.log,temp/').",
        value_name = "PATTERNS",
        help_heading = "Exclusion"
    )]
    pub exclude: Vec<String>,

    #[arg(
        long,
        help = "Exclude every file and directory whose name starts with '.'.",
        help_heading = "Exclusion"
    )]
    pub exclude_hidden: bool,

    #[arg(
        long,
        help = "Do not apply the built-in default exclusions.",
        help_heading = "Exclusion"
    )]
    pub no_default_excludes: bool,

    #[arg(
        long,
        help = "Project rule file, relative to the input directory (default: .exclude).",
        value_name = "FILE",
        help_heading = "Exclusion"
    )]
    pub rule_file: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTypeArg {
    #[value(alias = "txt")]
    Text,
    #[value(alias = "docx", alias = "xml")]
    Document,
    Json,
}

impl From<OutputTypeArg> for OutputKind {
    fn from(arg: OutputTypeArg) -> Self {
        match arg {
            OutputTypeArg::Text => OutputKind::Text,
            OutputTypeArg::Document => OutputKind::Document,
            OutputTypeArg::Json => OutputKind::Json,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Convert a source tree into a single text or document artifact.",
    long_about = "codetext walks a directory (or a cloned GitHub repository), drops everything \nmatched by the exclusion rules, and writes the folder structure followed by \nthe content of every remaining file into one output.",
    help_template = "{about-section}\nUsage: {usage}\n\n{all-args}{after-help}",
    after_help = "EXAMPLES:\n  codetext generate -i ./project -o project.txt\n  codetext generate -i https://github.com/user/repo -t document -o repo.xml\n  codetext rules -e '*.log,temp/' --exclude-hidden",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase message verbosity (-v, -vv).")]
    pub verbose: u8,

    #[arg(
        short,
        long,
        global = true,
        help = "Silence informational messages and warnings."
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    #[command(
        visible_alias = "g",
        visible_alias = "gen",
        about = "Convert the input tree and write the artifact."
    )]
    Generate(GenerateArgs),

    #[command(
        visible_alias = "r",
        about = "Show the merged exclusion rules without walking the tree."
    )]
    Rules(RulesArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub project_config: ProjectConfigOpts,

    #[command(flatten)]
    pub exclusion: ExclusionOpts,

    #[arg(
        short,
        long,
        help = "Write the artifact to this file instead of stdout.",
        value_name = "FILE",
        help_heading = "Output"
    )]
    pub output: Option<PathBuf>,

    #[arg(
        short = 't',
        long,
        alias = "output_type",
        value_enum,
        help = "Output type (default: text, or [output].kind from config).",
        value_name = "TYPE",
        help_heading = "Output"
    )]
    pub output_type: Option<OutputTypeArg>,

    #[arg(
        long,
        help = "Pretty-print JSON output.",
        help_heading = "Output"
    )]
    pub json_pretty: bool,

    #[arg(
        long,
        help = "Files larger than this are reported as binary (e.g. '512KB', '4 MiB').",
        value_name = "SIZE",
        help_heading = "Content"
    )]
    pub max_file_size: Option<String>,

    #[arg(
        short,
        long,
        help = "Number of reader threads (default: one per core, at most 12).",
        value_name = "N",
        value_parser = clap::value_parser!(usize),
        help_heading = "Content"
    )]
    pub jobs: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct RulesArgs {
    #[command(flatten)]
    pub project_config: ProjectConfigOpts,

    #[command(flatten)]
    pub exclusion: ExclusionOpts,
}
