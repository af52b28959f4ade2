use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Inspect quarry entity definitions and render SQL",
    arg_required_else_help = true
)]
pub struct Args {
    /// Increase logging verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Emit logs and command output as JSON
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to the entity definitions file
    #[arg(short, long, global = true)]
    pub entities: Option<String>,

    /// SQL dialect (generic, mysql, postgres, sqlite)
    #[arg(short, long, global = true)]
    pub dialect: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the stored columns of entities
    #[clap(name = "describe", visible_alias = "desc")]
    Describe {
        /// Entities to describe; all when omitted
        #[arg(required = false)]
        entities: Vec<String>,
    },

    /// Validate the entity definitions file
    #[clap(name = "check")]
    Check,

    /// Render a SELECT over an entity
    #[clap(name = "render")]
    Render(RenderArgs),

    /// Print the effective configuration
    #[clap(name = "config")]
    Config {
        /// Print the annotated default configuration instead
        #[arg(long)]
        default: bool,
    },

    /// Write the annotated default configuration file
    #[clap(name = "defconfig")]
    DefConfig,
}

#[derive(clap::Args, Clone, Debug, Default)]
pub struct RenderArgs {
    /// Entity to query
    pub entity: String,

    /// Property paths to select, e.g. `name` or `team.name`; COUNT(*) when omitted
    #[arg(short, long = "select")]
    pub select: Vec<String>,

    /// Filters such as `age>=18`, `team.name=core` or `name~A%`
    #[arg(short = 'w', long = "where")]
    pub filters: Vec<String>,

    /// Sort keys such as `name` or `age:desc`
    #[arg(short, long = "order")]
    pub order: Vec<String>,

    #[arg(short, long)]
    pub limit: Option<u64>,

    #[arg(long)]
    pub offset: Option<u64>,

    /// Render one clause per line
    #[arg(short, long)]
    pub pretty: bool,

    /// Print placeholder SQL and parameters instead of inlined values
    #[arg(long)]
    pub params: bool,
}
