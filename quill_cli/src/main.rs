use clap::{Parser, Subcommand};
use clap_verbosity_flag::Verbosity;
use quill_cli::{
    base_dir, clear_data, create_superuser, handle_error, init, list_migrations, migrate,
    rollback, serve, Result,
};

#[derive(Parser)]
#[command(
    name = "quill",
    version,
    about = "Manages the Quill blogging backend",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[command(flatten)]
    verbose: Verbosity,
}

#[derive(Subcommand)]
enum Commands {
    /// Write .quill/config.json with a newly generated signing secret.
    Init {
        /// Database file. Relative paths are relative to the current directory.
        #[arg(long)]
        database: Option<String>,
        /// Replace an existing config.
        #[arg(long)]
        force: bool,
    },
    /// Apply migrations.
    Migrate,
    /// List migrations.
    List,
    /// Undo the latest applied migration.
    Rollback,
    /// Serve the REST and GraphQL APIs.
    Serve {
        /// Address to listen on, overriding the config.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Create a user with every privilege.
    #[command(name = "createsuperuser")]
    CreateSuperuser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, env = "QUILL_SUPERUSER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Clear data.
    #[command(arg_required_else_help = true)]
    Clear {
        #[command(subcommand)]
        what: ClearCommands,
    },
}

#[derive(Subcommand)]
enum ClearCommands {
    /// Delete every row from every table. The schema is left intact.
    Data,
}

fn run(cli: Cli) -> Result<()> {
    let base = base_dir()?;
    match cli.command {
        Commands::Init { database, force } => init(&base, database.as_deref(), force),
        Commands::Migrate => migrate(&base),
        Commands::List => list_migrations(&base),
        Commands::Rollback => rollback(&base),
        Commands::Serve { bind } => serve(&base, bind),
        Commands::CreateSuperuser {
            username,
            email,
            password,
        } => create_superuser(&base, &username, email.as_deref(), &password),
        Commands::Clear { what } => match what {
            ClearCommands::Data => clear_data(&base),
        },
    }
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();
    handle_error(run(cli));
}
