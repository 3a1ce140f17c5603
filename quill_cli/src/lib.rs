#![doc(hidden)]
//! Commands behind the `quill` binary.
//!
//! Every command works relative to a base directory, normally the current
//! directory, whose `.quill/config.json` is written by [`init`].
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use quill::config::{Config, JwtConfig, CONFIG_DIR};
use quill_core::db::{self, Connection};
use quill_core::models::NewUser;
use quill_core::{handlers, migrations, ConnectionSpec};

pub type Result<T> = std::result::Result<T, anyhow::Error>;

/// Relative database paths are taken relative to `base`.
fn resolve_database(base: &Path, spec: &ConnectionSpec) -> ConnectionSpec {
    let path = Path::new(&spec.conn_str);
    if spec.is_memory() || path.is_absolute() {
        spec.clone()
    } else {
        ConnectionSpec::new(base.join(path).to_string_lossy())
    }
}

/// Write a fresh config with a generated signing secret.
pub fn init(base: &Path, database: Option<&str>, force: bool) -> Result<()> {
    let path = Config::default_path(base);
    if path.exists() && !force {
        bail!(
            "{} already exists. Use --force to replace it.",
            path.display()
        );
    }
    let mut config = Config::default();
    if let Some(database) = database {
        config.database = ConnectionSpec::new(database);
    }
    config.jwt = JwtConfig {
        secret: JwtConfig::generate_secret(),
        ..JwtConfig::default()
    };

    fs::create_dir_all(base.join(CONFIG_DIR))?;
    db::connect(&resolve_database(base, &config.database))
        .with_context(|| format!("cannot open database {}", config.database.conn_str))?;
    config.save(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// The config under `base` with environment overrides applied.
pub fn load_config(base: &Path) -> Result<Config> {
    let path = Config::default_path(base);
    if !path.exists() {
        bail!("No Quill configuration found. Did you run quill init?");
    }
    let mut config = Config::load(&path)?;
    config.apply_env();
    config.database = resolve_database(base, &config.database);
    Ok(config)
}

fn connect(base: &Path) -> Result<Connection> {
    let config = load_config(base)?;
    Ok(db::connect(&config.database)?)
}

pub fn migrate(base: &Path) -> Result<()> {
    let mut conn = connect(base)?;
    let to_apply = migrations::unapplied_migrations(&conn)?;
    println!("{} migrations to apply", to_apply.len());
    for m in to_apply {
        println!("Applying migration {}", m.name());
        m.apply(&mut conn)?;
    }
    Ok(())
}

pub fn list_migrations(base: &Path) -> Result<()> {
    let conn = connect(base)?;
    let unapplied = migrations::unapplied_migrations(&conn)?;
    for m in migrations::MIGRATIONS {
        let m_state = match unapplied.contains(&m) {
            true => "not applied",
            false => "applied",
        };
        println!("Migration '{}' ({})", m.name(), m_state);
    }
    Ok(())
}

/// Undo the most recently applied migration.
pub fn rollback(base: &Path) -> Result<()> {
    let mut conn = connect(base)?;
    match migrations::last_applied_migration(&conn)? {
        Some(m) => {
            println!("Rolling back migration {}", m.name());
            m.downgrade(&mut conn)?;
        }
        None => bail!("No migrations applied!"),
    }
    Ok(())
}

/// Delete every row, keeping the schema.
pub fn clear_data(base: &Path) -> Result<()> {
    let mut conn = connect(base)?;
    if migrations::last_applied_migration(&conn)?.is_none() {
        bail!("No migrations have been applied, so no data is recognized.");
    }
    migrations::clear_data(&mut conn)?;
    println!("Deleted all data");
    Ok(())
}

pub fn create_superuser(
    base: &Path,
    username: &str,
    email: Option<&str>,
    password: &str,
) -> Result<()> {
    let mut conn = connect(base)?;
    if !migrations::unapplied_migrations(&conn)?.is_empty() {
        bail!("The database is not fully migrated. Run quill migrate first.");
    }
    let input = NewUser {
        username: username.to_string(),
        email: email.map(str::to_string),
        password: password.to_string(),
    };
    let user = handlers::create_superuser(&mut conn, input)?;
    println!("Superuser {} created with id {}", user.username, user.id);
    Ok(())
}

/// Run the server until interrupted. `bind` replaces the configured
/// address.
pub fn serve(base: &Path, bind: Option<String>) -> Result<()> {
    let mut config = load_config(base)?;
    if let Some(bind) = bind {
        config.bind = bind;
    }
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(quill::serve(config))?;
    Ok(())
}

pub fn base_dir() -> Result<PathBuf> {
    std::env::current_dir().map_err(|e| e.into())
}

pub fn handle_error(r: Result<()>) {
    if let Err(e) = r {
        log::debug!("{e:?}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
