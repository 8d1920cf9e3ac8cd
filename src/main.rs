use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use foodgram::{
    actions::{import_ingredients, register_user},
    api::{self, Context},
    config::AppConfig,
    form::{IngredientForm, UserForm},
    pool::{connect, migrate},
    schema::UserRole,
};

/// foodgram - recipe sharing backend
#[derive(Parser)]
#[command(name = "foodgram")]
#[command(about = "Recipe sharing API server", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Server host address (overrides config file)
        #[arg(long)]
        host: Option<String>,

        /// Server port (overrides config file)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run database migrations
    Migrate,
    /// Import ingredients from a JSON array of {"name", "measurement_unit"}
    LoadIngredients { path: String },
    /// Create a user with the admin role
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    env_logger::Builder::from_env(Env::default().default_filter_or(config.log.level.as_str()))
        .init();

    match cli.command {
        Commands::Serve { host, port } => serve_command(config, host, port).await,
        Commands::Migrate => migrate_command(config).await,
        Commands::LoadIngredients { path } => load_ingredients_command(config, &path).await,
        Commands::CreateAdmin {
            email,
            username,
            password,
        } => create_admin_command(config, email, username, password).await,
    }
}

async fn serve_command(
    mut config: AppConfig,
    host_override: Option<String>,
    port_override: Option<u16>,
) -> Result<()> {
    if let Some(host) = host_override {
        config.server.host = host;
    }
    if let Some(port) = port_override {
        config.server.port = port;
    }

    let address: std::net::SocketAddr = config
        .address()
        .parse()
        .with_context(|| format!("Invalid listen address {}", config.address()))?;

    let pool = connect(&config.database).await?;
    let routes = api::routes(Context::new(pool, config.auth));

    let (bound, server) = warp::serve(routes).try_bind_with_graceful_shutdown(address, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for shutdown signal: {e}");
        }
        log::info!("Shutting down...");
    })?;

    log::info!("Listening on http://{bound}");
    server.await;

    Ok(())
}

async fn migrate_command(config: AppConfig) -> Result<()> {
    let pool = connect(&config.database).await?;
    migrate(&pool).await?;

    log::info!("Migrations applied");
    Ok(())
}

async fn load_ingredients_command(config: AppConfig, path: &str) -> Result<()> {
    let data = std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    let forms: Vec<IngredientForm> =
        serde_json::from_str(&data).with_context(|| format!("Failed to parse {path}"))?;

    let mut ingredients = Vec::with_capacity(forms.len());
    for (index, form) in forms.into_iter().enumerate() {
        let pair = form
            .validate()
            .map_err(|e| anyhow::anyhow!("Entry {index}: {}", e.body))?;
        ingredients.push(pair);
    }

    let pool = connect(&config.database).await?;
    let inserted = import_ingredients(&ingredients, &pool).await?;

    log::info!(
        "Imported {inserted} of {} ingredients ({} already present)",
        ingredients.len(),
        ingredients.len() as u64 - inserted
    );
    Ok(())
}

async fn create_admin_command(
    config: AppConfig,
    email: String,
    username: String,
    password: String,
) -> Result<()> {
    let form = UserForm {
        email: Some(email),
        username: Some(username),
        first_name: Some(String::from("admin")),
        last_name: Some(String::from("admin")),
        password: Some(password),
    }
    .validate()?;

    let pool = connect(&config.database).await?;
    let user = register_user(&pool, form, UserRole::Admin).await?;

    log::info!("Created admin {} ({})", user.username, user.id);
    Ok(())
}
