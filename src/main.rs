use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, middleware::Logger, web};
use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use medclinic::config::Config;
use medclinic::crypto::LabDataCipher;
use medclinic::{AppState, db, routes, seed};

#[derive(Parser)]
#[command(name = "medclinic", about = "Clinic management backend", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run pending migrations, then serve the HTTP API (default)
    Serve,
    /// Run pending migrations and exit
    Migrate,
    /// Create the default clinic, departments, admin and doctors
    Seed,
    /// Print a fresh base64 key for LAB_DATA_KEY
    Keygen,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,actix_web=info")))
        .init();

    match Cli::parse().command.unwrap_or(Command::Serve) {
        Command::Serve => serve(Config::from_env()?).await,
        Command::Migrate => {
            let config = Config::from_env()?;
            let pool = db::build_pool(&config.database_url, 1)?;
            db::run_migrations(&pool)
        }
        Command::Seed => {
            let config = Config::from_env()?;
            let pool = db::build_pool(&config.database_url, 1)?;
            db::run_migrations(&pool)?;
            let mut conn = pool.get().context("couldn't get db connection from pool")?;
            let report = seed::run(&mut conn, config.bcrypt_cost)?;
            tracing::info!(
                clinic_id = %report.clinic_id,
                departments = report.departments,
                accounts_created = report.accounts_created,
                "seeding complete"
            );
            Ok(())
        }
        Command::Keygen => {
            println!("{}", LabDataCipher::generate_key());
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::build_pool(&config.database_url, config.pool_size)?;
    db::run_migrations(&pool)?;

    tokio::fs::create_dir_all(config.uploads_dir.join("prescriptions"))
        .await
        .with_context(|| format!("creating {}", config.uploads_dir.display()))?;
    if config.lab_cipher.is_none() {
        tracing::warn!("LAB_DATA_KEY is not set; lab result data cannot be stored or read");
    }
    if config.smtp.is_none() {
        tracing::info!("SMTP_HOST is not set; outgoing mail is disabled");
    }

    let rate_limit = routes::rate_limit(config.rate_limit_per_minute)?;
    let bind = (config.host.clone(), config.port);
    let uploads_dir = config.uploads_dir.clone();
    let state = web::Data::new(AppState::new(config));
    let pool = web::Data::new(pool);

    tracing::info!(host = %bind.0, port = bind.1, rate_limit_per_minute = state.config.rate_limit_per_minute, "starting server");
    HttpServer::new(move || {
        App::new()
            .wrap(routes::security_headers())
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .app_data(pool.clone())
            .app_data(state.clone())
            .service(Files::new("/uploads", &uploads_dir))
            .configure(routes::configure_limited(rate_limit.clone()))
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}
