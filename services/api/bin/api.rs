//! Main Entrypoint for the Foundry API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the database connection pool and running migrations.
//! 3. Choosing the course generator for the configured provider.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use foundry_api::{
    config::{Config, Provider},
    db::Db,
    router::create_router,
    state::AppState,
};
use foundry_core::{
    CourseDefaults,
    course_gen::{CourseGenerator, LLMCourseGenerator, StaticCourseGenerator},
};
use sqlx::PgPool;
use std::{collections::HashMap, fs, net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        return;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// Loads every `*.md` file in a directory, keyed by file stem.
fn load_prompts(prompts_path: &std::path::Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    let entries = fs::read_dir(prompts_path)
        .with_context(|| format!("Could not read prompts directory {}", prompts_path.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

fn course_generator(config: &Config) -> anyhow::Result<Arc<dyn CourseGenerator>> {
    let (api_key, api_base) = match &config.provider {
        Provider::Static => {
            info!("Using the static course generator.");
            return Ok(Arc::new(StaticCourseGenerator));
        }
        Provider::OpenAI => {
            info!("Using OpenAI provider.");
            (
                config.openai_api_key.as_ref(),
                "https://api.openai.com/v1/",
            )
        }
        Provider::Gemini => {
            info!("Using Gemini provider.");
            (
                config.gemini_api_key.as_ref(),
                "https://generativelanguage.googleapis.com/v1beta/openai",
            )
        }
    };
    let api_key = api_key.context("Missing API key for the configured provider")?;

    let prompts = load_prompts(&config.prompts_path)?;
    if !prompts.contains_key("generate_course") {
        anyhow::bail!("generate_course.md not found in prompts directory");
    }

    let openai_config = OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(api_base);
    Ok(Arc::new(LLMCourseGenerator::new(
        openai_config,
        config.chat_model.clone(),
        prompts,
    )))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Database ---
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let db = Arc::new(Db::new(pool));
    db.run_migrations().await?;
    info!("Database connection established and migrations are up-to-date.");

    // --- 4. Initialize Shared Services ---
    let course_generator = course_generator(&config)?;
    if config.gemini_api_key.is_none() {
        info!("GEMINI_API_KEY is not set; live tutoring sessions will be refused.");
    }

    let app_state = Arc::new(AppState {
        db,
        course_generator,
        course_defaults: Arc::new(CourseDefaults::default()),
        config: Arc::new(config.clone()),
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        live_model = %config.live_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
