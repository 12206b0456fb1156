use std::sync::Arc;

use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod api;
mod auth;
mod config;
mod error;
mod state;
mod users;

use auth::clock::SystemClock;
use auth::guard::{LOCKOUT_WINDOW, LockoutPolicy, LoginGuard};
use auth::password::{Argon2Verifier, hash_password};
use auth::service::AuthService;
use auth::token::JwtIssuer;
use config::{AdminConfig, Config};
use state::AppState;
use users::store::UserStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    let mut store = UserStore::load_or_create(&config.users_path)?;
    if let Some(admin) = &config.admin {
        seed_admin(&mut store, admin)?;
    }
    let users = Arc::new(RwLock::new(store));

    let policy = LockoutPolicy {
        max_records: config.guard_max_records,
        ..LockoutPolicy::default()
    };
    let guard = Arc::new(LoginGuard::with_policy(policy, Arc::new(SystemClock)));
    let tokens = Arc::new(JwtIssuer::new(config.jwt_secret.clone(), config.token_ttl_hours));
    let passwords = Arc::new(Argon2Verifier::new()?);

    let state = Arc::new(AppState {
        auth: AuthService::new(guard.clone(), users.clone(), passwords.clone(), tokens.clone()),
        users,
        tokens,
        passwords,
    });

    spawn_guard_sweeper(guard, config.sweep_interval);

    let app = api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("mbanking-auth server listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn seed_admin(store: &mut UserStore, admin: &AdminConfig) -> anyhow::Result<()> {
    if store.find_by_email(&admin.email).is_some() {
        return Ok(());
    }
    let password_hash = hash_password(&admin.password)?;
    if let Some(user) = store.add(admin.name.clone(), admin.email.clone(), password_hash)? {
        tracing::info!("Seeded admin account {} ({})", user.email, user.id);
    }
    Ok(())
}

fn spawn_guard_sweeper(guard: Arc<LoginGuard>, every: std::time::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let removed = guard.sweep(LOCKOUT_WINDOW);
            if removed > 0 {
                tracing::debug!(
                    "Swept {} login attempt records, {} remain",
                    removed,
                    guard.len()
                );
            }
        }
    });
}
