// Mint a bearer token for a provisioned user
// Usage: issue_token <user-id>

use std::sync::Arc;

use campus_portal::{
    config::Config,
    core::UserId,
    infrastructure::{
        database::UserDirectory, security::SecurityService, sqlite_database::SqliteContentStore,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let user_id: UserId = match std::env::args().nth(1) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("user id must be an integer: {}", e))?,
        None => anyhow::bail!("usage: issue_token <user-id>"),
    };

    let config = Config::from_env()?;
    let store = Arc::new(
        SqliteContentStore::connect(&config.database.url, config.database.max_connections).await?,
    );
    let user = store
        .find_user(user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("user {} is not in the directory", user_id))?;

    let security = SecurityService::new(config.security());
    let token = security.issue_token(user.id, user.role)?;

    eprintln!("Token for {} <{}> ({})", user.name, user.email, user.role);
    println!("{}", token);
    Ok(())
}
