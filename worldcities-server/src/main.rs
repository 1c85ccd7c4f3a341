use worldcities_server::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_tracing(&config)?;

    tracing::info!(
        environment = %config.service.environment,
        database = config.database.is_some(),
        jwt = config.jwt.is_some(),
        "Configuration loaded"
    );

    let state = AppState::builder().config(config.clone()).build().await?;

    Server::new(config).serve(router(state)).await
}
