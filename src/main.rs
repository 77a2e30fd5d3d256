use hb_predictor::{config, init_subscriber, start_app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment may already carry the key.
    let _ = dotenvy::dotenv();

    let config = config::get_configuration()?;
    init_subscriber(&config.log_level);

    start_app(config).await?;

    Ok(())
}
