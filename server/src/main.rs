use anyhow::Context;
use bazaar_core::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bazaar_server::init_tracing();

    let config = AppConfig::load_with_env().context("loading configuration")?;
    bazaar_server::run(config).await
}
