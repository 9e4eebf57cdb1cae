use anyhow::Result;

use sql_mcq_generator::{logger, App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();

    let config = Config::load();

    let app = App::initialize(config).await?;
    app.run().await?;

    Ok(())
}
