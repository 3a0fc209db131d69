//! `seed`: populate the reference tags and sample data. Safe to run repeatedly.

use anyhow::Context;
use foodorder::{logging, seed, state::connect_db, store::PgStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let store = PgStore::new(connect_db(&database_url).await?);
    seed::run(&store, &mut std::io::stdout().lock()).await
}
