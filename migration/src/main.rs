use publisher_common::{database, load_record_types};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    domain::migration::Migration,
    infrastructure::{persistence::PersistenceAdapter, settings::Settings},
};

pub mod domain;
pub mod infrastructure;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer())
        .init();

    let settings = Settings::from_env()?;

    let record_types = load_record_types(&settings.schema_config_path)?;
    tracing::info!(path = %settings.schema_config_path, "record types loaded");

    let database = database::connect(&settings.database).await?;
    tracing::info!(schema = database.database_schema(), "connected to database");
    let persistence = PersistenceAdapter::new(database);

    // create the tables the record types need but the database lacks
    let migration = Migration::new(record_types, persistence);
    let created = migration.migrate().await?;
    tracing::info!(created, "schema migrated");

    Ok(())
}
