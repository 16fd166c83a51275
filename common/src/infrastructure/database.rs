use std::sync::{LazyLock, OnceLock};
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use regex::Regex;
use serde::Deserialize;
use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
};

/// Connection pool together with the schema holding the record type tables.
#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
    schema: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub db: String,
    pub schema: String,
    pub credentials: DatabaseCredentials,
    pub connection: DatabaseConnection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConnection {
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseCredentials {
    pub username: String,
    pub password: String,
}

fn default_port() -> u16 {
    5432
}

// table names are written as "schema"."table", so the schema stays a plain identifier
static SCHEMA_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("schema name regex must be valid"));

static DATABASE: OnceLock<Database> = OnceLock::new();

/// Open the process wide pool. A second call fails.
pub async fn connect(settings: &DatabaseSettings) -> Result<&'static Database, anyhow::Error> {
    settings.validate()?;

    let pool = settings
        .pool_options()
        .connect_with(settings.connect_options())
        .await
        .with_context(|| {
            format!(
                "failed to open database at {}:{}/{}",
                settings.host, settings.port, settings.db
            )
        })?;
    tracing::info!(
        host = %settings.host,
        db = %settings.db,
        schema = %settings.schema,
        "database pool opened"
    );

    let database = Database {
        pool,
        schema: settings.schema.to_owned(),
    };
    DATABASE
        .set(database)
        .map_err(|_| anyhow!("database is already connected"))?;
    DATABASE
        .get()
        .ok_or_else(|| anyhow!("database is not connected"))
}

impl DatabaseSettings {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !SCHEMA_NAME_REGEX.is_match(&self.schema) {
            bail!("invalid database schema name '{}'", self.schema);
        }
        let connection = &self.connection;
        if connection.max_connections == 0 {
            bail!("max_connections must be at least 1");
        }
        if connection.min_connections > connection.max_connections {
            bail!(
                "min_connections ({}) exceeds max_connections ({})",
                connection.min_connections,
                connection.max_connections
            );
        }
        Ok(())
    }

    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.credentials.username)
            .password(&self.credentials.password)
            .database(&self.db)
            .ssl_mode(PgSslMode::Prefer)
    }

    fn pool_options(&self) -> PgPoolOptions {
        let connection = &self.connection;
        PgPoolOptions::new()
            .min_connections(connection.min_connections)
            .max_connections(connection.max_connections)
            .acquire_timeout(Duration::from_secs(connection.acquire_timeout_seconds))
    }
}

impl Database {
    /// Run `queries` in one transaction, logged under `ctx`.
    pub async fn execute_in_transaction(
        &self,
        queries: Vec<String>,
        ctx: &'static str,
    ) -> Result<(), anyhow::Error> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .with_context(|| format!("failed to start {} transaction", ctx))?;

        tracing::info!(statements = queries.len(), "{}", ctx);
        for query in queries {
            tracing::debug!("{}", query);
            sqlx::query(&query)
                .execute(&mut *transaction)
                .await
                .with_context(|| format!("failed to execute {} statement: {}", ctx, query))?;
        }

        transaction
            .commit()
            .await
            .with_context(|| format!("failed to commit {} transaction", ctx))
    }

    pub fn database_pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn database_schema(&self) -> &str {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: &str = r#"{
        "host": "db.internal",
        "db": "publisher",
        "schema": "cms",
        "credentials": { "username": "editor", "password": "secret" },
        "connection": { "min_connections": 1, "max_connections": 4, "acquire_timeout_seconds": 3 }
    }"#;

    fn settings() -> DatabaseSettings {
        serde_json::from_str(SETTINGS).unwrap()
    }

    #[test]
    fn port_defaults_to_postgres() {
        let settings = settings();
        assert_eq!(settings.port, 5432);
        settings.validate().unwrap();

        let options = settings.connect_options();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 5432);
        assert_eq!(options.get_database(), Some("publisher"));
    }

    #[test]
    fn schema_must_be_a_plain_identifier() {
        for schema in ["", "Public", "cms\".\"page", "1cms", "my schema"] {
            let mut settings = settings();
            settings.schema = schema.to_owned();
            assert!(settings.validate().is_err(), "{schema} was accepted");
        }
    }

    #[test]
    fn pool_bounds_are_checked() {
        let mut settings = settings();
        settings.connection.min_connections = 5;
        assert!(settings.validate().is_err());

        settings.connection.min_connections = 0;
        settings.connection.max_connections = 0;
        assert!(settings.validate().is_err());
    }
}
