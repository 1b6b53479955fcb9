use std::{fs::File, path::PathBuf};

use market_client::{db::user_queries, domain::User};
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::NotifyError;
use crate::config::{RegistryKind, UsersConfig};

/// Read-only source of newsletter subscribers.
#[async_trait::async_trait]
pub trait UserRegistry: Send + Sync {
    async fn load_users(&self) -> Result<Vec<User>, NotifyError>;
}

/// Users listed directly in the configuration.
pub struct StaticUserRegistry {
    users: Vec<User>,
}

impl StaticUserRegistry {
    pub fn new(users: Vec<User>) -> Self {
        Self { users }
    }
}

#[async_trait::async_trait]
impl UserRegistry for StaticUserRegistry {
    async fn load_users(&self) -> Result<Vec<User>, NotifyError> {
        Ok(self.users.clone())
    }
}

/// CSV file with a `name,email` header, read on every load.
pub struct CsvUserRegistry {
    path: PathBuf,
}

impl CsvUserRegistry {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl UserRegistry for CsvUserRegistry {
    async fn load_users(&self) -> Result<Vec<User>, NotifyError> {
        let file = File::open(&self.path)
            .map_err(|e| NotifyError::Registry(format!("failed to open {}: {e}", self.path.display())))?;
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

        let mut users = Vec::new();
        for record in rdr.deserialize::<User>() {
            let user = record.map_err(|e| NotifyError::Registry(format!("failed to read user record: {e}")))?;
            if user.email.is_empty() {
                tracing::warn!(name = %user.name, "skipping user without email address");
                continue;
            }
            users.push(user);
        }
        Ok(users)
    }
}

/// `newsletter_users` table in Postgres.
pub struct PgUserRegistry {
    pool: PgPool,
}

impl PgUserRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserRegistry for PgUserRegistry {
    async fn load_users(&self) -> Result<Vec<User>, NotifyError> {
        user_queries::registered_users(&self.pool)
            .await
            .map_err(|e| NotifyError::Registry(e.to_string()))
    }
}

/// Builds the registry selected by `[users].kind`.
pub fn from_config(cfg: &UsersConfig) -> anyhow::Result<Box<dyn UserRegistry>> {
    let registry: Box<dyn UserRegistry> = match cfg.kind {
        RegistryKind::Static => Box::new(StaticUserRegistry::new(cfg.users.clone())),
        RegistryKind::Csv => {
            let path = cfg
                .csv_path
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("users.csv_path is required for the csv registry"))?;
            Box::new(CsvUserRegistry::new(path))
        }
        RegistryKind::Postgres => {
            let uri = cfg
                .postgres_uri
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("users.postgres_uri is required for the postgres registry"))?;
            // Connections are only opened when the notifier first loads users.
            let pool = PgPoolOptions::new()
                .max_connections(cfg.max_connections)
                .connect_lazy(uri)?;
            Box::new(PgUserRegistry::new(pool))
        }
    };
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn csv_registry_reads_users_in_file_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name,email").unwrap();
        writeln!(file, "Ada, ada@example.com").unwrap();
        writeln!(file, "Grace,grace@example.com").unwrap();
        writeln!(file, "Nobody,").unwrap();

        let users = CsvUserRegistry::new(file.path()).load_users().await.unwrap();

        assert_eq!(
            users,
            vec![
                User { name: "Ada".to_string(), email: "ada@example.com".to_string() },
                User { name: "Grace".to_string(), email: "grace@example.com".to_string() },
            ]
        );
    }

    #[tokio::test]
    async fn missing_csv_file_is_a_registry_error() {
        let res = CsvUserRegistry::new("/nonexistent/users.csv").load_users().await;
        assert!(matches!(res, Err(NotifyError::Registry(_))));
    }

    #[test]
    fn csv_registry_requires_path() {
        let cfg = UsersConfig {
            kind: RegistryKind::Csv,
            users: vec![],
            csv_path: None,
            postgres_uri: None,
            max_connections: 1,
        };
        assert!(from_config(&cfg).is_err());
    }
}
