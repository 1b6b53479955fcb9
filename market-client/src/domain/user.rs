use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, sqlx::FromRow)]
pub struct User {
    pub name: String,
    pub email: String,
}
