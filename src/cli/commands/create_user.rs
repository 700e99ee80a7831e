use anyhow::{bail, Result};
use model::entities::user;
use sea_orm::{ActiveModelTrait, Database, Set};
use tracing::{debug, info, trace};

use crate::auth::{generate_api_key, hash_password};

/// Creates a user and prints its webhook API key.
pub async fn create_user(
    database_url: &str,
    username: &str,
    password: &str,
    email: Option<String>,
    phone: Option<String>,
) -> Result<()> {
    trace!("Entering create_user function");
    debug!("Creating user {} in {}", username, database_url);

    if username.trim().is_empty() || password.is_empty() {
        bail!("username and password must not be empty");
    }

    let db = Database::connect(database_url).await?;
    if user::Entity::find_by_username(&db, username).await?.is_some() {
        bail!("user '{}' already exists", username);
    }

    let created = user::ActiveModel {
        username: Set(username.trim().to_string()),
        email: Set(email),
        phone: Set(phone),
        password_hash: Set(hash_password(password)?),
        api_key: Set(generate_api_key()),
        ..Default::default()
    }
    .insert(&db)
    .await?;

    info!("User {} created with ID {}", created.username, created.id);
    println!("User:    {} (id {})", created.username, created.id);
    println!("API key: {}", created.api_key);
    Ok(())
}
