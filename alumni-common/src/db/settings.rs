//! Key/value settings and the auth shared secret

use crate::Result;
use rand::Rng;
use sqlx::SqlitePool;

/// Settings key holding the signed-token shared secret
pub const SHARED_SECRET_KEY: &str = "auth_shared_secret";

pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// Load the shared secret, generating and storing one on first use
///
/// The generated secret is a random non-zero i64.
pub async fn load_or_init_shared_secret(pool: &SqlitePool) -> Result<i64> {
    if let Some(value) = get_setting(pool, SHARED_SECRET_KEY).await? {
        return value.parse::<i64>().map_err(|e| {
            crate::Error::Config(format!("Stored shared secret is not an i64: {}", e))
        });
    }

    let secret: i64 = {
        let mut rng = rand::thread_rng();
        loop {
            let val = rng.gen::<i64>();
            if val != 0 {
                break val;
            }
        }
    };

    set_setting(pool, SHARED_SECRET_KEY, &secret.to_string()).await?;
    tracing::info!("Generated new auth shared secret");
    Ok(secret)
}
