use rand::RngCore;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::auth::repo::User;

/// Opaque bearer credential: 32 random bytes, hex-encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Create or replace the single token row for a user. The previous token
/// stops resolving as soon as the new one is written. Also stamps
/// `last_login`.
pub async fn issue(db: &PgPool, user_id: Uuid, ttl_days: i64) -> anyhow::Result<String> {
    let token = generate_token();
    let expires_at = OffsetDateTime::now_utc() + Duration::days(ttl_days);

    sqlx::query(
        r#"
        INSERT INTO auth_tokens (token, user_id, expires_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id)
        DO UPDATE SET token = EXCLUDED.token,
                      created_at = now(),
                      expires_at = EXCLUDED.expires_at
        "#,
    )
    .bind(&token)
    .bind(user_id)
    .bind(expires_at)
    .execute(db)
    .await?;

    sqlx::query(r#"UPDATE users SET last_login = now() WHERE id = $1"#)
        .bind(user_id)
        .execute(db)
        .await?;

    debug!(user_id = %user_id, "token issued");
    Ok(token)
}

/// Resolve a presented token to its active owner. Expired tokens and
/// inactive accounts fail the same way as unknown tokens.
pub async fn resolve(db: &PgPool, token: &str) -> anyhow::Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.email, u.password_hash, u.name, u.is_active, u.is_staff,
               u.is_superuser, u.last_login, u.created_at
        FROM users u
        JOIN auth_tokens t ON t.user_id = u.id
        WHERE t.token = $1 AND t.expires_at > now() AND u.is_active
        "#,
    )
    .bind(token)
    .fetch_optional(db)
    .await?;
    Ok(user)
}

/// Delete the user's token row (logout).
pub async fn revoke(db: &PgPool, user_id: Uuid) -> anyhow::Result<()> {
    sqlx::query(r#"DELETE FROM auth_tokens WHERE user_id = $1"#)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tokens_do_not_repeat() {
        assert_ne!(generate_token(), generate_token());
    }
}
