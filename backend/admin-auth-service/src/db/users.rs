/// User database operations
use crate::models::{NewUser, UserChanges, UserRecord};
use sqlx::{Connection, PgConnection};
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, username, password_hash, display_name, email, login_type, is_active, created_at, updated_at";

/// Find user by username
pub async fn find_by_username(
    conn: &mut PgConnection,
    username: &str,
) -> Result<Option<UserRecord>, sqlx::Error> {
    sqlx::query_as::<_, UserRecord>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
    ))
    .bind(username)
    .fetch_optional(&mut *conn)
    .await
}

/// Find user by ID
pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<UserRecord>, sqlx::Error> {
    sqlx::query_as::<_, UserRecord>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

/// Check if username exists
pub async fn username_exists(conn: &mut PgConnection, username: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
        .bind(username)
        .fetch_one(&mut *conn)
        .await
}

/// One page of users, oldest first, optionally narrowed to an exact username
pub async fn list_users(
    conn: &mut PgConnection,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<UserRecord>, sqlx::Error> {
    sqlx::query_as::<_, UserRecord>(&format!(
        r#"
        SELECT {USER_COLUMNS} FROM users
        WHERE ($1::varchar IS NULL OR username = $1)
        ORDER BY created_at
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(search)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await
}

pub async fn count_users(conn: &mut PgConnection, search: Option<&str>) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM users WHERE ($1::varchar IS NULL OR username = $1)",
    )
    .bind(search)
    .fetch_one(&mut *conn)
    .await
}

/// Create a user and its role links in one transaction
pub async fn create_user(conn: &mut PgConnection, new_user: &NewUser) -> Result<UserRecord, sqlx::Error> {
    let mut tx = conn.begin().await?;

    let user = sqlx::query_as::<_, UserRecord>(&format!(
        r#"
        INSERT INTO users (username, password_hash, display_name, email, login_type, is_active)
        VALUES ($1, $2, $3, $4, 'password', TRUE)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(&new_user.username)
    .bind(&new_user.password_hash)
    .bind(&new_user.display_name)
    .bind(&new_user.email)
    .fetch_one(&mut *tx)
    .await?;

    replace_roles(&mut tx, user.id, &new_user.role_ids).await?;

    tx.commit().await?;
    Ok(user)
}

/// Apply a partial update; returns `None` if the user does not exist
pub async fn update_user(
    conn: &mut PgConnection,
    id: Uuid,
    changes: &UserChanges,
) -> Result<Option<UserRecord>, sqlx::Error> {
    let mut tx = conn.begin().await?;

    let user = sqlx::query_as::<_, UserRecord>(&format!(
        r#"
        UPDATE users
        SET display_name = COALESCE($2, display_name),
            email = COALESCE($3, email),
            is_active = COALESCE($4, is_active),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&changes.display_name)
    .bind(&changes.email)
    .bind(changes.is_active)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(user) = user else {
        tx.rollback().await?;
        return Ok(None);
    };

    if let Some(role_ids) = &changes.role_ids {
        replace_roles(&mut tx, id, role_ids).await?;
    }

    tx.commit().await?;
    Ok(Some(user))
}

/// Replace the stored credential; returns false if the user does not exist
pub async fn update_password(
    conn: &mut PgConnection,
    id: Uuid,
    password_hash: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(password_hash)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a user; role links go with it (ON DELETE CASCADE)
pub async fn delete_user(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

async fn replace_roles(conn: &mut PgConnection, user_id: Uuid, role_ids: &[Uuid]) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    if role_ids.is_empty() {
        return Ok(());
    }

    sqlx::query(
        "INSERT INTO user_roles (user_id, role_id) SELECT $1, UNNEST($2::uuid[]) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(role_ids)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
