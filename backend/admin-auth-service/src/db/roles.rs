/// Role database operations
use crate::models::Role;
use sqlx::PgConnection;
use uuid::Uuid;

/// Roles currently assigned to a user, by name
pub async fn roles_for_user(conn: &mut PgConnection, user_id: Uuid) -> Result<Vec<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>(
        r#"
        SELECT r.id, r.name, r.description
        FROM roles r
        JOIN user_roles ur ON ur.role_id = r.id
        WHERE ur.user_id = $1
        ORDER BY r.name
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await
}

/// All roles, by name
pub async fn list_roles(conn: &mut PgConnection) -> Result<Vec<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>("SELECT id, name, description FROM roles ORDER BY name")
        .fetch_all(&mut *conn)
        .await
}
