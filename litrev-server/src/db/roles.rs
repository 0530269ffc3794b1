//! Role rows

use litrev_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{get_timestamp, get_uuid};
use crate::models::{Permissions, Role};

const ROLE_COLUMNS: &str = "id, project_id, name, can_manage_project, can_manage_members, \
     can_manage_phases, can_manage_articles, can_run_ai_jobs, can_write_notes, created_at";

/// Read the six permission flags from a row holding role columns
pub(crate) fn permissions_from_row(row: &SqliteRow) -> Result<Permissions> {
    Ok(Permissions {
        can_manage_project: row.try_get("can_manage_project")?,
        can_manage_members: row.try_get("can_manage_members")?,
        can_manage_phases: row.try_get("can_manage_phases")?,
        can_manage_articles: row.try_get("can_manage_articles")?,
        can_run_ai_jobs: row.try_get("can_run_ai_jobs")?,
        can_write_notes: row.try_get("can_write_notes")?,
    })
}

fn row_to_role(row: &SqliteRow) -> Result<Role> {
    Ok(Role {
        id: get_uuid(row, "id")?,
        project_id: get_uuid(row, "project_id")?,
        name: row.try_get("name")?,
        permissions: permissions_from_row(row)?,
        created_at: get_timestamp(row, "created_at")?,
    })
}

/// Insert a role on an open connection (used while seeding a new project)
pub async fn insert_role(
    conn: &mut SqliteConnection,
    project_id: Uuid,
    name: &str,
    permissions: Permissions,
) -> Result<Role> {
    let role = Role {
        id: Uuid::new_v4(),
        project_id,
        name: name.to_string(),
        permissions,
        created_at: time::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO roles (
            id, project_id, name, can_manage_project, can_manage_members,
            can_manage_phases, can_manage_articles, can_run_ai_jobs,
            can_write_notes, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(role.id.to_string())
    .bind(role.project_id.to_string())
    .bind(&role.name)
    .bind(permissions.can_manage_project)
    .bind(permissions.can_manage_members)
    .bind(permissions.can_manage_phases)
    .bind(permissions.can_manage_articles)
    .bind(permissions.can_run_ai_jobs)
    .bind(permissions.can_write_notes)
    .bind(role.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(role)
}

pub async fn create_role(
    pool: &SqlitePool,
    project_id: Uuid,
    name: &str,
    permissions: Permissions,
) -> Result<Role> {
    let mut conn = pool.acquire().await?;
    insert_role(&mut *conn, project_id, name, permissions).await
}

pub async fn list_roles(pool: &SqlitePool, project_id: Uuid) -> Result<Vec<Role>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM roles WHERE project_id = ? ORDER BY created_at, name",
        ROLE_COLUMNS
    ))
    .bind(project_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_role).collect()
}

pub async fn get_role(pool: &SqlitePool, project_id: Uuid, role_id: Uuid) -> Result<Option<Role>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM roles WHERE id = ? AND project_id = ?",
        ROLE_COLUMNS
    ))
    .bind(role_id.to_string())
    .bind(project_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_role).transpose()
}

pub async fn update_role(pool: &SqlitePool, role: &Role) -> Result<()> {
    let p = role.permissions;
    sqlx::query(
        r#"
        UPDATE roles SET
            name = ?, can_manage_project = ?, can_manage_members = ?,
            can_manage_phases = ?, can_manage_articles = ?, can_run_ai_jobs = ?,
            can_write_notes = ?
        WHERE id = ?
        "#,
    )
    .bind(&role.name)
    .bind(p.can_manage_project)
    .bind(p.can_manage_members)
    .bind(p.can_manage_phases)
    .bind(p.can_manage_articles)
    .bind(p.can_run_ai_jobs)
    .bind(p.can_write_notes)
    .bind(role.id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete_role(pool: &SqlitePool, role_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM roles WHERE id = ?")
        .bind(role_id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count_members_with_role(pool: &SqlitePool, role_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM project_members WHERE role_id = ?")
        .bind(role_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count)
}
