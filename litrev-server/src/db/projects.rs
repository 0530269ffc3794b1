//! Project rows
//!
//! Creating a project seeds its default roles and makes the creator a member
//! holding the first (all-permissions) role, in one transaction.

use litrev_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::{get_timestamp, get_uuid, members, roles};
use crate::models::role::default_roles;
use crate::models::{Project, ProjectSummary};

fn row_to_project(row: &SqliteRow) -> Result<Project> {
    Ok(Project {
        id: get_uuid(row, "id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        created_by: row.try_get("created_by")?,
        created_at: get_timestamp(row, "created_at")?,
        updated_at: get_timestamp(row, "updated_at")?,
    })
}

pub async fn create_project(
    pool: &SqlitePool,
    name: &str,
    description: &str,
    created_by: &str,
) -> Result<Project> {
    let now = time::now();
    let project = Project {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: description.to_string(),
        created_by: created_by.to_string(),
        created_at: now,
        updated_at: now,
    };

    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO projects (id, name, description, created_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(project.id.to_string())
    .bind(&project.name)
    .bind(&project.description)
    .bind(&project.created_by)
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(&mut *tx)
    .await?;

    let mut owner_role = None;
    for (role_name, permissions) in default_roles() {
        let role = roles::insert_role(&mut *tx, project.id, role_name, permissions).await?;
        owner_role.get_or_insert(role.id);
    }

    if let Some(role_id) = owner_role {
        members::insert_member(&mut *tx, project.id, created_by, role_id).await?;
    }

    tx.commit().await?;

    info!(project_id = %project.id, created_by, "Created project");
    Ok(project)
}

pub async fn get_project(pool: &SqlitePool, project_id: Uuid) -> Result<Option<Project>> {
    let row = sqlx::query(
        "SELECT id, name, description, created_by, created_at, updated_at FROM projects WHERE id = ?",
    )
    .bind(project_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_project).transpose()
}

/// Projects `user_id` belongs to, newest first
pub async fn list_projects_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<ProjectSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT p.id, p.name, p.description, p.created_by, p.created_at, p.updated_at,
               r.name AS role_name,
               (SELECT COUNT(*) FROM project_members pm WHERE pm.project_id = p.id) AS member_count
        FROM projects p
        JOIN project_members m ON m.project_id = p.id
        JOIN roles r ON r.id = m.role_id
        WHERE m.user_id = ?
        ORDER BY p.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(ProjectSummary {
                project: row_to_project(row)?,
                role_name: row.try_get("role_name")?,
                member_count: row.try_get("member_count")?,
            })
        })
        .collect()
}

pub async fn update_project(pool: &SqlitePool, project: &Project) -> Result<()> {
    sqlx::query("UPDATE projects SET name = ?, description = ?, updated_at = ? WHERE id = ?")
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.updated_at.to_rfc3339())
        .bind(project.id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a project; child rows go with it
pub async fn delete_project(pool: &SqlitePool, project_id: Uuid) -> Result<bool> {
    let mut tx = pool.begin().await?;

    // project_members references roles without a cascade, so clear it first
    sqlx::query("DELETE FROM project_members WHERE project_id = ?")
        .bind(project_id.to_string())
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(project_id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}
