//! Project membership rows

use litrev_common::{time, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::roles::permissions_from_row;
use super::{get_timestamp, get_uuid};
use crate::models::Member;

const MEMBER_SELECT: &str = r#"
    SELECT m.project_id, m.user_id, m.role_id, m.joined_at, r.name AS role_name,
           r.can_manage_project, r.can_manage_members, r.can_manage_phases,
           r.can_manage_articles, r.can_run_ai_jobs, r.can_write_notes
    FROM project_members m
    JOIN roles r ON r.id = m.role_id
"#;

fn row_to_member(row: &SqliteRow) -> Result<Member> {
    Ok(Member {
        project_id: get_uuid(row, "project_id")?,
        user_id: row.try_get("user_id")?,
        role_id: get_uuid(row, "role_id")?,
        role_name: row.try_get("role_name")?,
        permissions: permissions_from_row(row)?,
        joined_at: get_timestamp(row, "joined_at")?,
    })
}

/// Insert a membership on an open connection
pub async fn insert_member(
    conn: &mut SqliteConnection,
    project_id: Uuid,
    user_id: &str,
    role_id: Uuid,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO project_members (project_id, user_id, role_id, joined_at) VALUES (?, ?, ?, ?)",
    )
    .bind(project_id.to_string())
    .bind(user_id)
    .bind(role_id.to_string())
    .bind(time::now_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Membership of `user_id`, `None` for non-members
pub async fn get_member(pool: &SqlitePool, project_id: Uuid, user_id: &str) -> Result<Option<Member>> {
    let row = sqlx::query(&format!("{} WHERE m.project_id = ? AND m.user_id = ?", MEMBER_SELECT))
        .bind(project_id.to_string())
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_member).transpose()
}

pub async fn list_members(pool: &SqlitePool, project_id: Uuid) -> Result<Vec<Member>> {
    let rows = sqlx::query(&format!(
        "{} WHERE m.project_id = ? ORDER BY m.joined_at, m.user_id",
        MEMBER_SELECT
    ))
    .bind(project_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_member).collect()
}

pub async fn add_member(pool: &SqlitePool, project_id: Uuid, user_id: &str, role_id: Uuid) -> Result<Member> {
    let mut conn = pool.acquire().await?;
    insert_member(&mut *conn, project_id, user_id, role_id).await?;
    drop(conn);

    get_member(pool, project_id, user_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Member {} vanished after insert", user_id)))
}

pub async fn update_member_role(pool: &SqlitePool, project_id: Uuid, user_id: &str, role_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE project_members SET role_id = ? WHERE project_id = ? AND user_id = ?")
        .bind(role_id.to_string())
        .bind(project_id.to_string())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn remove_member(pool: &SqlitePool, project_id: Uuid, user_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM project_members WHERE project_id = ? AND user_id = ?")
        .bind(project_id.to_string())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Members able to manage members, optionally ignoring one user and/or
/// everyone holding one role
pub async fn count_managers_excluding(
    pool: &SqlitePool,
    project_id: Uuid,
    except_user: Option<&str>,
    except_role: Option<Uuid>,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM project_members m
        JOIN roles r ON r.id = m.role_id
        WHERE m.project_id = ?
          AND r.can_manage_members = 1
          AND (? IS NULL OR m.user_id != ?)
          AND (? IS NULL OR m.role_id != ?)
        "#,
    )
    .bind(project_id.to_string())
    .bind(except_user)
    .bind(except_user)
    .bind(except_role.map(|r| r.to_string()))
    .bind(except_role.map(|r| r.to_string()))
    .fetch_one(pool)
    .await?;
    Ok(count)
}
