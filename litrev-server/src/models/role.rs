//! Roles and their boolean permission flags

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One permission flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ManageProject,
    ManageMembers,
    ManagePhases,
    ManageArticles,
    RunAiJobs,
    WriteNotes,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Permission::ManageProject => "can_manage_project",
            Permission::ManageMembers => "can_manage_members",
            Permission::ManagePhases => "can_manage_phases",
            Permission::ManageArticles => "can_manage_articles",
            Permission::RunAiJobs => "can_run_ai_jobs",
            Permission::WriteNotes => "can_write_notes",
        };
        f.write_str(name)
    }
}

/// Permission flags carried by a role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub can_manage_project: bool,
    #[serde(default)]
    pub can_manage_members: bool,
    #[serde(default)]
    pub can_manage_phases: bool,
    #[serde(default)]
    pub can_manage_articles: bool,
    #[serde(default)]
    pub can_run_ai_jobs: bool,
    #[serde(default)]
    pub can_write_notes: bool,
}

impl Permissions {
    pub fn all() -> Self {
        Self {
            can_manage_project: true,
            can_manage_members: true,
            can_manage_phases: true,
            can_manage_articles: true,
            can_run_ai_jobs: true,
            can_write_notes: true,
        }
    }

    /// Everything except project and member administration
    pub fn editor() -> Self {
        Self {
            can_manage_project: false,
            can_manage_members: false,
            ..Self::all()
        }
    }

    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::ManageProject => self.can_manage_project,
            Permission::ManageMembers => self.can_manage_members,
            Permission::ManagePhases => self.can_manage_phases,
            Permission::ManageArticles => self.can_manage_articles,
            Permission::RunAiJobs => self.can_run_ai_jobs,
            Permission::WriteNotes => self.can_write_notes,
        }
    }
}

/// Roles seeded into every new project; the first one is given to the creator
pub fn default_roles() -> [(&'static str, Permissions); 3] {
    [
        ("Owner", Permissions::all()),
        ("Editor", Permissions::editor()),
        ("Viewer", Permissions::default()),
    ]
}

#[derive(Debug, Clone, Serialize)]
pub struct Role {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    #[serde(flatten)]
    pub permissions: Permissions,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let editor = Permissions::editor();
        assert!(!editor.allows(Permission::ManageMembers));
        assert!(!editor.allows(Permission::ManageProject));
        assert!(editor.allows(Permission::RunAiJobs));
        assert!(editor.allows(Permission::ManagePhases));

        let viewer = Permissions::default();
        assert!(!viewer.allows(Permission::WriteNotes));

        let roles = default_roles();
        assert_eq!(roles[0].0, "Owner");
        assert_eq!(roles[0].1, Permissions::all());
    }

    #[test]
    fn test_flags_flatten_into_role_json() {
        let role = Role {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: "Editor".to_string(),
            permissions: Permissions::editor(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&role).unwrap();
        assert_eq!(json["can_run_ai_jobs"], true);
        assert_eq!(json["can_manage_members"], false);
    }
}
