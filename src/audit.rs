//! Audit trail for data-changing operations
//!
//! Every change is emitted as a `tracing` event with target `audit`, so it can
//! be routed or filtered separately (`RUST_LOG=audit=info`). Destructive
//! actions are logged at warn level.

use std::fmt::Display;

/// What happened to the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbAction {
    Add,
    Edit,
    Delete,
    BatchDelete,
    Enable,
    Disable,
}

impl DbAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DbAction::Add => "add",
            DbAction::Edit => "edit",
            DbAction::Delete => "delete",
            DbAction::BatchDelete => "batch_delete",
            DbAction::Enable => "enable",
            DbAction::Disable => "disable",
        }
    }

    /// Whether the action removes or restricts data
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            DbAction::Delete | DbAction::BatchDelete | DbAction::Disable
        )
    }
}

/// Kind of record touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Movie,
    Review,
    User,
    Genre,
    Favorite,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Movie => "movie",
            Entity::Review => "review",
            Entity::User => "user",
            Entity::Genre => "genre",
            Entity::Favorite => "favorite",
        }
    }
}

impl Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records one data change
///
/// `name` is the human-readable label of the record (movie title, username,
/// genre name) and `operator` the username of whoever performed the change.
pub fn record(
    action: DbAction,
    entity: Entity,
    record_id: Option<i64>,
    name: &str,
    operator: &str,
    details: Option<&str>,
) {
    let details = details.unwrap_or("");
    if action.is_destructive() {
        tracing::warn!(
            target: "audit",
            action = action.as_str(),
            entity = entity.as_str(),
            record_id,
            record_name = name,
            operator,
            details,
            "Record changed"
        );
    } else {
        tracing::info!(
            target: "audit",
            action = action.as_str(),
            entity = entity.as_str(),
            record_id,
            record_name = name,
            operator,
            details,
            "Record changed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destructive_actions() {
        assert!(DbAction::Delete.is_destructive());
        assert!(DbAction::BatchDelete.is_destructive());
        assert!(DbAction::Disable.is_destructive());
        assert!(!DbAction::Add.is_destructive());
        assert!(!DbAction::Edit.is_destructive());
        assert!(!DbAction::Enable.is_destructive());
    }

    #[test]
    fn test_labels() {
        assert_eq!(DbAction::BatchDelete.as_str(), "batch_delete");
        assert_eq!(Entity::Favorite.to_string(), "favorite");
    }
}
