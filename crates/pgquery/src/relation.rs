//! Entity-layer hooks used for eager loading.
//!
//! The query only needs the *shape* of a relation (which table, which keys) to
//! decide what to join; hydrating related entities is the entity layer's job.

use crate::options::SoftDeleteRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    HasOne,
    BelongsTo,
    HasMany,
    BelongsToMany,
}

impl RelationKind {
    pub fn is_one_to_one(&self) -> bool {
        matches!(self, RelationKind::HasOne | RelationKind::BelongsTo)
    }
}

/// Describes how a related entity is linked to its parent.
///
/// For `HasOne`/`HasMany` the foreign key lives on the related table and the
/// local key on the parent. For `BelongsTo` the foreign key lives on the
/// parent and the local key on the related table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub kind: RelationKind,
    /// Logical name of the related entity.
    pub model: String,
    pub foreign_key: String,
    pub local_key: String,
}

impl Relation {
    fn new(
        kind: RelationKind,
        model: impl Into<String>,
        foreign_key: impl Into<String>,
        local_key: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            model: model.into(),
            foreign_key: foreign_key.into(),
            local_key: local_key.into(),
        }
    }

    pub fn has_one(model: impl Into<String>, foreign_key: impl Into<String>, local_key: impl Into<String>) -> Self {
        Self::new(RelationKind::HasOne, model, foreign_key, local_key)
    }

    pub fn belongs_to(model: impl Into<String>, foreign_key: impl Into<String>, local_key: impl Into<String>) -> Self {
        Self::new(RelationKind::BelongsTo, model, foreign_key, local_key)
    }

    pub fn has_many(model: impl Into<String>, foreign_key: impl Into<String>, local_key: impl Into<String>) -> Self {
        Self::new(RelationKind::HasMany, model, foreign_key, local_key)
    }

    pub fn belongs_to_many(model: impl Into<String>, foreign_key: impl Into<String>, local_key: impl Into<String>) -> Self {
        Self::new(RelationKind::BelongsToMany, model, foreign_key, local_key)
    }

    /// Join predicate between the parent (aliased `parent`) and this relation
    /// (aliased `related`).
    pub(crate) fn join_columns(&self, parent: &str, related: &str) -> (String, String) {
        match self.kind {
            RelationKind::BelongsTo => (
                format!("{}.{}", parent, self.foreign_key),
                format!("{}.{}", related, self.local_key),
            ),
            _ => (
                format!("{}.{}", parent, self.local_key),
                format!("{}.{}", related, self.foreign_key),
            ),
        }
    }
}

/// Implemented by the entity layer for each model a [`Query`](crate::Query) serves.
pub trait EntityModel: Send + Sync {
    /// Logical entity name (`User`), resolved to the default table.
    fn name(&self) -> &str;

    /// Primary key column, if the model declares one.
    fn pk(&self) -> Option<&str> {
        None
    }

    /// Relation declared under `name` (camelCase), if any.
    fn relation(&self, name: &str) -> Option<Relation>;

    /// Soft-delete rule applied to every query for this model.
    fn soft_delete(&self) -> Option<SoftDeleteRule> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_columns_follow_key_ownership() {
        let has_one = Relation::has_one("Profile", "user_id", "id");
        assert_eq!(
            has_one.join_columns("user", "profile"),
            ("user.id".to_string(), "profile.user_id".to_string())
        );

        let belongs_to = Relation::belongs_to("Team", "team_id", "id");
        assert_eq!(
            belongs_to.join_columns("user", "team"),
            ("user.team_id".to_string(), "team.id".to_string())
        );
    }

    #[test]
    fn one_to_one_kinds() {
        assert!(RelationKind::HasOne.is_one_to_one());
        assert!(RelationKind::BelongsTo.is_one_to_one());
        assert!(!RelationKind::HasMany.is_one_to_one());
        assert!(!RelationKind::BelongsToMany.is_one_to_one());
    }
}
