//! engine::relations
//!
//! Pending foreign-key relationships between staged entities.
//!
//! # Design
//!
//! Each registered relationship records (child, foreign-key field, parent)
//! and merges a child-type -> parent-type edge into the type dependency
//! graph. The graph drives insertion ordering; the pending list drives
//! backfill, which writes the parent's identifier into the child's
//! foreign-key field once it is known.
//!
//! Junction registration is a convenience built on the same primitive: it
//! creates (or reuses) a junction entity and registers one relationship to
//! each side, returning the junction handle so callers can chain further
//! relationships onto it.

use crate::core::entity::Entity;
use crate::core::graph::TypeGraph;
use crate::core::types::{EntityType, FieldName};

/// One pending foreign-key assignment.
#[derive(Debug, Clone)]
pub struct PendingRelationship {
    /// The entity whose foreign-key field will be written.
    pub child: Entity,
    /// The foreign-key field on the child.
    pub field: FieldName,
    /// The entity whose identifier will be written into the field.
    pub parent: Entity,
}

/// The set of pending relationships registered on one instance, plus the
/// type dependency graph derived from them.
#[derive(Debug, Default)]
pub struct RelationshipBook {
    pending: Vec<PendingRelationship>,
    graph: TypeGraph,
}

impl RelationshipBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pending relationship and merge its dependency edge.
    pub fn register(&mut self, child: &Entity, field: FieldName, parent: &Entity) {
        self.graph.add_edge(child.entity_type(), parent.entity_type());
        self.pending.push(PendingRelationship {
            child: child.clone(),
            field,
            parent: parent.clone(),
        });
    }

    /// Pending relationships whose child is of the given type, in
    /// registration order.
    pub fn pending_for<'a>(
        &'a self,
        child_type: &'a EntityType,
    ) -> impl Iterator<Item = &'a PendingRelationship> {
        self.pending
            .iter()
            .filter(move |rel| &rel.child.entity_type() == child_type)
    }

    /// The derived type dependency graph.
    pub fn graph(&self) -> &TypeGraph {
        &self.graph
    }

    /// Number of pending relationships.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no relationships are registered.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::EntityId;

    fn t(name: &str) -> EntityType {
        EntityType::new(name).unwrap()
    }

    fn f(name: &str) -> FieldName {
        FieldName::new(name).unwrap()
    }

    #[test]
    fn register_records_relationship_and_edge() {
        let mut book = RelationshipBook::new();
        let parent = Entity::new(t("Account"));
        let child = Entity::new(t("Contact"));

        book.register(&child, f("AccountId"), &parent);

        assert_eq!(book.len(), 1);
        assert_eq!(book.graph().parents_of(&t("Contact")), &[t("Account")]);
    }

    #[test]
    fn pending_for_filters_by_child_type() {
        let mut book = RelationshipBook::new();
        let account = Entity::new(t("Account"));
        let contact = Entity::new(t("Contact"));
        let case = Entity::new(t("Case"));

        book.register(&contact, f("AccountId"), &account);
        book.register(&case, f("AccountId"), &account);
        book.register(&case, f("ContactId"), &contact);

        let contact_type = t("Contact");
        let for_contact: Vec<_> = book.pending_for(&contact_type).collect();
        assert_eq!(for_contact.len(), 1);
        assert_eq!(for_contact[0].field, f("AccountId"));

        let case_type = t("Case");
        let for_case: Vec<_> = book.pending_for(&case_type).collect();
        assert_eq!(for_case.len(), 2);
        // Registration order is preserved.
        assert_eq!(for_case[0].field, f("AccountId"));
        assert_eq!(for_case[1].field, f("ContactId"));
    }

    #[test]
    fn parent_outside_the_commit_is_allowed() {
        let mut book = RelationshipBook::new();
        let existing = Entity::with_id(t("Account"), EntityId::new("account-9").unwrap());
        let child = Entity::new(t("Contact"));

        book.register(&child, f("AccountId"), &existing);

        let contact_type = t("Contact");
        let pending: Vec<_> = book.pending_for(&contact_type).collect();
        assert_eq!(pending[0].parent.id(), Some(EntityId::new("account-9").unwrap()));
    }

    #[test]
    fn same_type_relationship_adds_self_edge() {
        let mut book = RelationshipBook::new();
        let parent = Entity::new(t("Account"));
        let child = Entity::new(t("Account"));

        book.register(&child, f("ParentId"), &parent);

        assert_eq!(book.graph().parents_of(&t("Account")), &[t("Account")]);
    }
}
