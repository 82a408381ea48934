//! The entity table: authoritative owner of every entity.
//!
//! Ids are handed out monotonically and are never reused, not even by
//! [`EntityTable::swap_placeholder`] -- the whole point of the swap is
//! that ids held elsewhere stay valid while the entity behind them
//! changes kind.

use quartz_common::error::{ErrC, Error, Result};
use quartz_common::files::InputFileId;
use rustc_hash::FxHashMap;

use crate::entity::{
    BuiltinKind, Entity, EntityId, EntityKind, EntityTag, ROOT_ENTITY_ID,
};

/// Upper bound on SymLink hops in `find`. A longer chain means a cycle,
/// which is a table-construction bug.
const MAX_LINK_HOPS: u32 = 64;

pub struct EntityTable {
    map: FxHashMap<EntityId, Entity>,
    next_id: u32,
}

impl EntityTable {
    /// Create the table with the root entity and all builtin types
    /// pre-inserted at their reserved ids.
    pub fn new() -> Self {
        let mut table = Self {
            map: FxHashMap::default(),
            next_id: BuiltinKind::first_free_id(),
        };

        let mut root = Entity {
            id: ROOT_ENTITY_ID,
            parent: EntityId::INVALID,
            pos: 0,
            line: 0,
            file: InputFileId::INVALID,
            lname: "::".into(),
            fqn: "::".into(),
            children: Vec::new(),
            kind: EntityKind::Root,
        };

        for builtin in BuiltinKind::ALL {
            let id = builtin.id();
            root.children.push(id);
            table.map.insert(
                id,
                Entity {
                    id,
                    parent: ROOT_ENTITY_ID,
                    pos: 0,
                    line: 0,
                    file: InputFileId::INVALID,
                    lname: builtin.name().into(),
                    fqn: format!("::{}", builtin.name()),
                    children: Vec::new(),
                    kind: EntityKind::Builtin(builtin),
                },
            );
        }

        table.map.insert(ROOT_ENTITY_ID, root);
        table
    }

    /// Insert a new entity under `parent` and return its id.
    ///
    /// # Panics
    ///
    /// Panics if the parent does not exist or `line` is zero.
    pub fn insert(
        &mut self,
        parent: EntityId,
        pos: u32,
        line: u32,
        file: InputFileId,
        lname: &str,
        kind: EntityKind,
    ) -> EntityId {
        assert!(self.exists(parent), "insert under nonexistent parent");
        assert!(line != 0, "entities carry 1-based lines");

        let id = EntityId(self.next_id);
        self.next_id += 1;

        let parent_ent = self.map.get_mut(&parent).expect("checked above");
        let fqn = if parent == ROOT_ENTITY_ID {
            format!("::{lname}")
        } else {
            format!("{}::{}", parent_ent.fqn, lname)
        };
        parent_ent.children.push(id);

        self.map.insert(
            id,
            Entity {
                id,
                parent,
                pos,
                line,
                file,
                lname: lname.into(),
                fqn,
                children: Vec::new(),
                kind,
            },
        );
        id
    }

    /// Replace the entity at `id` with one of a new kind, preserving
    /// its id, parent, children, local name and qualified name.
    pub fn swap_entity(
        &mut self,
        id: EntityId,
        pos: u32,
        line: u32,
        file: InputFileId,
        kind: EntityKind,
    ) -> EntityId {
        assert!(line != 0, "entities carry 1-based lines");
        let old = self.map.get_mut(&id).expect("swap of nonexistent entity");

        old.pos = pos;
        old.line = line;
        old.file = file;
        old.kind = kind;
        id
    }

    /// Upgrade a placeholder to its real kind, in place.
    ///
    /// Fails when an earlier reference already pinned the placeholder
    /// to an incompatible kind. Two UDT kinds are mutually compatible;
    /// an unset `to_be` accepts anything.
    pub fn swap_placeholder(
        &mut self,
        id: EntityId,
        pos: u32,
        line: u32,
        file: InputFileId,
        kind: EntityKind,
    ) -> Result<EntityId> {
        let tag = kind.tag();
        let old = self.map.get_mut(&id).expect("swap of nonexistent entity");

        let to_be = match &mut old.kind {
            EntityKind::PlaceHolder { to_be } => to_be,
            other => panic!(
                "swap_placeholder on a non-placeholder entity ({})",
                other.tag()
            ),
        };

        if *to_be == EntityTag::None || (to_be.is_udt() && tag.is_udt()) {
            *to_be = tag;
        }

        if *to_be != tag {
            let msg = format!(
                "Expected entity \"{}\" to be of kind \"{}\" \
                 (because of a previous declaration), got \"{}\" instead.",
                old.fqn, to_be, tag
            );
            return Err(Error::msg(ErrC::InvalidArg, msg));
        }

        Ok(self.swap_entity(id, pos, line, file, kind))
    }

    /// Record on a placeholder what kind a forward reference expects it
    /// to become. Errors on a conflict, like `swap_placeholder`.
    pub fn pin_placeholder(&mut self, id: EntityId, tag: EntityTag) -> Result<()> {
        let old = self.map.get_mut(&id).expect("pin of nonexistent entity");
        let to_be = match &mut old.kind {
            EntityKind::PlaceHolder { to_be } => to_be,
            other => panic!("pin_placeholder on a non-placeholder ({})", other.tag()),
        };

        if *to_be == EntityTag::None || (to_be.is_udt() && tag.is_udt()) {
            *to_be = tag;
        }

        if *to_be != tag {
            let msg = format!(
                "Expected entity \"{}\" to be of kind \"{}\" \
                 (because of a previous declaration), got \"{}\" instead.",
                old.fqn, to_be, tag
            );
            return Err(Error::msg(ErrC::InvalidArg, msg));
        }
        Ok(())
    }

    pub fn exists(&self, id: EntityId) -> bool {
        assert!(id.is_valid(), "exists() on the invalid id");
        self.map.contains_key(&id)
    }

    /// Fetch an entity without following SymLinks.
    ///
    /// # Panics
    ///
    /// Panics on an id not in the table (invariant violation).
    pub fn get(&self, id: EntityId) -> &Entity {
        self.map
            .get(&id)
            .unwrap_or_else(|| panic!("invalid entity id {}", id.0))
    }

    pub fn get_mut(&mut self, id: EntityId) -> &mut Entity {
        self.map
            .get_mut(&id)
            .unwrap_or_else(|| panic!("invalid entity id {}", id.0))
    }

    /// Fetch an entity, collapsing any chain of SymLinks (and alias
    /// types) down to the first non-link entity.
    ///
    /// # Panics
    ///
    /// Panics on an invalid id, a dangling link, or a link cycle.
    pub fn find(&self, id: EntityId) -> &Entity {
        let mut current = self.get(id);
        let mut hops = 0;
        while let Some(link) = current.kind.link() {
            assert!(link.is_valid(), "symlink with invalid target");
            assert!(hops < MAX_LINK_HOPS, "symlink cycle at id {}", current.id.0);
            current = self.get(link);
            hops += 1;
        }
        current
    }

    /// First entity matching the predicate, in no particular order.
    pub fn find_if(&self, pred: impl Fn(&Entity) -> bool) -> Option<&Entity> {
        self.map.values().find(|e| pred(e))
    }

    /// All entities, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.map.values()
    }

    /// Child of `parent` whose local name is `lname`.
    pub fn find_child(&self, parent: EntityId, lname: &str) -> Option<EntityId> {
        let parent = self.get(parent);
        parent
            .children
            .iter()
            .copied()
            .find(|id| self.get(*id).lname == lname)
    }

    pub fn root(&self) -> &Entity {
        self.get(ROOT_ENTITY_ID)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for EntityTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::QualBase;

    fn file() -> InputFileId {
        InputFileId(1)
    }

    #[test]
    fn construction_seeds_root_and_builtins() {
        let table = EntityTable::new();
        assert_eq!(table.root().fqn, "::");
        assert_eq!(table.root().children.len(), 12);
        assert_eq!(table.get(BuiltinKind::I32.id()).fqn, "::i32");
        assert_eq!(table.len(), 13);
    }

    #[test]
    fn insert_computes_fqn_and_links_parent() {
        let mut table = EntityTable::new();
        let ns = table.insert(ROOT_ENTITY_ID, 0, 1, file(), "app", EntityKind::Static);
        let proc_id = table.insert(
            ns,
            10,
            2,
            file(),
            "main",
            EntityKind::Proc {
                params: vec![],
                return_type: EntityId::INVALID,
            },
        );

        assert_eq!(table.get(ns).fqn, "::app");
        assert_eq!(table.get(proc_id).fqn, "::app::main");
        assert_eq!(table.get(proc_id).parent, ns);
        assert!(table.get(ns).children.contains(&proc_id));
        assert!(proc_id.0 >= BuiltinKind::first_free_id());
    }

    #[test]
    fn swap_placeholder_preserves_identity() {
        let mut table = EntityTable::new();
        let ph = table.insert(
            ROOT_ENTITY_ID,
            0,
            1,
            file(),
            "box",
            EntityKind::PlaceHolder {
                to_be: EntityTag::None,
            },
        );
        let child = table.insert(
            ph,
            4,
            1,
            file(),
            "inner",
            EntityKind::PlaceHolder {
                to_be: EntityTag::None,
            },
        );

        let swapped = table
            .swap_placeholder(ph, 20, 3, file(), EntityKind::Static)
            .unwrap();

        assert_eq!(swapped, ph);
        let ent = table.get(ph);
        assert_eq!(ent.kind.tag(), EntityTag::Static);
        assert_eq!(ent.fqn, "::box");
        assert_eq!(ent.children, vec![child]);
        assert_eq!(ent.line, 3);
        // The child still resolves and still points back.
        assert_eq!(table.get(child).parent, ph);
    }

    #[test]
    fn swap_placeholder_rejects_incompatible_pins() {
        let mut table = EntityTable::new();
        let ph = table.insert(
            ROOT_ENTITY_ID,
            0,
            1,
            file(),
            "thing",
            EntityKind::PlaceHolder {
                to_be: EntityTag::None,
            },
        );
        table.pin_placeholder(ph, EntityTag::Proc).unwrap();

        let err = table
            .swap_placeholder(ph, 0, 2, file(), EntityKind::Static)
            .unwrap_err();
        assert!(err.to_string().contains("previous declaration"));
        // Still a placeholder afterwards.
        assert_eq!(table.get(ph).kind.tag(), EntityTag::PlaceHolder);
    }

    #[test]
    fn udt_pins_are_mutually_compatible() {
        let mut table = EntityTable::new();
        let ph = table.insert(
            ROOT_ENTITY_ID,
            0,
            1,
            file(),
            "Shape",
            EntityKind::PlaceHolder {
                to_be: EntityTag::None,
            },
        );
        table.pin_placeholder(ph, EntityTag::Type).unwrap();

        // Type pinned, Struct delivered: both UDTs, accepted.
        table
            .swap_placeholder(ph, 0, 2, file(), EntityKind::Struct { members: vec![] })
            .unwrap();
        assert_eq!(table.get(ph).kind.tag(), EntityTag::Struct);
    }

    #[test]
    fn find_collapses_symlink_chains() {
        let mut table = EntityTable::new();
        let target = table.insert(ROOT_ENTITY_ID, 0, 1, file(), "real", EntityKind::Type);
        let link_a = table.insert(
            ROOT_ENTITY_ID,
            0,
            1,
            file(),
            "a",
            EntityKind::SymLink { link: target },
        );
        let link_b = table.insert(
            ROOT_ENTITY_ID,
            0,
            1,
            file(),
            "b",
            EntityKind::AliasType {
                link: link_a,
                quals: QualBase::default(),
            },
        );

        assert_eq!(table.find(link_b).id, target);
        assert_eq!(table.find(link_a).id, target);
        assert_eq!(table.find(target).id, target);
        assert_ne!(table.find(link_b).kind.tag(), EntityTag::SymLink);
    }

    #[test]
    #[should_panic(expected = "symlink cycle")]
    fn symlink_cycles_panic() {
        let mut table = EntityTable::new();
        let a = table.insert(
            ROOT_ENTITY_ID,
            0,
            1,
            file(),
            "a",
            EntityKind::SymLink { link: EntityId::INVALID },
        );
        let b = table.insert(
            ROOT_ENTITY_ID,
            0,
            1,
            file(),
            "b",
            EntityKind::SymLink { link: a },
        );
        match &mut table.get_mut(a).kind {
            EntityKind::SymLink { link } => *link = b,
            _ => unreachable!(),
        }
        table.find(a);
    }

    #[test]
    #[should_panic(expected = "invalid entity id")]
    fn get_panics_on_unknown_id() {
        let table = EntityTable::new();
        table.get(EntityId(999));
    }

    #[test]
    fn find_child_by_local_name() {
        let mut table = EntityTable::new();
        let ns = table.insert(ROOT_ENTITY_ID, 0, 1, file(), "net", EntityKind::Static);
        assert_eq!(table.find_child(ROOT_ENTITY_ID, "net"), Some(ns));
        assert_eq!(table.find_child(ROOT_ENTITY_ID, "missing"), None);
        assert_eq!(table.find_child(ROOT_ENTITY_ID, "i64"), Some(BuiltinKind::I64.id()));
    }

    #[test]
    fn ids_are_never_reused() {
        let mut table = EntityTable::new();
        let ph = table.insert(
            ROOT_ENTITY_ID,
            0,
            1,
            file(),
            "x",
            EntityKind::PlaceHolder {
                to_be: EntityTag::None,
            },
        );
        table
            .swap_placeholder(ph, 0, 2, file(), EntityKind::Static)
            .unwrap();
        let next = table.insert(ROOT_ENTITY_ID, 0, 3, file(), "y", EntityKind::Static);
        assert!(next.0 > ph.0);
    }
}
