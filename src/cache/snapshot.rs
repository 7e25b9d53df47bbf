//! Immutable published-content snapshots.
//!
//! A [`Snapshot`] is the whole published tree as of one version plus its
//! secondary indices. Nodes are held behind `Arc`, so a patched snapshot
//! shares every node outside the affected branch with its predecessor.
//!
//! Routes are computed per site root: every top-level node is reached at `/`
//! and a descendant's route is the `/`-joined URL segments below its root.
//! When two siblings produce the same segment, the first by sort order owns
//! the route.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::content::{ContentId, ContentNode, ContentRecord, URL_NAME_PROPERTY};
use crate::domain::content_types::{ContentTypeAlias, ContentTypeRegistry};
use crate::domain::slug::{SlugError, url_segment};

/// Route of a node: the site root it lives under plus its path below it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub root: ContentId,
    pub path: String,
}

impl RouteKey {
    pub fn new(root: ContentId, path: impl Into<String>) -> Self {
        Self {
            root,
            path: path.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotBuildError {
    #[error("content id {0} appears more than once")]
    DuplicateId(ContentId),
    #[error("content {id} references missing parent {parent}")]
    MissingParent { id: ContentId, parent: ContentId },
    #[error("content {id} is part of a parent cycle")]
    Cycle { id: ContentId },
    #[error("content {id} uses unknown content type `{content_type}`")]
    UnknownContentType {
        id: ContentId,
        content_type: ContentTypeAlias,
    },
    #[error("content {id} has no usable url segment: {source}")]
    InvalidSegment {
        id: ContentId,
        #[source]
        source: SlugError,
    },
    #[error("subtree for {root} does not contain its root record")]
    SubtreeRootMissing { root: ContentId },
    #[error("subtree {root} attaches to {parent}, which is not in the snapshot")]
    ParentNotInSnapshot { root: ContentId, parent: ContentId },
    #[error("subtree record {id} already lives elsewhere in the snapshot")]
    ForeignNode { id: ContentId },
}

/// One change applied by [`Snapshot::patch`].
#[derive(Debug, Clone)]
pub enum SubtreeChange {
    /// Replace the subtree rooted at `root` with freshly fetched records.
    /// Empty `records` means the root is no longer published.
    Replace {
        root: ContentId,
        records: Vec<ContentRecord>,
    },
    /// Drop `root` and all of its descendants.
    Remove(ContentId),
}

/// Immutable published content tree for one version.
#[derive(Debug)]
pub struct Snapshot {
    version: u64,
    built_at: OffsetDateTime,
    content_types: Arc<ContentTypeRegistry>,
    nodes: HashMap<ContentId, Arc<ContentNode>>,
    roots: Vec<ContentId>,
    by_key: HashMap<Uuid, ContentId>,
    routes: HashMap<RouteKey, ContentId>,
    route_of: HashMap<ContentId, RouteKey>,
    aliases: HashMap<String, ContentId>,
}

impl Snapshot {
    /// The snapshot published before the first build completes.
    pub fn empty() -> Self {
        Self {
            version: 0,
            built_at: OffsetDateTime::now_utc(),
            content_types: Arc::new(ContentTypeRegistry::empty()),
            nodes: HashMap::new(),
            roots: Vec::new(),
            by_key: HashMap::new(),
            routes: HashMap::new(),
            route_of: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Build a snapshot from a complete set of records.
    ///
    /// Unpublished records and everything below them are left out. A parent
    /// that is absent from `records` altogether is an error.
    pub fn build(
        version: u64,
        content_types: Arc<ContentTypeRegistry>,
        records: Vec<ContentRecord>,
    ) -> Result<Self, SnapshotBuildError> {
        let mut all = HashMap::with_capacity(records.len());
        for record in records {
            let id = record.id;
            if all.insert(id, record).is_some() {
                return Err(SnapshotBuildError::DuplicateId(id));
            }
        }

        for record in all.values() {
            if let Some(parent) = record.parent_id
                && !all.contains_key(&parent)
            {
                return Err(SnapshotBuildError::MissingParent {
                    id: record.id,
                    parent,
                });
            }
        }

        let records = visible_records(all)?;

        let children = group_children(&records);
        let mut roots: Vec<&ContentRecord> =
            records.values().filter(|r| r.parent_id.is_none()).collect();
        roots.sort_by_key(|r| (r.sort_order, r.id));

        let mut nodes = HashMap::with_capacity(records.len());
        for root in &roots {
            materialize_branch(&content_types, &records, &children, root.id, 1, &mut nodes)?;
        }

        // Every parent exists, so anything not reached from a root hangs off a cycle.
        if let Some(stray) = records.keys().find(|id| !nodes.contains_key(*id)) {
            return Err(SnapshotBuildError::Cycle { id: *stray });
        }

        let roots = roots.into_iter().map(|r| r.id).collect();
        Ok(Self::assemble(version, content_types, nodes, roots))
    }

    /// Apply subtree changes on top of this snapshot, producing a new one.
    ///
    /// Nodes outside the touched branches are shared with `self`. Removing a
    /// node that is not present is a no-op, so replaying a change is safe.
    pub fn patch(
        &self,
        version: u64,
        changes: &[SubtreeChange],
    ) -> Result<Self, SnapshotBuildError> {
        let mut nodes = self.nodes.clone();
        let mut roots = self.roots.clone();

        for change in changes {
            match change {
                SubtreeChange::Remove(root) => {
                    remove_branch(&mut nodes, &mut roots, *root);
                }
                SubtreeChange::Replace { root, records } => {
                    let published: Vec<ContentRecord> =
                        records.iter().filter(|r| r.published).cloned().collect();
                    if published.is_empty() {
                        remove_branch(&mut nodes, &mut roots, *root);
                    } else {
                        self.replace_branch(&mut nodes, &mut roots, *root, published)?;
                    }
                }
            }
        }

        Ok(Self::assemble(
            version,
            Arc::clone(&self.content_types),
            nodes,
            roots,
        ))
    }

    fn replace_branch(
        &self,
        nodes: &mut HashMap<ContentId, Arc<ContentNode>>,
        roots: &mut Vec<ContentId>,
        root: ContentId,
        records: Vec<ContentRecord>,
    ) -> Result<(), SnapshotBuildError> {
        let records = index_records(records)?;
        let root_record = records
            .get(&root)
            .ok_or(SnapshotBuildError::SubtreeRootMissing { root })?;

        let previous = branch_ids(nodes, root);

        if let Some(parent) = root_record.parent_id
            && (!nodes.contains_key(&parent) || previous.contains(&parent))
        {
            return Err(SnapshotBuildError::ParentNotInSnapshot { root, parent });
        }

        for record in records.values() {
            if record.id == root {
                continue;
            }
            match record.parent_id {
                Some(parent) if records.contains_key(&parent) => {}
                Some(parent) => {
                    return Err(SnapshotBuildError::MissingParent {
                        id: record.id,
                        parent,
                    });
                }
                None => {
                    return Err(SnapshotBuildError::MissingParent {
                        id: record.id,
                        parent: root,
                    });
                }
            }
            if nodes.contains_key(&record.id) && !previous.contains(&record.id) {
                return Err(SnapshotBuildError::ForeignNode { id: record.id });
            }
        }

        let level = match root_record.parent_id {
            Some(parent) => nodes.get(&parent).map_or(1, |p| p.level.saturating_add(1)),
            None => 1,
        };
        let parent_id = root_record.parent_id;

        let children = group_children(&records);
        let mut fresh = HashMap::with_capacity(records.len());
        materialize_branch(
            &self.content_types,
            &records,
            &children,
            root,
            level,
            &mut fresh,
        )?;
        if let Some(stray) = records.keys().find(|id| !fresh.contains_key(*id)) {
            return Err(SnapshotBuildError::Cycle { id: *stray });
        }

        remove_branch(nodes, roots, root);
        nodes.extend(fresh);

        match parent_id {
            Some(parent) => attach_child(nodes, parent, root),
            None => {
                roots.push(root);
                sort_ids(nodes, roots);
            }
        }

        Ok(())
    }

    fn assemble(
        version: u64,
        content_types: Arc<ContentTypeRegistry>,
        nodes: HashMap<ContentId, Arc<ContentNode>>,
        roots: Vec<ContentId>,
    ) -> Self {
        let mut by_key = HashMap::new();
        let mut routes = HashMap::new();
        let mut route_of = HashMap::with_capacity(nodes.len());
        let mut aliases = HashMap::new();

        for root in &roots {
            let mut stack = vec![(*root, String::from("/"))];
            while let Some((id, path)) = stack.pop() {
                let Some(node) = nodes.get(&id) else {
                    continue;
                };

                let key = RouteKey::new(*root, path.clone());
                routes.entry(key.clone()).or_insert(id);
                route_of.insert(id, key);

                if let Some(uuid) = node.key {
                    by_key.entry(uuid).or_insert(id);
                }
                for alias in node.url_aliases() {
                    aliases.entry(alias).or_insert(id);
                }

                // Reverse push so siblings pop in sort order and the first one owns a colliding route.
                for child in node.children.iter().rev() {
                    let Some(child_node) = nodes.get(child) else {
                        continue;
                    };
                    let child_path = if path == "/" {
                        format!("/{}", child_node.url_segment)
                    } else {
                        format!("{path}/{}", child_node.url_segment)
                    };
                    stack.push((*child, child_path));
                }
            }
        }

        Self {
            version,
            built_at: OffsetDateTime::now_utc(),
            content_types,
            nodes,
            roots,
            by_key,
            routes,
            route_of,
            aliases,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn built_at(&self) -> OffsetDateTime {
        self.built_at
    }

    pub fn content_types(&self) -> &Arc<ContentTypeRegistry> {
        &self.content_types
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: ContentId) -> Option<&Arc<ContentNode>> {
        self.nodes.get(&id)
    }

    pub fn get_by_key(&self, key: Uuid) -> Option<&Arc<ContentNode>> {
        self.by_key.get(&key).and_then(|id| self.nodes.get(id))
    }

    /// Top-level nodes in sort order.
    pub fn roots(&self) -> impl Iterator<Item = &Arc<ContentNode>> {
        self.roots.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Root used when a request matches no domain binding.
    pub fn default_root(&self) -> Option<ContentId> {
        self.roots.first().copied()
    }

    pub fn children(&self, id: ContentId) -> impl Iterator<Item = &Arc<ContentNode>> {
        self.nodes
            .get(&id)
            .into_iter()
            .flat_map(|node| node.children.iter())
            .filter_map(|child| self.nodes.get(child))
    }

    pub fn parent(&self, node: &ContentNode) -> Option<&Arc<ContentNode>> {
        node.parent_id.and_then(|parent| self.nodes.get(&parent))
    }

    pub fn content_at_route(&self, route: &RouteKey) -> Option<&Arc<ContentNode>> {
        self.routes.get(route).and_then(|id| self.nodes.get(id))
    }

    pub fn route_of(&self, id: ContentId) -> Option<&RouteKey> {
        self.route_of.get(&id)
    }

    pub fn content_by_alias(&self, path: &str) -> Option<&Arc<ContentNode>> {
        self.aliases.get(path).and_then(|id| self.nodes.get(id))
    }

    pub fn ids(&self) -> impl Iterator<Item = ContentId> + '_ {
        self.nodes.keys().copied()
    }
}

fn index_records(
    records: Vec<ContentRecord>,
) -> Result<HashMap<ContentId, ContentRecord>, SnapshotBuildError> {
    let mut indexed = HashMap::with_capacity(records.len());
    for record in records.into_iter().filter(|r| r.published) {
        let id = record.id;
        if indexed.insert(id, record).is_some() {
            return Err(SnapshotBuildError::DuplicateId(id));
        }
    }
    Ok(indexed)
}

/// Keep published records whose ancestors are all published.
///
/// Every parent id must already be present in `all`.
fn visible_records(
    all: HashMap<ContentId, ContentRecord>,
) -> Result<HashMap<ContentId, ContentRecord>, SnapshotBuildError> {
    let mut visible = HashSet::new();
    for record in all.values().filter(|r| r.published) {
        let mut current = record;
        let mut depth = 0;
        let reachable = loop {
            let Some(parent) = current.parent_id.and_then(|id| all.get(&id)) else {
                break current.parent_id.is_none();
            };
            if !parent.published {
                break false;
            }
            depth += 1;
            if depth > all.len() {
                return Err(SnapshotBuildError::Cycle { id: record.id });
            }
            current = parent;
        };
        if reachable {
            visible.insert(record.id);
        }
    }

    Ok(all
        .into_iter()
        .filter(|(id, _)| visible.contains(id))
        .collect())
}

fn group_children(
    records: &HashMap<ContentId, ContentRecord>,
) -> HashMap<ContentId, Vec<ContentId>> {
    let mut children: HashMap<ContentId, Vec<&ContentRecord>> = HashMap::new();
    for record in records.values() {
        if let Some(parent) = record.parent_id {
            children.entry(parent).or_default().push(record);
        }
    }

    children
        .into_iter()
        .map(|(parent, mut kids)| {
            kids.sort_by_key(|r| (r.sort_order, r.id));
            (parent, kids.into_iter().map(|r| r.id).collect())
        })
        .collect()
}

fn materialize_branch(
    content_types: &ContentTypeRegistry,
    records: &HashMap<ContentId, ContentRecord>,
    children: &HashMap<ContentId, Vec<ContentId>>,
    root: ContentId,
    level: u16,
    out: &mut HashMap<ContentId, Arc<ContentNode>>,
) -> Result<(), SnapshotBuildError> {
    let mut stack = vec![(root, level)];
    while let Some((id, level)) = stack.pop() {
        let Some(record) = records.get(&id) else {
            continue;
        };
        if out.contains_key(&id) {
            return Err(SnapshotBuildError::Cycle { id });
        }

        if !content_types.contains(&record.content_type) {
            return Err(SnapshotBuildError::UnknownContentType {
                id,
                content_type: record.content_type.clone(),
            });
        }

        let explicit = record
            .properties
            .get(URL_NAME_PROPERTY)
            .and_then(|value| value.as_text());
        let segment = url_segment(explicit, &record.name)
            .map_err(|source| SnapshotBuildError::InvalidSegment { id, source })?;

        let kids = children.get(&id).cloned().unwrap_or_default();
        for kid in &kids {
            stack.push((*kid, level.saturating_add(1)));
        }

        out.insert(
            id,
            Arc::new(ContentNode {
                id,
                key: record.key,
                parent_id: record.parent_id,
                name: record.name.clone(),
                content_type: record.content_type.clone(),
                sort_order: record.sort_order,
                level,
                url_segment: segment,
                template: record.template.clone(),
                culture: record.culture.clone(),
                children: kids,
                properties: record.properties.clone(),
            }),
        );
    }
    Ok(())
}

fn branch_ids(nodes: &HashMap<ContentId, Arc<ContentNode>>, root: ContentId) -> HashSet<ContentId> {
    let mut ids = HashSet::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let Some(node) = nodes.get(&id) else {
            continue;
        };
        if ids.insert(id) {
            stack.extend(node.children.iter().copied());
        }
    }
    ids
}

fn remove_branch(
    nodes: &mut HashMap<ContentId, Arc<ContentNode>>,
    roots: &mut Vec<ContentId>,
    root: ContentId,
) {
    let Some(parent_id) = nodes.get(&root).map(|node| node.parent_id) else {
        return;
    };

    for id in branch_ids(nodes, root) {
        nodes.remove(&id);
    }

    match parent_id {
        Some(parent) => {
            if let Some(parent_node) = nodes.get(&parent) {
                let mut updated = ContentNode::clone(parent_node);
                updated.children.retain(|child| *child != root);
                nodes.insert(parent, Arc::new(updated));
            }
        }
        None => roots.retain(|id| *id != root),
    }
}

fn attach_child(nodes: &mut HashMap<ContentId, Arc<ContentNode>>, parent: ContentId, child: ContentId) {
    let Some(parent_node) = nodes.get(&parent) else {
        return;
    };
    let mut updated = ContentNode::clone(parent_node);
    if !updated.children.contains(&child) {
        updated.children.push(child);
    }
    sort_ids(nodes, &mut updated.children);
    nodes.insert(parent, Arc::new(updated));
}

fn sort_ids(nodes: &HashMap<ContentId, Arc<ContentNode>>, ids: &mut [ContentId]) {
    ids.sort_by_key(|id| (nodes.get(id).map_or(i32::MAX, |n| n.sort_order), *id));
}
