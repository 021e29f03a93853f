//! Object connection graph
//!
//! Linking is two-phase: [`ObjectIndex::collect`] records every object under
//! `Objects` by id, then [`SceneGraph::link`] applies the `Connections`
//! section on top of the finished index, so connections may reference objects
//! declared anywhere in the file.

use hashbrown::HashMap;
use tracing::{debug, warn};

use crate::node::{FbxDocument, Node, Property};
use crate::objects::{FbxObject, Model};

pub type ObjectId = i64;

/// Implicit id of the scene root
pub const SCENE_ROOT_ID: ObjectId = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionKind {
    /// `OO`: object to object
    Object,
    /// `OP`: object to a named property of the parent
    Property(String),
}

/// One `C` record: `child` is connected into `parent`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub child: ObjectId,
    pub parent: ObjectId,
    pub kind: ConnectionKind,
}

impl Connection {
    /// Decode a `C: "OO", child, parent[, "property"]` record
    pub fn from_node(node: &Node) -> Option<Self> {
        if node.name != "C" {
            return None;
        }
        let kind = match node.property(0)?.as_str()? {
            "OO" => ConnectionKind::Object,
            "OP" => ConnectionKind::Property(node.property(3)?.as_str()?.to_string()),
            _ => return None,
        };
        Some(Self {
            child: node.property(1)?.as_i64()?,
            parent: node.property(2)?.as_i64()?,
            kind,
        })
    }

    pub fn to_node(&self) -> Node {
        let node = Node::new("C");
        let node = match &self.kind {
            ConnectionKind::Object => node.with_property(Property::String("OO".into())),
            ConnectionKind::Property(_) => node.with_property(Property::String("OP".into())),
        };
        let node = node
            .with_property(Property::I64(self.child))
            .with_property(Property::I64(self.parent));
        match &self.kind {
            ConnectionKind::Property(name) => node.with_property(Property::String(name.clone())),
            ConnectionKind::Object => node,
        }
    }
}

/// Phase 1: every object under `Objects`, keyed by id, in file order
#[derive(Debug, Default)]
pub struct ObjectIndex<'a> {
    objects: HashMap<ObjectId, &'a Node>,
    order: Vec<ObjectId>,
}

impl<'a> ObjectIndex<'a> {
    pub fn collect(document: &'a FbxDocument) -> Self {
        let mut index = Self::default();
        let Some(objects) = document.find("Objects") else {
            warn!("FBX has no Objects section");
            return index;
        };
        for node in &objects.children {
            let Some(id) = node.property(0).and_then(Property::as_i64) else {
                debug!(record = %node.name, "object without id, ignored");
                continue;
            };
            if index.objects.insert(id, node).is_some() {
                warn!(id, "duplicate object id, later declaration wins");
            } else {
                index.order.push(id);
            }
        }
        index
    }

    pub fn get(&self, id: ObjectId) -> Option<&'a Node> {
        self.objects.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Objects in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &'a Node)> + '_ {
        self.order
            .iter()
            .filter_map(|&id| self.objects.get(&id).map(|&node| (id, node)))
    }
}

/// Phase 2: index plus resolved parent/child edges
#[derive(Debug, Default)]
pub struct SceneGraph<'a> {
    index: ObjectIndex<'a>,
    children: HashMap<ObjectId, Vec<(ObjectId, ConnectionKind)>>,
    parents: HashMap<ObjectId, Vec<(ObjectId, ConnectionKind)>>,
}

impl<'a> SceneGraph<'a> {
    /// Run both phases over a parsed document
    pub fn build(document: &'a FbxDocument) -> Self {
        let index = ObjectIndex::collect(document);
        let connections: Vec<Connection> = document
            .find("Connections")
            .map(|section| section.children.iter().filter_map(Connection::from_node).collect())
            .unwrap_or_default();
        Self::link(index, connections)
    }

    /// Apply connections to a finished index; edges naming unknown objects
    /// are dropped with a warning
    pub fn link(index: ObjectIndex<'a>, connections: Vec<Connection>) -> Self {
        let mut graph = Self {
            index,
            ..Default::default()
        };
        let mut dropped = 0usize;
        for connection in connections {
            let parent_known =
                connection.parent == SCENE_ROOT_ID || graph.index.get(connection.parent).is_some();
            if graph.index.get(connection.child).is_none() || !parent_known {
                dropped += 1;
                continue;
            }
            graph
                .children
                .entry(connection.parent)
                .or_default()
                .push((connection.child, connection.kind.clone()));
            graph
                .parents
                .entry(connection.child)
                .or_default()
                .push((connection.parent, connection.kind));
        }
        if dropped > 0 {
            warn!(dropped, "connections referencing unknown objects");
        }
        debug!(
            objects = graph.index.len(),
            edges = graph.parents.values().map(Vec::len).sum::<usize>(),
            "linked FBX connections"
        );
        graph
    }

    pub fn index(&self) -> &ObjectIndex<'a> {
        &self.index
    }

    pub fn object(&self, id: ObjectId) -> Option<&'a Node> {
        self.index.get(id)
    }

    /// Objects connected into `id` (object-to-object and property connections)
    pub fn children(&self, id: ObjectId) -> impl Iterator<Item = (ObjectId, &'a Node)> + '_ {
        self.children
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|(child, _)| self.index.get(*child).map(|node| (*child, node)))
    }

    /// Children whose record name is `class` (`Geometry`, `Deformer`, ...)
    pub fn children_of_class<'s>(
        &'s self,
        id: ObjectId,
        class: &'s str,
    ) -> impl Iterator<Item = (ObjectId, &'a Node)> + 's {
        self.children(id).filter(move |(_, node)| node.name == class)
    }

    /// Child connected through the named property (`OP` connection)
    pub fn property_child(&self, id: ObjectId, property: &str) -> Option<&'a Node> {
        self.children.get(&id)?.iter().find_map(|(child, kind)| match kind {
            ConnectionKind::Property(name) if name == property => self.index.get(*child),
            _ => None,
        })
    }

    /// Parents `id` is connected into, the scene root included
    pub fn parents(&self, id: ObjectId) -> impl Iterator<Item = ObjectId> + '_ {
        self.parents.get(&id).into_iter().flatten().map(|(p, _)| *p)
    }

    /// First parent whose record name is `class`
    pub fn parent_of_class(&self, id: ObjectId, class: &str) -> Option<(ObjectId, &'a Node)> {
        self.parents(id)
            .filter_map(|p| self.index.get(p).map(|node| (p, node)))
            .find(|(_, node)| node.name == class)
    }

    /// Every `Model` object in declaration order
    pub fn models(&self) -> impl Iterator<Item = Model<'a>> + '_ {
        self.index.iter().filter_map(|(_, node)| Model::from_node(node))
    }

    /// Parent model of a model, `None` for models attached to the scene root
    pub fn parent_model(&self, model: &Model<'a>) -> Option<Model<'a>> {
        self.parent_of_class(model.id(), "Model")
            .and_then(|(_, node)| Model::from_node(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(class: &str, id: i64, name: &str, kind: &str) -> Node {
        Node::new(class)
            .with_property(Property::I64(id))
            .with_property(Property::String(format!("{name}\u{0}\u{1}{class}")))
            .with_property(Property::String(kind.into()))
    }

    fn connection(kind: &str, child: i64, parent: i64) -> Node {
        Node::new("C")
            .with_property(Property::String(kind.into()))
            .with_property(Property::I64(child))
            .with_property(Property::I64(parent))
    }

    fn document() -> FbxDocument {
        FbxDocument {
            version: 7400,
            nodes: vec![
                // Connections before Objects: linking must not depend on order
                Node::new("Connections")
                    .with_child(connection("OO", 20, 10))
                    .with_child(connection("OO", 10, 0))
                    .with_child(connection("OO", 30, 10))
                    .with_child(connection("OO", 99, 10))
                    .with_child(connection("OP", 40, 30).with_property(Property::String("DiffuseColor".into()))),
                Node::new("Objects")
                    .with_child(object("Model", 10, "Body", "Mesh"))
                    .with_child(object("Geometry", 20, "Body", "Mesh"))
                    .with_child(object("Material", 30, "Skin", ""))
                    .with_child(object("Texture", 40, "skin.png", "")),
            ],
        }
    }

    #[test]
    fn test_link_resolves_children() {
        let doc = document();
        let graph = SceneGraph::build(&doc);

        assert_eq!(graph.index().len(), 4);
        let geometry: Vec<_> = graph.children_of_class(10, "Geometry").map(|(id, _)| id).collect();
        assert_eq!(geometry, vec![20]);
        assert_eq!(graph.parents(10).collect::<Vec<_>>(), vec![SCENE_ROOT_ID]);
        assert_eq!(
            graph.property_child(30, "DiffuseColor").map(|n| n.name.as_str()),
            Some("Texture")
        );
    }

    #[test]
    fn test_dangling_connection_dropped() {
        let doc = document();
        let graph = SceneGraph::build(&doc);
        // 99 is not an object
        assert_eq!(graph.children(10).count(), 2);
    }

    #[test]
    fn test_connection_node_roundtrip() {
        let c = Connection {
            child: 5,
            parent: 6,
            kind: ConnectionKind::Property("Lcl Translation".into()),
        };
        assert_eq!(Connection::from_node(&c.to_node()), Some(c));
    }

    #[test]
    fn test_models_and_parent_model() {
        let doc = FbxDocument {
            version: 7400,
            nodes: vec![
                Node::new("Objects")
                    .with_child(object("Model", 1, "Hips", "LimbNode"))
                    .with_child(object("Model", 2, "Spine", "LimbNode")),
                Node::new("Connections")
                    .with_child(connection("OO", 1, 0))
                    .with_child(connection("OO", 2, 1)),
            ],
        };
        let graph = SceneGraph::build(&doc);
        let models: Vec<_> = graph.models().collect();
        assert_eq!(models.len(), 2);
        assert!(graph.parent_model(&models[0]).is_none());
        assert_eq!(graph.parent_model(&models[1]).map(|m| m.id()), Some(1));
    }
}
