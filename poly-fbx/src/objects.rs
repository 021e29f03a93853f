//! Typed views over object records
//!
//! Each wrapper borrows one node from the tree and exposes what the importers
//! need. Shared behaviour lives in capability traits: [`FbxObject`] for every
//! object, [`HasTransform`] for scene nodes and [`HasWeights`] for skin
//! clusters.

use glam::{DMat4, DQuat, DVec3};
use poly_common::{euler_to_quat, EulerOrder};
use tracing::warn;

use crate::graph::{ObjectId, SceneGraph};
use crate::node::{object_name, Node, Property};

/// Common accessors for records under `Objects`
pub trait FbxObject<'a> {
    fn node(&self) -> &'a Node;

    fn id(&self) -> ObjectId {
        self.node().property(0).and_then(Property::as_i64).unwrap_or(0)
    }

    /// Object name without the `\x00\x01Class` suffix
    fn name(&self) -> &'a str {
        self.node()
            .property(1)
            .and_then(Property::as_str)
            .map(object_name)
            .unwrap_or("")
    }

    /// Sub-class string (`"Mesh"`, `"LimbNode"`, `"Cluster"`, ...)
    fn kind(&self) -> &'a str {
        self.node().property(2).and_then(Property::as_str).unwrap_or("")
    }

    /// Values of a `Properties70` entry (`P: name, type, label, flags, values...`)
    fn property70(&self, name: &str) -> Option<&'a [Property]> {
        let table = self.node().find_child("Properties70")?;
        let entry = table.children.iter().find(|p| {
            p.name == "P" && p.property(0).and_then(Property::as_str) == Some(name)
        })?;
        Some(entry.properties.get(4..).unwrap_or(&[]))
    }

    fn property70_f64(&self, name: &str) -> Option<f64> {
        self.property70(name)?.first()?.as_f64()
    }

    fn property70_vec3(&self, name: &str) -> Option<DVec3> {
        match self.property70(name)? {
            [x, y, z, ..] => Some(DVec3::new(x.as_f64()?, y.as_f64()?, z.as_f64()?)),
            _ => None,
        }
    }
}

/// Scene nodes with `Lcl Translation` / `Lcl Rotation` / `Lcl Scaling`
pub trait HasTransform<'a>: FbxObject<'a> {
    fn local_translation(&self) -> DVec3 {
        self.property70_vec3("Lcl Translation").unwrap_or(DVec3::ZERO)
    }

    /// Euler angles in degrees, X applied first
    fn local_rotation(&self) -> DVec3 {
        self.property70_vec3("Lcl Rotation").unwrap_or(DVec3::ZERO)
    }

    fn local_scaling(&self) -> DVec3 {
        self.property70_vec3("Lcl Scaling").unwrap_or(DVec3::ONE)
    }

    fn pre_rotation(&self) -> DVec3 {
        self.property70_vec3("PreRotation").unwrap_or(DVec3::ZERO)
    }

    /// `T * Rpre * R * S`
    fn local_matrix(&self) -> DMat4 {
        let rotation = degrees_to_quat(self.pre_rotation()) * degrees_to_quat(self.local_rotation());
        DMat4::from_scale_rotation_translation(
            self.local_scaling(),
            rotation,
            self.local_translation(),
        )
    }
}

/// Skin clusters: control point indices with matching weights
pub trait HasWeights<'a>: FbxObject<'a> {
    fn indexes(&self) -> &'a [i32] {
        self.node()
            .child_property("Indexes")
            .and_then(Property::as_i32_slice)
            .unwrap_or(&[])
    }

    fn weights(&self) -> Vec<f64> {
        self.node()
            .child_property("Weights")
            .and_then(Property::to_f64_vec)
            .unwrap_or_default()
    }

    /// `(control point, weight)` pairs; unmatched trailing entries and
    /// negative indices are dropped
    fn weighted_indices(&self) -> Vec<(usize, f64)> {
        self.indexes()
            .iter()
            .zip(self.weights())
            .filter_map(|(&i, w)| usize::try_from(i).ok().map(|i| (i, w)))
            .collect()
    }
}

fn degrees_to_quat(degrees: DVec3) -> DQuat {
    euler_to_quat(
        DVec3::new(
            degrees.x.to_radians(),
            degrees.y.to_radians(),
            degrees.z.to_radians(),
        ),
        EulerOrder::Xyz,
    )
}

/// Column-major 4x4 matrix stored as 16 doubles
fn matrix_property(node: &Node, name: &str) -> Option<DMat4> {
    let values = node.child_property(name)?.to_f64_vec()?;
    let array: [f64; 16] = values.get(..16)?.try_into().ok()?;
    Some(DMat4::from_cols_array(&array))
}

fn vec3_list(values: &[f64]) -> Vec<DVec3> {
    values
        .chunks_exact(3)
        .map(|c| DVec3::new(c[0], c[1], c[2]))
        .collect()
}

macro_rules! object_wrapper {
    ($(#[$meta:meta])* $name:ident, $record:literal $(, $kind:literal)?) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name<'a> {
            node: &'a Node,
        }

        impl<'a> $name<'a> {
            pub fn from_node(node: &'a Node) -> Option<Self> {
                if node.name != $record {
                    return None;
                }
                $(
                    if node.property(2).and_then(Property::as_str) != Some($kind) {
                        return None;
                    }
                )?
                Some(Self { node })
            }
        }

        impl<'a> FbxObject<'a> for $name<'a> {
            fn node(&self) -> &'a Node {
                self.node
            }
        }
    };
}

object_wrapper!(
    /// Scene node: mesh holder, bone (`LimbNode`) or null
    Model,
    "Model"
);
object_wrapper!(
    /// Polygon mesh geometry
    Geometry,
    "Geometry",
    "Mesh"
);
object_wrapper!(
    /// Blend shape target geometry (sparse deltas)
    Shape,
    "Geometry",
    "Shape"
);
object_wrapper!(Skin, "Deformer", "Skin");
object_wrapper!(
    /// One bone's influence inside a skin
    Cluster,
    "Deformer",
    "Cluster"
);
object_wrapper!(BlendShapeChannel, "Deformer", "BlendShapeChannel");
object_wrapper!(Material, "Material");
object_wrapper!(Texture, "Texture");

impl<'a> HasTransform<'a> for Model<'a> {}

impl<'a> HasWeights<'a> for Cluster<'a> {}

impl<'a> Model<'a> {
    pub fn is_mesh(&self) -> bool {
        self.kind() == "Mesh"
    }

    pub fn is_bone(&self) -> bool {
        matches!(self.kind(), "LimbNode" | "Root")
    }

    pub fn geometry(&self, graph: &SceneGraph<'a>) -> Option<Geometry<'a>> {
        graph
            .children_of_class(self.id(), "Geometry")
            .find_map(|(_, node)| Geometry::from_node(node))
    }

    /// Materials in connection order (the order polygon material indices use)
    pub fn materials(&self, graph: &SceneGraph<'a>) -> Vec<Material<'a>> {
        graph
            .children_of_class(self.id(), "Material")
            .filter_map(|(_, node)| Material::from_node(node))
            .collect()
    }

    /// Model-space matrix: local matrices multiplied up the parent chain
    pub fn global_matrix(&self, graph: &SceneGraph<'a>) -> DMat4 {
        let mut matrix = self.local_matrix();
        let mut current = *self;
        // Bounded walk; connection data may contain cycles
        for _ in 0..graph.index().len() {
            match graph.parent_model(&current) {
                Some(parent) => {
                    matrix = parent.local_matrix() * matrix;
                    current = parent;
                }
                None => break,
            }
        }
        matrix
    }
}

/// How a layer element maps values onto the mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingMode {
    ByControlPoint,
    ByPolygonVertex,
    ByPolygon,
    AllSame,
}

impl MappingMode {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "ByControlPoint" | "ByVertex" | "ByVertice" => Some(Self::ByControlPoint),
            "ByPolygonVertex" => Some(Self::ByPolygonVertex),
            "ByPolygon" => Some(Self::ByPolygon),
            "AllSame" => Some(Self::AllSame),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceMode {
    Direct,
    IndexToDirect,
}

/// Decoded `LayerElement*` block
#[derive(Debug, Clone, PartialEq)]
pub struct LayerElement {
    pub mapping: MappingMode,
    pub reference: ReferenceMode,
    pub values: Vec<f64>,
    pub indices: Vec<i32>,
    /// Components per value (3 for normals, 2 for UVs, 1 for material ids)
    pub components: usize,
}

impl LayerElement {
    fn from_node(node: &Node, values: &str, indices: &str, components: usize) -> Option<Self> {
        let mapping = MappingMode::parse(node.child_property("MappingInformationType")?.as_str()?)?;
        let reference = match node
            .child_property("ReferenceInformationType")
            .and_then(Property::as_str)
        {
            Some("IndexToDirect") | Some("Index") => ReferenceMode::IndexToDirect,
            _ => ReferenceMode::Direct,
        };
        Some(Self {
            mapping,
            reference,
            values: node.child_property(values)?.to_f64_vec()?,
            indices: node
                .child_property(indices)
                .and_then(Property::as_i32_slice)
                .map(<[i32]>::to_vec)
                .unwrap_or_default(),
            components,
        })
    }

    /// Value slot for one polygon corner
    pub fn value_index(&self, polygon: usize, corner: usize, control_point: usize) -> Option<usize> {
        let slot = match self.mapping {
            MappingMode::ByControlPoint => control_point,
            MappingMode::ByPolygonVertex => corner,
            MappingMode::ByPolygon => polygon,
            MappingMode::AllSame => 0,
        };
        match self.reference {
            ReferenceMode::Direct => Some(slot),
            ReferenceMode::IndexToDirect => usize::try_from(*self.indices.get(slot)?).ok(),
        }
    }

    pub fn value(&self, polygon: usize, corner: usize, control_point: usize) -> Option<&[f64]> {
        let i = self.value_index(polygon, corner, control_point)?;
        self.values
            .get(i * self.components..(i + 1) * self.components)
    }
}

/// One polygon: control point indices plus the running corner index of its
/// first corner (the index layer elements use for `ByPolygonVertex`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polygon {
    pub control_points: Vec<usize>,
    pub first_corner: usize,
}

impl<'a> Geometry<'a> {
    pub fn control_points(&self) -> Vec<DVec3> {
        self.node
            .child_property("Vertices")
            .and_then(Property::to_f64_vec)
            .map(|v| vec3_list(&v))
            .unwrap_or_default()
    }

    /// Polygons from `PolygonVertexIndex`; the last corner of each polygon is
    /// stored bitwise-negated
    pub fn polygons(&self) -> Vec<Polygon> {
        let Some(indices) = self
            .node
            .child_property("PolygonVertexIndex")
            .and_then(Property::as_i32_slice)
        else {
            return Vec::new();
        };

        let mut polygons = Vec::new();
        let mut current = Vec::new();
        let mut first_corner = 0;
        for (corner, &raw) in indices.iter().enumerate() {
            let last = raw < 0;
            let index = if last { !raw } else { raw };
            current.push(index as usize);
            if last {
                polygons.push(Polygon {
                    control_points: std::mem::take(&mut current),
                    first_corner,
                });
                first_corner = corner + 1;
            }
        }
        if !current.is_empty() {
            warn!(
                geometry = %self.name(),
                corners = current.len(),
                "last polygon has no end marker, dropped"
            );
        }
        polygons
    }

    pub fn normals(&self) -> Option<LayerElement> {
        LayerElement::from_node(
            self.node.find_child("LayerElementNormal")?,
            "Normals",
            "NormalsIndex",
            3,
        )
    }

    pub fn uvs(&self) -> Option<LayerElement> {
        LayerElement::from_node(self.node.find_child("LayerElementUV")?, "UV", "UVIndex", 2)
    }

    /// Per-polygon material slot (index into [`Model::materials`])
    pub fn material_slot(&self, polygon: usize) -> Option<usize> {
        let layer = self.node.find_child("LayerElementMaterial")?;
        let mapping =
            MappingMode::parse(layer.child_property("MappingInformationType")?.as_str()?)?;
        let slots = layer.child_property("Materials")?.as_i32_slice()?;
        let slot = match mapping {
            MappingMode::AllSame => slots.first(),
            _ => slots.get(polygon),
        }?;
        usize::try_from(*slot).ok()
    }

    pub fn skins(&self, graph: &SceneGraph<'a>) -> Vec<Skin<'a>> {
        graph
            .children_of_class(self.id(), "Deformer")
            .filter_map(|(_, node)| Skin::from_node(node))
            .collect()
    }

    /// Channels of every blend shape deformer attached to this geometry
    pub fn blend_shape_channels(&self, graph: &SceneGraph<'a>) -> Vec<BlendShapeChannel<'a>> {
        graph
            .children_of_class(self.id(), "Deformer")
            .filter(|(_, node)| node.property(2).and_then(Property::as_str) == Some("BlendShape"))
            .flat_map(|(id, _)| {
                graph
                    .children_of_class(id, "Deformer")
                    .filter_map(|(_, node)| BlendShapeChannel::from_node(node))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

impl<'a> Shape<'a> {
    pub fn indexes(&self) -> &'a [i32] {
        self.node
            .child_property("Indexes")
            .and_then(Property::as_i32_slice)
            .unwrap_or(&[])
    }

    /// Position deltas, parallel to [`indexes`](Self::indexes)
    pub fn deltas(&self) -> Vec<DVec3> {
        self.node
            .child_property("Vertices")
            .and_then(Property::to_f64_vec)
            .map(|v| vec3_list(&v))
            .unwrap_or_default()
    }
}

impl<'a> Skin<'a> {
    pub fn clusters(&self, graph: &SceneGraph<'a>) -> Vec<Cluster<'a>> {
        graph
            .children_of_class(self.id(), "Deformer")
            .filter_map(|(_, node)| Cluster::from_node(node))
            .collect()
    }
}

impl<'a> Cluster<'a> {
    /// Bone model driving this cluster
    pub fn bone(&self, graph: &SceneGraph<'a>) -> Option<Model<'a>> {
        graph
            .children_of_class(self.id(), "Model")
            .find_map(|(_, node)| Model::from_node(node))
    }

    /// Bone's model-space matrix at bind time
    pub fn transform_link(&self) -> Option<DMat4> {
        matrix_property(self.node, "TransformLink")
    }

    /// Mesh's model-space matrix at bind time
    pub fn transform(&self) -> Option<DMat4> {
        matrix_property(self.node, "Transform")
    }
}

impl<'a> BlendShapeChannel<'a> {
    pub fn shapes(&self, graph: &SceneGraph<'a>) -> Vec<Shape<'a>> {
        graph
            .children_of_class(self.id(), "Geometry")
            .filter_map(|(_, node)| Shape::from_node(node))
            .collect()
    }

    /// Default influence in percent
    pub fn deform_percent(&self) -> f64 {
        self.node
            .child_property("DeformPercent")
            .and_then(Property::as_f64)
            .or_else(|| self.property70_f64("DeformPercent"))
            .unwrap_or(0.0)
    }
}

impl<'a> Material<'a> {
    /// RGB diffuse colour, falling back to the legacy `Diffuse` entry
    pub fn diffuse_color(&self) -> Option<DVec3> {
        self.property70_vec3("DiffuseColor")
            .or_else(|| self.property70_vec3("Diffuse"))
    }

    pub fn opacity(&self) -> f64 {
        self.property70_f64("Opacity").unwrap_or(1.0)
    }

    pub fn ambient_color(&self) -> Option<DVec3> {
        self.property70_vec3("AmbientColor")
    }

    pub fn emissive_color(&self) -> Option<DVec3> {
        self.property70_vec3("EmissiveColor")
    }

    pub fn specular_color(&self) -> Option<DVec3> {
        self.property70_vec3("SpecularColor")
    }

    pub fn shininess(&self) -> Option<f64> {
        self.property70_f64("Shininess")
            .or_else(|| self.property70_f64("ShininessExponent"))
    }

    pub fn diffuse_texture(&self, graph: &SceneGraph<'a>) -> Option<Texture<'a>> {
        Texture::from_node(graph.property_child(self.id(), "DiffuseColor")?)
    }
}

impl<'a> Texture<'a> {
    /// Relative path if present, else the absolute one
    pub fn file_name(&self) -> Option<&'a str> {
        ["RelativeFilename", "FileName"]
            .into_iter()
            .filter_map(|name| self.node.child_property(name)?.as_str())
            .find(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FbxDocument;

    fn p70(name: &str, values: &[f64]) -> Node {
        let mut node = Node::new("P")
            .with_property(Property::String(name.into()))
            .with_property(Property::String("Vector3D".into()))
            .with_property(Property::String(String::new()))
            .with_property(Property::String("A".into()));
        for &v in values {
            node = node.with_property(Property::F64(v));
        }
        node
    }

    fn object(class: &str, id: i64, name: &str, kind: &str) -> Node {
        Node::new(class)
            .with_property(Property::I64(id))
            .with_property(Property::String(format!("{name}\u{0}\u{1}{class}")))
            .with_property(Property::String(kind.into()))
    }

    fn string_child(name: &str, value: &str) -> Node {
        Node::new(name).with_property(Property::String(value.into()))
    }

    #[test]
    fn test_model_transform() {
        let node = object("Model", 1, "Arm", "LimbNode").with_child(
            Node::new("Properties70")
                .with_child(p70("Lcl Translation", &[1.0, 2.0, 3.0]))
                .with_child(p70("Lcl Rotation", &[0.0, 0.0, 90.0])),
        );
        let model = Model::from_node(&node).unwrap();
        assert_eq!(model.name(), "Arm");
        assert!(model.is_bone());
        assert_eq!(model.local_translation(), DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(model.local_scaling(), DVec3::ONE);

        let moved = model.local_matrix().transform_point3(DVec3::X);
        assert!((moved - DVec3::new(1.0, 3.0, 3.0)).length() < 1e-9, "{moved:?}");
    }

    #[test]
    fn test_wrapper_checks_kind() {
        let skin = object("Deformer", 2, "Skin", "Skin");
        assert!(Skin::from_node(&skin).is_some());
        assert!(Cluster::from_node(&skin).is_none());
        assert!(Geometry::from_node(&skin).is_none());
    }

    #[test]
    fn test_geometry_polygons_and_layers() {
        let node = object("Geometry", 3, "Quad", "Mesh")
            .with_child(Node::new("Vertices").with_property(Property::F64Array(vec![
                0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0,
            ])))
            .with_child(
                Node::new("PolygonVertexIndex")
                    .with_property(Property::I32Array(vec![0, 1, !2, 0, 2, !3])),
            )
            .with_child(
                Node::new("LayerElementUV")
                    .with_child(string_child("MappingInformationType", "ByPolygonVertex"))
                    .with_child(string_child("ReferenceInformationType", "IndexToDirect"))
                    .with_child(Node::new("UV").with_property(Property::F64Array(vec![
                        0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0,
                    ])))
                    .with_child(
                        Node::new("UVIndex").with_property(Property::I32Array(vec![0, 1, 2, 0, 2, 3])),
                    ),
            )
            .with_child(
                Node::new("LayerElementMaterial")
                    .with_child(string_child("MappingInformationType", "AllSame"))
                    .with_child(Node::new("Materials").with_property(Property::I32Array(vec![0]))),
            );
        let geometry = Geometry::from_node(&node).unwrap();

        assert_eq!(geometry.control_points().len(), 4);
        let polygons = geometry.polygons();
        assert_eq!(polygons.len(), 2);
        assert_eq!(polygons[1].control_points, vec![0, 2, 3]);
        assert_eq!(polygons[1].first_corner, 3);

        let uvs = geometry.uvs().unwrap();
        // Second polygon, third corner -> UV index 3
        assert_eq!(uvs.value(1, 5, 3), Some(&[0.0, 1.0][..]));
        assert_eq!(geometry.material_slot(1), Some(0));
        assert!(geometry.normals().is_none());
    }

    #[test]
    fn test_unterminated_polygon_is_dropped() {
        let node = object("Geometry", 4, "Open", "Mesh").with_child(
            Node::new("PolygonVertexIndex").with_property(Property::I32Array(vec![0, 1, !2, 2, 3])),
        );
        let geometry = Geometry::from_node(&node).unwrap();
        let polygons = geometry.polygons();
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].control_points, vec![0, 1, 2]);
    }

    #[test]
    fn test_cluster_weights_and_bone() {
        let doc = FbxDocument {
            version: 7400,
            nodes: vec![
                Node::new("Objects")
                    .with_child(object("Deformer", 10, "Skin", "Skin"))
                    .with_child(
                        object("Deformer", 11, "Cluster", "Cluster")
                            .with_child(Node::new("Indexes").with_property(Property::I32Array(vec![0, 2])))
                            .with_child(Node::new("Weights").with_property(Property::F64Array(vec![1.0, 0.5])))
                            .with_child(Node::new("TransformLink").with_property(Property::F64Array(
                                DMat4::from_translation(DVec3::Y).to_cols_array().to_vec(),
                            ))),
                    )
                    .with_child(object("Model", 12, "Hips", "LimbNode")),
                Node::new("Connections")
                    .with_child(
                        Node::new("C")
                            .with_property(Property::String("OO".into()))
                            .with_property(Property::I64(11))
                            .with_property(Property::I64(10)),
                    )
                    .with_child(
                        Node::new("C")
                            .with_property(Property::String("OO".into()))
                            .with_property(Property::I64(12))
                            .with_property(Property::I64(11)),
                    ),
            ],
        };
        let graph = SceneGraph::build(&doc);
        let skin = Skin::from_node(graph.object(10).unwrap()).unwrap();
        let clusters = skin.clusters(&graph);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].weighted_indices(), vec![(0, 1.0), (2, 0.5)]);
        assert_eq!(clusters[0].bone(&graph).map(|m| m.name()), Some("Hips"));
        assert_eq!(
            clusters[0].transform_link().map(|m| m.w_axis.y),
            Some(1.0)
        );
    }

    #[test]
    fn test_texture_file_name_prefers_relative() {
        let node = object("Texture", 5, "tex", "")
            .with_child(string_child("FileName", "C:/abs/skin.png"))
            .with_child(string_child("RelativeFilename", "skin.png"));
        assert_eq!(Texture::from_node(&node).unwrap().file_name(), Some("skin.png"));
    }
}
