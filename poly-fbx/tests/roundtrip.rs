//! Write-then-read tests over whole documents

use poly_fbx::{
    parse_fbx, write_fbx, ArrayCompression, FbxDocument, Node, Property, SceneGraph, WriteOptions,
};

fn every_property_type() -> Node {
    Node::new("Mixed")
        .with_property(Property::Bool(true))
        .with_property(Property::I16(-12))
        .with_property(Property::I32(123_456))
        .with_property(Property::I64(-9_000_000_000))
        .with_property(Property::F32(0.25))
        .with_property(Property::F64(-1.0e-7))
        .with_property(Property::String("Body\u{0}\u{1}Model".into()))
        .with_property(Property::Raw(vec![0, 1, 2, 255]))
        .with_property(Property::BoolArray(vec![true, false, true]))
        .with_property(Property::I32Array(vec![0, -1, i32::MAX]))
        .with_property(Property::I64Array(vec![i64::MIN, 7]))
        .with_property(Property::F32Array(vec![1.5; 64]))
        .with_property(Property::F64Array((0..100).map(f64::from).collect()))
}

#[test]
fn test_compressed_zero_array_roundtrip() {
    let doc = FbxDocument {
        version: 7400,
        nodes: vec![Node::new("Objects").with_child(
            Node::new("Geometry").with_child(
                Node::new("Vertices").with_property(Property::F32Array(vec![0.0; 1000])),
            ),
        )],
    };
    let options = WriteOptions {
        compression: ArrayCompression::Always,
    };
    let bytes = write_fbx(&doc, options).unwrap();
    // 4000 bytes of zeros deflate to almost nothing
    assert!(bytes.len() < 1000, "{} bytes", bytes.len());

    let back = parse_fbx(&bytes).unwrap();
    assert_eq!(back, doc);
}

#[test]
fn test_every_property_type_roundtrip() {
    for version in [7400, 7500] {
        for compression in [
            ArrayCompression::Never,
            ArrayCompression::Always,
            ArrayCompression::AtLeast(64),
        ] {
            let doc = FbxDocument {
                version,
                nodes: vec![
                    Node::new("Header").with_child(every_property_type()),
                    Node::new("Empty"),
                    every_property_type().with_child(Node::new("Leaf")),
                ],
            };
            let bytes = write_fbx(&doc, WriteOptions { compression }).unwrap();
            let back = parse_fbx(&bytes).unwrap();
            assert_eq!(back, doc, "version {version}, {compression:?}");
        }
    }
}

#[test]
fn test_graph_over_written_file() {
    let object = |class: &str, id: i64, kind: &str| {
        Node::new(class)
            .with_property(Property::I64(id))
            .with_property(Property::String(format!("obj{id}\u{0}\u{1}{class}")))
            .with_property(Property::String(kind.into()))
    };
    let doc = FbxDocument {
        version: 7400,
        nodes: vec![
            Node::new("Objects")
                .with_child(object("Model", 100, "Mesh"))
                .with_child(object("Geometry", 200, "Mesh")),
            Node::new("Connections")
                .with_child(
                    Node::new("C")
                        .with_property(Property::String("OO".into()))
                        .with_property(Property::I64(100))
                        .with_property(Property::I64(0)),
                )
                .with_child(
                    Node::new("C")
                        .with_property(Property::String("OO".into()))
                        .with_property(Property::I64(200))
                        .with_property(Property::I64(100)),
                ),
        ],
    };
    let bytes = write_fbx(&doc, WriteOptions::default()).unwrap();
    let back = parse_fbx(&bytes).unwrap();
    let graph = SceneGraph::build(&back);

    let model = graph.models().next().unwrap();
    assert!(model.is_mesh());
    assert!(model.geometry(&graph).is_some());
}
