use std::sync::Arc;

use loom_node::{LineInfo, MemberId, Node, NodeKind, Schema, TypeId, Value};
use loom_stream::{IndexedReader, NodeList, NodeQueue, NodeReader, NodeWriter, transform};
use proptest::prelude::*;

fn type_name() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{0,6}"
}

fn scalar() -> impl Strategy<Value = Vec<Node>> {
    prop_oneof![
        any::<i64>().prop_map(Value::Int),
        "[a-z ]{0,8}".prop_map(Value::from),
        any::<bool>().prop_map(Value::Bool),
    ]
    .prop_map(|value| vec![Node::Value(value)])
}

/// A well-formed object region.
fn object() -> impl Strategy<Value = Vec<Node>> {
    let leaf = type_name().prop_map(|ty| vec![Node::StartObject(TypeId::new(ty)), Node::EndObject]);
    leaf.prop_recursive(4, 48, 4, |inner| {
        let content = prop_oneof![inner, scalar()];
        (
            type_name(),
            any::<bool>(),
            prop::collection::vec((type_name(), prop::collection::vec(content, 1..3)), 0..4),
        )
            .prop_map(|(ty, retrieved, members)| {
                let ty = TypeId::new(ty);
                let mut nodes = vec![if retrieved {
                    Node::GetObject
                } else {
                    Node::StartObject(ty.clone())
                }];
                for (name, values) in members {
                    nodes.push(Node::StartMember(MemberId::new(ty.clone(), name)));
                    nodes.extend(values.into_iter().flatten());
                    nodes.push(Node::EndMember);
                }
                nodes.push(Node::EndObject);
                nodes
            })
    })
}

/// Index of the node closing the region opened at each index.
fn partners(nodes: &[Node]) -> Vec<Option<usize>> {
    let mut out = vec![None; nodes.len()];
    let mut open = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        match node.kind() {
            NodeKind::StartObject | NodeKind::GetObject | NodeKind::StartMember => open.push(i),
            NodeKind::EndObject | NodeKind::EndMember => {
                let start = open.pop().unwrap();
                out[start] = Some(i);
            }
            _ => {}
        }
    }
    out
}

fn frozen(nodes: &[Node], with_lines: bool) -> NodeList {
    let mut list = NodeList::with_schema(Arc::new(Schema::new()));
    let mut writer = list.writer();
    for (i, node) in nodes.iter().enumerate() {
        if with_lines {
            writer.set_line_info(LineInfo::new(i as u32 + 1, 1)).unwrap();
        }
        writer.write(node.clone()).unwrap();
    }
    writer.close().unwrap();
    list
}

proptest! {
    /// Replaying a buffer yields exactly what was written, positions included.
    #[test]
    fn replay_is_exact(nodes in object()) {
        let list = frozen(&nodes, true);
        let mut reader = list.reader().unwrap();
        prop_assert_eq!(reader.count(), nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            prop_assert!(reader.read().unwrap());
            prop_assert_eq!(reader.node(), node);
            prop_assert_eq!(reader.line_info(), Some(LineInfo::new(i as u32 + 1, 1)));
        }
        prop_assert!(!reader.read().unwrap());
        prop_assert!(reader.is_eof());
    }

    /// Skip moves past the matching closer.
    #[test]
    fn skip_is_balanced(nodes in object()) {
        let list = frozen(&nodes, false);
        let mut reader = list.reader().unwrap();
        for (i, partner) in partners(&nodes).into_iter().enumerate() {
            reader.set_current_index(i as isize).unwrap();
            reader.skip().unwrap();
            let expected = partner.unwrap_or(i) + 1;
            prop_assert_eq!(reader.current_index(), expected as isize);
        }
    }

    /// A subtree covers its region exactly and leaves the parent on the closer.
    #[test]
    fn subtree_leaves_parent_on_closer(nodes in object()) {
        let list = frozen(&nodes, false);
        let mut reader = list.reader().unwrap();
        for (i, partner) in partners(&nodes).into_iter().enumerate() {
            let end = partner.unwrap_or(i);
            reader.set_current_index(i as isize).unwrap();
            let mut seen = Vec::new();
            {
                let mut sub = reader.read_subtree();
                while sub.read().unwrap() {
                    seen.push(sub.node().clone());
                }
            }
            prop_assert_eq!(&seen[..], &nodes[i..=end]);
            prop_assert_eq!(reader.current_index(), end as isize);
        }
    }

    /// Pumping a list through a queue preserves the stream.
    #[test]
    fn transform_into_queue(nodes in object()) {
        let list = frozen(&nodes, true);
        let queue = NodeQueue::new();
        let mut writer = queue.writer();
        transform(&mut list.reader().unwrap(), &mut writer, true).unwrap();
        let mut reader = queue.reader();
        let mut replayed = Vec::new();
        while reader.read().unwrap() {
            replayed.push(reader.node().clone());
        }
        prop_assert_eq!(replayed, nodes);
    }
}
