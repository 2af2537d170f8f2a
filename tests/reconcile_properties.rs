//! Property tests over randomly generated frame trees.

use framewheel::diff::{diff_with_config, Edit};
use framewheel::{diff, BuildError, ComponentType, DiffConfig, EditSink, FrameBuffer, Frames, LiveTree};
use proptest::prelude::*;

type Attrs = Vec<(u32, &'static str, String)>;

#[derive(Debug, Clone)]
enum Node {
    Element {
        seq: u32,
        name: &'static str,
        key: Option<i64>,
        attrs: Attrs,
        children: Vec<Node>,
    },
    Text {
        seq: u32,
        text: String,
    },
    Markup {
        seq: u32,
        markup: String,
    },
    Component {
        seq: u32,
        ty: &'static str,
        key: Option<i64>,
        params: Attrs,
    },
    Region {
        seq: u32,
        children: Vec<Node>,
    },
}

fn emit(b: &mut FrameBuffer, node: &Node) -> Result<(), BuildError> {
    match node {
        Node::Element {
            seq,
            name,
            key,
            attrs,
            children,
        } => {
            b.open_element(*seq, *name)?;
            if let Some(key) = key {
                b.set_key(*key)?;
            }
            for (seq, name, value) in attrs {
                b.add_attribute(*seq, *name, value.as_str())?;
            }
            for child in children {
                emit(b, child)?;
            }
            b.close_element()
        }
        Node::Text { seq, text } => b.add_text(*seq, text.as_str()),
        Node::Markup { seq, markup } => b.add_markup(*seq, markup.as_str()),
        Node::Component { seq, ty, key, params } => {
            b.open_component(*seq, ComponentType::named(*ty))?;
            if let Some(key) = key {
                b.set_key(*key)?;
            }
            for (seq, name, value) in params {
                b.add_attribute(*seq, *name, value.as_str())?;
            }
            b.close_component()
        }
        Node::Region { seq, children } => {
            b.open_region(*seq)?;
            for child in children {
                emit(b, child)?;
            }
            b.close_region()
        }
    }
}

fn build(roots: &[Node]) -> Frames {
    let mut buffer = FrameBuffer::new();
    for root in roots {
        emit(&mut buffer, root).unwrap();
    }
    buffer.finish().unwrap()
}

fn live_count(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .map(|node| match node {
            Node::Region { children, .. } => live_count(children),
            _ => 1,
        })
        .sum()
}

fn arb_attrs() -> impl Strategy<Value = Attrs> {
    prop::collection::vec(
        (0u32..3, prop::sample::select(vec!["class", "id", "title"]), "[xy]{0,2}"),
        0..3,
    )
}

fn arb_node() -> impl Strategy<Value = Node> {
    let leaf = prop_oneof![
        (0u32..4, "[a-c]{0,3}").prop_map(|(seq, text)| Node::Text { seq, text }),
        (0u32..4, "<[bi]>").prop_map(|(seq, markup)| Node::Markup { seq, markup }),
        (
            0u32..4,
            prop::sample::select(vec!["Avatar", "Clock"]),
            prop::option::of(0i64..6),
            arb_attrs(),
        )
            .prop_map(|(seq, ty, key, params)| Node::Component { seq, ty, key, params }),
    ];

    leaf.prop_recursive(4, 64, 5, |inner| {
        prop_oneof![
            3 => (
                0u32..4,
                prop::sample::select(vec!["div", "p", "li"]),
                prop::option::of(0i64..6),
                arb_attrs(),
                prop::collection::vec(inner.clone(), 0..5),
            )
                .prop_map(|(seq, name, key, attrs, children)| Node::Element {
                    seq,
                    name,
                    key,
                    attrs,
                    children,
                }),
            1 => (0u32..4, prop::collection::vec(inner, 0..4))
                .prop_map(|(seq, children)| Node::Region { seq, children }),
        ]
    })
}

fn arb_roots() -> impl Strategy<Value = Vec<Node>> {
    prop::collection::vec(arb_node(), 0..5)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_built_buffers_are_well_formed(roots in arb_roots()) {
        let frames = build(&roots);
        prop_assert!(frames.is_well_formed());
        let covered: usize = frames.top_level().map(|i| frames[i].span()).sum();
        prop_assert_eq!(covered, frames.len());
    }

    #[test]
    fn prop_identical_trees_diff_empty(roots in arb_roots()) {
        let first = build(&roots);
        let second = build(&roots);
        let script = diff(&first, &second).unwrap();
        prop_assert!(script.is_empty(), "unexpected edits: {:?}", script.edits);
    }

    #[test]
    fn prop_diff_from_empty_inserts_each_live_root(roots in arb_roots()) {
        let frames = build(&roots);
        let script = diff(&Frames::empty(), &frames).unwrap();
        prop_assert_eq!(script.len(), live_count(&roots));
        prop_assert_eq!(frames.live_roots(), live_count(&roots));
        let all_inserts = script.iter().all(|edit| matches!(edit, Edit::InsertSubtree { .. }));
        prop_assert!(all_inserts, "unexpected edits: {:?}", script.edits);
    }

    #[test]
    fn prop_applying_script_reaches_new_tree(old in arb_roots(), new in arb_roots()) {
        let old = build(&old);
        let new = build(&new);
        let script = diff(&old, &new).unwrap();

        let mut tree = LiveTree::from_frames(&old);
        script.apply_to(&mut tree).unwrap();
        prop_assert_eq!(&tree, &LiveTree::from_frames(&new));
        prop_assert!(!tree.in_batch());
    }

    #[test]
    fn prop_applying_script_without_fast_path(old in arb_roots(), new in arb_roots()) {
        let old = build(&old);
        let new = build(&new);
        let config = DiffConfig { fast_path: false, ..DiffConfig::default() };
        let script = diff_with_config(&old, &new, config).unwrap();

        let mut tree = LiveTree::from_frames(&old);
        script.apply_to(&mut tree).unwrap();
        prop_assert_eq!(&tree, &LiveTree::from_frames(&new));
    }

    #[test]
    fn prop_edits_apply_one_by_one(old in arb_roots(), new in arb_roots()) {
        let old = build(&old);
        let new = build(&new);
        let script = diff(&old, &new).unwrap();

        let mut tree = LiveTree::from_frames(&old);
        for edit in &script {
            tree.apply(edit).unwrap();
        }
        prop_assert_eq!(tree, LiveTree::from_frames(&new));
    }
}
