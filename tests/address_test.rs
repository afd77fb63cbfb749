//! Tests for NodeAddress encode/decode/resolve

use rstest::{fixture, rstest};

use catsync::domain::{CategoryId, CategoryNode, DomainError, Forest, NodeAddress, ParentRef};

// a
// ├── a1
// └── a2
//     └── a2x
// b        (children not loaded)
// c        (leaf)
#[fixture]
fn forest() -> Forest {
    Forest::new(vec![
        CategoryNode::new("a", 0, 1).with_children(vec![
            CategoryNode::new("a1", 0, 1).with_children(vec![]),
            CategoryNode::new("a2", 1, 1)
                .with_children(vec![CategoryNode::new("a2x", 0, 1).with_children(vec![])]),
        ]),
        CategoryNode::new("b", 1, 1),
        CategoryNode::new("c", 2, 1).with_children(vec![]),
    ])
}

#[rstest]
#[case(0, &[], "0")]
#[case(2, &[1], "2-1")]
#[case(1, &[0, 3, 2], "1-0-3-2")]
fn given_path_when_encoding_then_renders_dash_separated(
    #[case] root: usize,
    #[case] path: &[usize],
    #[case] expected: &str,
) {
    let address = NodeAddress::encode(root, path);
    assert_eq!(address.to_string(), expected);
    assert_eq!(address.depth(), path.len() + 1);
}

#[test]
fn given_nested_address_when_decoding_then_splits_root_and_rest() {
    let address = NodeAddress::encode(2, &[1, 0]);

    let (root, rest) = address.decode();

    assert_eq!(root, 2);
    assert_eq!(rest, &[1, 0]);
    assert_eq!(address.index(), 0);
    assert!(!address.is_root_level());
}

#[rstest]
#[case("")]
#[case("  ")]
#[case("a-1")]
#[case("1--2")]
#[case("-1")]
fn given_malformed_text_when_parsing_then_invalid_address(#[case] input: &str) {
    let result = input.parse::<NodeAddress>();
    assert!(matches!(result, Err(DomainError::InvalidAddress(_))));
}

#[test]
fn given_text_when_parsing_then_same_as_encoded() {
    let parsed: NodeAddress = "0-1-0".parse().unwrap();
    assert_eq!(parsed, NodeAddress::encode(0, &[1, 0]));
}

#[rstest]
fn given_root_level_address_when_resolving_parent_then_synthetic_forest_root(forest: Forest) {
    let address = NodeAddress::encode(1, &[]);

    let parent = address.resolve_parent(&forest).unwrap();

    assert!(matches!(parent, ParentRef::ForestRoot(_)));
    assert_eq!(parent.key(), None);
    assert_eq!(parent.children().len(), 3);
}

#[rstest]
fn given_nested_address_when_resolving_parent_then_returns_parent_node(forest: Forest) {
    let address = NodeAddress::encode(0, &[1, 0]);

    let parent = address.resolve_parent(&forest).unwrap();

    assert_eq!(parent.key(), Some(&CategoryId::from("a2")));
    assert_eq!(parent.children()[0].id, CategoryId::from("a2x"));
}

#[rstest]
#[case(NodeAddress::encode(5, &[0]))]
#[case(NodeAddress::encode(0, &[9, 0]))]
#[case(NodeAddress::encode(1, &[0]))] // b's children are not loaded
fn given_stale_address_when_resolving_parent_then_address_not_found(
    forest: Forest,
    #[case] address: NodeAddress,
) {
    let result = address.resolve_parent(&forest);
    assert!(matches!(result, Err(DomainError::AddressNotFound { .. })));
}

#[rstest]
fn given_valid_address_when_resolving_then_returns_node(forest: Forest) {
    let node = NodeAddress::encode(0, &[1, 0]).resolve(&forest).unwrap();
    assert_eq!(node.id, CategoryId::from("a2x"));

    let root = NodeAddress::encode(2, &[]).resolve(&forest).unwrap();
    assert_eq!(root.id, CategoryId::from("c"));
}

#[rstest]
fn given_index_past_siblings_when_resolving_then_address_not_found(forest: Forest) {
    let result = NodeAddress::encode(0, &[2]).resolve(&forest);
    assert_eq!(
        result.unwrap_err(),
        DomainError::AddressNotFound {
            address: "0-2".to_string()
        }
    );
}

#[test]
fn given_address_when_deriving_sibling_and_child_then_paths_adjusted() {
    let address = NodeAddress::encode(0, &[1]);
    assert_eq!(address.sibling(0), NodeAddress::encode(0, &[0]));
    assert_eq!(address.child(3), NodeAddress::encode(0, &[1, 3]));
}
