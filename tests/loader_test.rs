//! Tests for LazyLoader against the in-memory category service

use std::sync::Arc;

use catsync::application::services::LazyLoader;
use catsync::domain::{CategoryId, CategoryNode};
use catsync::infrastructure::RemoteError;
use catsync::util::testing::{init_test_setup, InMemoryCategoryService};
use catsync::ApplicationError;

fn ids(nodes: &[CategoryNode]) -> Vec<&str> {
    nodes.iter().map(|n| n.id.as_str()).collect()
}

// Registered out of order: the loader sorts by position.
fn catalog() -> InMemoryCategoryService {
    InMemoryCategoryService::new()
        .with_roots(vec![
            CategoryNode::new("r2", 2, 1),
            CategoryNode::new("r0", 0, 1),
            CategoryNode::new("r1", 1, 1),
        ])
        .with_children(
            "r0",
            vec![CategoryNode::new("r0b", 1, 1), CategoryNode::new("r0a", 0, 1)],
        )
        .with_children("r0a", vec![CategoryNode::new("r0a0", 0, 1)])
}

#[tokio::test]
async fn given_roots_when_loading_then_sorted_with_first_level_attached() {
    init_test_setup();
    let loader = LazyLoader::new(Arc::new(catalog()));

    let forest = loader.load_roots().await.unwrap();

    assert_eq!(ids(&forest.roots), vec!["r0", "r1", "r2"]);
    let r0 = &forest.roots[0];
    assert!(!r0.leaf);
    assert_eq!(ids(r0.loaded_children()), vec!["r0a", "r0b"]);
    // only one level is prefetched
    assert!(r0.loaded_children().iter().all(|c| c.children.is_none()));
    // r1 and r2 have no children on the server
    assert!(forest.roots[1].leaf);
    assert_eq!(forest.roots[2].children, Some(vec![]));
}

#[tokio::test]
async fn given_one_root_children_failing_when_loading_then_only_that_root_unknown() {
    init_test_setup();
    let loader = LazyLoader::new(Arc::new(catalog().fail_children("r1")));

    let forest = loader.load_roots().await.unwrap();

    assert_eq!(forest.len(), 3);
    assert!(forest.roots[1].children.is_none());
    assert!(!forest.roots[1].leaf);
    assert!(forest.roots[0].is_loaded());
    assert!(forest.roots[2].leaf);
}

#[tokio::test]
async fn given_roots_unavailable_when_loading_then_load_failed_for_roots() {
    init_test_setup();
    let loader = LazyLoader::new(Arc::new(catalog().fail_roots()));

    let result = loader.load_roots().await;

    match result {
        Err(ApplicationError::LoadFailed { target, source }) => {
            assert_eq!(target, "roots");
            assert!(matches!(source, RemoteError::Transport(_)));
        }
        other => panic!("expected LoadFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn given_key_when_loading_children_then_one_sorted_level_unknown_below() {
    init_test_setup();
    let service = Arc::new(catalog());
    let loader = LazyLoader::new(service.clone());

    let children = loader.load_children(&CategoryId::from("r0")).await.unwrap();

    assert_eq!(ids(&children), vec!["r0a", "r0b"]);
    assert!(children.iter().all(|c| c.children.is_none() && !c.leaf));
    assert_eq!(service.children_fetches(), vec![CategoryId::from("r0")]);
}

#[tokio::test]
async fn given_failing_key_when_loading_children_then_load_failed_names_key() {
    init_test_setup();
    let loader = LazyLoader::new(Arc::new(catalog().fail_children("r0")));

    let err = loader
        .load_children(&CategoryId::from("r0"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ApplicationError::LoadFailed {
            target: "r0".to_string(),
            source: RemoteError::Status {
                status: 503,
                body: "children of r0 unavailable".to_string(),
            },
        }
    );
}

#[tokio::test]
async fn given_key_when_loading_prefetched_then_grandchildren_decide_leaf_flags() {
    init_test_setup();
    let loader = LazyLoader::new(Arc::new(catalog()));

    let children = loader
        .load_children_prefetched(&CategoryId::from("r0"))
        .await
        .unwrap();

    assert_eq!(ids(&children), vec!["r0a", "r0b"]);
    assert!(!children[0].leaf);
    assert_eq!(ids(children[0].loaded_children()), vec!["r0a0"]);
    assert!(children[1].leaf);
}
