//! Tests for the two-step sibling swap and its rollback

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast::Receiver;
use tokio::sync::Notify;

use catsync::application::services::can_move;
use catsync::config::Settings;
use catsync::domain::mutator::find_by_key;
use catsync::domain::{CategoryId, CategoryNode, DomainError, NodeAddress};
use catsync::infrastructure::di::ServiceContainer;
use catsync::infrastructure::traits::{CategoryService, CategoryUpdate};
use catsync::infrastructure::RemoteError;
use catsync::util::testing::{init_test_setup, InMemoryCategoryService, PatchCall};
use catsync::{ApplicationError, Direction, TreeEvent};

fn id(s: &str) -> CategoryId {
    CategoryId::from(s)
}

fn root_order(services: &ServiceContainer) -> Vec<(String, i64, u64)> {
    services
        .store
        .current_forest()
        .roots
        .iter()
        .map(|n| (n.id.to_string(), n.position, n.version))
        .collect()
}

fn failures(events: &mut Receiver<TreeEvent>) -> Vec<TreeEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        if !matches!(event, TreeEvent::ForestPublished { .. }) {
            seen.push(event);
        }
    }
    seen
}

// a (pos 0, v1) with children a1, b (pos 1, v1)
fn two_roots() -> InMemoryCategoryService {
    InMemoryCategoryService::new()
        .with_roots(vec![CategoryNode::new("b", 1, 1), CategoryNode::new("a", 0, 1)])
        .with_children("a", vec![CategoryNode::new("a1", 0, 1)])
}

async fn setup(service: InMemoryCategoryService) -> (Arc<InMemoryCategoryService>, ServiceContainer) {
    init_test_setup();
    let service = Arc::new(service);
    let services = ServiceContainer::with_deps(Settings::default(), service.clone());
    services.store.initialize().await.unwrap();
    (service, services)
}

// ============================================================
// Successful swaps
// ============================================================

#[tokio::test]
async fn given_second_root_when_moving_up_then_two_patches_and_swapped_locally() {
    let (service, services) = setup(two_roots()).await;
    let generation = services.store.generation();

    let moved = services
        .reorder
        .move_node(&NodeAddress::encode(1, &[]), Direction::Up)
        .await
        .unwrap();

    assert!(moved);
    assert_eq!(
        service.patches(),
        vec![PatchCall::new("b", 0, 1), PatchCall::new("a", 1, 1)]
    );
    assert_eq!(
        root_order(&services),
        vec![("b".to_string(), 0, 2), ("a".to_string(), 1, 2)]
    );
    assert_eq!(service.remote_state("b"), Some((0, 2)));
    assert_eq!(service.remote_state("a"), Some((1, 2)));
    assert_eq!(services.store.generation(), generation + 1);
}

#[tokio::test]
async fn given_loaded_subtree_when_swapping_then_children_travel_with_node() {
    let (_, services) = setup(two_roots()).await;

    services
        .reorder
        .move_key(&id("a"), Direction::Down)
        .await
        .unwrap();

    let forest = services.store.current_forest();
    assert_eq!(forest.roots[1].id, id("a"));
    assert_eq!(forest.roots[1].loaded_children()[0].id, id("a1"));
}

#[tokio::test]
async fn given_nested_sibling_when_moving_down_then_only_that_level_reordered() {
    let service = InMemoryCategoryService::new()
        .with_roots(vec![CategoryNode::new("p", 0, 1)])
        .with_children(
            "p",
            vec![
                CategoryNode::new("z", 2, 1),
                CategoryNode::new("x", 0, 1),
                CategoryNode::new("y", 1, 5),
            ],
        );
    let (service, services) = setup(service).await;

    let moved = services
        .reorder
        .move_node(&NodeAddress::encode(0, &[0]), Direction::Down)
        .await
        .unwrap();

    assert!(moved);
    assert_eq!(
        service.patches(),
        vec![PatchCall::new("x", 1, 1), PatchCall::new("y", 0, 5)]
    );
    let forest = services.store.current_forest();
    let children: Vec<(&str, i64, u64)> = forest.roots[0]
        .loaded_children()
        .iter()
        .map(|n| (n.id.as_str(), n.position, n.version))
        .collect();
    assert_eq!(children, vec![("y", 0, 6), ("x", 1, 2), ("z", 2, 1)]);
}

#[tokio::test]
async fn given_expansion_after_address_computed_when_swapping_then_expansion_kept() {
    let service = two_roots().with_children("a1", vec![CategoryNode::new("a1x", 0, 1)]);
    let (_, services) = setup(service).await;
    let address = NodeAddress::encode(0, &[]);

    services.store.expand(&id("a")).await.unwrap();
    services
        .reorder
        .move_node(&address, Direction::Down)
        .await
        .unwrap();

    let forest = services.store.current_forest();
    let a1 = find_by_key(&forest, &id("a1")).unwrap();
    assert_eq!(a1.loaded_children()[0].id, id("a1x"));
}

/// Holds the reply to the second position update until released.
struct PausedAfterSecondUpdate {
    inner: Arc<InMemoryCategoryService>,
    reached: Notify,
    release: Notify,
}

#[async_trait]
impl CategoryService for PausedAfterSecondUpdate {
    async fn fetch_roots(&self) -> Result<Vec<CategoryNode>, RemoteError> {
        self.inner.fetch_roots().await
    }

    async fn fetch_children(&self, parent: &CategoryId) -> Result<Vec<CategoryNode>, RemoteError> {
        self.inner.fetch_children(parent).await
    }

    async fn update_position(
        &self,
        id: &CategoryId,
        position: i64,
        expected_version: u64,
    ) -> Result<CategoryUpdate, RemoteError> {
        let result = self.inner.update_position(id, position, expected_version).await;
        if self.inner.patches().len() == 2 {
            self.reached.notify_one();
            self.release.notified().await;
        }
        result
    }
}

#[tokio::test]
async fn given_parent_refetched_before_commit_when_swapping_then_siblings_stay_sorted() {
    init_test_setup();
    let inner = Arc::new(
        InMemoryCategoryService::new()
            .with_roots(vec![CategoryNode::new("p", 0, 1)])
            .with_children(
                "p",
                vec![CategoryNode::new("x", 0, 1), CategoryNode::new("y", 1, 1)],
            ),
    );
    let service = Arc::new(PausedAfterSecondUpdate {
        inner: inner.clone(),
        reached: Notify::new(),
        release: Notify::new(),
    });
    let services = ServiceContainer::with_deps(Settings::default(), service.clone());
    services.store.initialize().await.unwrap();
    let (x, p) = (id("x"), id("p"));

    let (moved, expanded) = futures::join!(services.reorder.move_key(&x, Direction::Down), async {
        service.reached.notified().await;
        // both writes landed: the refetch already returns y(0), x(1)
        let expanded = services.store.expand(&p).await;
        service.release.notify_one();
        expanded
    });

    assert!(moved.unwrap());
    expanded.unwrap();
    let forest = services.store.current_forest();
    let children: Vec<(&str, i64, u64)> = find_by_key(&forest, &p)
        .unwrap()
        .loaded_children()
        .iter()
        .map(|n| (n.id.as_str(), n.position, n.version))
        .collect();
    assert_eq!(children, vec![("y", 0, 2), ("x", 1, 2)]);
}

// ============================================================
// Boundaries
// ============================================================

#[tokio::test]
async fn given_first_or_last_sibling_when_moving_outward_then_noop_without_remote_call() {
    let (service, services) = setup(two_roots()).await;
    let before = services.store.current_forest();

    let up = services
        .reorder
        .move_node(&NodeAddress::encode(0, &[]), Direction::Up)
        .await
        .unwrap();
    let down = services
        .reorder
        .move_node(&NodeAddress::encode(1, &[]), Direction::Down)
        .await
        .unwrap();

    assert!(!up);
    assert!(!down);
    assert!(service.patches().is_empty());
    assert_eq!(*services.store.current_forest(), *before);
    assert!(!services.reorder.can_move_key(&id("a"), Direction::Up));
    assert!(services.reorder.can_move_key(&id("a"), Direction::Down));
}

#[tokio::test]
async fn given_snapshot_when_checking_can_move_then_ends_and_stale_addresses_rejected() {
    let (_, services) = setup(two_roots()).await;
    let forest = services.store.current_forest();

    assert!(can_move(&forest, &NodeAddress::encode(1, &[]), Direction::Up));
    assert!(!can_move(&forest, &NodeAddress::encode(1, &[]), Direction::Down));
    // only child of a
    assert!(!can_move(&forest, &NodeAddress::encode(0, &[0]), Direction::Down));
    assert!(!can_move(&forest, &NodeAddress::encode(5, &[]), Direction::Up));
}

#[tokio::test]
async fn given_stale_address_when_moving_then_address_not_found_without_remote_call() {
    let (service, services) = setup(two_roots()).await;

    let past_end = services
        .reorder
        .move_node(&NodeAddress::encode(7, &[]), Direction::Up)
        .await;
    // children of a1 were never loaded
    let below_unknown = services
        .reorder
        .move_node(&NodeAddress::encode(0, &[0, 0]), Direction::Up)
        .await;

    assert!(past_end.unwrap_err().is_address_not_found());
    assert!(below_unknown.unwrap_err().is_address_not_found());
    assert!(service.patches().is_empty());
}

#[tokio::test]
async fn given_unknown_key_when_moving_then_node_not_found_reported() {
    let (_, services) = setup(two_roots()).await;
    let mut events = services.store.subscribe();

    let result = services.reorder.move_key(&id("ghost"), Direction::Up).await;

    assert_eq!(
        result.unwrap_err(),
        ApplicationError::Domain(DomainError::NodeNotFound(id("ghost")))
    );
    assert!(matches!(
        failures(&mut events).as_slice(),
        [TreeEvent::ReorderFailed { .. }]
    ));
}

// ============================================================
// Failures and rollback
// ============================================================

#[tokio::test]
async fn given_first_update_fails_when_moving_then_rejected_and_nothing_else_sent() {
    let (service, services) = setup(two_roots().fail_update_calls(&[1])).await;
    let before = root_order(&services);

    let err = services
        .reorder
        .move_key(&id("b"), Direction::Up)
        .await
        .unwrap_err();

    assert!(matches!(err, ApplicationError::UpdateRejected { ref id, .. } if id.as_str() == "b"));
    assert_eq!(service.patches(), vec![PatchCall::new("b", 0, 1)]);
    assert_eq!(root_order(&services), before);
}

#[tokio::test]
async fn given_second_update_fails_when_moving_then_first_rolled_back() {
    let (service, services) = setup(two_roots().fail_update_calls(&[2])).await;
    let before = root_order(&services);
    let mut events = services.store.subscribe();

    let err = services
        .reorder
        .move_key(&id("b"), Direction::Up)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ApplicationError::UpdateRejected {
            id: id("a"),
            source: RemoteError::Status {
                status: 500,
                body: "update #2 failed".to_string(),
            },
        }
    );
    assert_eq!(
        service.patches(),
        vec![
            PatchCall::new("b", 0, 1),
            PatchCall::new("a", 1, 1),
            PatchCall::new("b", 1, 2),
        ]
    );
    // b is back at its position, one version further
    assert_eq!(service.remote_state("b"), Some((1, 3)));
    assert_eq!(service.remote_state("a"), Some((0, 1)));
    assert_eq!(root_order(&services), before);
    match failures(&mut events).as_slice() {
        [TreeEvent::ReorderFailed { key, .. }] => assert_eq!(key, &id("b")),
        other => panic!("unexpected events {other:?}"),
    }
}

#[tokio::test]
async fn given_rollback_fails_when_moving_then_compensation_failed_reported() {
    let (service, services) = setup(two_roots().fail_update_calls(&[2, 3])).await;
    let before = root_order(&services);
    let mut events = services.store.subscribe();

    let err = services
        .reorder
        .move_key(&id("b"), Direction::Up)
        .await
        .unwrap_err();

    match err {
        ApplicationError::CompensationFailed {
            id: failed,
            original,
            compensation,
        } => {
            assert_eq!(failed, id("b"));
            assert!(matches!(original, RemoteError::Status { status: 500, .. }));
            assert!(matches!(compensation, RemoteError::Status { status: 500, .. }));
        }
        other => panic!("expected CompensationFailed, got {other:?}"),
    }
    assert_eq!(service.patches().len(), 3);
    // remote keeps the half-applied move
    assert_eq!(service.remote_state("b"), Some((0, 2)));
    assert_eq!(root_order(&services), before);
    match failures(&mut events).as_slice() {
        [TreeEvent::CompensationFailed { key, .. }] => assert_eq!(key, &id("b")),
        other => panic!("unexpected events {other:?}"),
    }
}

#[tokio::test]
async fn given_remote_version_moved_on_when_moving_then_conflict_rejected() {
    let (service, services) = setup(two_roots()).await;
    service
        .update_position(&id("b"), 1, 1)
        .await
        .unwrap();

    let err = services
        .reorder
        .move_key(&id("b"), Direction::Up)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ApplicationError::UpdateRejected {
            id: id("b"),
            source: RemoteError::Conflict {
                id: id("b"),
                expected_version: 1,
            },
        }
    );
    assert_eq!(service.patches().len(), 2);
    assert_eq!(root_order(&services)[1], ("b".to_string(), 1, 1));
}
