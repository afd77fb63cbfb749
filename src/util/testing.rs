use std::collections::{HashMap, HashSet};
use std::env;
use std::sync::{Mutex, Once, PoisonError};

use async_trait::async_trait;
use tracing::{debug, info};
use tracing_subscriber::{
    filter::filter_fn,
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::domain::{CategoryId, CategoryNode};
use crate::infrastructure::traits::{CategoryService, CategoryUpdate};
use crate::infrastructure::RemoteError;

static TEST_SETUP: Once = Once::new();

pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        // global logging subscriber, used by all tracing log macros
        setup_test_logging();
        info!("Test Setup complete");
    });
}

fn setup_test_logging() {
    debug!("INIT: Attempting logger init from testing.rs");

    // Create a filter for noisy modules
    let noisy_modules = ["hyper", "reqwest"];
    let module_filter = filter_fn(move |metadata| {
        !noisy_modules
            .iter()
            .any(|name| metadata.target().starts_with(name))
    });

    let env_filter = env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("debug"));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_test_writer()
            .with_target(true)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(module_filter)
            .with_filter(env_filter),
    );

    // Only set if we haven't already set a global subscriber
    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else {
        subscriber.try_init().unwrap_or_else(|e| {
            eprintln!("Error: Failed to set up logging: {}", e);
        });
    }
}

/// A recorded `update_position` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchCall {
    pub id: CategoryId,
    pub position: i64,
    pub version: u64,
}

impl PatchCall {
    pub fn new(id: &str, position: i64, version: u64) -> Self {
        Self {
            id: CategoryId::from(id),
            position,
            version,
        }
    }
}

#[derive(Default)]
struct Catalog {
    roots: Vec<CategoryId>,
    children: HashMap<CategoryId, Vec<CategoryId>>,
    nodes: HashMap<CategoryId, CategoryNode>,
    fail_roots: bool,
    failing_children: HashSet<CategoryId>,
    // 1-based ordinals of update calls that fail
    failing_updates: HashSet<usize>,
    patches: Vec<PatchCall>,
    children_fetches: Vec<CategoryId>,
}

impl Catalog {
    fn snapshot(&self, ids: &[CategoryId]) -> Vec<CategoryNode> {
        ids.iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|node| node.clone().unloaded())
            .collect()
    }
}

/// In-memory category service with optimistic versioning and scripted failures.
///
/// Nodes are registered unordered on purpose; the loader must sort them.
#[derive(Default)]
pub struct InMemoryCategoryService {
    catalog: Mutex<Catalog>,
}

impl InMemoryCategoryService {
    pub fn new() -> Self {
        Self::default()
    }

    fn catalog(&self) -> std::sync::MutexGuard<'_, Catalog> {
        self.catalog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_roots(self, roots: Vec<CategoryNode>) -> Self {
        {
            let mut catalog = self.catalog();
            for node in roots {
                catalog.roots.push(node.id.clone());
                catalog.nodes.insert(node.id.clone(), node);
            }
        }
        self
    }

    pub fn with_children(self, parent: &str, children: Vec<CategoryNode>) -> Self {
        {
            let mut catalog = self.catalog();
            let parent = CategoryId::from(parent);
            let mut ids = Vec::new();
            for node in children {
                ids.push(node.id.clone());
                catalog.nodes.insert(node.id.clone(), node);
            }
            catalog.children.entry(parent).or_default().extend(ids);
        }
        self
    }

    pub fn fail_roots(self) -> Self {
        self.catalog().fail_roots = true;
        self
    }

    /// Every children fetch below `parent` fails.
    pub fn fail_children(self, parent: &str) -> Self {
        self.set_children_failing(parent, true);
        self
    }

    pub fn set_children_failing(&self, parent: &str, failing: bool) {
        let mut catalog = self.catalog();
        if failing {
            catalog.failing_children.insert(CategoryId::from(parent));
        } else {
            catalog.failing_children.remove(&CategoryId::from(parent));
        }
    }

    /// The update calls with these 1-based ordinals fail with a server error.
    pub fn fail_update_calls(self, ordinals: &[usize]) -> Self {
        self.catalog().failing_updates.extend(ordinals.iter().copied());
        self
    }

    /// Add a child on the remote side only (to simulate server-side changes).
    pub fn insert_child(&self, parent: &str, child: CategoryNode) {
        let mut catalog = self.catalog();
        catalog
            .children
            .entry(CategoryId::from(parent))
            .or_default()
            .push(child.id.clone());
        catalog.nodes.insert(child.id.clone(), child);
    }

    pub fn patches(&self) -> Vec<PatchCall> {
        self.catalog().patches.clone()
    }

    pub fn children_fetches(&self) -> Vec<CategoryId> {
        self.catalog().children_fetches.clone()
    }

    /// Current remote `(position, version)` of a category.
    pub fn remote_state(&self, id: &str) -> Option<(i64, u64)> {
        self.catalog()
            .nodes
            .get(&CategoryId::from(id))
            .map(|node| (node.position, node.version))
    }
}

#[async_trait]
impl CategoryService for InMemoryCategoryService {
    async fn fetch_roots(&self) -> Result<Vec<CategoryNode>, RemoteError> {
        let catalog = self.catalog();
        if catalog.fail_roots {
            return Err(RemoteError::Transport("roots unavailable".to_string()));
        }
        Ok(catalog.snapshot(&catalog.roots))
    }

    async fn fetch_children(&self, parent: &CategoryId) -> Result<Vec<CategoryNode>, RemoteError> {
        let mut catalog = self.catalog();
        catalog.children_fetches.push(parent.clone());
        if catalog.failing_children.contains(parent) {
            return Err(RemoteError::Status {
                status: 503,
                body: format!("children of {parent} unavailable"),
            });
        }
        let ids = catalog.children.get(parent).cloned().unwrap_or_default();
        Ok(catalog.snapshot(&ids))
    }

    async fn update_position(
        &self,
        id: &CategoryId,
        position: i64,
        expected_version: u64,
    ) -> Result<CategoryUpdate, RemoteError> {
        let mut catalog = self.catalog();
        catalog.patches.push(PatchCall {
            id: id.clone(),
            position,
            version: expected_version,
        });
        let ordinal = catalog.patches.len();
        if catalog.failing_updates.contains(&ordinal) {
            return Err(RemoteError::Status {
                status: 500,
                body: format!("update #{ordinal} failed"),
            });
        }
        let node = catalog.nodes.get_mut(id).ok_or_else(|| RemoteError::Status {
            status: 404,
            body: format!("unknown category {id}"),
        })?;
        if node.version != expected_version {
            return Err(RemoteError::Conflict {
                id: id.clone(),
                expected_version,
            });
        }
        node.position = position;
        node.version += 1;
        Ok(CategoryUpdate {
            id: id.clone(),
            position,
            version: node.version,
        })
    }
}
