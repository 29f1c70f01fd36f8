//! Ordered startup and exhaustive shutdown of long-running components.
//!
//! [`LifecycleManager::start`] starts components one at a time in
//! registration order and stops at the first failure. Components that
//! already started are left running; callers own the explicit
//! [`close`](LifecycleManager::close).
//!
//! [`LifecycleManager::close`] attempts every component's `close`, logs each
//! failure with the component's name and group, and reports all of them.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{CloseFailure, LifecycleError, Result};

/// A long-running component with explicit start and close.
#[async_trait]
pub trait Component: Send + Sync {
    /// Starts the component. Long-running work should be spawned and tied
    /// to `ctx`; this call returns once the component is up.
    async fn start(&self, ctx: CancellationToken) -> Result<()>;

    /// Stops the component and releases its resources.
    async fn close(&self) -> Result<()>;

    /// Name used in logs and errors. Defaults to the concrete type name.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }
}

fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

struct Registered {
    group: String,
    component: Arc<dyn Component>,
}

/// Owns a set of components and coordinates their lifecycle.
///
/// # Examples
///
/// ```
/// use hourglass::lifecycle::LifecycleManager;
///
/// let manager = LifecycleManager::new();
/// assert!(manager.is_empty());
/// ```
#[derive(Default)]
pub struct LifecycleManager {
    components: Vec<Registered>,
    ctx: CancellationToken,
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field(
                "components",
                &self
                    .components
                    .iter()
                    .map(|r| format!("{}/{}", r.group, r.component.name()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl LifecycleManager {
    /// Creates an empty manager with its own root cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager whose components observe `ctx`.
    pub fn with_context(ctx: CancellationToken) -> Self {
        Self {
            components: Vec::new(),
            ctx,
        }
    }

    /// Registers a component under a group label. Order of registration is
    /// the order of startup.
    pub fn register(&mut self, group: impl Into<String>, component: Arc<dyn Component>) -> &mut Self {
        self.components.push(Registered {
            group: group.into(),
            component,
        });
        self
    }

    /// Number of registered components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether no component is registered.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// The token handed to every component's `start`.
    pub fn context(&self) -> &CancellationToken {
        &self.ctx
    }

    /// Starts all components sequentially, failing fast.
    pub async fn start(&self) -> std::result::Result<(), LifecycleError> {
        for registered in &self.components {
            let name = registered.component.name().to_string();
            info!(component = %name, group = %registered.group, "starting component");
            if let Err(source) = registered.component.start(self.ctx.child_token()).await {
                error!(
                    component = %name,
                    group = %registered.group,
                    error = %source,
                    "component failed to start"
                );
                return Err(LifecycleError::Start {
                    group: registered.group.clone(),
                    component: name,
                    source,
                });
            }
        }
        Ok(())
    }

    /// Cancels the shared context and closes every component.
    ///
    /// A failing component never prevents the remaining ones from closing.
    pub async fn close(&self) -> std::result::Result<(), LifecycleError> {
        self.ctx.cancel();
        let mut failures = Vec::new();
        for registered in &self.components {
            let name = registered.component.name().to_string();
            match registered.component.close().await {
                Ok(()) => info!(component = %name, group = %registered.group, "component closed"),
                Err(err) => {
                    error!(
                        component = %name,
                        group = %registered.group,
                        error = %err,
                        "component failed to close"
                    );
                    failures.push(CloseFailure {
                        group: registered.group.clone(),
                        component: name,
                        error: err,
                    });
                },
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::Close { failures })
        }
    }
}
