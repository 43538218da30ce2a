//! Factory scheduler
//!
//! Factories are asynchronous data-preparation units bound to a target. Before
//! any markup is produced the engine runs every unit bound to the targets of a
//! request:
//!
//! - units are ordered by descending priority
//! - equal priorities keep registration order
//! - one priority tier completes before the next starts
//! - within a tier units may run concurrently (equal priority declares that
//!   no ordering dependency exists between them)
//!
//! The first failure abandons the rest of the run and surfaces as a
//! [`DataPreparationError`]. Nothing is retried.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use asm_core::ComponentKey;
use futures_util::future::{try_join_all, BoxFuture};

use crate::context::RenderContext;
use crate::error::{BoxError, DataPreparationError};

/// What a factory unit is bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FactoryTarget {
    /// Runs for every request
    Global,
    /// Runs when the blueprint is the root of the request
    Blueprint(ComponentKey),
    /// Runs once per request in which the component appears
    Component(ComponentKey),
}

impl fmt::Display for FactoryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Blueprint(key) => write!(f, "blueprint {}", key),
            Self::Component(key) => write!(f, "component {}", key),
        }
    }
}

/// View of the render context handed to a running unit
pub struct FactoryContext<'a> {
    render: &'a RenderContext,
    target: &'a FactoryTarget,
    depth: usize,
}

impl<'a> FactoryContext<'a> {
    /// Create a factory context
    pub fn new(render: &'a RenderContext, target: &'a FactoryTarget, depth: usize) -> Self {
        Self { render, target, depth }
    }

    /// Target the running unit was bound to
    pub fn target(&self) -> &FactoryTarget {
        self.target
    }

    /// Nesting depth of the first node the target appeared at
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The underlying render context
    pub fn render_context(&self) -> &RenderContext {
        self.render
    }
}

impl Deref for FactoryContext<'_> {
    type Target = RenderContext;

    fn deref(&self) -> &RenderContext {
        self.render
    }
}

/// A data-preparation unit.
///
/// Units write into the request data store; they do not return values.
#[async_trait::async_trait]
pub trait FactoryUnit: Send + Sync {
    /// Identity reported on failure
    fn name(&self) -> &str;

    /// Higher runs earlier
    fn priority(&self) -> i32 {
        0
    }

    /// Prepare data
    async fn run(&self, ctx: &FactoryContext<'_>) -> Result<(), BoxError>;
}

/// Future returned by closure-backed factories
pub type FactoryFuture<'a> = BoxFuture<'a, Result<(), BoxError>>;

/// Factory unit backed by a closure
pub struct FnFactory<F> {
    name: String,
    priority: i32,
    func: F,
}

impl<F> FnFactory<F>
where
    F: for<'a> Fn(&'a FactoryContext<'a>) -> FactoryFuture<'a> + Send + Sync,
{
    /// Wrap a closure returning a boxed future
    pub fn new(name: impl Into<String>, priority: i32, func: F) -> Self {
        Self {
            name: name.into(),
            priority,
            func,
        }
    }
}

#[async_trait::async_trait]
impl<F> FactoryUnit for FnFactory<F>
where
    F: for<'a> Fn(&'a FactoryContext<'a>) -> FactoryFuture<'a> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn run(&self, ctx: &FactoryContext<'_>) -> Result<(), BoxError> {
        (self.func)(ctx).await
    }
}

struct ScheduledUnit {
    target: FactoryTarget,
    order: usize,
    unit: Arc<dyn FactoryUnit>,
}

/// Holds every factory binding; built at startup and shared read-only
pub struct FactoryScheduler {
    units: Vec<ScheduledUnit>,
    concurrent_tiers: bool,
}

impl FactoryScheduler {
    /// Create an empty scheduler running equal-priority tiers concurrently
    pub fn new() -> Self {
        Self {
            units: Vec::new(),
            concurrent_tiers: true,
        }
    }

    /// Choose whether equal-priority units run concurrently
    pub fn with_concurrent_tiers(mut self, concurrent: bool) -> Self {
        self.concurrent_tiers = concurrent;
        self
    }

    /// Attach a unit to a target
    pub fn schedule(&mut self, target: FactoryTarget, unit: impl FactoryUnit + 'static) {
        self.schedule_arc(target, Arc::new(unit));
    }

    /// Attach a shared unit to a target
    pub fn schedule_arc(&mut self, target: FactoryTarget, unit: Arc<dyn FactoryUnit>) {
        log::debug!(
            "Scheduled factory '{}' (priority {}) for {}",
            unit.name(),
            unit.priority(),
            target
        );
        let order = self.units.len();
        self.units.push(ScheduledUnit { target, order, unit });
    }

    /// Total number of bindings
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if no unit is scheduled
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Number of units bound to exactly this target
    pub fn count_for(&self, target: &FactoryTarget) -> usize {
        self.units.iter().filter(|s| &s.target == target).count()
    }

    /// Unit names for the targets, in execution order
    pub fn plan(&self, targets: &[FactoryTarget]) -> Vec<&str> {
        self.ordered(targets).iter().map(|s| s.unit.name()).collect()
    }

    fn ordered(&self, targets: &[FactoryTarget]) -> Vec<&ScheduledUnit> {
        let mut selected: Vec<&ScheduledUnit> = self
            .units
            .iter()
            .filter(|s| targets.contains(&s.target))
            .collect();
        // `sort_by_key` is stable, and `order` makes the tie-break explicit anyway.
        selected.sort_by_key(|s| (std::cmp::Reverse(s.unit.priority()), s.order));
        selected
    }

    /// Run every unit bound to any of `targets`.
    ///
    /// Returns the number of units that ran.
    pub async fn run(
        &self,
        ctx: &RenderContext,
        targets: &[FactoryTarget],
        depth: usize,
    ) -> Result<usize, DataPreparationError> {
        let ordered = self.ordered(targets);
        let total = ordered.len();

        for tier in ordered.chunk_by(|a, b| a.unit.priority() == b.unit.priority()) {
            let priority = tier[0].unit.priority();
            log::debug!(
                "[{}] factory tier {} ({} units)",
                ctx.request_id(),
                priority,
                tier.len()
            );

            if self.concurrent_tiers && tier.len() > 1 {
                try_join_all(tier.iter().map(|s| run_unit(ctx, s, depth))).await?;
            } else {
                for scheduled in tier {
                    run_unit(ctx, scheduled, depth).await?;
                }
            }
        }

        Ok(total)
    }
}

async fn run_unit(
    ctx: &RenderContext,
    scheduled: &ScheduledUnit,
    depth: usize,
) -> Result<(), DataPreparationError> {
    let factory_ctx = FactoryContext::new(ctx, &scheduled.target, depth);
    scheduled.unit.run(&factory_ctx).await.map_err(|cause| {
        log::warn!(
            "[{}] factory '{}' for {} failed: {}",
            ctx.request_id(),
            scheduled.unit.name(),
            scheduled.target,
            cause
        );
        DataPreparationError {
            unit: scheduled.unit.name().to_string(),
            target: scheduled.target.clone(),
            cause,
        }
    })
}

impl Default for FactoryScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FactoryScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryScheduler")
            .field("units", &self.units.len())
            .field("concurrent_tiers", &self.concurrent_tiers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestInfo;
    use parking_lot::Mutex;
    use serde_json::json;

    struct Recording {
        name: &'static str,
        priority: i32,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait::async_trait]
    impl FactoryUnit for Recording {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        async fn run(&self, ctx: &FactoryContext<'_>) -> Result<(), BoxError> {
            self.log.lock().push(self.name);
            ctx.data().set(self.name, json!(self.priority));
            Ok(())
        }
    }

    #[test]
    fn test_target_display() {
        assert_eq!(FactoryTarget::Global.to_string(), "global");
        assert_eq!(
            FactoryTarget::Component(ComponentKey::new("shop", "reviews")).to_string(),
            "component shop:reviews"
        );
    }

    #[tokio::test]
    async fn test_sequential_ties_keep_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = FactoryScheduler::new().with_concurrent_tiers(false);
        for (name, priority) in [("low", 1), ("tie-a", 5), ("high", 9), ("tie-b", 5)] {
            scheduler.schedule(
                FactoryTarget::Global,
                Recording {
                    name,
                    priority,
                    log: Arc::clone(&log),
                },
            );
        }

        let ctx = RenderContext::detached(RequestInfo::new("/"));
        let ran = scheduler.run(&ctx, &[FactoryTarget::Global], 0).await.unwrap();

        assert_eq!(ran, 4);
        assert_eq!(*log.lock(), vec!["high", "tie-a", "tie-b", "low"]);
        assert_eq!(scheduler.plan(&[FactoryTarget::Global]), vec!["high", "tie-a", "tie-b", "low"]);
        assert_eq!(ctx.data().get("tie-b"), Some(json!(5)));
    }

    #[tokio::test]
    async fn test_unbound_targets_do_not_run() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = FactoryScheduler::new();
        let gallery = ComponentKey::new("shop", "gallery");
        scheduler.schedule(
            FactoryTarget::Component(gallery.clone()),
            Recording {
                name: "gallery",
                priority: 0,
                log: Arc::clone(&log),
            },
        );

        let ctx = RenderContext::detached(RequestInfo::new("/"));
        let ran = scheduler.run(&ctx, &[FactoryTarget::Global], 0).await.unwrap();
        assert_eq!(ran, 0);
        assert!(log.lock().is_empty());
        assert_eq!(scheduler.count_for(&FactoryTarget::Component(gallery)), 1);
    }

    #[tokio::test]
    async fn test_closure_factory() {
        let mut scheduler = FactoryScheduler::new();
        scheduler.schedule(
            FactoryTarget::Global,
            FnFactory::new("greeting", 0, |ctx| {
                Box::pin(async move {
                    let name = ctx.param("name").unwrap_or("guest").to_string();
                    ctx.data().set("greeting", json!(format!("hello {}", name)));
                    Ok::<(), BoxError>(())
                })
            }),
        );

        let ctx = RenderContext::detached(RequestInfo::new("/").with_param("name", "ada"));
        scheduler.run(&ctx, &[FactoryTarget::Global], 0).await.unwrap();
        assert_eq!(ctx.data().get("greeting"), Some(json!("hello ada")));
    }
}
