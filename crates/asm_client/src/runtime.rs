//! Page-scoped client runtime
//!
//! The host drives the runtime with page signals (`dom_parsed`, `idle`,
//! `intersect`, `media_changed`, elapsed time) and the runtime decides which
//! islands activate. Everything here is single-threaded: one runtime per page,
//! owned by the bootstrap and torn down with [`ClientRuntime::destroy_page`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use asm_bus::EventBus;
use asm_core::{HydrationDirective, HydrationId};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{BoxError, HydrationMismatch};
use crate::module::{ClientModule, Island, IslandContext, ModuleLoader};
use crate::scanner::{scan, ScannedIsland};

/// Lifecycle of one island
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IslandState {
    /// Waiting for its activation signal
    Pending,
    /// Media query did not match; waiting for a change event
    Suspended,
    /// Mounted
    Active,
    /// Removed from the page
    Destroyed,
    /// Activation failed; markup stays inert
    Static,
}

struct Entry {
    island: ScannedIsland,
    state: IslandState,
    instance: Option<Box<dyn Island>>,
    context: Option<IslandContext>,
}

type MediaEvaluator = Box<dyn Fn(&str) -> bool>;

/// Client runtime for one page
pub struct ClientRuntime<L: ModuleLoader> {
    config: ClientConfig,
    loader: L,
    bus: EventBus,
    entries: Vec<Entry>,
    index: HashMap<HydrationId, usize>,
    modules: HashMap<String, Result<Arc<dyn ClientModule>, String>>,
    reports: Vec<HydrationMismatch>,
    media: MediaEvaluator,
    dom_parsed: bool,
    idle_fired: bool,
    since_parsed: Duration,
    page_destroyed: bool,
}

impl<L: ModuleLoader> ClientRuntime<L> {
    /// Create a runtime with its own page bus. Media queries evaluate to
    /// `false` until an evaluator is installed with [`Self::with_media`].
    pub fn new(config: ClientConfig, loader: L) -> Self {
        Self {
            config,
            loader,
            bus: EventBus::new(),
            entries: Vec::new(),
            index: HashMap::new(),
            modules: HashMap::new(),
            reports: Vec::new(),
            media: Box::new(|_| false),
            dom_parsed: false,
            idle_fired: false,
            since_parsed: Duration::ZERO,
            page_destroyed: false,
        }
    }

    /// Install the media query evaluator
    pub fn with_media<F>(mut self, evaluate: F) -> Self
    where
        F: Fn(&str) -> bool + 'static,
    {
        self.media = Box::new(evaluate);
        self
    }

    /// Scan `html` and register its islands. Markup added after the DOM was
    /// parsed is scheduled right away. Returns the number of islands added.
    pub fn boot(&mut self, html: &str) -> usize {
        if self.page_destroyed {
            log::debug!("Ignoring boot on a destroyed page");
            return 0;
        }

        let output = scan(html, &self.config.marker_tag);
        for mismatch in output.mismatches {
            self.report(mismatch);
        }

        let first_new = self.entries.len();
        for island in output.islands {
            if self.index.contains_key(&island.id) {
                self.report(HydrationMismatch::DuplicateId(island.id));
                continue;
            }
            self.index.insert(island.id, self.entries.len());
            self.entries.push(Entry {
                island,
                state: IslandState::Pending,
                instance: None,
                context: None,
            });
        }

        let added = self.entries.len() - first_new;
        log::info!("Booted {} islands", added);
        if self.dom_parsed {
            self.schedule(first_new);
        }
        added
    }

    /// The DOM finished parsing
    pub fn dom_parsed(&mut self) {
        if self.page_destroyed || self.dom_parsed {
            return;
        }
        self.dom_parsed = true;
        for (directive, ids) in self.groups() {
            log::debug!("{} {} island(s)", ids.len(), directive);
        }
        self.schedule(0);
    }

    /// The host reported an idle period
    pub fn idle(&mut self) {
        if self.page_destroyed {
            return;
        }
        self.idle_fired = true;
        if self.dom_parsed {
            self.activate_pending_idle(0);
        }
    }

    /// Time passed since the last call. Once the idle fallback window since
    /// DOM parse has elapsed, pending `idle` islands activate anyway.
    pub fn advance(&mut self, elapsed: Duration) {
        if self.page_destroyed || !self.dom_parsed {
            return;
        }
        self.since_parsed += elapsed;
        if self.since_parsed >= self.config.idle_fallback {
            if !self.idle_fired {
                log::debug!("Idle fallback after {:?}", self.since_parsed);
            }
            self.idle_fired = true;
            self.activate_pending_idle(0);
        }
    }

    /// An island's subtree intersected the viewport. Returns `true` only for
    /// the event that activated it.
    pub fn intersect(&mut self, id: HydrationId) -> bool {
        if self.page_destroyed || !self.dom_parsed {
            return false;
        }
        let Some(&idx) = self.index.get(&id) else {
            return false;
        };
        let entry = &self.entries[idx];
        if entry.state != IslandState::Pending || entry.island.directive != HydrationDirective::Visible {
            return false;
        }
        self.activate(idx);
        true
    }

    /// A media query changed its match state. Returns how many islands
    /// activated.
    pub fn media_changed(&mut self, query: &str, matches: bool) -> usize {
        if self.page_destroyed || !self.dom_parsed || !matches {
            return 0;
        }
        let waiting: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.state == IslandState::Suspended && e.island.directive.media_query() == Some(query))
            .map(|(idx, _)| idx)
            .collect();
        for &idx in &waiting {
            self.activate(idx);
        }
        waiting.len()
    }

    /// Remove an island and every island nested in it. Active instances are
    /// destroyed (children first) and their subscriptions released. Returns
    /// the number of islands removed.
    pub fn remove_subtree(&mut self, id: HydrationId) -> usize {
        let Some(&root) = self.index.get(&id) else {
            return 0;
        };
        let mut removed = 0;
        for idx in (root..self.entries.len()).rev() {
            if self.is_within(idx, id) && self.teardown(idx) {
                removed += 1;
            }
        }
        removed
    }

    /// Tear down the whole page. Later signals are ignored and suspended
    /// islands are never retried.
    pub fn destroy_page(&mut self) {
        if self.page_destroyed {
            return;
        }
        let removed = (0..self.entries.len())
            .rev()
            .filter(|&idx| self.teardown(idx))
            .count();
        self.page_destroyed = true;
        self.bus.close();
        log::info!("Page destroyed ({} islands removed)", removed);
    }

    /// Current state of an island
    pub fn island_state(&self, id: HydrationId) -> Option<IslandState> {
        self.index.get(&id).map(|&idx| self.entries[idx].state)
    }

    /// Context of a mounted island
    pub fn context(&self, id: HydrationId) -> Option<&IslandContext> {
        self.index
            .get(&id)
            .and_then(|&idx| self.entries[idx].context.as_ref())
    }

    /// Scanned islands, in document order
    pub fn islands(&self) -> impl Iterator<Item = &ScannedIsland> {
        self.entries.iter().map(|e| &e.island)
    }

    /// Island ids grouped by directive name
    pub fn groups(&self) -> BTreeMap<&'static str, Vec<HydrationId>> {
        let mut groups: BTreeMap<&'static str, Vec<HydrationId>> = BTreeMap::new();
        for entry in &self.entries {
            groups
                .entry(entry.island.directive.name())
                .or_default()
                .push(entry.island.id);
        }
        groups
    }

    /// Ids of islands in `state`
    pub fn in_state(&self, state: IslandState) -> Vec<HydrationId> {
        self.entries
            .iter()
            .filter(|e| e.state == state)
            .map(|e| e.island.id)
            .collect()
    }

    /// Every mismatch encountered so far
    pub fn reports(&self) -> &[HydrationMismatch] {
        &self.reports
    }

    /// Page bus shared by all islands
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Module loader
    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Runtime configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether [`Self::destroy_page`] has run
    pub fn is_destroyed(&self) -> bool {
        self.page_destroyed
    }

    // Immediate islands first, then media, then idle.
    fn schedule(&mut self, from: usize) {
        for idx in from..self.entries.len() {
            if self.entries[idx].state == IslandState::Pending
                && self.entries[idx].island.directive == HydrationDirective::Immediate
            {
                self.activate(idx);
            }
        }

        for idx in from..self.entries.len() {
            if self.entries[idx].state != IslandState::Pending {
                continue;
            }
            let HydrationDirective::Media(query) = &self.entries[idx].island.directive else {
                continue;
            };
            if (self.media)(query) {
                self.activate(idx);
            } else {
                log::debug!("Island {} suspended on '{}'", self.entries[idx].island.id, query);
                self.entries[idx].state = IslandState::Suspended;
            }
        }

        if self.idle_fired {
            self.activate_pending_idle(from);
        }
    }

    fn activate_pending_idle(&mut self, from: usize) {
        for idx in from..self.entries.len() {
            if self.entries[idx].state == IslandState::Pending
                && self.entries[idx].island.directive == HydrationDirective::Idle
            {
                self.activate(idx);
            }
        }
    }

    fn activate(&mut self, idx: usize) {
        match self.mount(idx) {
            Ok((instance, context)) => {
                let entry = &mut self.entries[idx];
                log::info!(
                    "Hydrated island {} ({}, {})",
                    entry.island.id,
                    entry.island.module,
                    entry.island.directive.name()
                );
                entry.instance = Some(instance);
                entry.context = Some(context);
                entry.state = IslandState::Active;
            }
            Err(mismatch) => {
                self.entries[idx].state = IslandState::Static;
                self.report(mismatch);
            }
        }
    }

    fn mount(&mut self, idx: usize) -> Result<(Box<dyn Island>, IslandContext), HydrationMismatch> {
        let island = &self.entries[idx].island;
        let id = island.id;
        let raw = island
            .state
            .as_deref()
            .ok_or(HydrationMismatch::MissingState { id })?;
        let props: Value =
            serde_json::from_str(raw).map_err(|source| HydrationMismatch::SnapshotParse { id, source })?;
        let module_ref = island.module.clone();
        let markup = island.markup.clone();

        let module = self
            .load_module(&module_ref)
            .map_err(|cause| HydrationMismatch::ModuleLoad {
                id,
                module: module_ref.clone(),
                cause,
            })?;

        let mut instance = module.instantiate();
        let mut context = IslandContext::new(id, module_ref, props, markup, self.bus.clone());
        if let Err(cause) = instance.mount(&mut context) {
            context.release_subscriptions();
            return Err(HydrationMismatch::MountFailed { id, cause });
        }
        Ok((instance, context))
    }

    fn load_module(&mut self, module: &str) -> Result<Arc<dyn ClientModule>, BoxError> {
        if let Some(cached) = self.modules.get(module) {
            return cached.clone().map_err(|message| message.into());
        }
        log::debug!("Loading module {}", module);
        let loaded = self.loader.load(module);
        let cached = match &loaded {
            Ok(code) => Ok(Arc::clone(code)),
            Err(e) => Err(e.to_string()),
        };
        self.modules.insert(module.to_string(), cached);
        loaded
    }

    fn is_within(&self, idx: usize, root: HydrationId) -> bool {
        let mut current = Some(self.entries[idx].island.id);
        while let Some(id) = current {
            if id == root {
                return true;
            }
            current = self
                .index
                .get(&id)
                .and_then(|&i| self.entries[i].island.parent);
        }
        false
    }

    fn teardown(&mut self, idx: usize) -> bool {
        let entry = &mut self.entries[idx];
        match entry.state {
            IslandState::Destroyed => false,
            IslandState::Active => {
                if let (Some(mut instance), Some(mut context)) = (entry.instance.take(), entry.context.take()) {
                    instance.destroy(&mut context);
                    context.release_subscriptions();
                }
                log::info!("Destroyed island {}", entry.island.id);
                entry.state = IslandState::Destroyed;
                true
            }
            IslandState::Pending | IslandState::Suspended | IslandState::Static => {
                log::debug!("Removed island {} before activation", entry.island.id);
                entry.state = IslandState::Destroyed;
                true
            }
        }
    }

    fn report(&mut self, mismatch: HydrationMismatch) {
        log::warn!("{}", mismatch);
        self.reports.push(mismatch);
    }
}

impl<L: ModuleLoader> fmt::Debug for ClientRuntime<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRuntime")
            .field("islands", &self.entries.len())
            .field("dom_parsed", &self.dom_parsed)
            .field("reports", &self.reports.len())
            .field("page_destroyed", &self.page_destroyed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleRegistry;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Counter {
        mounts: Rc<Cell<u32>>,
    }

    impl Island for Counter {
        fn mount(&mut self, _ctx: &mut IslandContext) -> Result<(), BoxError> {
            self.mounts.set(self.mounts.get() + 1);
            Ok(())
        }

        fn destroy(&mut self, _ctx: &mut IslandContext) {}
    }

    struct CounterModule {
        mounts: Rc<Cell<u32>>,
    }

    impl ClientModule for CounterModule {
        fn instantiate(&self) -> Box<dyn Island> {
            Box::new(Counter {
                mounts: Rc::clone(&self.mounts),
            })
        }
    }

    fn marker(id: &str, directive: &str, extra: &str) -> String {
        format!(
            "<asm-island data-asm-id=\"{id}\" data-asm-directive=\"{directive}\" data-asm-module=\"m.js\"{extra}>\
             <p>{id}</p><script type=\"application/json\" data-asm-state=\"{id}\">{{}}</script></asm-island>"
        )
    }

    fn runtime(mounts: &Rc<Cell<u32>>) -> ClientRuntime<ModuleRegistry> {
        let registry = ModuleRegistry::new().with(
            "m.js",
            Arc::new(CounterModule {
                mounts: Rc::clone(mounts),
            }),
        );
        ClientRuntime::new(ClientConfig::from_idle_fallback_ms(100), registry)
    }

    #[test]
    fn test_nothing_activates_before_dom_parsed() {
        let mounts = Rc::new(Cell::new(0));
        let mut rt = runtime(&mounts);
        rt.boot(&marker("h0", "immediate", ""));
        rt.idle();
        assert_eq!(rt.island_state(HydrationId::new(0)), Some(IslandState::Pending));

        rt.dom_parsed();
        rt.dom_parsed();
        assert_eq!(rt.island_state(HydrationId::new(0)), Some(IslandState::Active));
        assert_eq!(mounts.get(), 1);
    }

    #[test]
    fn test_idle_fallback_window() {
        let mounts = Rc::new(Cell::new(0));
        let mut rt = runtime(&mounts);
        rt.boot(&marker("h0", "idle", ""));
        rt.dom_parsed();

        rt.advance(Duration::from_millis(60));
        assert_eq!(rt.island_state(HydrationId::new(0)), Some(IslandState::Pending));
        rt.advance(Duration::from_millis(40));
        assert_eq!(rt.island_state(HydrationId::new(0)), Some(IslandState::Active));
    }

    #[test]
    fn test_groups_by_directive() {
        let mounts = Rc::new(Cell::new(0));
        let mut rt = runtime(&mounts);
        let page = [
            marker("h0", "immediate", ""),
            marker("h1", "visible", ""),
            marker("h2", "visible", ""),
            marker("h3", "media", " data-asm-media=\"print\""),
        ]
        .concat();
        assert_eq!(rt.boot(&page), 4);

        let groups = rt.groups();
        assert_eq!(groups["visible"], vec![HydrationId::new(1), HydrationId::new(2)]);
        assert_eq!(groups["media"], vec![HydrationId::new(3)]);
        assert_eq!(groups["immediate"].len(), 1);
    }

    #[test]
    fn test_late_boot_is_scheduled() {
        let mounts = Rc::new(Cell::new(0));
        let mut rt = runtime(&mounts);
        rt.dom_parsed();
        rt.boot(&marker("h7", "immediate", ""));
        assert_eq!(rt.island_state(HydrationId::new(7)), Some(IslandState::Active));

        rt.boot(&marker("h7", "immediate", ""));
        assert!(matches!(rt.reports()[0], HydrationMismatch::DuplicateId(_)));
        assert_eq!(mounts.get(), 1);
    }
}
