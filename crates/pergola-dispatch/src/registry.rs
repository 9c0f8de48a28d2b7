//! The mount-path registry.
//!
//! One process-scoped table of `mount path → handler type`, plus the ordered
//! list of every registered type. Populated at registration time and
//! finalized once at startup; read on every dispatch.
//!
//! # Automap
//!
//! A type whose (ancestral) `automap` setting is on and which carries no
//! explicit mapping is assigned its derived mount at registration - but only
//! if that mount is still vacant. Explicit [`map`](Registry::map) calls
//! always win: they overwrite whatever held the path, and any type displaced
//! that way gets one more vacant-only attempt when
//! [`finalize`](Registry::finalize) runs at startup.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use pergola_inform::Informer;

use crate::config::ConfigStore;
use crate::error::ConfigError;
use crate::handler::HandlerType;
use crate::resolve::normalize_path;

#[derive(Default)]
struct Inner {
    /// mount path → handler type. Ordered for deterministic iteration.
    mapping: BTreeMap<String, Arc<HandlerType>>,
    /// Every registered type, in registration order.
    handlers: Vec<Arc<HandlerType>>,
    /// Effective capability set per type: declared minus excluded, computed
    /// at registration and recomputed at finalize.
    capabilities: HashMap<String, BTreeSet<String>>,
}

/// The global mount table. One instance per framework, shared behind an
/// `Arc` by the Resolver and Dispatcher.
pub struct Registry {
    informer: Arc<Informer>,
    inner: RwLock<Inner>,
}

impl Registry {
    pub fn new(informer: Arc<Informer>) -> Self {
        Self {
            informer,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Registers a handler type: declares it (and its parent link) in the
    /// config store, records it, and attempts automap assignment.
    pub fn register(&self, config: &ConfigStore, handler: HandlerType) -> Arc<HandlerType> {
        config.declare(handler.name(), handler.parent());
        let handler = Arc::new(handler);

        let mut inner = self.write();
        inner.handlers.push(handler.clone());
        let effective = effective_capabilities(config, &handler);
        inner
            .capabilities
            .insert(handler.name().to_string(), effective);

        if config.automap(handler.name()) && mount_of(&inner, handler.name()).is_none() {
            let derived = handler.derived_mount();
            if !inner.mapping.contains_key(&derived) {
                self.informer
                    .debug(&format!("mapping {} => {}", derived, handler.name()));
                inner.mapping.insert(derived, handler.clone());
            }
        }
        handler
    }

    /// Maps a type to the given paths, replacing the type's previous
    /// mappings. Existing mappings at those paths are overwritten: explicit
    /// mappings always win over automap assignments.
    pub fn map(&self, ty: &str, paths: &[&str]) -> Result<(), ConfigError> {
        let mut inner = self.write();
        let handler = inner
            .handlers
            .iter()
            .find(|h| h.name() == ty)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownType(ty.to_string()))?;

        let mut mounts = Vec::with_capacity(paths.len());
        for path in paths {
            if path.is_empty() {
                return Err(ConfigError::InvalidMount(path.to_string()));
            }
            mounts.push(normalize_path(path));
        }

        inner.mapping.retain(|_, h| h.name() != ty);
        for mount in mounts {
            self.informer.debug(&format!("mapping {} => {}", mount, ty));
            inner.mapping.insert(mount, handler.clone());
        }
        Ok(())
    }

    /// The handler type mounted at exactly this path.
    pub fn at(&self, mount: &str) -> Option<Arc<HandlerType>> {
        self.read().mapping.get(&normalize_path(mount)).cloned()
    }

    /// The first mount path a type is mapped at, if any.
    pub fn mount_of(&self, ty: &str) -> Option<String> {
        mount_of(&self.read(), ty)
    }

    /// A registered handler type by name.
    pub fn handler(&self, ty: &str) -> Option<Arc<HandlerType>> {
        self.read()
            .handlers
            .iter()
            .find(|h| h.name() == ty)
            .cloned()
    }

    /// The effective (declared minus excluded) capability set for a type.
    pub fn effective_capabilities(&self, ty: &str) -> BTreeSet<String> {
        self.read().capabilities.get(ty).cloned().unwrap_or_default()
    }

    /// Finalizes the table at startup: recomputes effective capabilities
    /// against the final configuration and gives still-unmapped automap
    /// types one more vacant-only assignment attempt.
    pub fn finalize(&self, config: &ConfigStore) {
        let mut inner = self.write();

        let handlers = inner.handlers.clone();
        for handler in &handlers {
            let effective = effective_capabilities(config, handler);
            inner
                .capabilities
                .insert(handler.name().to_string(), effective);

            if !config.automap(handler.name()) || mount_of(&inner, handler.name()).is_some() {
                continue;
            }
            let derived = handler.derived_mount();
            if !inner.mapping.contains_key(&derived) {
                self.informer
                    .debug(&format!("mapping {} => {}", derived, handler.name()));
                inner.mapping.insert(derived, handler.clone());
            }
        }
    }

    /// All mount paths, longest first - the probe order the Resolver wants.
    pub fn mounts(&self) -> Vec<String> {
        let mut mounts: Vec<String> = self.read().mapping.keys().cloned().collect();
        mounts.sort_by_key(|m| std::cmp::Reverse(m.len()));
        mounts
    }

    /// Names of all registered types, in registration order.
    pub fn handler_names(&self) -> Vec<String> {
        self.read()
            .handlers
            .iter()
            .map(|h| h.name().to_string())
            .collect()
    }

    /// True when no mount path is assigned at all.
    pub fn is_empty(&self) -> bool {
        self.read().mapping.is_empty()
    }

    pub fn len(&self) -> usize {
        self.read().mapping.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }
}

fn mount_of(inner: &Inner, ty: &str) -> Option<String> {
    inner
        .mapping
        .iter()
        .find(|(_, h)| h.name() == ty)
        .map(|(mount, _)| mount.clone())
}

fn effective_capabilities(config: &ConfigStore, handler: &HandlerType) -> BTreeSet<String> {
    let excluded = config.excluded_capabilities(handler.name());
    handler
        .capabilities()
        .difference(&excluded)
        .cloned()
        .collect()
}
