//! Per-handler-type configuration with ancestral lookup.
//!
//! Every setting is resolved the same way: the type's own override first,
//! then the declared parent chain up to the nearest ancestor that defines
//! the setting, finally a process-wide default. Mutating a setting on a
//! subtype copies the effective ancestral value into the subtype's own slot
//! first (copy-on-first-write), so an ancestor's configuration is never
//! changed through a descendant.
//!
//! Each setting is independent: a subtype may override only its cache rules
//! and keep inheriting everything else.
//!
//! Querying an unset setting never errors - it yields the documented empty
//! value. Mutating configuration for a type that was never declared is a
//! [`ConfigError::UnknownType`], raised at definition time.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::error::ConfigError;
use crate::request::Request;

/// Identifies a layout template.
///
/// A name starting with `/` is absolute: it resolves in the shared template
/// namespace. Anything else resolves scoped under the owning handler type's
/// mount path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutRef(String);

impl LayoutRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn is_absolute(&self) -> bool {
        self.0.starts_with('/')
    }

    /// The template name this reference resolves to for a handler mounted at
    /// `mount`. Engine template names carry no leading slash.
    pub fn resolve(&self, mount: &str) -> String {
        if self.is_absolute() {
            self.0.trim_start_matches('/').to_string()
        } else if mount == "/" {
            self.0.clone()
        } else {
            format!("{}/{}", mount.trim_start_matches('/'), self.0)
        }
    }
}

impl From<&str> for LayoutRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for LayoutRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A handler type's layout policy: a type-wide default, per-action
/// overrides, and a denylist that suppresses layouts entirely.
#[derive(Debug, Clone, Default)]
pub struct LayoutRules {
    pub default: Option<LayoutRef>,
    pub per_action: HashMap<String, LayoutRef>,
    pub deny: HashSet<String>,
}

impl LayoutRules {
    /// The layout that wraps `action`, if any. Denylist beats per-action
    /// override beats type-wide default.
    pub fn layout_for(&self, action: &str) -> Option<&LayoutRef> {
        if self.deny.contains(action) {
            return None;
        }
        self.per_action.get(action).or(self.default.as_ref())
    }

    fn is_empty(&self) -> bool {
        self.default.is_none() && self.per_action.is_empty() && self.deny.is_empty()
    }
}

/// A cache key function: derives a secondary cache key from the request.
pub type CacheKeyFn = Arc<dyn Fn(&Request) -> String + Send + Sync>;

/// Per-action cache configuration. Set once via the declarative `cache`
/// call, read on every dispatch of that action.
#[derive(Clone, Default)]
pub struct CacheOptions {
    ttl: Option<Duration>,
    key_fn: Option<CacheKeyFn>,
}

impl CacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries expire this long after being stored.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Nest entries under a per-request secondary key.
    pub fn key<F>(mut self, f: F) -> Self
    where
        F: Fn(&Request) -> String + Send + Sync + 'static,
    {
        self.key_fn = Some(Arc::new(f));
        self
    }

    pub fn ttl_value(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn has_key_fn(&self) -> bool {
        self.key_fn.is_some()
    }

    /// Runs the key function against a request, if one is configured.
    pub fn key_for(&self, request: &Request) -> Option<String> {
        self.key_fn.as_ref().map(|f| f(request))
    }
}

impl fmt::Debug for CacheOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheOptions")
            .field("ttl", &self.ttl)
            .field("key_fn", &self.key_fn.is_some())
            .finish()
    }
}

/// A template reroute: render `action` with the template belonging to
/// another handler type's action instead of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateReroute {
    pub handler: String,
    pub action: String,
}

/// One type's own overrides. `None` means "inherit".
#[derive(Default)]
struct TypeConfig {
    automap: Option<bool>,
    layout: Option<LayoutRules>,
    cache: Option<HashMap<String, CacheOptions>>,
    excluded_capabilities: Option<BTreeSet<String>>,
    template_root: Option<PathBuf>,
    reroutes: Option<HashMap<String, TemplateReroute>>,
}

struct TypeEntry {
    parent: Option<String>,
    config: TypeConfig,
}

/// The store of per-handler-type configuration.
///
/// Interior-locked so it can sit behind an `Arc` next to the Registry;
/// writes happen at startup, reads on every dispatch.
pub struct ConfigStore {
    types: RwLock<HashMap<String, TypeEntry>>,
    /// Process-wide default for `automap`.
    default_automap: bool,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    pub fn new() -> Self {
        Self {
            types: RwLock::new(HashMap::new()),
            default_automap: true,
        }
    }

    /// Declares a type (and its parent link). Called by the Registry at
    /// registration; idempotent.
    pub fn declare(&self, name: &str, parent: Option<&str>) {
        let mut types = self.write();
        types.entry(name.to_string()).or_insert_with(|| TypeEntry {
            parent: parent.map(str::to_string),
            config: TypeConfig::default(),
        });
    }

    /// Whether the type participates in automap. Ancestral; process default
    /// is `true`.
    pub fn automap(&self, ty: &str) -> bool {
        self.ancestral(ty, |c| c.automap)
            .unwrap_or(self.default_automap)
    }

    pub fn set_automap(&self, ty: &str, on: bool) -> Result<(), ConfigError> {
        self.mutate(ty, |c| c.automap = Some(on))
    }

    /// The effective layout rules for a type. Ancestral; empty when nothing
    /// in the chain defines any.
    pub fn layout_rules(&self, ty: &str) -> LayoutRules {
        self.ancestral(ty, |c| c.layout.clone()).unwrap_or_default()
    }

    /// Sets the type-wide default layout.
    pub fn set_layout(&self, ty: &str, layout: impl Into<LayoutRef>) -> Result<(), ConfigError> {
        let layout = layout.into();
        self.mutate_layout(ty, |rules| rules.default = Some(layout))
    }

    /// Maps a layout to specific actions, overriding the type-wide default
    /// for those actions only. An empty action list is refused.
    pub fn set_action_layout(
        &self,
        ty: &str,
        layout: impl Into<LayoutRef>,
        actions: &[&str],
    ) -> Result<(), ConfigError> {
        let layout = layout.into();
        if actions.is_empty() {
            return Err(ConfigError::EmptyLayoutMapping {
                handler: ty.to_string(),
                layout: layout.name().to_string(),
            });
        }
        self.mutate_layout(ty, |rules| {
            for action in actions {
                rules.per_action.insert(action.to_string(), layout.clone());
            }
        })
    }

    /// Excludes actions from layout wrapping entirely.
    pub fn deny_layout(&self, ty: &str, actions: &[&str]) -> Result<(), ConfigError> {
        self.mutate_layout(ty, |rules| {
            rules.deny.extend(actions.iter().map(|a| a.to_string()));
        })
    }

    /// The cache options for one action, if a cache rule applies. Ancestral.
    pub fn cache_options(&self, ty: &str, action: &str) -> Option<CacheOptions> {
        self.ancestral(ty, |c| c.cache.clone())
            .and_then(|rules| rules.get(action).cloned())
    }

    /// Enables output caching for the named actions. An empty list is
    /// refused.
    pub fn set_cache(
        &self,
        ty: &str,
        actions: &[&str],
        options: CacheOptions,
    ) -> Result<(), ConfigError> {
        if actions.is_empty() {
            return Err(ConfigError::EmptyCacheRule(ty.to_string()));
        }
        let effective = self.ancestral(ty, |c| c.cache.clone()).unwrap_or_default();
        self.mutate(ty, move |c| {
            let rules = c.cache.get_or_insert(effective);
            for action in actions {
                rules.insert(action.to_string(), options.clone());
            }
        })
    }

    /// The capabilities excluded on a type. Ancestral; empty by default.
    pub fn excluded_capabilities(&self, ty: &str) -> BTreeSet<String> {
        self.ancestral(ty, |c| c.excluded_capabilities.clone())
            .unwrap_or_default()
    }

    pub fn exclude_capabilities(&self, ty: &str, caps: &[&str]) -> Result<(), ConfigError> {
        let effective = self
            .ancestral(ty, |c| c.excluded_capabilities.clone())
            .unwrap_or_default();
        self.mutate(ty, move |c| {
            let set = c.excluded_capabilities.get_or_insert(effective);
            set.extend(caps.iter().map(|s| s.to_string()));
        })
    }

    /// The template root for a type, if one was declared anywhere in the
    /// chain.
    pub fn template_root(&self, ty: &str) -> Option<PathBuf> {
        self.ancestral(ty, |c| c.template_root.clone())
    }

    pub fn set_template_root(&self, ty: &str, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref().to_path_buf();
        self.mutate(ty, move |c| c.template_root = Some(path))
    }

    /// The template reroute for an action, if configured. Ancestral.
    pub fn reroute(&self, ty: &str, action: &str) -> Option<TemplateReroute> {
        self.ancestral(ty, |c| c.reroutes.clone())
            .and_then(|map| map.get(action).cloned())
    }

    /// Reroutes `action` to render with `from_ty`'s `from_action` template.
    /// `from_ty` must already be declared.
    pub fn set_template(
        &self,
        ty: &str,
        action: &str,
        from_ty: &str,
        from_action: &str,
    ) -> Result<(), ConfigError> {
        if !self.read().contains_key(from_ty) {
            return Err(ConfigError::UnknownType(from_ty.to_string()));
        }
        let effective = self.ancestral(ty, |c| c.reroutes.clone()).unwrap_or_default();
        let reroute = TemplateReroute {
            handler: from_ty.to_string(),
            action: from_action.to_string(),
        };
        self.mutate(ty, move |c| {
            c.reroutes
                .get_or_insert(effective)
                .insert(action.to_string(), reroute);
        })
    }

    /// Is the type declared?
    pub fn knows(&self, ty: &str) -> bool {
        self.read().contains_key(ty)
    }

    // Ancestral resolution: own value, else walk the parent chain, guarding
    // against cycles in malformed parent declarations.
    fn ancestral<T>(&self, ty: &str, pick: impl Fn(&TypeConfig) -> Option<T>) -> Option<T> {
        let types = self.read();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut cursor = Some(ty);
        while let Some(name) = cursor {
            if !seen.insert(name) {
                break;
            }
            let entry = types.get(name)?;
            if let Some(value) = pick(&entry.config) {
                return Some(value);
            }
            cursor = entry.parent.as_deref();
        }
        None
    }

    fn mutate(
        &self,
        ty: &str,
        apply: impl FnOnce(&mut TypeConfig),
    ) -> Result<(), ConfigError> {
        let mut types = self.write();
        let entry = types
            .get_mut(ty)
            .ok_or_else(|| ConfigError::UnknownType(ty.to_string()))?;
        apply(&mut entry.config);
        Ok(())
    }

    // Copy-on-first-write for layout rules: the first mutation on a subtype
    // clones the effective ancestral rules into its own slot.
    fn mutate_layout(
        &self,
        ty: &str,
        apply: impl FnOnce(&mut LayoutRules),
    ) -> Result<(), ConfigError> {
        let effective = self.layout_rules(ty);
        self.mutate(ty, move |c| {
            let rules = c.layout.get_or_insert_with(|| {
                if effective.is_empty() {
                    LayoutRules::default()
                } else {
                    effective
                }
            });
            apply(rules);
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, TypeEntry>> {
        self.types.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, TypeEntry>> {
        self.types.write().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_chain() -> ConfigStore {
        let store = ConfigStore::new();
        store.declare("BaseController", None);
        store.declare("AdminController", Some("BaseController"));
        store
    }

    #[test]
    fn test_automap_default_and_override() {
        let store = store_with_chain();
        assert!(store.automap("BaseController"));

        store.set_automap("BaseController", false).unwrap();
        assert!(!store.automap("BaseController"));
        // Subtype inherits the ancestor's override.
        assert!(!store.automap("AdminController"));

        store.set_automap("AdminController", true).unwrap();
        assert!(store.automap("AdminController"));
        assert!(!store.automap("BaseController"));
    }

    #[test]
    fn test_layout_inheritance() {
        let store = store_with_chain();
        store.set_layout("BaseController", "page").unwrap();

        let rules = store.layout_rules("AdminController");
        assert_eq!(rules.default, Some(LayoutRef::new("page")));
    }

    #[test]
    fn test_copy_on_write_leaves_ancestor_untouched() {
        let store = store_with_chain();
        store.set_layout("BaseController", "page").unwrap();

        // Denying an action on the subtype must not leak upward.
        store.deny_layout("AdminController", &["raw"]).unwrap();

        assert!(store.layout_rules("AdminController").deny.contains("raw"));
        assert!(store.layout_rules("BaseController").deny.is_empty());
        // The subtype's copy retains the inherited default.
        assert_eq!(
            store.layout_rules("AdminController").default,
            Some(LayoutRef::new("page"))
        );
    }

    #[test]
    fn test_layout_for_precedence() {
        let mut rules = LayoutRules::default();
        rules.default = Some(LayoutRef::new("page"));
        rules
            .per_action
            .insert("special".to_string(), LayoutRef::new("wide"));
        rules.deny.insert("raw".to_string());

        assert_eq!(rules.layout_for("index"), Some(&LayoutRef::new("page")));
        assert_eq!(rules.layout_for("special"), Some(&LayoutRef::new("wide")));
        assert_eq!(rules.layout_for("raw"), None);
    }

    #[test]
    fn test_layout_ref_resolution() {
        assert_eq!(LayoutRef::new("main").resolve("/widgets"), "widgets/main");
        assert_eq!(LayoutRef::new("main").resolve("/"), "main");
        assert_eq!(
            LayoutRef::new("/shared/page").resolve("/widgets"),
            "shared/page"
        );
    }

    #[test]
    fn test_empty_action_layout_is_refused() {
        let store = store_with_chain();
        let err = store
            .set_action_layout("BaseController", "wide", &[])
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyLayoutMapping { .. }));
    }

    #[test]
    fn test_cache_rules_per_subtype() {
        let store = store_with_chain();
        store
            .set_cache(
                "BaseController",
                &["index"],
                CacheOptions::new().ttl(Duration::from_secs(60)),
            )
            .unwrap();

        // Inherited.
        assert!(store.cache_options("AdminController", "index").is_some());
        assert!(store.cache_options("AdminController", "show").is_none());

        // Subtype adds its own rule; ancestor is unchanged.
        store
            .set_cache("AdminController", &["show"], CacheOptions::new())
            .unwrap();
        assert!(store.cache_options("AdminController", "show").is_some());
        assert!(store.cache_options("BaseController", "show").is_none());
        // The copied-down inherited rule is still visible on the subtype.
        assert!(store.cache_options("AdminController", "index").is_some());
    }

    #[test]
    fn test_empty_cache_rule_is_refused() {
        let store = store_with_chain();
        let err = store
            .set_cache("BaseController", &[], CacheOptions::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyCacheRule(_)));
    }

    #[test]
    fn test_excluded_capabilities() {
        let store = store_with_chain();
        assert!(store.excluded_capabilities("BaseController").is_empty());

        store
            .exclude_capabilities("BaseController", &["flash"])
            .unwrap();
        store
            .exclude_capabilities("AdminController", &["link"])
            .unwrap();

        let admin = store.excluded_capabilities("AdminController");
        assert!(admin.contains("flash") && admin.contains("link"));
        let base = store.excluded_capabilities("BaseController");
        assert!(base.contains("flash") && !base.contains("link"));
    }

    #[test]
    fn test_reroute_requires_known_target() {
        let store = store_with_chain();
        let err = store
            .set_template("BaseController", "index", "GhostController", "list")
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownType(name) if name == "GhostController"));

        store
            .set_template("AdminController", "index", "BaseController", "list")
            .unwrap();
        let reroute = store.reroute("AdminController", "index").unwrap();
        assert_eq!(reroute.handler, "BaseController");
        assert_eq!(reroute.action, "list");
    }

    #[test]
    fn test_unknown_type_mutation_fails_queries_do_not() {
        let store = ConfigStore::new();
        assert!(store.set_layout("GhostController", "page").is_err());
        // Queries on unknown types yield empty values, never errors.
        assert!(store.layout_rules("GhostController").default.is_none());
        assert!(store.cache_options("GhostController", "index").is_none());
        assert!(store.automap("GhostController"));
    }

    #[test]
    fn test_cache_options_key_fn() {
        let opts = CacheOptions::new().key(|req: &Request| {
            req.param("name").unwrap_or("anonymous").to_string()
        });
        assert!(opts.has_key_fn());

        let req = Request::new().with_param("name", "ada");
        assert_eq!(opts.key_for(&req), Some("ada".to_string()));
        assert_eq!(opts.key_for(&Request::new()), Some("anonymous".to_string()));
        assert_eq!(CacheOptions::new().key_for(&req), None);
    }

    #[test]
    fn test_parent_cycle_terminates() {
        let store = ConfigStore::new();
        store.declare("AController", Some("BController"));
        store.declare("BController", Some("AController"));
        // No own value anywhere in the (cyclic) chain: falls to the default.
        assert!(store.automap("AController"));
    }
}
