//! Flexible records and their type descriptors.
//!
//! A [`RecordType`] is the explicit per-type descriptor: the silence
//! policy, the computed-attribute table, and the named-view table. Building
//! one is the "type definition" event — it seeds the implicit `"defaults"`
//! view and appends the type to the process-wide registry, exactly once.
//!
//! A [`Record`] is an instance: an open mapping from attribute name to
//! [`Value`], resolved through a three-way lookup:
//!
//! ```text
//! stored state          → the value, verbatim
//! computed attribute    → its getter's result, propagated unchanged
//! neither               → Null under the silence policy, else an error
//! ```
//!
//! Stored state only ever contains values explicitly assigned; computed
//! attributes never leak into it.

use crate::error::ProteanError;
use crate::registry;
use crate::view::{Projection, View};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// The view every type owns implicitly: all stored state, nothing else.
pub const DEFAULTS_VIEW: &str = "defaults";

type Getter = Arc<dyn Fn(&Record) -> Result<Value, ProteanError> + Send + Sync>;
type Setter = Arc<dyn Fn(&mut Record, Value) -> Result<(), ProteanError> + Send + Sync>;

/// A computed attribute: a read rule and an optional write rule.
#[derive(Clone)]
struct Computed {
    get: Getter,
    set: Option<Setter>,
}

/// Result of resolving an attribute name against a record.
enum Lookup {
    Stored(Value),
    Computed(Result<Value, ProteanError>),
    Missing,
}

/// Per-type descriptor: name, silence policy, computed attributes, views.
///
/// The view table sits behind a lock so views can be defined after the
/// type is built ([`RecordType::define_view`]); everything else is frozen
/// at build time.
pub struct RecordType {
    name: String,
    silent: bool,
    computed: BTreeMap<String, Computed>,
    views: RwLock<BTreeMap<String, View>>,
}

impl RecordType {
    /// Start defining a record type. `name` is the type's identifier, used
    /// by [`Record`] display output and by the naming chain.
    pub fn builder(name: impl Into<String>) -> RecordTypeBuilder {
        RecordTypeBuilder {
            name: name.into(),
            silent: true,
            computed: BTreeMap::new(),
            views: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether reads of plain missing attributes return `Null` instead of
    /// failing.
    pub fn is_silent(&self) -> bool {
        self.silent
    }

    /// Store a view under `name` in this type's own table, shadowing any
    /// previous view of that name.
    pub fn define_view(&self, name: impl Into<String>, view: View) {
        self.views
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), view);
    }

    /// Look up a view by name.
    pub fn view(&self, name: &str) -> Option<View> {
        self.views
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// The names of every view this type owns, sorted.
    pub fn view_names(&self) -> Vec<String> {
        self.views
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn computed(&self, attribute: &str) -> Option<&Computed> {
        self.computed.get(attribute)
    }

    /// Start building a record of this type.
    pub fn record(self: &Arc<Self>) -> RecordBuilder {
        RecordBuilder {
            record: Record {
                ty: Arc::clone(self),
                state: Map::new(),
            },
            assignments: Vec::new(),
        }
    }
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordType")
            .field("name", &self.name)
            .field("silent", &self.silent)
            .field("computed", &self.computed.keys().collect::<Vec<_>>())
            .field("views", &self.view_names())
            .finish()
    }
}

/// Builder for [`RecordType`]. `build` is the definition hook: it seeds
/// the `"defaults"` view if the type did not configure its own and
/// registers the type, exactly once.
pub struct RecordTypeBuilder {
    name: String,
    silent: bool,
    computed: BTreeMap<String, Computed>,
    views: BTreeMap<String, View>,
}

impl RecordTypeBuilder {
    /// Set the silence policy (enabled by default).
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Define a read-only computed attribute.
    pub fn computed<F>(mut self, attribute: impl Into<String>, get: F) -> Self
    where
        F: Fn(&Record) -> Result<Value, ProteanError> + Send + Sync + 'static,
    {
        self.computed.insert(
            attribute.into(),
            Computed {
                get: Arc::new(get),
                set: None,
            },
        );
        self
    }

    /// Define a computed attribute with both a read and a write rule. The
    /// setter intercepts every policy-path write to this attribute name.
    pub fn computed_with_setter<F, G>(mut self, attribute: impl Into<String>, get: F, set: G) -> Self
    where
        F: Fn(&Record) -> Result<Value, ProteanError> + Send + Sync + 'static,
        G: Fn(&mut Record, Value) -> Result<(), ProteanError> + Send + Sync + 'static,
    {
        self.computed.insert(
            attribute.into(),
            Computed {
                get: Arc::new(get),
                set: Some(Arc::new(set)),
            },
        );
        self
    }

    /// Pre-configure a named view. Configuring one named `"defaults"`
    /// replaces the implicit all-state view.
    pub fn view(mut self, name: impl Into<String>, view: View) -> Self {
        self.views.insert(name.into(), view);
        self
    }

    /// Finish the definition: seed `"defaults"`, register, return the type.
    pub fn build(mut self) -> Arc<RecordType> {
        self.views
            .entry(DEFAULTS_VIEW.to_string())
            .or_insert_with(|| View::new().with_defaults());
        let ty = Arc::new(RecordType {
            name: self.name,
            silent: self.silent,
            computed: self.computed,
            views: RwLock::new(self.views),
        });
        registry::register(&ty);
        ty
    }
}

/// An instance of a [`RecordType`]: open, mutable stored state.
#[derive(Clone)]
pub struct Record {
    ty: Arc<RecordType>,
    state: Map<String, Value>,
}

impl Record {
    fn lookup(&self, attribute: &str) -> Lookup {
        if let Some(value) = self.state.get(attribute) {
            return Lookup::Stored(value.clone());
        }
        if let Some(computed) = self.ty.computed(attribute) {
            return Lookup::Computed((computed.get)(self));
        }
        Lookup::Missing
    }

    /// Read an attribute.
    ///
    /// Stored state wins over a same-named computed attribute. A computed
    /// attribute's failure propagates unchanged — the silence policy
    /// governs only plain missing attributes.
    pub fn get(&self, attribute: &str) -> Result<Value, ProteanError> {
        match self.lookup(attribute) {
            Lookup::Stored(value) => Ok(value),
            Lookup::Computed(result) => result,
            Lookup::Missing => {
                if self.ty.silent {
                    Ok(Value::Null)
                } else {
                    Err(ProteanError::MissingAttribute {
                        attribute: attribute.to_string(),
                    })
                }
            }
        }
    }

    /// Write an attribute through the write policy: a computed setter
    /// intercepts the write if one is exposed, otherwise the value is
    /// stored verbatim, overwriting any prior value.
    pub fn set(&mut self, attribute: &str, value: impl Into<Value>) -> Result<(), ProteanError> {
        let value = value.into();
        let setter = self
            .ty
            .computed(attribute)
            .and_then(|computed| computed.set.clone());
        if let Some(setter) = setter {
            return setter(self, value);
        }
        self.state.insert(attribute.to_string(), value);
        Ok(())
    }

    /// Merge entries verbatim into stored state, bypassing computed
    /// setters. Later entries overwrite earlier ones.
    pub fn update<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (key, value) in entries {
            self.state.insert(key, value);
        }
    }

    /// Apply entries through the write policy, one [`Record::set`] each.
    pub fn assign<I>(&mut self, entries: I) -> Result<(), ProteanError>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (key, value) in entries {
            self.set(&key, value)?;
        }
        Ok(())
    }

    /// Project this record through one of its type's named views.
    pub fn view(&self, name: &str) -> Result<Projection, ProteanError> {
        let view = self.ty.view(name).ok_or_else(|| ProteanError::NoSuchView {
            view: name.to_string(),
        })?;
        view.project(self)
    }

    /// Project through the implicit `"defaults"` view.
    pub fn default_view(&self) -> Result<Projection, ProteanError> {
        self.view(DEFAULTS_VIEW)
    }

    /// The stored state, excluding anything computed.
    pub fn state(&self) -> &Map<String, Value> {
        &self.state
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.ty
    }
}

/// Two records are equal iff they are instances of the same type and
/// their stored state is equal. A record never equals a bare mapping.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.ty, &other.ty) && self.state == other.state
    }
}

impl fmt::Display for Record {
    /// Constructor-call form: `TypeName({...stored state as JSON...})`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({})",
            self.ty.name,
            serde_json::to_string(&self.state).unwrap_or_default()
        )
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// Builder for [`Record`]: input mappings merge by direct state copy,
/// keyed values apply through the write policy at `build` time, so a
/// same-named computed setter intercepts them.
pub struct RecordBuilder {
    record: Record,
    assignments: Vec<(String, Value)>,
}

impl RecordBuilder {
    /// Merge an input mapping by direct state copy. May be chained; later
    /// entries overwrite earlier ones. Unknown keys are accepted.
    pub fn state<I>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        self.record.update(entries);
        self
    }

    /// Queue one keyed value for the write policy.
    pub fn set(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.push((attribute.into(), value.into()));
        self
    }

    /// Apply the queued keyed values and produce the record. Fails iff a
    /// computed setter fails.
    pub fn build(mut self) -> Result<Record, ProteanError> {
        let assignments = std::mem::take(&mut self.assignments);
        for (attribute, value) in assignments {
            self.record.set(&attribute, value)?;
        }
        Ok(self.record)
    }
}
