//! Name inference for located record types.
//!
//! A [`LocatedType`] derives two identifiers from its own type name: a
//! *location name* and a *unit name* (informally: a database and a table).
//! Each sits at the end of a layered fallback chain:
//!
//! ```text
//! location_name   explicit override
//!                   → resolver, from the explicit location handle
//!                   → second-to-last name token
//!                   → undefined location
//! unit_name       explicit override
//!                   → resolver, from the explicit unit handle
//!                   → all tokens joined with "_" (location implied)
//!                   → last name token
//!                   → undefined unit
//! location        explicit handle
//!                   → resolver, from the explicit unit handle
//!                   → resolver, from location_name
//! unit            explicit handle
//!                   → resolver, through the resolved location
//!                   → resolver, from unit_name
//! ```
//!
//! Every derived value is memoized on the type — value or failure alike —
//! and never recomputed. Explicit overrides always win over derivation.
//!
//! The chain never connects to anything: handles are opaque [`Value`]s and
//! resolution beyond name parsing is delegated to a [`ResolveNames`]
//! implementation, whose every default fails with the corresponding
//! undefined condition.

use crate::error::ProteanError;
use crate::record::{Record, RecordBuilder, RecordType, RecordTypeBuilder};
use crate::view::View;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, OnceLock};

fn name_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("[A-Z]+[a-z]*").expect("name token pattern is valid"))
}

/// Split a type identifier into lower-cased word tokens at capital-letter
/// boundaries.
///
/// A run of capitals immediately followed by a capitalized word splits
/// before the last capital, so a leading acronym stays one token:
/// `FOOBarQux` → `foo, bar, qux`. An identifier with no capitals yields an
/// empty sequence.
pub fn name_tokens(identifier: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in name_token_re().find_iter(identifier) {
        let word = word.as_str();
        let capitals = word
            .chars()
            .take_while(char::is_ascii_uppercase)
            .count();
        if capitals > 1 && capitals < word.len() {
            // acronym run, then a capitalized word
            tokens.push(word[..capitals - 1].to_lowercase());
            tokens.push(word[capitals - 1..].to_lowercase());
        } else {
            tokens.push(word.to_lowercase());
        }
    }
    tokens
}

/// Extension points of the naming chain.
///
/// Every default fails with the matching undefined condition: out of the
/// box neither identifier is derivable from the other's handle or from a
/// name, only from the type's own identifier. Implementations override the
/// steps their backend can actually answer.
pub trait ResolveNames: Send + Sync {
    /// Derive the location handle from the explicit unit handle.
    fn location_from_unit(&self, _unit: &Value) -> Result<Value, ProteanError> {
        Err(ProteanError::UndefinedLocation)
    }

    /// Derive the location handle from a location name.
    fn location_from_name(&self, _name: &str) -> Result<Value, ProteanError> {
        Err(ProteanError::UndefinedLocation)
    }

    /// Derive the location name from the explicit location handle.
    fn location_name_of(&self, _location: &Value) -> Result<String, ProteanError> {
        Err(ProteanError::UndefinedLocation)
    }

    /// Derive the unit handle from a resolved location handle.
    fn unit_from_location(&self, _location: &Value) -> Result<Value, ProteanError> {
        Err(ProteanError::UndefinedUnit)
    }

    /// Derive the unit handle from a unit name.
    fn unit_from_name(&self, _name: &str) -> Result<Value, ProteanError> {
        Err(ProteanError::UndefinedUnit)
    }

    /// Derive the unit name from the explicit unit handle.
    fn unit_name_of(&self, _unit: &Value) -> Result<String, ProteanError> {
        Err(ProteanError::UndefinedUnit)
    }
}

/// The resolver every located type starts with: nothing is derivable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResolver;

impl ResolveNames for NoResolver {}

/// A record type that knows how to name its location and unit.
///
/// Wraps an ordinary [`RecordType`] (registered, with a `"defaults"` view,
/// full record behavior) and adds the memoized naming chain on top.
pub struct LocatedType {
    ty: Arc<RecordType>,
    location_handle: Option<Value>,
    unit_handle: Option<Value>,
    location_name_override: Option<String>,
    unit_name_override: Option<String>,
    resolver: Box<dyn ResolveNames>,
    names: OnceLock<Vec<String>>,
    location_name: OnceLock<Result<String, ProteanError>>,
    unit_name: OnceLock<Result<String, ProteanError>>,
    location: OnceLock<Result<Value, ProteanError>>,
    unit: OnceLock<Result<Value, ProteanError>>,
}

impl LocatedType {
    /// Start defining a located record type named `name`.
    pub fn builder(name: impl Into<String>) -> LocatedTypeBuilder {
        LocatedTypeBuilder {
            record: RecordType::builder(name),
            location_handle: None,
            unit_handle: None,
            location_name: None,
            unit_name: None,
            resolver: Box::new(NoResolver),
        }
    }

    /// The underlying record type.
    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.ty
    }

    /// Start building a record of this type.
    pub fn record(&self) -> RecordBuilder {
        self.ty.record()
    }

    /// The lower-cased word tokens of the type identifier.
    pub fn names(&self) -> &[String] {
        self.names.get_or_init(|| name_tokens(self.ty.name()))
    }

    /// The location identifier, e.g. a database name.
    pub fn location_name(&self) -> Result<String, ProteanError> {
        self.location_name
            .get_or_init(|| self.resolve_location_name())
            .clone()
    }

    /// The unit identifier, e.g. a table name.
    pub fn unit_name(&self) -> Result<String, ProteanError> {
        self.unit_name
            .get_or_init(|| self.resolve_unit_name())
            .clone()
    }

    /// The resolved location handle.
    pub fn location(&self) -> Result<Value, ProteanError> {
        self.location
            .get_or_init(|| self.resolve_location())
            .clone()
    }

    /// The resolved unit handle.
    pub fn unit(&self) -> Result<Value, ProteanError> {
        self.unit.get_or_init(|| self.resolve_unit()).clone()
    }

    fn resolve_location_name(&self) -> Result<String, ProteanError> {
        if let Some(name) = &self.location_name_override {
            return Ok(name.clone());
        }
        if let Some(handle) = &self.location_handle {
            return self.resolver.location_name_of(handle);
        }
        let names = self.names();
        if names.len() < 2 {
            return Err(ProteanError::UndefinedLocation);
        }
        Ok(names[names.len() - 2].clone())
    }

    fn resolve_unit_name(&self) -> Result<String, ProteanError> {
        if let Some(name) = &self.unit_name_override {
            return Ok(name.clone());
        }
        if let Some(handle) = &self.unit_handle {
            return self.resolver.unit_name_of(handle);
        }
        let names = self.names();
        if names.is_empty() {
            return Err(ProteanError::UndefinedUnit);
        }
        if self.location_handle.is_some() || self.location_name_override.is_some() {
            // A location is implied: qualify the unit name with every
            // token so it stays unambiguous across locations.
            return Ok(names.join("_"));
        }
        Ok(names[names.len() - 1].clone())
    }

    fn resolve_location(&self) -> Result<Value, ProteanError> {
        if let Some(handle) = &self.location_handle {
            return Ok(handle.clone());
        }
        if let Some(unit) = &self.unit_handle {
            return self.resolver.location_from_unit(unit);
        }
        let name = self.location_name()?;
        self.resolver.location_from_name(&name)
    }

    fn resolve_unit(&self) -> Result<Value, ProteanError> {
        if let Some(handle) = &self.unit_handle {
            return Ok(handle.clone());
        }
        if let Ok(location) = self.location() {
            return self.resolver.unit_from_location(&location);
        }
        let name = self.unit_name()?;
        self.resolver.unit_from_name(&name)
    }
}

impl fmt::Debug for LocatedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocatedType")
            .field("name", &self.ty.name())
            .field("location_handle", &self.location_handle)
            .field("unit_handle", &self.unit_handle)
            .field("location_name_override", &self.location_name_override)
            .field("unit_name_override", &self.unit_name_override)
            .finish()
    }
}

/// Builder for [`LocatedType`]. Record-type configuration (silence,
/// computed attributes, views) passes through to the underlying
/// [`RecordTypeBuilder`]; the rest configures the naming chain.
pub struct LocatedTypeBuilder {
    record: RecordTypeBuilder,
    location_handle: Option<Value>,
    unit_handle: Option<Value>,
    location_name: Option<String>,
    unit_name: Option<String>,
    resolver: Box<dyn ResolveNames>,
}

impl LocatedTypeBuilder {
    /// Set the explicit location handle. Wins over every derivation.
    pub fn location_handle(mut self, handle: impl Into<Value>) -> Self {
        self.location_handle = Some(handle.into());
        self
    }

    /// Set the explicit unit handle. Wins over every derivation.
    pub fn unit_handle(mut self, handle: impl Into<Value>) -> Self {
        self.unit_handle = Some(handle.into());
        self
    }

    /// Override the location name.
    pub fn location_name(mut self, name: impl Into<String>) -> Self {
        self.location_name = Some(name.into());
        self
    }

    /// Override the unit name.
    pub fn unit_name(mut self, name: impl Into<String>) -> Self {
        self.unit_name = Some(name.into());
        self
    }

    /// Install the resolver implementing the chain's extension points.
    pub fn resolver(mut self, resolver: impl ResolveNames + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    /// Set the silence policy of the underlying record type.
    pub fn silent(mut self, silent: bool) -> Self {
        self.record = self.record.silent(silent);
        self
    }

    /// Define a read-only computed attribute on the underlying record type.
    pub fn computed<F>(mut self, attribute: impl Into<String>, get: F) -> Self
    where
        F: Fn(&Record) -> Result<Value, ProteanError> + Send + Sync + 'static,
    {
        self.record = self.record.computed(attribute, get);
        self
    }

    /// Define a computed attribute with both a read and a write rule on
    /// the underlying record type.
    pub fn computed_with_setter<F, G>(
        mut self,
        attribute: impl Into<String>,
        get: F,
        set: G,
    ) -> Self
    where
        F: Fn(&Record) -> Result<Value, ProteanError> + Send + Sync + 'static,
        G: Fn(&mut Record, Value) -> Result<(), ProteanError> + Send + Sync + 'static,
    {
        self.record = self.record.computed_with_setter(attribute, get, set);
        self
    }

    /// Pre-configure a named view on the underlying record type.
    pub fn view(mut self, name: impl Into<String>, view: View) -> Self {
        self.record = self.record.view(name, view);
        self
    }

    /// Finish the definition. Builds (and registers) the underlying record
    /// type; the naming chain starts out fully unresolved.
    pub fn build(self) -> LocatedType {
        LocatedType {
            ty: self.record.build(),
            location_handle: self.location_handle,
            unit_handle: self.unit_handle,
            location_name_override: self.location_name,
            unit_name_override: self.unit_name,
            resolver: self.resolver,
            names: OnceLock::new(),
            location_name: OnceLock::new(),
            unit_name: OnceLock::new(),
            location: OnceLock::new(),
            unit: OnceLock::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn splits_capitalized_words() {
        assert_eq!(name_tokens("FooBar"), vec!["foo", "bar"]);
        assert_eq!(name_tokens("DatabaseTable"), vec!["database", "table"]);
    }

    #[test]
    fn a_single_word_is_a_single_token() {
        assert_eq!(name_tokens("Table"), vec!["table"]);
        assert_eq!(name_tokens("Foobar"), vec!["foobar"]);
    }

    #[test]
    fn no_capitals_yields_no_tokens() {
        assert!(name_tokens("lowercase").is_empty());
        assert!(name_tokens("").is_empty());
    }

    #[test]
    fn acronyms_stay_single_tokens() {
        assert_eq!(name_tokens("FOOBarQux"), vec!["foo", "bar", "qux"]);
        assert_eq!(name_tokens("BarFOOQux"), vec!["bar", "foo", "qux"]);
        assert_eq!(name_tokens("BarQuxFOO"), vec!["bar", "qux", "foo"]);
    }

    #[test]
    fn names_come_from_the_type_identifier() {
        let ty = LocatedType::builder("DatabaseTable").build();
        assert_eq!(ty.names(), ["database", "table"]);
    }

    #[test]
    fn location_name_is_the_second_to_last_token() {
        let ty = LocatedType::builder("DatabaseTable").build();
        assert_eq!(ty.location_name().expect("derivable"), "database");
    }

    #[test]
    fn location_name_override_wins() {
        let ty = LocatedType::builder("DatabaseTable")
            .location_name("somewhere")
            .build();
        assert_eq!(ty.location_name().expect("override"), "somewhere");
    }

    #[test]
    fn location_name_needs_two_tokens() {
        let ty = LocatedType::builder("Table").build();
        assert_eq!(ty.location_name(), Err(ProteanError::UndefinedLocation));
    }

    #[test]
    fn location_handle_routes_location_name_through_the_resolver() {
        // The default resolver cannot name a handle, even an explicit one.
        let ty = LocatedType::builder("DatabaseTable")
            .location_handle(json!(true))
            .build();
        assert_eq!(ty.location_name(), Err(ProteanError::UndefinedLocation));
    }

    #[test]
    fn override_wins_then_handle_routes_through_the_resolver() {
        struct Named;
        impl ResolveNames for Named {
            fn location_name_of(&self, _location: &Value) -> Result<String, ProteanError> {
                Ok("from_handle".to_string())
            }
        }
        let ty = LocatedType::builder("DatabaseTable")
            .location_handle(json!(true))
            .resolver(Named)
            .build();
        assert_eq!(ty.location_name().expect("handle derivation"), "from_handle");

        // But an explicit name override still wins over the handle.
        let ty = LocatedType::builder("DatabaseTable")
            .location_handle(json!(true))
            .location_name("explicit")
            .resolver(Named)
            .build();
        assert_eq!(ty.location_name().expect("override"), "explicit");
    }

    #[test]
    fn unit_name_is_the_last_token() {
        let ty = LocatedType::builder("DatabaseTable").build();
        assert_eq!(ty.unit_name().expect("derivable"), "table");
    }

    #[test]
    fn unit_name_qualifies_when_a_location_handle_is_set() {
        let ty = LocatedType::builder("DatabaseTable")
            .location_handle(json!(true))
            .build();
        assert_eq!(ty.unit_name().expect("derivable"), "database_table");
    }

    #[test]
    fn unit_name_qualifies_when_a_location_name_is_set() {
        let ty = LocatedType::builder("DatabaseTable")
            .location_name("foo")
            .build();
        assert_eq!(ty.unit_name().expect("derivable"), "database_table");
    }

    #[test]
    fn unit_name_override_wins() {
        let ty = LocatedType::builder("DatabaseTable")
            .unit_name("somewhere_else")
            .build();
        assert_eq!(ty.unit_name().expect("override"), "somewhere_else");
    }

    #[test]
    fn unit_handle_routes_unit_name_through_the_resolver() {
        let ty = LocatedType::builder("DatabaseTable")
            .unit_handle(json!(true))
            .build();
        assert_eq!(ty.unit_name(), Err(ProteanError::UndefinedUnit));
    }

    #[test]
    fn unit_name_fails_without_tokens() {
        let ty = LocatedType::builder("lowercase").build();
        assert_eq!(ty.unit_name(), Err(ProteanError::UndefinedUnit));
    }

    #[test]
    fn explicit_handles_resolve_to_themselves() {
        let ty = LocatedType::builder("DatabaseTable")
            .location_handle(json!("db"))
            .unit_handle(json!("tbl"))
            .build();
        assert_eq!(ty.location().expect("explicit"), json!("db"));
        assert_eq!(ty.unit().expect("explicit"), json!("tbl"));
    }

    #[test]
    fn location_is_undefined_by_default() {
        let ty = LocatedType::builder("DatabaseTable").build();
        assert_eq!(ty.location(), Err(ProteanError::UndefinedLocation));

        // With only a unit handle, the default resolver still cannot
        // walk back to the location.
        let ty = LocatedType::builder("DatabaseTable")
            .unit_handle(json!(true))
            .build();
        assert_eq!(ty.location(), Err(ProteanError::UndefinedLocation));
    }

    #[test]
    fn unit_is_undefined_by_default() {
        let ty = LocatedType::builder("Table").build();
        assert_eq!(ty.unit(), Err(ProteanError::UndefinedUnit));

        let ty = LocatedType::builder("Table")
            .location_handle(json!(true))
            .build();
        assert_eq!(ty.unit(), Err(ProteanError::UndefinedUnit));
    }

    #[test]
    fn location_resolves_through_the_unit_handle() {
        struct Backwalk;
        impl ResolveNames for Backwalk {
            fn location_from_unit(&self, unit: &Value) -> Result<Value, ProteanError> {
                Ok(unit.clone())
            }
        }
        let ty = LocatedType::builder("DatabaseTable")
            .unit_handle(json!(true))
            .resolver(Backwalk)
            .build();
        assert_eq!(ty.location().expect("derived"), json!(true));
    }

    #[test]
    fn location_resolves_from_its_name() {
        struct ByName;
        impl ResolveNames for ByName {
            fn location_from_name(&self, name: &str) -> Result<Value, ProteanError> {
                Ok(json!({ "location": name }))
            }
        }
        let ty = LocatedType::builder("DatabaseTable").resolver(ByName).build();
        assert_eq!(ty.location().expect("derived"), json!({"location": "database"}));
    }

    #[test]
    fn unit_resolves_through_the_resolved_location() {
        struct Forward;
        impl ResolveNames for Forward {
            fn unit_from_location(&self, location: &Value) -> Result<Value, ProteanError> {
                Ok(location.clone())
            }
        }
        let ty = LocatedType::builder("DatabaseTable")
            .location_handle(json!(true))
            .resolver(Forward)
            .build();
        assert_eq!(ty.unit().expect("derived"), json!(true));
    }

    #[test]
    fn unit_resolves_from_its_name_when_no_location_resolves() {
        struct ByName;
        impl ResolveNames for ByName {
            fn unit_from_name(&self, name: &str) -> Result<Value, ProteanError> {
                Ok(json!({ "unit": name }))
            }
        }
        let ty = LocatedType::builder("DatabaseTable").resolver(ByName).build();
        assert_eq!(ty.unit().expect("derived"), json!({"unit": "table"}));
    }

    #[test]
    fn failures_propagate_out_of_the_chain() {
        // A missing location name makes the location unresolvable, and
        // the unit chain falls through to its own name.
        let ty = LocatedType::builder("Table").build();
        assert_eq!(ty.location(), Err(ProteanError::UndefinedLocation));
        assert_eq!(ty.unit(), Err(ProteanError::UndefinedUnit));
    }

    #[test]
    fn resolution_is_memoized_including_failures() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        struct Counting;
        impl ResolveNames for Counting {
            fn location_from_name(&self, name: &str) -> Result<Value, ProteanError> {
                CALLS.fetch_add(1, Ordering::SeqCst);
                Ok(json!(name))
            }
        }
        let ty = LocatedType::builder("DatabaseTable")
            .resolver(Counting)
            .build();
        assert_eq!(ty.location().expect("derived"), json!("database"));
        assert_eq!(ty.location().expect("cached"), json!("database"));
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);

        let failing = LocatedType::builder("Table").build();
        assert_eq!(failing.location(), Err(ProteanError::UndefinedLocation));
        assert_eq!(failing.location(), Err(ProteanError::UndefinedLocation));
    }

    #[test]
    fn located_types_take_writable_computed_attributes() {
        let ty = LocatedType::builder("CatalogEntry")
            .computed_with_setter(
                "label",
                |record| record.get("raw_label"),
                |record, value| {
                    record.update([("raw_label".to_string(), value)]);
                    Ok(())
                },
            )
            .build();
        let record = ty
            .record()
            .set("label", "widget")
            .build()
            .expect("setter stores under raw_label");
        assert_eq!(record.state().get("raw_label"), Some(&json!("widget")));
        assert!(!record.state().contains_key("label"));
        assert_eq!(record.get("label").expect("derived"), json!("widget"));
    }

    #[test]
    fn located_types_are_full_record_types() {
        let ty = LocatedType::builder("DatabaseTable").build();
        let record = ty
            .record()
            .set("foo", "bar")
            .build()
            .expect("plain store");
        let out = record.default_view().expect("defaults view exists");
        assert_eq!(Value::Object(out), json!({"foo": "bar"}));
    }
}
