//! Named, reusable projections from a record to a plain output mapping.
//!
//! A [`View`] is pure configuration: which attributes to include (with
//! optional renaming), whether to seed the output with the record's stored
//! state, which output keys to drop, and whether the output must preserve
//! insertion order. Projection itself resolves every included attribute
//! through the record's normal read policy, so computed attributes and the
//! silence policy apply exactly as they do for direct reads.

use crate::error::ProteanError;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// The output mapping produced by a projection.
///
/// Keeps insertion order (the crate builds `serde_json` with
/// `preserve_order`); equality is content-based, not order-based.
pub type Projection = Map<String, Value>;

/// One include entry: a source attribute and the output key it lands under.
///
/// A bare include uses the attribute name as the key; a renaming include
/// carries a distinct key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Include {
    pub attribute: String,
    pub key: String,
}

/// Projection configuration.
///
/// Built through the consuming chained-builder style:
///
/// ```
/// use protean_kernel::View;
///
/// let view = View::new()
///     .with_defaults()
///     .include_as("foo", "FOO")
///     .exclude("password")
///     .ordered();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    defaults: bool,
    include: Vec<Include>,
    exclude: BTreeSet<String>,
    ordered: bool,
}

impl View {
    /// An empty view: no defaults, no includes, no excludes, unordered.
    ///
    /// Projecting with it yields an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the output with all of the record's stored state (after the
    /// include entries; include entries are never overwritten).
    pub fn with_defaults(mut self) -> Self {
        self.defaults = true;
        self
    }

    /// Include one attribute under its own name.
    pub fn include(mut self, attribute: impl Into<String>) -> Self {
        let attribute = attribute.into();
        self.include.push(Include {
            key: attribute.clone(),
            attribute,
        });
        self
    }

    /// Include one attribute under a renamed output key.
    pub fn include_as(mut self, attribute: impl Into<String>, key: impl Into<String>) -> Self {
        self.include.push(Include {
            attribute: attribute.into(),
            key: key.into(),
        });
        self
    }

    /// Drop an output key unconditionally, even if an include or the
    /// defaults pass produced it.
    pub fn exclude(mut self, key: impl Into<String>) -> Self {
        self.exclude.insert(key.into());
        self
    }

    /// Preserve insertion order in the output (includes first, in
    /// configuration order, then stored state). Without this the output
    /// order is unspecified and canonicalized to sorted keys.
    pub fn ordered(mut self) -> Self {
        self.ordered = true;
        self
    }

    /// Project a record into an output mapping.
    ///
    /// Include entries resolve through [`Record::get`], so a failing
    /// computed attribute fails the whole projection, while a plain missing
    /// attribute follows the type's silence policy.
    pub fn project(&self, record: &Record) -> Result<Projection, ProteanError> {
        let mut out = Projection::new();
        for entry in &self.include {
            out.insert(entry.key.clone(), record.get(&entry.attribute)?);
        }
        if self.defaults {
            for (key, value) in record.state() {
                if !out.contains_key(key) {
                    out.insert(key.clone(), value.clone());
                }
            }
        }
        for key in &self.exclude {
            out.remove(key);
        }
        if self.ordered {
            Ok(out)
        } else {
            let canonical: BTreeMap<String, Value> = out.into_iter().collect();
            Ok(canonical.into_iter().collect())
        }
    }
}
