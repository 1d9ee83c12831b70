//! # Protean Kernel
//!
//! Flexible records: schemaless attribute stores whose behavior lives on
//! the type, not the data. A [`RecordType`] carries the silence policy,
//! the computed attributes, and the named views; a [`Record`] is a JSON
//! object mapped through those policies.
//!
//! ## Architecture
//!
//! ```text
//! RecordType            ← Silence policy, computed attributes, views
//!     │
//! Record                ← One JSON object, read/written through the type
//!     │
//! View                  ← Include/rename, defaults, exclude, ordering
//!     │
//! Projection            ← The plain output mapping a view produces
//!
//! LocatedType           ← RecordType + derived location/unit naming
//!     │
//! ResolveNames          ← Extension points of the naming chain
//! ```
//!
//! Every built type is also appended to the process-wide [`registry`],
//! in definition order.

pub mod error;
pub mod naming;
pub mod record;
pub mod registry;
pub mod view;

pub use error::ProteanError;
pub use naming::{LocatedType, LocatedTypeBuilder, NoResolver, ResolveNames, name_tokens};
pub use record::{DEFAULTS_VIEW, Record, RecordBuilder, RecordType, RecordTypeBuilder};
pub use view::{Include, Projection, View};
