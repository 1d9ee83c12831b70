//! Process-wide record-type registry.
//!
//! Every built [`RecordType`] is appended here, in definition order. The
//! registry exists for introspection and tests; no other component reads
//! it. The expected lifecycle is single-threaded type definition at load
//! time, so the lock only matters for the odd concurrent reader.

use crate::record::RecordType;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

static REGISTRY: OnceLock<Mutex<Vec<Arc<RecordType>>>> = OnceLock::new();

fn registry() -> &'static Mutex<Vec<Arc<RecordType>>> {
    REGISTRY.get_or_init(|| Mutex::new(Vec::new()))
}

/// Append a newly defined type. Called once per `build`, never per record.
pub(crate) fn register(ty: &Arc<RecordType>) {
    registry()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(Arc::clone(ty));
}

/// A snapshot of every registered type, in definition order.
pub fn types() -> Vec<Arc<RecordType>> {
    registry()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Forget every registered type. Test lifecycle only.
pub fn clear() {
    registry()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    // The registry is shared with every concurrently running test, so
    // these assertions only reason about the types defined here, never
    // about the registry's full contents. The guard keeps `clear` from
    // racing the ordering assertions.

    static GUARD: Mutex<()> = Mutex::new(());

    fn position(ty: &Arc<RecordType>) -> Option<usize> {
        types().iter().position(|entry| Arc::ptr_eq(entry, ty))
    }

    #[test]
    fn built_types_are_registered_in_definition_order() {
        let _guard = GUARD.lock().unwrap_or_else(PoisonError::into_inner);
        let first = RecordType::builder("RegistryFirst").build();
        let second = RecordType::builder("RegistrySecond").build();
        let first_at = position(&first).expect("first type registered");
        let second_at = position(&second).expect("second type registered");
        assert!(first_at < second_at);
    }

    #[test]
    fn clear_forgets_registered_types() {
        let _guard = GUARD.lock().unwrap_or_else(PoisonError::into_inner);
        let ty = RecordType::builder("RegistryCleared").build();
        assert!(position(&ty).is_some());
        clear();
        assert!(position(&ty).is_none());
    }
}
