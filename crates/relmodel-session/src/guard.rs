//! Visited set for the relation loader.

use relmodel_core::{Error, Result, Value};
use std::collections::HashSet;

/// Records currently being resolved, keyed by table, identity and the
/// remaining relation depth.
///
/// Depth strictly decreases on every hop, so a record legitimately reappears
/// on the path only at a smaller depth. Seeing the same key twice means the
/// depth bookkeeping is broken and the walk would not terminate.
#[derive(Debug, Default)]
pub struct ResolutionGuard {
    path: HashSet<(&'static str, Vec<Value>, u32)>,
}

impl ResolutionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, table: &'static str, identity: &[Value], depth: u32) -> Result<()> {
        if self.path.insert((table, identity.to_vec(), depth)) {
            return Ok(());
        }
        tracing::warn!(
            table = table,
            identity = ?identity,
            depth = depth,
            "Relation cycle detected while loading"
        );
        Err(Error::Custom(format!(
            "relation cycle: {table} {identity:?} revisited at depth {depth}"
        )))
    }

    pub fn leave(&mut self, table: &'static str, identity: &[Value], depth: u32) {
        self.path.remove(&(table, identity.to_vec(), depth));
    }

    pub fn path_len(&self) -> usize {
        self.path.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_identity_at_lower_depth_is_allowed() {
        let mut guard = ResolutionGuard::new();
        let id = [Value::Integer(1)];
        guard.enter("node", &id, 3).unwrap();
        guard.enter("node", &id, 2).unwrap();
        assert_eq!(guard.path_len(), 2);
    }

    #[test]
    fn test_repeat_key_trips() {
        let mut guard = ResolutionGuard::new();
        let id = [Value::Integer(1)];
        guard.enter("node", &id, 2).unwrap();
        let err = guard.enter("node", &id, 2).unwrap_err();
        assert!(matches!(err, Error::Custom(_)));

        guard.leave("node", &id, 2);
        assert_eq!(guard.path_len(), 0);
        guard.enter("node", &id, 2).unwrap();
    }
}
