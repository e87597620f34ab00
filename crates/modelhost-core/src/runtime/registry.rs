// crates/modelhost-core/src/runtime/registry.rs
// ============================================================================
// Module: Unit Registry
// Description: Keyed container of command and query units.
// Purpose: Resolve unit names to execute handles with O(1) lookup.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The registry maps unit names to trait objects, one table per kind, both
//! behind a single reader-preferring lock. Names are globally unique across
//! both tables; duplicate registration fails with `ALREADY_EXISTS`. Lookups
//! return `None` for unknown names — an unknown unit is the caller's error
//! to shape, not the registry's. No unit is ever invoked while the registry
//! lock is held.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use crate::core::CoreError;
use crate::core::Unit;
use crate::core::UnitDescriptor;
use crate::core::UnitName;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Both unit tables, guarded together.
#[derive(Default)]
struct Tables {
    /// Command units keyed by name.
    commands: BTreeMap<UnitName, Arc<dyn Unit>>,
    /// Query units keyed by name.
    queries: BTreeMap<UnitName, Arc<dyn Unit>>,
}

/// Keyed container of registered units.
///
/// # Invariants
/// - A name appears in at most one table; registered descriptors are
///   immutable for their lifetime.
/// - One lock guards both tables, so uniqueness checks are atomic with
///   insertion.
#[derive(Default)]
pub struct UnitRegistry {
    /// Command and query tables under a single lock.
    tables: RwLock<Tables>,
}

impl UnitRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command unit.
    ///
    /// # Errors
    ///
    /// Returns `ALREADY_EXISTS` when the name is taken by any unit.
    pub fn register_command(&self, unit: Arc<dyn Unit>) -> Result<(), CoreError> {
        let name = unit.descriptor().name.clone();
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        ensure_unregistered(&tables, &name)?;
        tables.commands.insert(name, unit);
        Ok(())
    }

    /// Registers a query unit.
    ///
    /// # Errors
    ///
    /// Returns `ALREADY_EXISTS` when the name is taken by any unit.
    pub fn register_query(&self, unit: Arc<dyn Unit>) -> Result<(), CoreError> {
        let name = unit.descriptor().name.clone();
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        ensure_unregistered(&tables, &name)?;
        tables.queries.insert(name, unit);
        Ok(())
    }

    /// Looks up a command unit by name.
    #[must_use]
    pub fn command(&self, name: &UnitName) -> Option<Arc<dyn Unit>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .commands
            .get(name)
            .cloned()
    }

    /// Looks up a query unit by name.
    #[must_use]
    pub fn query(&self, name: &UnitName) -> Option<Arc<dyn Unit>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .queries
            .get(name)
            .cloned()
    }

    /// Looks up a unit of either kind by name (commands take precedence).
    #[must_use]
    pub fn any(&self, name: &UnitName) -> Option<Arc<dyn Unit>> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.commands.get(name).or_else(|| tables.queries.get(name)).cloned()
    }

    /// Enumerates registered descriptors, optionally restricted to a domain.
    #[must_use]
    pub fn list(&self, domain: Option<&str>) -> Vec<UnitDescriptor> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut descriptors: Vec<UnitDescriptor> = tables
            .commands
            .values()
            .chain(tables.queries.values())
            .map(|unit| unit.descriptor().clone())
            .filter(|descriptor| domain.is_none_or(|wanted| descriptor.domain == wanted))
            .collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }
}

/// Fails when the name is already registered in either table.
fn ensure_unregistered(tables: &Tables, name: &UnitName) -> Result<(), CoreError> {
    if tables.commands.contains_key(name) || tables.queries.contains_key(name) {
        return Err(CoreError::already_exists(
            name.domain(),
            format!("unit already registered: {name}"),
        ));
    }
    Ok(())
}
