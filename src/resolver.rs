use std::collections::{BTreeMap, BTreeSet};

use crate::model::{FuncId, RawTarget};
use crate::parser::ObjectSummary;

/// Cross-object symbol tables, built incrementally as object files are
/// ingested and consulted once all raw graphs are in.
#[derive(Debug, Default)]
pub struct SymbolTables {
    /// (object, zero-stripped address) -> defining identity
    addresses: BTreeMap<(String, String), FuncId>,
    /// Bare name -> last identity registered under it. Later
    /// registrations shadow earlier ones; that is the documented
    /// last-wins policy for ambiguous names.
    globals: BTreeMap<String, FuncId>,
    /// First non-dummy identity seen per bare name, for collision
    /// detection
    defined: BTreeMap<String, FuncId>,
    /// Bare names defined by more than one translation unit
    ambiguous: BTreeSet<String>,
}

impl SymbolTables {
    /// Register one object's definitions. Dummy entries update the
    /// global name table but never flag ambiguity; they stand in for
    /// their real function, not for a competing definition.
    pub fn register_object(&mut self, summary: &ObjectSummary) {
        for def in &summary.defs {
            let name = &def.id.name;
            if !def.dummy {
                match self.defined.get(name) {
                    Some(prev) if *prev != def.id => {
                        self.ambiguous.insert(name.clone());
                    }
                    _ => {}
                }
                self.defined.insert(name.clone(), def.id.clone());
            }
            self.globals.insert(name.clone(), def.id.clone());
        }
        for (addr, id) in &summary.addresses {
            self.addresses
                .insert((summary.object.clone(), addr.clone()), id.clone());
        }
    }

    pub fn is_ambiguous(&self, name: &str) -> bool {
        self.ambiguous.contains(name)
    }

    /// Hand the tables over to the result once resolution is done.
    pub fn into_parts(self) -> (BTreeMap<String, FuncId>, BTreeSet<String>) {
        (self.globals, self.ambiguous)
    }

    /// Resolve a single target. Precedence: exact address match in the
    /// same object, then the global name table, then a target that is
    /// already a graph key. `None` means unresolved.
    fn resolve(
        &self,
        target: &RawTarget,
        graph: &BTreeMap<FuncId, BTreeSet<RawTarget>>,
    ) -> Option<FuncId> {
        match target {
            RawTarget::Offset { addr, object } => self
                .addresses
                .get(&(object.clone(), addr.clone()))
                .cloned(),
            RawTarget::Name(name) => {
                if let Some(id) = self.globals.get(name) {
                    return Some(id.clone());
                }
                // a name of the form func@object may itself be a key
                let (func, object) = name.split_once('@')?;
                let id = FuncId::new(func, object);
                graph.contains_key(&id).then_some(id)
            }
            RawTarget::Qualified(id) => graph.contains_key(id).then(|| id.clone()),
        }
    }
}

/// Replace every callee set with its resolved counterpart. Targets that
/// match nothing are collected and reported, never silently dropped;
/// their edges simply contribute no cost.
pub fn resolve_graph(
    tables: &SymbolTables,
    raw: &BTreeMap<FuncId, BTreeSet<RawTarget>>,
    log_ambiguous: bool,
) -> (BTreeMap<FuncId, BTreeSet<FuncId>>, BTreeSet<RawTarget>) {
    let mut resolved = BTreeMap::new();
    let mut unresolved = BTreeSet::new();

    for (source, targets) in raw {
        let mut callees = BTreeSet::new();
        for target in targets {
            match tables.resolve(target, raw) {
                Some(id) => {
                    if let RawTarget::Name(name) = target {
                        if log_ambiguous && tables.is_ambiguous(name) {
                            log::warn!("Ambiguous resolution: {}", name);
                        }
                    }
                    callees.insert(id);
                }
                None => {
                    unresolved.insert(target.clone());
                }
            }
        }
        resolved.insert(source.clone(), callees);
    }

    (resolved, unresolved)
}
