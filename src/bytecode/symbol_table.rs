use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolScope {
    Global,
}

/// A name bound to a storage slot at compile time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// Maps identifiers to slots so the VM never looks names up at run time.
///
/// Only the global scope exists. Redefining a name rebinds it to a fresh
/// slot; the old slot is simply never referenced again.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    store: HashMap<String, Symbol>,
    num_definitions: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to the next slot index and returns the new symbol.
    pub fn define(&mut self, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Global,
            index: self.num_definitions,
        };

        if self.store.insert(name.to_string(), symbol.clone()).is_some() {
            log::warn!("redefining global '{}' in slot {}", name, symbol.index);
        } else {
            log::trace!("defined global '{}' in slot {}", name, symbol.index);
        }

        self.num_definitions += 1;
        symbol
    }

    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        self.store.get(name)
    }

    /// Slots handed out so far, including ones orphaned by redefinition.
    pub fn num_definitions(&self) -> usize {
        self.num_definitions
    }
}
