use indexmap::IndexMap;

use funcy_util::Log;

/// How a name is bound in a scope (§3). `Intrinsic` extends the
/// originating design's four-way split so a standard-library intrinsic can
/// be referenced like an ordinary callable (`PUSH_LABEL`, indirect call)
/// rather than only inlined at its call site.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolAccess {
    Undefined,
    Intrinsic,
    Func,
    Local,
    LocalMut,
}

/// A name's binding within a [`Scope`]. `int_value` is an arity for
/// `Func`/`Intrinsic`, a frame-relative offset for `Local`/`LocalMut`.
/// `str_value` is the IR label for `Func`/`Intrinsic`.
#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub access: SymbolAccess,
    pub int_value: i32,
    pub str_value: String,
}

impl Symbol {
    fn undefined(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            access: SymbolAccess::Undefined,
            int_value: 0,
            str_value: String::new(),
        }
    }
}

/// Which loop-exit construct a [`ScopedLabel`] targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JumpTarget {
    Break,
    Continue,
}

/// A compile-time target for `break`/`continue` (§3): the IR label to jump
/// to and how many locals must be dropped first to keep the stack
/// balanced. `is_available = false` is a mask left behind when entering a
/// function body, so `break`/`continue` cannot leap across a call boundary
/// into an enclosing loop.
#[derive(Clone, Debug)]
pub struct ScopedLabel {
    pub label: String,
    pub local_count: u32,
    pub is_available: bool,
}

struct Scope {
    local_count: u32,
    scope_local_count: u32,
    symbols: IndexMap<String, Symbol>,
    scoped_labels: IndexMap<JumpTarget, ScopedLabel>,
}

impl Scope {
    fn new(local_count: u32) -> Self {
        Self {
            local_count,
            scope_local_count: 0,
            symbols: IndexMap::new(),
            scoped_labels: IndexMap::new(),
        }
    }
}

/// A stack of [`Scope`]s (§4.6). The bottom scope holds globals and is
/// never popped.
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(0)],
        }
    }

    fn top(&self) -> &Scope {
        self.scopes.last().expect("scope stack is never empty")
    }

    fn top_mut(&mut self) -> &mut Scope {
        self.scopes.last_mut().expect("scope stack is never empty")
    }

    /// Look up a name across the whole stack, innermost scope first.
    pub fn get(&self, name: &str) -> Symbol {
        for scope in self.scopes.iter().rev() {
            if let Some(symbol) = scope.symbols.get(name) {
                return symbol.clone();
            }
        }
        Symbol::undefined(name)
    }

    /// Whether `name` is defined directly in the current (innermost) scope.
    pub fn has(&self, name: &str) -> bool {
        self.top().symbols.contains_key(name)
    }

    /// The number of locals defined at the current scope level (how many
    /// `DROP`s its block exit must emit).
    pub fn scope_local_count(&self) -> u32 {
        self.top().scope_local_count
    }

    pub fn push(&mut self) {
        let local_count = self.top().local_count;
        self.scopes.push(Scope::new(local_count));
    }

    pub fn pop(&mut self, log: &mut Log, module: &str) {
        if self.scopes.len() <= 1 {
            log.log_bug("Popped an empty scope stack!", module);
            return;
        }
        self.scopes.pop();
    }

    pub fn define_func(&mut self, log: &mut Log, module: &str, name: &str, label: &str, param_count: i32) {
        if self.has(name) {
            log.log_bug(format!("Function name '{name}' is already defined!"), module);
            return;
        }
        self.top_mut().symbols.insert(
            name.to_string(),
            Symbol {
                name: name.to_string(),
                access: SymbolAccess::Func,
                int_value: param_count,
                str_value: label.to_string(),
            },
        );
    }

    pub fn define_intrinsic(&mut self, log: &mut Log, module: &str, name: &str, label: &str, param_count: i32) {
        if self.has(name) {
            log.log_bug(format!("Intrinsic name '{name}' is already defined!"), module);
            return;
        }
        self.top_mut().symbols.insert(
            name.to_string(),
            Symbol {
                name: name.to_string(),
                access: SymbolAccess::Intrinsic,
                int_value: param_count,
                str_value: label.to_string(),
            },
        );
    }

    fn define_local_with(&mut self, log: &mut Log, module: &str, name: &str, access: SymbolAccess) {
        if self.has(name) {
            log.log_bug(format!("Local name '{name}' is already defined!"), module);
            return;
        }
        let scope = self.top_mut();
        let offset = scope.local_count;
        scope.local_count += 1;
        scope.scope_local_count += 1;
        scope.symbols.insert(
            name.to_string(),
            Symbol {
                name: name.to_string(),
                access,
                int_value: offset as i32,
                str_value: String::new(),
            },
        );
    }

    pub fn define_local(&mut self, log: &mut Log, module: &str, name: &str) {
        self.define_local_with(log, module, name, SymbolAccess::Local);
    }

    pub fn define_local_mut(&mut self, log: &mut Log, module: &str, name: &str) {
        self.define_local_with(log, module, name, SymbolAccess::LocalMut);
    }

    /// Define a `let` binding, always allocating a fresh frame slot even
    /// when `name` already names a local at this same depth. Unlike
    /// [`Self::define_local`]/[`Self::define_local_mut`], re-declaring a
    /// name this way is not a compiler bug: it is ordinary shadowing, and
    /// the symbol table simply starts resolving `name` to the new slot.
    /// The old slot stays allocated (and gets dropped like any other local
    /// when the block exits) — it is just no longer reachable by name.
    pub fn define_shadowable_local(&mut self, name: &str, is_mutable: bool) {
        let access = if is_mutable { SymbolAccess::LocalMut } else { SymbolAccess::Local };
        let scope = self.top_mut();
        let offset = scope.local_count;
        scope.local_count += 1;
        scope.scope_local_count += 1;
        scope.symbols.insert(
            name.to_string(),
            Symbol {
                name: name.to_string(),
                access,
                int_value: offset as i32,
                str_value: String::new(),
            },
        );
    }

    /// The cumulative local count visible at the current scope (§4.6): how
    /// many locals must be unwound to reach this point from a deeper one.
    pub fn local_count(&self) -> u32 {
        self.top().local_count
    }

    /// Mask every `Local`/`LocalMut` visible from an enclosing scope with
    /// `Undefined` at the current scope level, and reset the current
    /// scope's local count to zero. Used when entering a function body so
    /// it cannot read or write an outer frame's locals.
    ///
    /// The originating implementation only masked immutable `Local`
    /// bindings, leaving an outer `LocalMut` visible across a call
    /// boundary; both are masked here (see DESIGN.md).
    pub fn undefine_locals(&mut self) {
        let mut seen = std::collections::HashSet::new();
        let current = self.scopes.len() - 1;

        for name in self.scopes[current].symbols.keys().cloned().collect::<Vec<_>>() {
            seen.insert(name.clone());
            let access = self.scopes[current].symbols[&name].access;
            if matches!(access, SymbolAccess::Local | SymbolAccess::LocalMut) {
                self.scopes[current]
                    .symbols
                    .insert(name.clone(), Symbol::undefined(name));
            }
        }

        for i in (0..current).rev() {
            let names: Vec<String> = self.scopes[i].symbols.keys().cloned().collect();
            for name in names {
                if seen.contains(&name) {
                    continue;
                }
                seen.insert(name.clone());
                let access = self.scopes[i].symbols[&name].access;
                if matches!(access, SymbolAccess::Local | SymbolAccess::LocalMut) {
                    self.scopes[current]
                        .symbols
                        .insert(name.clone(), Symbol::undefined(name));
                }
            }
        }

        self.scopes[current].local_count = 0;
    }

    pub fn define_scoped_label(&mut self, target: JumpTarget, label: &str, local_count: u32) {
        self.top_mut().scoped_labels.insert(
            target,
            ScopedLabel {
                label: label.to_string(),
                local_count,
                is_available: true,
            },
        );
    }

    /// Mask any `break`/`continue` target visible from an enclosing loop at
    /// the current scope level. Used alongside [`Self::undefine_locals`]
    /// when entering a function body.
    pub fn undefine_scoped_labels(&mut self) {
        for target in [JumpTarget::Break, JumpTarget::Continue] {
            self.top_mut().scoped_labels.insert(
                target,
                ScopedLabel {
                    label: String::new(),
                    local_count: 0,
                    is_available: false,
                },
            );
        }
    }

    /// Find the nearest enclosing `break`/`continue` target, or `None` if
    /// there is no enclosing loop (or a function boundary masked it).
    pub fn get_scoped_label(&self, target: JumpTarget) -> Option<ScopedLabel> {
        for scope in self.scopes.iter().rev() {
            if let Some(sl) = scope.scoped_labels.get(&target) {
                return if sl.is_available { Some(sl.clone()) } else { None };
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_lookup_returns_undefined_symbol() {
        let stack = ScopeStack::new();
        assert_eq!(stack.get("x").access, SymbolAccess::Undefined);
    }

    #[test]
    fn locals_get_increasing_offsets_inherited_across_pushed_scopes() {
        let mut log = Log::new();
        let mut stack = ScopeStack::new();
        stack.define_local(&mut log, "m", "a");
        stack.push();
        stack.define_local_mut(&mut log, "m", "b");

        assert_eq!(stack.get("a").int_value, 0);
        assert_eq!(stack.get("b").int_value, 1);
        assert!(!log.has_records());
    }

    #[test]
    fn duplicate_definition_in_same_scope_is_a_logged_bug() {
        let mut log = Log::new();
        let mut stack = ScopeStack::new();
        stack.define_local(&mut log, "m", "a");
        stack.define_local(&mut log, "m", "a");
        assert!(log.has_records());
    }

    #[test]
    fn popping_the_bottom_scope_is_a_logged_bug_not_a_panic() {
        let mut log = Log::new();
        let mut stack = ScopeStack::new();
        stack.pop(&mut log, "m");
        assert!(log.has_records());
    }

    #[test]
    fn undefine_locals_masks_both_local_and_local_mut_from_outer_scopes() {
        let mut log = Log::new();
        let mut stack = ScopeStack::new();
        stack.define_local(&mut log, "m", "imm");
        stack.define_local_mut(&mut log, "m", "mutable");
        stack.push();
        stack.undefine_locals();

        assert_eq!(stack.get("imm").access, SymbolAccess::Undefined);
        assert_eq!(stack.get("mutable").access, SymbolAccess::Undefined);
    }

    #[test]
    fn scoped_label_is_visible_through_nested_block_scopes() {
        let mut stack = ScopeStack::new();
        stack.define_scoped_label(JumpTarget::Break, ".loop_end", 0);
        stack.push();
        let found = stack.get_scoped_label(JumpTarget::Break).unwrap();
        assert_eq!(found.label, ".loop_end");
    }

    #[test]
    fn scoped_label_is_masked_at_a_function_boundary() {
        let mut stack = ScopeStack::new();
        stack.define_scoped_label(JumpTarget::Continue, ".loop_top", 2);
        stack.push();
        stack.undefine_scoped_labels();
        assert!(stack.get_scoped_label(JumpTarget::Continue).is_none());
    }
}
