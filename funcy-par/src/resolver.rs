//! Module resolution: turns a single entry module into a topologically
//! ordered [`Root`] by following `include` directives.
//!
//! This mirrors the include-graph walk of a path-based module system, but
//! funcy-par never touches a filesystem itself — callers (the driver)
//! supply a [`SourceProvider`] that maps a resolved module name to its
//! source text. A name beginning with `//` denotes the standard library;
//! such modules are parsed with `$(...)` intrinsic syntax enabled, since
//! that syntax has no meaning outside the standard library.

use indexmap::IndexMap;

use funcy_util::Log;

use crate::ast::{Incl, Module, Root};
use crate::parser::Parser;

/// Characters forbidden in a path component, matching what most
/// filesystems reject or treat specially.
const BAD_PATH_CHARS: &str = "\"*/:<>?\\|";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ModuleState {
    Unparsed,
    Parsed,
    Visited,
    Resolved,
}

struct ResolverModule {
    state: ModuleState,
    module: Module,
}

impl Default for ResolverModule {
    fn default() -> Self {
        Self {
            state: ModuleState::Unparsed,
            module: Module::default(),
        }
    }
}

/// Supplies module source text by resolved name. Implementors decide how a
/// name maps to a file (or an in-memory table, for the standard library).
pub trait SourceProvider {
    /// Load a module's source text, or `None` if it cannot be found.
    fn load(&self, name: &str) -> Option<String>;
}

/// Normalize an include `path` relative to the including module `name`
/// into a canonical module name, or an empty string if the path is
/// illegal. Leading `//` denotes an absolute standard-library path;
/// leading `/` denotes a path rooted at the program's entry directory;
/// anything else is relative to `name`'s directory.
pub fn get_module_name(name: &str, path: &str) -> String {
    let mut is_abs = false;
    let mut is_std = name.starts_with("//");

    let mut path = path.trim().replace('\\', "/");

    if let Some(rest) = path.strip_prefix("//") {
        is_abs = true;
        is_std = true;
        path = rest.trim_start().to_string();
    } else if let Some(rest) = path.strip_prefix('/') {
        is_abs = true;
        path = rest.trim_start().to_string();
    }

    if path.contains("//") || path.starts_with('/') || path.ends_with('/') {
        return String::new();
    }

    let mut parts: Vec<String> = if is_abs {
        Vec::new()
    } else {
        let mut segs: Vec<&str> = name.split('/').collect();
        segs.pop();
        segs.into_iter().map(String::from).collect()
    };

    for raw in path.split('/') {
        let part = raw.trim();

        if part.is_empty() {
            return String::new();
        } else if part == "." {
            continue;
        } else if part == ".." {
            if parts.is_empty() {
                return String::new();
            }
            parts.pop();
        } else if part.ends_with('.') {
            return String::new();
        } else {
            for c in part.chars() {
                if (c as u32) < 32 || (c as u32) == 127 || BAD_PATH_CHARS.contains(c) {
                    return String::new();
                }
            }
            parts.push(part.to_string());
        }
    }

    format!("{}{}", if is_std { "//" } else { "" }, parts.join("/"))
}

struct Resolver<'p, 'l> {
    provider: &'p dyn SourceProvider,
    log: &'l mut Log,
    modules: IndexMap<String, ResolverModule>,
}

impl<'p, 'l> Resolver<'p, 'l> {
    fn state(&self, name: &str) -> ModuleState {
        self.modules
            .get(name)
            .map(|m| m.state)
            .unwrap_or(ModuleState::Unparsed)
    }

    fn set_state(&mut self, name: &str, state: ModuleState) {
        if let Some(m) = self.modules.get_mut(name) {
            m.state = state;
        }
    }

    fn declare(&mut self, name: &str) {
        if !self.modules.contains_key(name) {
            self.modules
                .insert(name.to_string(), ResolverModule::default());
        }

        if self.modules[name].state != ModuleState::Unparsed {
            return;
        }

        match self.provider.load(name) {
            Some(source) => {
                let allow_intrinsic = name.starts_with("//");
                let mut parser = Parser::new(name, &source, allow_intrinsic, &mut *self.log);
                let parsed = parser.parse_module(name);
                self.modules.get_mut(name).unwrap().module = parsed;
            }
            None => {
                self.log.log(format!("Failed to load module '{name}'!"), name);
            }
        }

        self.modules.get_mut(name).unwrap().state = ModuleState::Parsed;
    }

    fn children(&mut self, name: &str) -> Vec<String> {
        let incls: Vec<Incl> = self.modules[name].module.incls.clone();
        let mut children = Vec::new();

        for incl in &incls {
            let child = get_module_name(name, &incl.path);

            if child.is_empty() {
                self.log
                    .log_at(format!("Illegal include path '{}'!", incl.path), incl.span.clone());
            } else if child == name {
                self.log.log_at("Module includes itself!", incl.span.clone());
            } else if children.contains(&child) {
                self.log.log_at(
                    format!("Module '{child}' is already included!"),
                    incl.span.clone(),
                );
            } else if self.state(&child) == ModuleState::Visited {
                self.log.log_at(
                    format!("Including module '{child}' creates a circular dependency!"),
                    incl.span.clone(),
                );
            } else {
                children.push(child);
            }
        }

        children
    }

    fn visit(&mut self, name: &str, root: &mut Root) {
        self.declare(name);

        if self.state(name) != ModuleState::Parsed {
            return;
        }

        self.set_state(name, ModuleState::Visited);

        for child in self.children(name) {
            self.visit(&child, root);
        }

        root.modules.push(self.modules[name].module.clone());
        self.set_state(name, ModuleState::Resolved);
    }
}

/// Resolve a whole program starting from its already-loaded entry module.
///
/// `entry_name` and `entry_source` are the main module; everything it
/// (transitively) includes is loaded through `provider`. The returned
/// [`Root`] lists modules in the order they must be initialized: every
/// module precedes anything that includes it.
pub fn resolve(
    entry_name: &str,
    entry_source: &str,
    provider: &dyn SourceProvider,
    log: &mut Log,
) -> Root {
    let mut resolver = Resolver {
        provider,
        log,
        modules: IndexMap::new(),
    };

    resolver.modules.insert(
        entry_name.to_string(),
        ResolverModule {
            state: ModuleState::Unparsed,
            module: Module::default(),
        },
    );

    let allow_intrinsic = entry_name.starts_with("//");
    let mut parser = Parser::new(entry_name, entry_source, allow_intrinsic, &mut *resolver.log);
    let parsed = parser.parse_module(entry_name);
    resolver.modules.get_mut(entry_name).unwrap().module = parsed;
    resolver.modules.get_mut(entry_name).unwrap().state = ModuleState::Parsed;

    let mut root = Root::default();
    resolver.visit(entry_name, &mut root);
    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapProvider(HashMap<&'static str, &'static str>);

    impl SourceProvider for MapProvider {
        fn load(&self, name: &str) -> Option<String> {
            self.0.get(name).map(|s| s.to_string())
        }
    }

    #[test]
    fn relative_include_resolves_against_including_module() {
        assert_eq!(get_module_name("a/b", "c"), "a/c");
        assert_eq!(get_module_name("a/b", "./c"), "a/c");
        assert_eq!(get_module_name("a/b", "../c"), "c");
    }

    #[test]
    fn double_slash_path_is_absolute_std() {
        assert_eq!(get_module_name("a/b", "//std/io"), "//std/io");
    }

    #[test]
    fn ascending_past_root_is_illegal() {
        assert_eq!(get_module_name("a", "../x"), "");
    }

    #[test]
    fn illegal_characters_are_rejected() {
        assert_eq!(get_module_name("a", "b:c"), "");
        assert_eq!(get_module_name("a", "b."), "");
    }

    #[test]
    fn resolves_a_simple_include_chain_in_order() {
        let mut log = Log::new();
        let provider = MapProvider(HashMap::from([("util", "func helper() { return; }")]));

        let root = resolve(
            "main",
            "include \"util\";\nfunc main() { return; }",
            &provider,
            &mut log,
        );

        assert_eq!(root.modules.len(), 2);
        assert_eq!(root.modules[0].name, "util");
        assert_eq!(root.modules[1].name, "main");
        assert!(!log.has_records());
    }

    #[test]
    fn circular_include_is_reported_without_infinite_recursion() {
        let mut log = Log::new();
        let provider = MapProvider(HashMap::from([("a", "include \"b\";"), ("b", "include \"a\";")]));

        let root = resolve("a", "include \"b\";", &provider, &mut log);

        assert_eq!(root.modules.len(), 2);
        assert!(log.has_records());
        assert!(log
            .records()
            .iter()
            .any(|r| r.message.contains("circular dependency")));
    }

    #[test]
    fn missing_module_is_logged() {
        let mut log = Log::new();
        let provider = MapProvider(HashMap::new());

        let root = resolve("main", "include \"missing\";", &provider, &mut log);

        assert_eq!(root.modules.len(), 1);
        assert!(log.records().iter().any(|r| r.message.contains("Failed to load")));
    }
}
