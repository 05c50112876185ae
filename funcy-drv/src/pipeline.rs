//! Orchestrates the full source-to-bytecode pipeline (§6, §7): resolve,
//! analyze, optimize, serialize. Diagnostics never abort the pipeline —
//! they're printed, and compilation falls back to a trap blob that halts
//! the VM with exit code 1 the moment it runs (§7).

use funcy_par::SourceProvider;
use funcy_util::Log;

use crate::stdlib::FUNCY_STANDARD_LIBRARY;

/// Name the standard library is always resolved under (§4.12).
const STD_MODULE: &str = "//std";

/// Compile `source`, named `entry_name`, against `provider`. The standard
/// library is always parsed and resolved first, ahead of the entry module,
/// whether or not the entry source ever writes `include "//std";` itself
/// (§4.12). Diagnostics accumulated along the way are printed to stderr;
/// if any were logged the returned bytes are a trap blob rather than the
/// program's real bytecode.
pub fn compile_to_bytecode(
    entry_name: &str,
    source: &str,
    provider: &dyn SourceProvider,
) -> Vec<u8> {
    let mut log = Log::new();

    let mut root = funcy_par::resolve(STD_MODULE, FUNCY_STANDARD_LIBRARY, provider, &mut log);
    let entry_root = funcy_par::resolve(entry_name, source, provider, &mut log);
    for module in entry_root.modules {
        if !root.modules.iter().any(|m| m.name == module.name) {
            root.modules.push(module);
        }
    }

    let mut code = funcy_sem::visit(&root, &mut log);

    for record in log.records() {
        eprintln!("{record}");
    }

    if log.has_records() {
        code = trap_blob();
    } else {
        funcy_ir::optimize(&mut code);
    }

    funcy_bc::serialize(&code)
}

/// A minimal program that halts immediately with exit code 1, used in
/// place of a program whose compilation produced diagnostics.
fn trap_blob() -> funcy_ir::IRCode {
    let mut code = funcy_ir::IRCode::new();
    code.emit(funcy_ir::IROp::PushInt(1));
    code.emit(funcy_ir::IROp::Halt);
    code
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
    fn well_formed_source_compiles_to_bytecode_carrying_the_magic() {
        let provider = MapProvider(HashMap::from([("//std", "")]));
        let bytes = compile_to_bytecode("main", "func main() { return; }", &provider);
        assert!(bytes.starts_with(&funcy_bc::MAGIC[..]));
    }

    #[test]
    fn a_syntax_error_produces_a_trap_blob_rather_than_failing() {
        let provider = MapProvider(HashMap::from([("//std", "")]));
        let bytes = compile_to_bytecode("main", "func main( { return; }", &provider);
        assert!(bytes.starts_with(&funcy_bc::MAGIC[..]));

        let mut vm = funcy_vm::Vm::with_output(Vec::new());
        vm.load(&bytes).unwrap();
        assert_eq!(vm.run(), 1);
    }

    #[test]
    fn standard_library_functions_are_callable_without_an_explicit_include() {
        let provider = MapProvider(HashMap::new());
        let bytes = compile_to_bytecode("main", "func main() { printIntLn(42); return 0; }", &provider);

        let mut vm = funcy_vm::Vm::with_output(Vec::new());
        vm.load(&bytes).unwrap();
        assert_eq!(vm.run(), 0);
        assert_eq!(vm.output(), b"42\n");
    }
}
