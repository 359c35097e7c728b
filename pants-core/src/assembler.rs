//! Stitch generated code into the runtime blocks to form one C unit.

use crate::CodegenOptions;
use crate::codegen::GeneratedCode;
use crate::runtime;

/// Output order: header, data structures, name-set layouts, start block,
/// top-level code, function bodies, dispatch table, end block.
pub fn assemble(code: &GeneratedCode, options: &CodegenOptions) -> String {
    let mut out = String::new();
    if options.use_gc {
        out.push_str("#define PANTS_USE_GC 1\n");
    }
    out.push_str(runtime::HEADER);
    out.push('\n');
    out.push_str(runtime::DATA_STRUCTURES);
    out.push('\n');
    out.push_str(&code.namesets.write_layouts());
    out.push('\n');
    out.push_str(runtime::START_MAIN);
    out.push_str(&code.root);
    for function in &code.functions {
        out.push('\n');
        out.push_str(function);
    }
    out.push('\n');
    out.push_str(&code.dispatch);
    out.push_str(runtime::END_MAIN);
    out
}
