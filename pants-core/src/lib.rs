pub mod assembler;
pub mod ast;
pub mod codegen;
pub mod cps;
pub mod diags;
pub mod error;
pub mod ir;
pub mod lexer;
pub mod lowering;
pub mod name;
pub mod parser;
pub mod runtime;

#[cfg(test)]
mod codegen_tests;
#[cfg(test)]
mod cps_tests;
#[cfg(test)]
mod integration_tests;

use std::collections::BTreeSet;
use std::marker::PhantomData;

use log::debug;

use cps::CallableId;
use error::Result;
use name::Name;

// =============================================================================
// Generic ID allocation
// =============================================================================

/// Generic counter for generating unique IDs.
///
/// The ID type must implement `From<u32>` to convert the raw counter value.
#[derive(Debug, Clone)]
pub struct IdSource<Id> {
    next_id: u32,
    _phantom: PhantomData<Id>,
}

impl<Id: From<u32>> IdSource<Id> {
    pub fn new() -> Self {
        IdSource {
            next_id: 0,
            _phantom: PhantomData,
        }
    }

    pub fn next(&mut self) -> Id {
        let id = Id::from(self.next_id);
        self.next_id += 1;
        id
    }

    /// How many ids have been handed out.
    pub fn issued(&self) -> u32 {
        self.next_id
    }
}

impl<Id: From<u32>> Default for IdSource<Id> {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters shared by lowering and CPS conversion of one compilation.
#[derive(Debug, Default)]
pub struct CompileContext {
    gensyms: IdSource<u32>,
    callables: IdSource<CallableId>,
}

impl CompileContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh compiler temporary, `ir_<n>`.
    pub fn gensym(&mut self) -> Name {
        Name::compiler(format!("{}{}", name::GENSYM_PREFIX, self.gensyms.next()))
    }

    pub fn next_callable_id(&mut self) -> CallableId {
        self.callables.next()
    }

    pub fn callable_count(&self) -> u32 {
        self.callables.issued()
    }
}

/// Knobs for the final C output.
#[derive(Debug, Clone, Default)]
pub struct CodegenOptions {
    /// Allocate through the Boehm collector instead of plain `calloc`.
    pub use_gc: bool,
}

// =============================================================================
// Typestate Compiler Pipeline
// =============================================================================
//
// Each struct is one stage; methods consume `self` and return the next one:
//
//   Compiler::parse(source)        -> Parsed
//     -> .lower()                  -> Lowered
//       -> .to_cps()               -> Converted
//         -> .generate(&options)   -> Generated

/// Entry point for the compiler. Use `Compiler::parse()` to start the pipeline.
pub struct Compiler;

impl Compiler {
    pub fn parse(source: &str) -> Result<Parsed> {
        let tokens = lexer::tokenize(source).map_err(|e| err_parse!("{}", e))?;
        let mut parser = parser::Parser::new(tokens);
        let ast = parser.parse()?;
        debug!("parsed {} top-level expressions", ast.expressions.len());
        Ok(Parsed { ast })
    }
}

/// Source has been parsed into an AST
pub struct Parsed {
    pub ast: ast::Program,
}

impl Parsed {
    pub fn lower(self) -> Result<Lowered> {
        let mut ctx = CompileContext::new();
        let ir = lowering::lower_program(&self.ast, &mut ctx)?;
        Ok(Lowered { ir, ctx })
    }
}

/// Program has been lowered to IR
pub struct Lowered {
    pub ir: ir::Program,
    ctx: CompileContext,
}

impl Lowered {
    /// Convert to CPS, reject unbound names and mark the names that need
    /// cells.
    pub fn to_cps(mut self) -> Result<Converted> {
        let mut cps = cps::convert_program(&self.ir, &mut self.ctx)?;
        let provided = runtime::provided_names();
        check_unbound(&cps, &provided)?;
        let mutated = cps::annotate_mutations(&mut cps, &provided);
        let provided = provided
            .into_iter()
            .map(|mut global| {
                global.mutated = mutated.contains(&global);
                global
            })
            .collect();
        Ok(Converted { cps, mutated, provided })
    }
}

/// Every name the program reads at top level must be one the runtime
/// binds. A user-written name is reported in preference to a temporary.
fn check_unbound(program: &cps::Program, provided: &BTreeSet<Name>) -> Result<()> {
    let free = program.root.free_names();
    let unbound: Vec<&Name> = free.iter().filter(|name| !provided.contains(*name)).collect();
    let reported = unbound.iter().find(|name| name.is_user_provided()).or(unbound.first());
    match reported {
        Some(name) => Err(err_unbound!("unbound variable: {}", name.name)),
        None => Ok(()),
    }
}

/// Program is in CPS form with boxed names marked
pub struct Converted {
    pub cps: cps::Program,
    pub mutated: BTreeSet<Name>,
    provided: BTreeSet<Name>,
}

impl Converted {
    pub fn generate(self, options: &CodegenOptions) -> Result<Generated> {
        let code = codegen::generate(&self.cps, &self.provided)?;
        let c = assembler::assemble(&code, options);
        Ok(Generated { c })
    }
}

/// Final C source
pub struct Generated {
    pub c: String,
}

/// Run the whole pipeline on `source`.
pub fn compile(source: &str, options: &CodegenOptions) -> Result<String> {
    let generated = Compiler::parse(source)?.lower()?.to_cps()?.generate(options)?;
    Ok(generated.c)
}
