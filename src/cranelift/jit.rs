// This module selects the host ISA and turns a finished Cranelift function into executable
// memory. Settings come from the session Config: the optimization level maps onto
// Cranelift's opt_level and the verifier switch onto enable_verifier. Routines are not
// position independent and call host helpers through absolute addresses, so is_pic and
// colocated libcalls are off. Each routine gets its own JITModule, which the returned
// CompiledCode keeps alive and frees when the routine is dropped. The machine code bytes
// and the source-location ranges Cranelift reports are copied out for disassembly, object
// export and the debug line table.

//! Host ISA selection and JIT emission.

use crate::core::{CodeRange, CompiledCode, Config, ReactorError, ReactorResult};
use cranelift_codegen::ir::Function;
use cranelift_codegen::isa::OwnedTargetIsa;
use cranelift_codegen::settings::{self, Configurable};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{default_libcall_names, Linkage, Module};

/// Native ISA configured from `config`.
pub fn host_isa(config: &Config) -> ReactorResult<OwnedTargetIsa> {
    let mut flags = settings::builder();
    set_flag(&mut flags, "opt_level", config.optimization.as_str())?;
    set_flag(&mut flags, "enable_verifier", if config.enable_verifier { "true" } else { "false" })?;
    set_flag(&mut flags, "is_pic", "false")?;
    set_flag(&mut flags, "use_colocated_libcalls", "false")?;

    let builder = cranelift_native::builder().map_err(|reason| ReactorError::UnsupportedTarget {
        reason: reason.to_string(),
    })?;
    builder
        .finish(settings::Flags::new(flags))
        .map_err(|e| ReactorError::UnsupportedTarget { reason: e.to_string() })
}

fn set_flag(flags: &mut settings::Builder, name: &'static str, value: &str) -> ReactorResult<()> {
    flags.set(name, value).map_err(|e| ReactorError::InvalidSetting {
        name,
        reason: e.to_string(),
    })
}

/// Owns the executable mapping of one routine.
struct JitMemory(Option<JITModule>);

impl Drop for JitMemory {
    fn drop(&mut self) {
        if let Some(module) = self.0.take() {
            // SAFETY: the routine owning this memory is being dropped, so no
            // function pointer into it can be called any more.
            unsafe { module.free_memory() };
        }
    }
}

/// Compile `func` and map it executable.
pub fn compile(isa: &OwnedTargetIsa, name: &str, func: Function) -> ReactorResult<CompiledCode> {
    let codegen_error = |reason: String| ReactorError::CodeGeneration {
        routine: name.to_string(),
        reason,
    };

    let mut module = JITModule::new(JITBuilder::with_isa(isa.clone(), default_libcall_names()));
    let id = module
        .declare_function(name, Linkage::Export, &func.signature)
        .map_err(|e| codegen_error(e.to_string()))?;

    let mut ctx = module.make_context();
    ctx.func = func;
    module
        .define_function(id, &mut ctx)
        .map_err(|e| codegen_error(format!("{e:?}")))?;

    let (bytes, line_table) = match ctx.compiled_code() {
        Some(code) => {
            let line_table = code
                .buffer
                .get_srclocs_sorted()
                .iter()
                .filter(|range| !range.loc.is_default())
                .map(|range| CodeRange {
                    start: range.start,
                    end: range.end,
                    location: range.loc.bits(),
                })
                .collect();
            (code.code_buffer().to_vec(), line_table)
        }
        None => (Vec::new(), Vec::new()),
    };

    module.finalize_definitions().map_err(|e| ReactorError::Allocation {
        routine: name.to_string(),
        reason: e.to_string(),
    })?;
    let entry = module.get_finalized_function(id);
    log::debug!("JIT mapped {} ({} bytes) at {:p}", name, bytes.len(), entry);

    Ok(CompiledCode {
        entry,
        bytes,
        line_table,
        owner: Box::new(JitMemory(Some(module))),
    })
}
