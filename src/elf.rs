// Export of finalized routines as relocatable ELF objects with the object crate. The copy
// of the machine code goes into .text under a global function symbol named after the
// routine, so the file can be inspected with objdump or fed to other binary tools. The
// code is exported as emitted: absolute addresses it embeds (host calls, constant data)
// still refer to the running process, and no relocations are written.

//! ELF object export.

use crate::core::{ReactorError, ReactorResult};
use crate::routine::Routine;
use object::write::{Object, StandardSection, Symbol, SymbolSection};
use object::{Architecture, BinaryFormat, Endianness, SymbolFlags, SymbolKind, SymbolScope};

fn host_architecture() -> ReactorResult<(Architecture, Endianness)> {
    let arch = match std::env::consts::ARCH {
        "x86_64" => Architecture::X86_64,
        "aarch64" => Architecture::Aarch64,
        "riscv64" => Architecture::Riscv64,
        "s390x" => return Ok((Architecture::S390x, Endianness::Big)),
        other => {
            return Err(ReactorError::ObjectEmission {
                reason: format!("no ELF machine for {other}"),
            })
        }
    };
    Ok((arch, Endianness::Little))
}

/// Build an ELF object holding `code` under the symbol `name`.
pub fn write_object(name: &str, code: &[u8]) -> ReactorResult<Vec<u8>> {
    let (arch, endian) = host_architecture()?;
    let mut obj = Object::new(BinaryFormat::Elf, arch, endian);
    obj.add_file_symbol(format!("{name}.jit").into_bytes());

    let text = obj.section_id(StandardSection::Text);
    let offset = obj.append_section_data(text, code, 16);
    obj.add_symbol(Symbol {
        name: name.as_bytes().to_vec(),
        value: offset,
        size: code.len() as u64,
        kind: SymbolKind::Text,
        scope: SymbolScope::Linkage,
        weak: false,
        section: SymbolSection::Section(text),
        flags: SymbolFlags::None,
    });

    let bytes = obj.write().map_err(|e| ReactorError::ObjectEmission { reason: e.to_string() })?;
    log::debug!("Wrote ELF object for {} ({} bytes of code, {} bytes total)", name, code.len(), bytes.len());
    Ok(bytes)
}

impl Routine {
    /// The routine as a relocatable ELF object.
    pub fn to_object(&self) -> ReactorResult<Vec<u8>> {
        write_object(self.name(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object::{File, Object as _, ObjectSection, ObjectSymbol};

    #[test]
    fn test_object_has_text_and_symbol() {
        let bytes = write_object("blend", &[0xC3]).unwrap();
        let file = File::parse(&*bytes).unwrap();

        let text = file.section_by_name(".text").unwrap();
        assert_eq!(text.data().unwrap(), &[0xC3]);
        let symbol = file.symbol_by_name("blend").unwrap();
        assert_eq!(symbol.size(), 1);
        assert!(symbol.is_global());
    }
}
