// Disassembly of finalized routines with iced-x86. The routine keeps a copy of its machine
// code, which is decoded starting at the real entry address so that rip-relative operands
// and branch targets print as absolute addresses. When the routine carries a line table,
// the listing marks where each source line's code begins. Only x86-64 hosts can be
// disassembled.

//! Routine disassembly.

use crate::core::{ReactorError, ReactorResult};
use crate::routine::Routine;
use iced_x86::{Decoder, DecoderOptions, Formatter, Instruction, NasmFormatter};
use std::fmt;

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisassembledInstruction {
    /// Offset from the routine entry.
    pub offset: u32,
    pub bytes: Vec<u8>,
    pub text: String,
}

impl fmt::Display for DisassembledInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex: Vec<String> = self.bytes.iter().map(|b| format!("{b:02X}")).collect();
        write!(f, "{:06X}  {:<30} {}", self.offset, hex.join(""), self.text)
    }
}

/// Decode x86-64 `code` located at `ip`.
pub fn disassemble_x86_64(code: &[u8], ip: u64) -> Vec<DisassembledInstruction> {
    let mut decoder = Decoder::with_ip(64, code, ip, DecoderOptions::NONE);
    let mut formatter = NasmFormatter::new();
    formatter.options_mut().set_first_operand_char_index(8);

    let mut instructions = Vec::new();
    let mut instruction = Instruction::default();
    while decoder.can_decode() {
        decoder.decode_out(&mut instruction);
        let start = (instruction.ip() - ip) as usize;
        let mut text = String::new();
        formatter.format(&instruction, &mut text);
        instructions.push(DisassembledInstruction {
            offset: start as u32,
            bytes: code[start..start + instruction.len()].to_vec(),
            text,
        });
    }
    instructions
}

impl Routine {
    /// Decode the routine's machine code.
    pub fn disassemble(&self) -> ReactorResult<Vec<DisassembledInstruction>> {
        if !cfg!(target_arch = "x86_64") {
            return Err(ReactorError::UnsupportedDisassembly {
                arch: std::env::consts::ARCH,
            });
        }
        Ok(disassemble_x86_64(self.code(), self.entry() as u64))
    }

    /// Disassembly as text, one instruction per line.
    pub fn listing(&self) -> ReactorResult<String> {
        let instructions = self.disassemble()?;
        let mut out = format!("{}:\n", self.name());
        for instruction in &instructions {
            #[cfg(feature = "debug-info")]
            if let Some(entry) = self
                .debug_info()
                .and_then(|info| info.line_table().iter().find(|entry| entry.start == instruction.offset))
            {
                out.push_str(&format!("        ; {}:{}\n", entry.file, entry.line));
            }
            out.push_str(&format!("{instruction}\n"));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_sequence() {
        // mov eax, edi; add eax, esi; ret
        let code = [0x89, 0xF8, 0x01, 0xF0, 0xC3];
        let instructions = disassemble_x86_64(&code, 0x1000);

        assert_eq!(instructions.len(), 3);
        assert!(instructions[0].text.starts_with("mov"));
        assert!(instructions[0].text.ends_with("eax,edi"));
        assert_eq!(instructions[1].offset, 2);
        assert_eq!(instructions[2].bytes, vec![0xC3]);
        assert_eq!(instructions[2].text, "ret");
    }
}
