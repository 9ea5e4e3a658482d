use std::collections::{BTreeSet, HashMap};
use std::fmt::Write;

use crate::bytecode::{
    Bytecode,
    op::{self, Opcode},
};
use crate::lang::object::Object;

/// Print disassembly of a bytecode program
pub fn print_bc(bc: &Bytecode) {
    print!("{}", disassemble(bc));
}

/// Render a bytecode program: instruction listing with jump targets marked,
/// followed by the constant pool.
pub fn disassemble(bc: &Bytecode) -> String {
    let mut out = String::new();
    let targets = collect_jump_targets(bc.instructions.as_bytes());

    let _ = writeln!(out, "════════════════════════════════════════");
    let _ = writeln!(out, " main");
    let _ = writeln!(out, " {} bytes", bc.instructions.len());
    let _ = writeln!(out, "════════════════════════════════════════");

    let bytes = bc.instructions.as_bytes();
    let mut ip = 0;
    while ip < bytes.len() {
        let marker = if targets.contains(&ip) { "► " } else { "  " };

        let def = match op::lookup(bytes[ip]) {
            Ok(def) => def,
            Err(e) => {
                let _ = writeln!(out, "{:04} {}!! {}", ip, marker, e);
                break;
            }
        };
        let (operands, read) = match op::read_operands(def, &bytes[ip + 1..]) {
            Ok(decoded) => decoded,
            Err(e) => {
                let _ = writeln!(out, "{:04} {}!! {}", ip, marker, e);
                break;
            }
        };

        let _ = write!(out, "{:04} {}{:<16}", ip, marker, def.name);
        for operand in &operands {
            let _ = write!(out, " {}", operand);
        }
        if let (Ok(Opcode::Constant), Some(&index)) = (Opcode::try_from(bytes[ip]), operands.first())
        {
            if let Some(constant) = bc.constants.get(index) {
                let _ = write!(out, "    ; {}", format_constant(constant));
            }
        }
        let _ = writeln!(out);

        ip += 1 + read;
    }

    if !bc.constants.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, " constants");
        for (i, constant) in bc.constants.iter().enumerate() {
            let _ = writeln!(out, "  [{}] {}", i, format_constant(constant));
        }
    }

    out
}

/// Absolute targets of every `OpJump` / `OpJumpNotTruthy` in the stream.
fn collect_jump_targets(bytes: &[u8]) -> BTreeSet<usize> {
    let mut targets = BTreeSet::new();
    let mut ip = 0;

    while let Some(&byte) = bytes.get(ip) {
        let Ok(opcode) = Opcode::try_from(byte) else {
            break;
        };
        if matches!(opcode, Opcode::Jump | Opcode::JumpNotTruthy) {
            if let Some(target) = op::read_u16(&bytes[ip + 1..]) {
                targets.insert(target as usize);
            }
        }
        ip += opcode.definition().instruction_len();
    }

    targets
}

fn format_constant(constant: &Object) -> String {
    match constant {
        Object::String(s) => format!("{:?}", s),
        other => other.to_string(),
    }
}

/// Print opcode frequencies, most frequent first.
pub fn print_bc_stats(bc: &Bytecode) {
    let bytes = bc.instructions.as_bytes();
    let mut counts: HashMap<&'static str, usize> = HashMap::new();
    let mut total = 0;
    let mut ip = 0;

    while let Some(&byte) = bytes.get(ip) {
        let Ok(def) = op::lookup(byte) else {
            break;
        };
        *counts.entry(def.name).or_insert(0) += 1;
        total += 1;
        ip += def.instruction_len();
    }

    let mut sorted: Vec<_> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    println!("=== BYTECODE STATS ===");
    println!("instructions: {}", total);
    println!("bytes:        {}", bytes.len());
    println!("constants:    {}", bc.constants.len());
    for (name, count) in sorted {
        println!("  {:<16} {}", name, count);
    }
}
