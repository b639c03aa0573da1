//! Debug utilities for the kernel IR
//!
//! Renders a builder's declares and instruction list in a vISA-like
//! textual form.

use super::builder::IrBuilder;
use super::ir::{
    Declare, InstKind, InstrId, Operand, OperandId, PredControl, PredState, RegAccess, RegBase,
    RegFileKind, SrcModifier, SubRegAlign,
};
use std::fmt::Write;

/// Print the kernel in human-readable format
pub fn print_kernel(builder: &IrBuilder) {
    println!("═══════════════════════════════════════════════════════════");
    println!("                    KERNEL DUMP");
    println!("═══════════════════════════════════════════════════════════");
    print!("{}", dump_kernel(builder));
    println!("═══════════════════════════════════════════════════════════\n");
}

/// Full textual dump: declares, inputs, then the instruction list
pub fn dump_kernel(builder: &IrBuilder) -> String {
    let mut out = String::new();
    let _ = writeln!(out, ".kernel \"{}\"", builder.kernel_name());
    for decl in builder.declares().iter() {
        let _ = writeln!(out, "{}", format_declare(decl));
    }
    for input in builder.kernel_inputs() {
        let _ = writeln!(
            out,
            ".input {} offset={} size={}",
            builder.declare(input.decl).name(),
            input.offset,
            builder.declare(input.decl).byte_size()
        );
    }
    let _ = writeln!(out, ".code");
    for (i, (id, _)) in builder.instructions().enumerate() {
        let _ = writeln!(out, "{:04}: {}", i, format_instruction(builder, id));
    }
    out
}

fn format_declare(decl: &Declare) -> String {
    let file = match decl.reg_file() {
        RegFileKind::Grf => "G",
        RegFileKind::Address => "A",
        RegFileKind::Flag => "P",
        RegFileKind::Input => "I",
    };
    let mut line = format!(
        ".decl {} v_name={} v_type={} type={} num_elts={}",
        decl.id(),
        decl.name(),
        file,
        decl.elem_type().suffix(),
        decl.total_elems()
    );
    match decl.sub_reg_align() {
        SubRegAlign::Any => {}
        SubRegAlign::Words(w) => {
            let _ = write!(line, " align={}w", w);
        }
        SubRegAlign::HalfGrf => line.push_str(" align=hgrf"),
        SubRegAlign::Grf => line.push_str(" align=grf"),
    }
    if let Some(link) = decl.alias() {
        let _ = write!(line, " alias=<{}, {}>", link.target, link.offset);
    }
    if let Some(pin) = decl.reg_var().binding() {
        let _ = write!(line, " bind={}.{}", pin.reg, pin.sub_reg);
    }
    if decl.reg_file() == RegFileKind::Flag {
        let _ = write!(line, " bits={}", decl.num_flag_elems());
    }
    line
}

/// Format a single instruction
pub fn format_instruction(builder: &IrBuilder, id: InstrId) -> String {
    let inst = builder.instruction(id);
    let opnd = |op: OperandId| format_operand(builder, op);

    if inst.is_label() {
        return match inst.src(0) {
            Some(label) => format!("{}:", opnd(label)),
            None => "<label>:".to_string(),
        };
    }

    let mut line = String::new();
    if let Some(pred) = inst.predicate() {
        let _ = write!(line, "{} ", opnd(pred));
    }
    line.push_str(inst.opcode().mnemonic());
    if let InstKind::Math { function } = inst.kind() {
        let _ = write!(line, ".{}", function.name());
    }
    if let InstKind::Intrinsic(intrinsic) = inst.kind() {
        let _ = write!(line, ".{}", intrinsic.name());
    }
    if inst.saturate() {
        line.push_str(".sat");
    }
    let _ = write!(line, " ({})", inst.exec_size().lanes());
    if let Some(cond) = inst.cond_mod() {
        let _ = write!(line, " {}", opnd(cond));
    }
    if let Some(dst) = inst.dst() {
        let _ = write!(line, " {}", opnd(dst));
    }
    for src in inst.srcs() {
        let _ = write!(line, " {}", opnd(src));
    }

    match inst.kind() {
        InstKind::FlowControl { jip, uip } => {
            if let Some(jip) = jip {
                let _ = write!(line, " jip={}", opnd(*jip));
            }
            if let Some(uip) = uip {
                let _ = write!(line, " uip={}", opnd(*uip));
            }
        }
        InstKind::Send {
            msg,
            desc,
            ext_desc,
        } => {
            if let Some(ext) = ext_desc {
                let _ = write!(line, " {}", opnd(*ext));
            }
            let _ = write!(line, " {}", opnd(*desc));
            let _ = write!(
                line,
                "  // {} desc=0x{:08x} exdesc=0x{:08x} bti={} rlen={} mlen={}",
                msg.sfid(),
                msg.desc(),
                msg.ext_desc(),
                msg.bti(),
                msg.response_len(),
                msg.msg_len()
            );
        }
        _ => {}
    }

    let options = inst.options().names();
    if !options.is_empty() {
        let _ = write!(line, " {{{}}}", options.join(","));
    }
    line
}

fn format_operand(builder: &IrBuilder, id: OperandId) -> String {
    let base_name = |base: RegBase| match base {
        RegBase::Declare(decl) => builder.declare(decl).name().to_string(),
        RegBase::Phys(reg) => reg.to_string(),
    };

    match builder.operand(id) {
        Operand::Imm(imm) => match imm.as_f32() {
            Some(value) => format!("{:?}:f", value),
            None => format!("0x{:x}:{}", imm.as_u64(), imm.ty.suffix()),
        },
        Operand::Src(src) => {
            let modifier = match src.modifier {
                SrcModifier::None => "",
                SrcModifier::Neg => "-",
                SrcModifier::Abs => "(abs)",
                SrcModifier::NegAbs => "-(abs)",
                SrcModifier::Not => "~",
            };
            let region = builder.region(src.region);
            match src.access {
                RegAccess::Direct => format!(
                    "{}{}({},{}){}:{}",
                    modifier,
                    base_name(src.base),
                    src.row_off,
                    src.sub_reg_off,
                    region,
                    src.ty.suffix()
                ),
                RegAccess::Indirect {
                    addr,
                    addr_sub_reg,
                    imm_disp,
                } => format!(
                    "{}r[{}.{}, {}]{}:{}",
                    modifier,
                    builder.declare(addr).name(),
                    addr_sub_reg,
                    imm_disp,
                    region,
                    src.ty.suffix()
                ),
            }
        }
        Operand::Dst(dst) => match dst.access {
            RegAccess::Direct => format!(
                "{}({},{})<{}>:{}",
                base_name(dst.base),
                dst.row_off,
                dst.sub_reg_off,
                dst.horz_stride,
                dst.ty.suffix()
            ),
            RegAccess::Indirect {
                addr,
                addr_sub_reg,
                imm_disp,
            } => format!(
                "r[{}.{}, {}]<{}>:{}",
                builder.declare(addr).name(),
                addr_sub_reg,
                imm_disp,
                dst.horz_stride,
                dst.ty.suffix()
            ),
        },
        Operand::Pred(pred) => {
            let sign = match pred.state {
                PredState::Plus => "",
                PredState::Minus => "!",
            };
            let control = match pred.control {
                PredControl::Default => "",
                PredControl::Any => ".any",
                PredControl::All => ".all",
            };
            format!(
                "({}{}.{}{})",
                sign,
                builder.declare(pred.flag).name(),
                pred.sub_reg_off,
                control
            )
        }
        Operand::CondMod(cond) => match cond.flag {
            Some(flag) => format!(
                "({}){}.{}",
                cond.modifier.mnemonic(),
                builder.declare(flag).name(),
                cond.sub_reg_off
            ),
            None => format!("({})", cond.modifier.mnemonic()),
        },
        Operand::Label(label) => label.name.clone(),
        Operand::AddrExp(exp) => format!(
            "&{}+{}:{}",
            builder.declare(exp.decl).name(),
            exp.offset,
            exp.ty.suffix()
        ),
    }
}
