//! Integration tests for the IR builder
//!
//! These tests drive the public construction API end to end:
//! 1. Alignment checks tighten declares the allocator has not placed yet
//! 2. Immediates are shared by bit pattern and type
//! 3. Send lowering leaves register-valued descriptors in the address register
//! 4. ABI binding pins inputs and predefined variables, or refuses to

use visa_ir::compiler::ir::{
    ElemType, ExecSize, InstKind, InstOptions, LabelKind, Opcode, Operand, PhyReg, RegFileKind,
    SendAccess, Sfid, SubRegAlign,
};
use visa_ir::compiler::{dump_kernel, PredefinedVar, SendMessage};
use visa_ir::{BuilderOptions, Error, ErrorSeverity, IrBuilder};

fn builder() -> IrBuilder {
    IrBuilder::new("test_kernel", BuilderOptions::default()).unwrap()
}

// =============================================================================
// SCENARIO A - alignment tightening
// =============================================================================

#[test]
fn test_full_grf_alignment_of_fresh_declare() {
    let mut b = builder();
    let v = b
        .create_declare("V", RegFileKind::Grf, 8, 1, ElemType::F)
        .unwrap();
    let region = b.region_stride1();
    let src = b.create_src_region(v, region);

    assert!(b.is_aligned(src, 32));
    assert_eq!(b.declare(v).sub_reg_align(), SubRegAlign::Grf);
}

#[test]
fn test_small_declare_tightened_on_demand() {
    let mut b = builder();
    let v = b
        .create_declare("S", RegFileKind::Grf, 2, 1, ElemType::W)
        .unwrap();
    assert_eq!(b.declare(v).sub_reg_align(), SubRegAlign::Any);

    let dst = b.create_dst_region(v, 1);
    assert!(b.is_aligned(dst, 16));
    assert_eq!(b.declare(v).sub_reg_align(), SubRegAlign::HalfGrf);

    // weaker requirements hold without further change
    assert!(b.is_aligned(dst, 8));
    assert_eq!(b.declare(v).sub_reg_align(), SubRegAlign::HalfGrf);

    // stronger ones raise it
    assert!(b.is_aligned(dst, 32));
    assert_eq!(b.declare(v).sub_reg_align(), SubRegAlign::Grf);
}

// =============================================================================
// SCENARIO B - immediate pooling
// =============================================================================

#[test]
fn test_identical_float_immediates_are_shared() {
    let mut b = builder();
    let one_a = b.create_imm_f32(1.0);
    let one_b = b.create_imm_f32(1.0);
    assert_eq!(one_a, one_b);
}

#[test]
fn test_same_bits_different_type_not_shared() {
    let mut b = builder();
    let bits = 1.0f32.to_bits() as i64;
    let as_float = b.create_imm(bits, ElemType::F);
    let as_int = b.create_imm(bits, ElemType::UD);
    assert_ne!(as_float, as_int);
    assert_eq!(
        b.operand(as_float).as_imm().map(|i| i.bits),
        b.operand(as_int).as_imm().map(|i| i.bits)
    );
}

// =============================================================================
// SCENARIO C - split send with a register surface
// =============================================================================

#[test]
fn test_split_send_register_surface_immediate_sampler() {
    let mut b = builder();
    let payload0 = b
        .create_declare("PAYLOAD0", RegFileKind::Grf, 8, 2, ElemType::UD)
        .unwrap();
    let payload1 = b
        .create_declare("PAYLOAD1", RegFileKind::Grf, 8, 1, ElemType::UD)
        .unwrap();
    let surface = b
        .create_declare("SURF_IDX", RegFileKind::Grf, 1, 1, ElemType::UD)
        .unwrap();
    let out = b
        .create_declare("OUT", RegFileKind::Grf, 16, 2, ElemType::F)
        .unwrap();

    let stride1 = b.region_stride1();
    let scalar = b.region_scalar();
    let src0 = b.create_src_region(payload0, stride1);
    let src1 = b.create_src_region(payload1, stride1);
    let dst = b.create_dst_region(out, 1);

    let mut msg = SendMessage::new(Sfid::Sampler, SendAccess::Read, 0x0000_8000);
    msg.msg_len = 2;
    msg.ext_msg_len = 1;
    msg.response_len = 4;
    msg.surface = Some(b.create_src_region(surface, scalar));
    msg.sampler = Some(b.create_imm(2, ElemType::UD));

    let send = b
        .create_split_send_for_cisa(
            None,
            ExecSize::SIMD16,
            dst,
            src0,
            src1,
            &msg,
            InstOptions::NONE,
            false,
        )
        .unwrap();

    let a0 = b.builtins().a0;
    let writes_a0: Vec<_> = b
        .instructions()
        .filter(|(_, inst)| {
            inst.dst()
                .and_then(|d| b.operand(d).base_declare())
                .map(|d| b.root_declare(d).0 == a0)
                .unwrap_or(false)
        })
        .collect();
    assert_eq!(writes_a0.len(), 1);
    assert_eq!(writes_a0[0].1.opcode(), Opcode::Add);

    let InstKind::Send { msg, desc, ext_desc } = b.instruction(send).kind() else {
        panic!("expected a send");
    };
    assert!(!b.operand(*desc).is_imm());
    assert_eq!(b.operand(*desc).base_declare(), Some(a0));
    // the sampler index went into the descriptor bits
    assert_eq!((msg.desc() >> 8) & 0xF, 2);
    // no bindless routing: the extended descriptor stays immediate
    assert!(b.operand(ext_desc.unwrap()).is_imm());

    // the list ends with the send and the add comes right before it
    let list = b.instruction_list();
    assert_eq!(list.last(), Some(&send));
    assert_eq!(b.instruction(list[list.len() - 2]).opcode(), Opcode::Add);
}

#[test]
fn test_simd16_send_destination_retyped() {
    let mut b = builder();
    let payload = b
        .create_declare("P", RegFileKind::Grf, 8, 1, ElemType::UD)
        .unwrap();
    let out = b
        .create_declare("OUT", RegFileKind::Grf, 16, 2, ElemType::F)
        .unwrap();
    let stride1 = b.region_stride1();
    let src = b.create_src_region(payload, stride1);
    let dst = b.create_dst_region(out, 1);
    let msg = SendMessage::new(Sfid::DpDc1, SendAccess::Read, 0x10);

    let send = b
        .create_send_for_cisa(
            None,
            ExecSize::SIMD16,
            dst,
            src,
            &msg,
            InstOptions::NONE,
            false,
        )
        .unwrap();
    let new_dst = b.instruction(send).dst().unwrap();
    assert_eq!(b.operand(new_dst).elem_type(), Some(ElemType::W));
    assert_eq!(b.operand(new_dst).base_declare(), Some(out));
}

// =============================================================================
// ABI BINDING
// =============================================================================

#[test]
fn test_kernel_with_inputs_binds_everything() {
    let mut b = builder();
    let arg0 = b
        .create_input("arg0", 8, 1, ElemType::UD, 32)
        .unwrap();
    let arg1 = b
        .create_input("arg1", 2, 1, ElemType::UQ, 64)
        .unwrap();
    b.bind_kernel_inputs().unwrap();

    let pin0 = b.declare(arg0).reg_var().binding().unwrap();
    assert_eq!(pin0.reg, PhyReg::Grf(1));
    let pin1 = b.declare(arg1).reg_var().binding().unwrap();
    assert_eq!((pin1.reg, pin1.sub_reg), (PhyReg::Grf(2), 0));

    // inputs end at byte 80: local sizes start there
    let lsx = b.predefined_var(PredefinedVar::LocalSizeX);
    let pin = b.declare(lsx).reg_var().binding().unwrap();
    assert_eq!((pin.reg, pin.sub_reg), (PhyReg::Grf(2), 4));
    assert!(b.declare(lsx).is_pinned());
}

#[test]
fn test_inputs_past_usable_grfs_fail() {
    let mut b = IrBuilder::new(
        "big",
        BuilderOptions {
            reserved_grfs: 8,
            ..Default::default()
        },
    )
    .unwrap();
    b.create_input("huge", 8, 4, ElemType::UD, 118 * 32).unwrap();

    let err = b.bind_kernel_inputs().unwrap_err();
    assert!(matches!(err, Error::InputOutOfRange { limit: 120, .. }));
    assert_eq!(err.classify(), ErrorSeverity::Fatal);
}

#[test]
fn test_entry_expansion_after_labels() {
    let mut b = IrBuilder::new(
        "expand",
        BuilderOptions {
            new_r0_format: true,
            ..Default::default()
        },
    )
    .unwrap();
    let label = b.create_label("BB_entry", LabelKind::Block);
    b.create_label_inst(label, true).unwrap();

    let out = b
        .create_declare("TID", RegFileKind::Grf, 1, 1, ElemType::UD)
        .unwrap();
    let scalar = b.region_scalar();
    let hw_tid = b.predefined_var(PredefinedVar::HwTid);
    let dst = b.create_dst_region(out, 1);
    let src = b.create_src_region(hw_tid, scalar);
    b.create_mov(ExecSize::SIMD1, dst, src, InstOptions::NONE, true)
        .unwrap();

    b.expand_predefined_vars().unwrap();
    let ops: Vec<Opcode> = b.instructions().map(|(_, i)| i.opcode()).collect();
    assert_eq!(ops, vec![Opcode::Label, Opcode::And, Opcode::Mov]);

    let and = b.instruction(b.instruction_list()[1]);
    assert!(and.is_write_enable());
    let mask = and.src(1).and_then(|s| b.operand(s).as_imm()).unwrap();
    assert_eq!(mask.as_u64(), 0x3FF);
    let r0_src = and.src(0).unwrap();
    match b.operand(r0_src) {
        Operand::Src(src) => {
            assert_eq!(src.base.declare(), Some(b.builtins().r0));
            assert_eq!(src.sub_reg_off, 5);
        }
        other => panic!("unexpected operand {:?}", other),
    }
}

// =============================================================================
// CONSTRUCTOR CONTRACTS
// =============================================================================

#[test]
fn test_generic_constructor_rejects_special_opcodes() {
    let mut b = builder();
    for opcode in [Opcode::Math, Opcode::Send, Opcode::Jmpi, Opcode::Label] {
        let result = b.create_instruction(
            None,
            opcode,
            None,
            false,
            ExecSize::SIMD1,
            None,
            None,
            None,
            InstOptions::NONE,
            true,
        );
        assert!(
            matches!(result, Err(Error::WrongConstructor { .. })),
            "{:?} accepted",
            opcode
        );
    }
    assert!(b.instruction_list().is_empty());
}

#[test]
fn test_saturated_flow_control_rejected() {
    let mut b = builder();
    let result = b.create_instruction(
        None,
        Opcode::Jmpi,
        None,
        true,
        ExecSize::SIMD1,
        None,
        None,
        None,
        InstOptions::NONE,
        true,
    );
    assert!(matches!(result, Err(Error::SaturationOnFlowControl { .. })));
}

#[test]
fn test_detached_instruction_keeps_program_order() {
    let mut b = builder();
    let v = b
        .create_declare("V", RegFileKind::Grf, 8, 1, ElemType::UD)
        .unwrap();
    let zero = b.create_imm(0, ElemType::UD);
    let one = b.create_imm(1, ElemType::UD);

    let dst = b.create_dst_region(v, 1);
    let first = b
        .create_mov(ExecSize::SIMD8, dst, zero, InstOptions::NONE, true)
        .unwrap();
    let detached = b
        .create_mov(ExecSize::SIMD8, dst, one, InstOptions::NONE, false)
        .unwrap();
    let second = b
        .create_mov(ExecSize::SIMD8, dst, one, InstOptions::NONE, true)
        .unwrap();
    assert_eq!(b.instruction_list(), &[first, second]);

    b.insert_before(1, detached);
    assert_eq!(b.instruction_list(), &[first, detached, second]);
}

#[test]
fn test_dump_lists_declares_and_code() {
    let mut b = builder();
    let v = b
        .create_declare("VALUE", RegFileKind::Grf, 8, 1, ElemType::D)
        .unwrap();
    let dst = b.create_dst_region(v, 1);
    let seven = b.create_imm(7, ElemType::D);
    b.create_mov(ExecSize::SIMD8, dst, seven, InstOptions::WRITE_ENABLE, true)
        .unwrap();

    let text = dump_kernel(&b);
    assert!(text.contains("v_name=VALUE"));
    assert!(text.contains("mov (8) VALUE(0,0)<1>:d 0x7:d {NoMask}"));
}
