//! Send construction and descriptor lowering
//!
//! [`IrBuilder::create_send`] and [`IrBuilder::create_split_send`] take a
//! ready descriptor operand. The `*_for_cisa` front doors start from the raw
//! message fields instead: they build the [`SendMsgDesc`], fold immediate
//! binding indices into it and, for register-valued indices, emit the
//! address computation that leaves the final descriptor in `a0.0`:
//!
//! ```text
//! add (1) a0.0  surface  desc          // register surface
//! shl (1) tmp   sampler  8             // register sampler
//! add (1) a0.0  a0.0     tmp           // (or tmp + desc without a surface)
//! send (16) dst payload  a0.0
//! ```
//!
//! Bindless surfaces carry BTI 252 in the descriptor and route the surface
//! through `a0.2` as the extended descriptor.

use super::IrBuilder;
use crate::compiler::ir::{
    CondModifier, DeclareId, DstRegion, ElemType, ExecSize, InstKind, InstOptions, InstrId,
    Opcode, Operand, OperandId, PredControl, PredState, RegAccess, SendAccess, SendMsgDesc, Sfid,
    SubRegAlign, PREDEF_SURF_252,
};
use crate::{Error, Result};

/// Raw fields of a send message, as the frontend supplies them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessage {
    pub sfid: Sfid,
    pub access: SendAccess,
    /// Function control bits, including the BTI byte
    pub func_ctrl: u32,
    /// Response length in GRFs
    pub response_len: u32,
    /// Length of the first payload in GRFs
    pub msg_len: u32,
    /// Length of the second payload of a split send in GRFs
    pub ext_msg_len: u32,
    pub ext_func_ctrl: u32,
    pub header_present: bool,
    pub eot: bool,
    /// Surface (binding table) index, immediate or register
    pub surface: Option<OperandId>,
    /// Sampler index, immediate or register
    pub sampler: Option<OperandId>,
}

impl SendMessage {
    pub fn new(sfid: Sfid, access: SendAccess, func_ctrl: u32) -> Self {
        Self {
            sfid,
            access,
            func_ctrl,
            response_len: 0,
            msg_len: 1,
            ext_msg_len: 0,
            ext_func_ctrl: 0,
            header_present: false,
            eot: false,
            surface: None,
            sampler: None,
        }
    }

    pub fn to_desc(&self) -> SendMsgDesc {
        SendMsgDesc::new(
            self.func_ctrl,
            self.response_len,
            self.msg_len,
            self.sfid,
            self.ext_msg_len,
            self.ext_func_ctrl,
            self.header_present,
            self.eot,
            self.access,
            self.surface,
            self.sampler,
        )
    }
}

/// Descriptor operands produced by lowering
struct LoweredDesc {
    desc: OperandId,
    ext_desc: Option<OperandId>,
}

impl IrBuilder {
    /// Creates a `send`/`sendc` with an explicit descriptor operand.
    ///
    /// The destination is rewritten to `:w` when it is half float, or when
    /// the send is SIMD16 and the type is not already a 16-bit integer.
    #[allow(clippy::too_many_arguments)]
    pub fn create_send(
        &mut self,
        predicate: Option<OperandId>,
        opcode: Opcode,
        exec_size: ExecSize,
        dst: OperandId,
        src0: OperandId,
        desc: OperandId,
        options: InstOptions,
        msg: SendMsgDesc,
        append: bool,
    ) -> Result<InstrId> {
        if !opcode.is_send() || opcode.is_split_send() {
            return Err(Error::WrongConstructor {
                opcode: opcode.to_string(),
                expected: if opcode.is_split_send() {
                    "create_split_send"
                } else {
                    "create_instruction"
                },
            });
        }
        self.build_send(
            predicate,
            opcode,
            exec_size,
            dst,
            [Some(src0), None, None],
            LoweredDesc {
                desc,
                ext_desc: None,
            },
            options,
            msg,
            append,
        )
    }

    /// Creates a `sends`/`sendsc` with two payloads and an extended
    /// descriptor operand
    #[allow(clippy::too_many_arguments)]
    pub fn create_split_send(
        &mut self,
        predicate: Option<OperandId>,
        opcode: Opcode,
        exec_size: ExecSize,
        dst: OperandId,
        src0: OperandId,
        src1: OperandId,
        desc: OperandId,
        ext_desc: OperandId,
        options: InstOptions,
        msg: SendMsgDesc,
        append: bool,
    ) -> Result<InstrId> {
        if !opcode.is_split_send() {
            return Err(Error::WrongConstructor {
                opcode: opcode.to_string(),
                expected: if opcode.is_send() {
                    "create_send"
                } else {
                    "create_instruction"
                },
            });
        }
        self.build_send(
            predicate,
            opcode,
            exec_size,
            dst,
            [Some(src0), Some(src1), None],
            LoweredDesc {
                desc,
                ext_desc: Some(ext_desc),
            },
            options,
            msg,
            append,
        )
    }

    /// Builds a send from raw message fields, lowering the binding indices
    /// and realigning the payload if needed. Appends to the list.
    pub fn create_send_for_cisa(
        &mut self,
        predicate: Option<OperandId>,
        exec_size: ExecSize,
        dst: OperandId,
        payload: OperandId,
        msg: &SendMessage,
        options: InstOptions,
        conditional: bool,
    ) -> Result<InstrId> {
        let payload = self.realign_payload(payload, msg.msg_len)?;
        let mut desc = msg.to_desc();
        let lowered = self.lower_descriptor(&mut desc, false)?;
        let opcode = if conditional {
            Opcode::Sendc
        } else {
            Opcode::Send
        };
        self.build_send(
            predicate,
            opcode,
            exec_size,
            dst,
            [Some(payload), None, None],
            lowered,
            options,
            desc,
            true,
        )
    }

    /// Split-send counterpart of [`IrBuilder::create_send_for_cisa`]
    #[allow(clippy::too_many_arguments)]
    pub fn create_split_send_for_cisa(
        &mut self,
        predicate: Option<OperandId>,
        exec_size: ExecSize,
        dst: OperandId,
        src0: OperandId,
        src1: OperandId,
        msg: &SendMessage,
        options: InstOptions,
        conditional: bool,
    ) -> Result<InstrId> {
        let src0 = self.realign_payload(src0, msg.msg_len)?;
        let src1 = self.realign_payload(src1, msg.ext_msg_len)?;
        let mut desc = msg.to_desc();
        let lowered = self.lower_descriptor(&mut desc, true)?;
        let opcode = if conditional {
            Opcode::Sendsc
        } else {
            Opcode::Sends
        };
        self.build_send(
            predicate,
            opcode,
            exec_size,
            dst,
            [Some(src0), Some(src1), None],
            lowered,
            options,
            desc,
            true,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build_send(
        &mut self,
        predicate: Option<OperandId>,
        opcode: Opcode,
        exec_size: ExecSize,
        dst: OperandId,
        srcs: [Option<OperandId>; 3],
        lowered: LoweredDesc,
        options: InstOptions,
        msg: SendMsgDesc,
        append: bool,
    ) -> Result<InstrId> {
        let dst = self.fix_send_dst_type(dst, exec_size)?;
        let inst = self.new_instruction(
            opcode,
            exec_size,
            predicate,
            None,
            false,
            Some(dst),
            srcs,
            options,
            InstKind::Send {
                msg: Box::new(msg),
                desc: lowered.desc,
                ext_desc: lowered.ext_desc,
            },
        );
        Ok(self.add_instruction(inst, append))
    }

    /// Returns `dst`, or a retyped copy of it when the send path cannot write
    /// its type at this width
    fn fix_send_dst_type(&mut self, dst: OperandId, exec_size: ExecSize) -> Result<OperandId> {
        let region = match self.operand(dst) {
            Operand::Dst(region @ DstRegion {
                access: RegAccess::Direct,
                ..
            }) => region.clone(),
            Operand::Dst(_) => {
                return Err(Error::InvalidOperand {
                    expected: "direct destination region",
                    got: "indirect destination region",
                })
            }
            other => {
                return Err(Error::InvalidOperand {
                    expected: "destination region",
                    got: other.kind_name(),
                })
            }
        };

        let needs_word = region.ty == ElemType::HF
            || (exec_size == ExecSize::SIMD16 && !matches!(region.ty, ElemType::W | ElemType::UW));
        if !needs_word {
            return Ok(dst);
        }
        tracing::debug!(from = ?region.ty, "retyping send destination to :w");
        Ok(self.alloc_operand(Operand::Dst(DstRegion {
            ty: ElemType::W,
            ..region
        })))
    }

    /// Folds the binding indices into `msg` and emits the address-register
    /// setup for register-valued ones. Auxiliary instructions are appended.
    fn lower_descriptor(&mut self, msg: &mut SendMsgDesc, split: bool) -> Result<LoweredDesc> {
        let surface = msg.surface();
        let sampler = msg.sampler();
        let imm_surface = surface.and_then(|s| self.imm_value(s));
        let imm_sampler = sampler.and_then(|s| self.imm_value(s));

        // immediates first so every emitted add sees the final descriptor
        if let Some(bti) = imm_surface {
            msg.set_bti(bti as u32);
        }
        if let Some(index) = imm_sampler {
            msg.set_desc(msg.desc() | (((index as u32) & 0xF) << 8));
        }

        let builtins = self.builtins;
        let mut in_a0 = false;
        let mut ext_desc = None;

        if let (Some(surface), None) = (surface, imm_surface) {
            let bindless = self.operand_root(surface) == Some(builtins.t252)
                || msg.bti() == PREDEF_SURF_252;
            if bindless {
                msg.set_bti(PREDEF_SURF_252);
                let s = self.region_scalar();
                let marker = self.create_src(builtins.t252, 0, 0, s, ElemType::UD);
                if split {
                    tracing::debug!("routing bindless surface through a0.2");
                    let a0_2 = self.create_dst(builtins.a0_dot2, 0, 0, 1, ElemType::UD);
                    let ext = self.create_imm(msg.ext_desc() as i64, ElemType::UD);
                    self.create_bin_op(
                        Opcode::Add,
                        ExecSize::SIMD1,
                        a0_2,
                        marker,
                        ext,
                        InstOptions::WRITE_ENABLE,
                        true,
                    )?;
                    ext_desc = Some(self.create_src(builtins.a0_dot2, 0, 0, s, ElemType::UD));
                } else {
                    tracing::debug!("bindless surface on a plain send, binding T252 only");
                }
                msg.set_surface(Some(marker));
            } else {
                tracing::debug!(desc = msg.desc(), "moving surface index into a0.0");
                let a0 = self.create_dst(builtins.a0, 0, 0, 1, ElemType::UD);
                let desc = self.create_imm(msg.desc() as i64, ElemType::UD);
                self.create_bin_op(
                    Opcode::Add,
                    ExecSize::SIMD1,
                    a0,
                    surface,
                    desc,
                    InstOptions::WRITE_ENABLE,
                    true,
                )?;
                in_a0 = true;
            }
        }

        if let (Some(sampler), None) = (sampler, imm_sampler) {
            if let Some(term) = self.sampler_term(sampler)? {
                tracing::debug!(combine = in_a0, "moving sampler index into a0.0");
                let s = self.region_scalar();
                let a0_dst = self.create_dst(builtins.a0, 0, 0, 1, ElemType::UD);
                let term = self.create_src(term, 0, 0, s, ElemType::UD);
                let other = if in_a0 {
                    self.create_src(builtins.a0, 0, 0, s, ElemType::UD)
                } else {
                    self.create_imm(msg.desc() as i64, ElemType::UD)
                };
                self.create_bin_op(
                    Opcode::Add,
                    ExecSize::SIMD1,
                    a0_dst,
                    other,
                    term,
                    InstOptions::WRITE_ENABLE,
                    true,
                )?;
                in_a0 = true;
            }
        }

        let desc = if in_a0 {
            let s = self.region_scalar();
            self.create_src(builtins.a0, 0, 0, s, ElemType::UD)
        } else {
            self.create_imm(msg.desc() as i64, ElemType::UD)
        };
        if ext_desc.is_none() && split {
            ext_desc = Some(self.create_imm(msg.ext_desc() as i64, ElemType::UD));
        }
        Ok(LoweredDesc { desc, ext_desc })
    }

    /// Temporary holding the sampler's contribution to the descriptor, if
    /// it contributes one
    fn sampler_term(&mut self, sampler: OperandId) -> Result<Option<DeclareId>> {
        if self.operand_root(sampler) != Some(self.builtins.bindless_sampler) {
            // shl (1) tmp sampler 8
            let tmp = self.create_temp_var(1, ElemType::UD, SubRegAlign::Any, "ST")?;
            let dst = self.create_dst(tmp, 0, 0, 1, ElemType::UD);
            let shift = self.create_imm(8, ElemType::UD);
            self.create_bin_op(
                Opcode::Shl,
                ExecSize::SIMD1,
                dst,
                sampler,
                shift,
                InstOptions::WRITE_ENABLE,
                true,
            )?;
            return Ok(Some(tmp));
        }

        if !self.options.align_bindless_sampler {
            tracing::debug!("bindless sampler without alignment mode adds no descriptor term");
            return Ok(None);
        }

        // and (1) (nz)f null sampler 0x10
        // (f) sel (1) tmp 0x100 0x0
        let flag = self.create_temp_flag(1)?;
        let cond = self.create_cond_mod(CondModifier::Nz, Some(flag), 0);
        let null = self.create_null_dst(ElemType::UD);
        let bit4 = self.create_imm(0x10, ElemType::UW);
        self.create_instruction(
            None,
            Opcode::And,
            Some(cond),
            false,
            ExecSize::SIMD1,
            Some(null),
            Some(sampler),
            Some(bit4),
            InstOptions::WRITE_ENABLE,
            true,
        )?;

        let tmp = self.create_temp_var(1, ElemType::UD, SubRegAlign::Any, "ST")?;
        let pred = self.create_predicate(PredState::Plus, flag, 0, PredControl::Default);
        let dst = self.create_dst(tmp, 0, 0, 1, ElemType::UD);
        let hi = self.create_imm(0x100, ElemType::UW);
        let lo = self.create_imm(0, ElemType::UW);
        self.create_instruction(
            Some(pred),
            Opcode::Sel,
            None,
            false,
            ExecSize::SIMD1,
            Some(dst),
            Some(hi),
            Some(lo),
            InstOptions::WRITE_ENABLE,
            true,
        )?;
        Ok(Some(tmp))
    }

    /// Copies a payload that does not start on a GRF boundary into a
    /// GRF-aligned temporary, `rows` GRFs long
    fn realign_payload(&mut self, payload: OperandId, rows: u32) -> Result<OperandId> {
        let grf = self.grf_size();
        if rows == 0 || self.is_aligned(payload, grf) {
            return Ok(payload);
        }
        let src = match self.operand(payload) {
            Operand::Src(src) if src.access == RegAccess::Direct => src.clone(),
            Operand::Src(_) => {
                return Err(Error::InvalidOperand {
                    expected: "direct payload region",
                    got: "indirect source region",
                })
            }
            other => {
                return Err(Error::InvalidOperand {
                    expected: "source region",
                    got: other.kind_name(),
                })
            }
        };
        let Some(decl) = src.base.declare() else {
            return Err(Error::InvalidOperand {
                expected: "declare-based payload",
                got: "physical register",
            });
        };

        let (_, alias_off) = self.declares.root_declare(decl);
        let decl_start = src.row_off as u32 * grf + src.sub_reg_off as u32 * src.ty.size();
        let start = alias_off + decl_start;
        let ty = if start % 4 == 0 {
            ElemType::UD
        } else if start % 2 == 0 {
            ElemType::UW
        } else {
            ElemType::UB
        };
        let lanes_per_row = grf / ty.size();
        let exec = lanes_per_row.min(32);

        tracing::debug!(
            payload = self.declares.get(decl).name(),
            rows,
            copy_type = ?ty,
            "realigning send payload"
        );
        let tmp = self.create_temp_var(rows * lanes_per_row, ty, SubRegAlign::Grf, "TV")?;
        let stride1 = self.region_stride1();

        for row in 0..rows {
            for chunk in 0..lanes_per_row / exec {
                let dst_sub = chunk * exec;
                let from = decl_start + row * grf + dst_sub * ty.size();
                let dst = self.create_dst(tmp, row as u16, dst_sub as u16, 1, ty);
                let src = self.create_src(
                    decl,
                    (from / grf) as u16,
                    ((from % grf) / ty.size()) as u16,
                    stride1,
                    ty,
                );
                self.create_mov(
                    ExecSize(exec as u8),
                    dst,
                    src,
                    InstOptions::WRITE_ENABLE,
                    true,
                )?;
            }
        }
        Ok(self.create_src(tmp, 0, 0, src.region, src.ty))
    }

    fn imm_value(&self, id: OperandId) -> Option<u64> {
        self.operand(id).as_imm().map(|imm| imm.as_u64())
    }

    fn operand_root(&self, id: OperandId) -> Option<DeclareId> {
        self.operand(id)
            .base_declare()
            .map(|d| self.declares.root_declare(d).0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::RegFileKind;
    use crate::compiler::BuilderOptions;

    fn builder() -> IrBuilder {
        IrBuilder::new("k", BuilderOptions::default()).unwrap()
    }

    fn grf_payload(b: &mut IrBuilder) -> OperandId {
        let p = b
            .create_declare("P", RegFileKind::Grf, 8, 2, ElemType::UD)
            .unwrap();
        let r = b.region_stride1();
        b.create_src_region(p, r)
    }

    fn reg_index(b: &mut IrBuilder, name: &str) -> OperandId {
        let d = b
            .create_declare(name, RegFileKind::Grf, 1, 1, ElemType::UD)
            .unwrap();
        let s = b.region_scalar();
        b.create_src_region(d, s)
    }

    fn opcodes(b: &IrBuilder) -> Vec<Opcode> {
        b.instructions().map(|(_, i)| i.opcode()).collect()
    }

    fn send_parts(b: &IrBuilder, id: InstrId) -> (SendMsgDesc, OperandId, Option<OperandId>) {
        match b.instruction(id).kind() {
            InstKind::Send {
                msg,
                desc,
                ext_desc,
            } => ((**msg).clone(), *desc, *ext_desc),
            other => panic!("not a send: {:?}", other),
        }
    }

    #[test]
    fn test_generic_opcode_rejected() {
        let mut b = builder();
        let out = b
            .create_declare("O", RegFileKind::Grf, 8, 1, ElemType::UD)
            .unwrap();
        let dst = b.create_dst_region(out, 1);
        let payload = grf_payload(&mut b);
        let desc = b.create_imm(0, ElemType::UD);
        let msg = SendMsgDesc::from_raw(0, 0, SendAccess::Read, None, None);
        let err = b
            .create_send(
                None,
                Opcode::Add,
                ExecSize::SIMD8,
                dst,
                payload,
                desc,
                InstOptions::NONE,
                msg.clone(),
                true,
            )
            .unwrap_err();
        assert!(matches!(err, Error::WrongConstructor { .. }));
        let err = b
            .create_send(
                None,
                Opcode::Sends,
                ExecSize::SIMD8,
                dst,
                payload,
                desc,
                InstOptions::NONE,
                msg,
                true,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::WrongConstructor {
                expected: "create_split_send",
                ..
            }
        ));
        assert!(b.instruction_list().is_empty());
    }

    #[test]
    fn test_dst_type_coercion() {
        let cases = [
            (ElemType::F, ExecSize::SIMD16, ElemType::W),
            (ElemType::UD, ExecSize::SIMD16, ElemType::W),
            (ElemType::UW, ExecSize::SIMD16, ElemType::UW),
            (ElemType::HF, ExecSize::SIMD8, ElemType::W),
            (ElemType::F, ExecSize::SIMD8, ElemType::F),
        ];
        for (ty, exec, expected) in cases {
            let mut b = builder();
            let out = b
                .create_declare("O", RegFileKind::Grf, 16, 2, ty)
                .unwrap();
            let dst = b.create_dst_region(out, 1);
            let payload = grf_payload(&mut b);
            let desc = b.create_imm(0, ElemType::UD);
            let msg = SendMsgDesc::from_raw(0, 0, SendAccess::Read, None, None);
            let id = b
                .create_send(
                    None,
                    Opcode::Send,
                    exec,
                    dst,
                    payload,
                    desc,
                    InstOptions::NONE,
                    msg,
                    true,
                )
                .unwrap();
            let new_dst = b.instruction(id).dst().unwrap();
            assert_eq!(b.operand(new_dst).elem_type(), Some(expected), "{:?}", ty);
            // the caller's operand is never modified
            assert_eq!(b.operand(dst).elem_type(), Some(ty));
        }
    }

    #[test]
    fn test_indirect_dst_rejected() {
        let mut b = builder();
        let a0 = b.builtins().a0;
        let dst = b.create_indirect_dst(a0, 0, 1, ElemType::UD, 0);
        let payload = grf_payload(&mut b);
        let desc = b.create_imm(0, ElemType::UD);
        let msg = SendMsgDesc::from_raw(0, 0, SendAccess::Read, None, None);
        let err = b
            .create_send(
                None,
                Opcode::Send,
                ExecSize::SIMD8,
                dst,
                payload,
                desc,
                InstOptions::NONE,
                msg,
                true,
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOperand { .. }));
    }

    #[test]
    fn test_all_immediate_bindings_emit_nothing() {
        let mut b = builder();
        let null = b.create_null_dst(ElemType::UD);
        let payload = grf_payload(&mut b);
        let mut msg = SendMessage::new(Sfid::Sampler, SendAccess::Read, 0x1000);
        msg.surface = Some(b.create_imm(5, ElemType::UD));
        msg.sampler = Some(b.create_imm(3, ElemType::UD));
        let id = b
            .create_send_for_cisa(None, ExecSize::SIMD8, null, payload, &msg, InstOptions::NONE, false)
            .unwrap();
        assert_eq!(opcodes(&b), vec![Opcode::Send]);
        let (desc, desc_op, ext) = send_parts(&b, id);
        assert_eq!(desc.bti(), 5);
        assert_eq!(desc.desc() & 0xF00, 0x300);
        let imm = b.operand(desc_op).as_imm().unwrap();
        assert_eq!(imm.as_u64(), desc.desc() as u64);
        assert_eq!(ext, None);
    }

    #[test]
    fn test_register_sampler_without_surface() {
        let mut b = builder();
        let null = b.create_null_dst(ElemType::UD);
        let payload = grf_payload(&mut b);
        let mut msg = SendMessage::new(Sfid::Sampler, SendAccess::Read, 0x1000);
        msg.sampler = Some(reg_index(&mut b, "SMP"));
        let id = b
            .create_send_for_cisa(None, ExecSize::SIMD8, null, payload, &msg, InstOptions::NONE, false)
            .unwrap();
        assert_eq!(opcodes(&b), vec![Opcode::Shl, Opcode::Add, Opcode::Send]);
        let add = b.instruction(b.instruction_list()[1]);
        let imm = add.src(0).and_then(|s| b.operand(s).as_imm()).unwrap();
        assert_eq!(imm.as_u64(), send_parts(&b, id).0.desc() as u64);
        assert!(add.is_write_enable());
    }

    #[test]
    fn test_register_surface_and_sampler_accumulate() {
        let mut b = builder();
        let null = b.create_null_dst(ElemType::UD);
        let payload = grf_payload(&mut b);
        let mut msg = SendMessage::new(Sfid::Sampler, SendAccess::Read, 0);
        msg.surface = Some(reg_index(&mut b, "SURF"));
        msg.sampler = Some(reg_index(&mut b, "SMP"));
        b.create_send_for_cisa(None, ExecSize::SIMD8, null, payload, &msg, InstOptions::NONE, false)
            .unwrap();
        assert_eq!(
            opcodes(&b),
            vec![Opcode::Add, Opcode::Shl, Opcode::Add, Opcode::Send]
        );
        // second add reads a0.0 back
        let a0 = b.builtins().a0;
        let add = b.instruction(b.instruction_list()[2]);
        let src0 = add.src(0).unwrap();
        assert_eq!(b.operand(src0).base_declare(), Some(a0));
    }

    #[test]
    fn test_bindless_surface_uses_a0_dot2() {
        let mut b = builder();
        let null = b.create_null_dst(ElemType::UD);
        let src0 = grf_payload(&mut b);
        let src1 = grf_payload(&mut b);
        let t252 = b.builtins().t252;
        let s = b.region_scalar();
        let mut msg = SendMessage::new(Sfid::DpDc1, SendAccess::Write, 0x5A07);
        msg.ext_msg_len = 1;
        msg.surface = Some(b.create_src_region(t252, s));
        let id = b
            .create_split_send_for_cisa(
                None,
                ExecSize::SIMD8,
                null,
                src0,
                src1,
                &msg,
                InstOptions::NONE,
                false,
            )
            .unwrap();
        assert_eq!(opcodes(&b), vec![Opcode::Add, Opcode::Sends]);
        let (desc, desc_op, ext) = send_parts(&b, id);
        assert_eq!(desc.bti(), PREDEF_SURF_252);
        assert!(b.operand(desc_op).is_imm());
        let ext = ext.unwrap();
        assert_eq!(b.operand(ext).base_declare(), Some(b.builtins().a0_dot2));
        let add = b.instruction(b.instruction_list()[0]);
        let imm = add.src(1).and_then(|s| b.operand(s).as_imm()).unwrap();
        assert_eq!(imm.as_u64(), desc.ext_desc() as u64);
    }

    #[test]
    fn test_bindless_descriptor_routes_register_surface_through_t252() {
        let mut b = builder();
        let null = b.create_null_dst(ElemType::UD);
        let src0 = grf_payload(&mut b);
        let src1 = grf_payload(&mut b);
        let surf = reg_index(&mut b, "SURF");
        let mut msg = SendMessage::new(Sfid::DpDc1, SendAccess::Write, 0x5AFC);
        msg.ext_msg_len = 1;
        msg.surface = Some(surf);
        let id = b
            .create_split_send_for_cisa(
                None,
                ExecSize::SIMD8,
                null,
                src0,
                src1,
                &msg,
                InstOptions::NONE,
                false,
            )
            .unwrap();
        assert_eq!(opcodes(&b), vec![Opcode::Add, Opcode::Sends]);

        let t252 = b.builtins().t252;
        let add = b.instruction(b.instruction_list()[0]);
        let dst = add.dst().unwrap();
        assert_eq!(b.operand(dst).base_declare(), Some(b.builtins().a0_dot2));
        let add_src0 = add.src(0).unwrap();
        assert_eq!(b.operand_root(add_src0), Some(t252));

        let (desc, _, ext) = send_parts(&b, id);
        assert_eq!(desc.bti(), PREDEF_SURF_252);
        assert_eq!(b.operand_root(desc.surface().unwrap()), Some(t252));
        assert!(ext.is_some());
    }

    #[test]
    fn test_bindless_surface_on_plain_send_keeps_immediate_descriptors() {
        let mut b = builder();
        let null = b.create_null_dst(ElemType::UD);
        let payload = grf_payload(&mut b);
        let mut msg = SendMessage::new(Sfid::DpDc1, SendAccess::Read, 0x5AFC);
        msg.surface = Some(reg_index(&mut b, "SURF"));
        let id = b
            .create_send_for_cisa(None, ExecSize::SIMD8, null, payload, &msg, InstOptions::NONE, false)
            .unwrap();
        assert_eq!(opcodes(&b), vec![Opcode::Send]);

        let (desc, desc_op, ext) = send_parts(&b, id);
        assert_eq!(ext, None);
        assert!(b.operand(desc_op).is_imm());
        assert_eq!(desc.bti(), PREDEF_SURF_252);
        let t252 = b.builtins().t252;
        assert_eq!(b.operand_root(desc.surface().unwrap()), Some(t252));
    }

    #[test]
    fn test_bindless_sampler_alignment_mode() {
        let mut b = IrBuilder::new(
            "k",
            BuilderOptions {
                align_bindless_sampler: true,
                ..Default::default()
            },
        )
        .unwrap();
        let null = b.create_null_dst(ElemType::UD);
        let payload = grf_payload(&mut b);
        let bs = b.builtins().bindless_sampler;
        let s = b.region_scalar();
        let mut msg = SendMessage::new(Sfid::Sampler, SendAccess::Read, 0);
        msg.sampler = Some(b.create_src_region(bs, s));
        b.create_send_for_cisa(None, ExecSize::SIMD8, null, payload, &msg, InstOptions::NONE, false)
            .unwrap();
        assert_eq!(
            opcodes(&b),
            vec![Opcode::And, Opcode::Sel, Opcode::Add, Opcode::Send]
        );
        let and = b.instruction(b.instruction_list()[0]);
        assert!(and.cond_mod().is_some());
        let sel = b.instruction(b.instruction_list()[1]);
        assert!(sel.predicate().is_some());
    }

    #[test]
    fn test_bindless_sampler_without_alignment_mode() {
        let mut b = builder();
        let null = b.create_null_dst(ElemType::UD);
        let payload = grf_payload(&mut b);
        let bs = b.builtins().bindless_sampler;
        let s = b.region_scalar();
        let mut msg = SendMessage::new(Sfid::Sampler, SendAccess::Read, 0);
        msg.sampler = Some(b.create_src_region(bs, s));
        let id = b
            .create_send_for_cisa(None, ExecSize::SIMD8, null, payload, &msg, InstOptions::NONE, false)
            .unwrap();
        assert_eq!(opcodes(&b), vec![Opcode::Send]);
        assert!(b.operand(send_parts(&b, id).1).is_imm());
    }

    #[test]
    fn test_misaligned_payload_is_copied() {
        let mut b = builder();
        let null = b.create_null_dst(ElemType::UD);
        let p = b
            .create_declare("P", RegFileKind::Grf, 8, 3, ElemType::UD)
            .unwrap();
        let r = b.region_stride1();
        // starts at byte 8 of the declare
        let payload = b.create_src(p, 0, 2, r, ElemType::UD);
        let mut msg = SendMessage::new(Sfid::DpDc, SendAccess::Read, 0);
        msg.msg_len = 2;
        let id = b
            .create_send_for_cisa(None, ExecSize::SIMD8, null, payload, &msg, InstOptions::NONE, false)
            .unwrap();
        assert_eq!(opcodes(&b), vec![Opcode::Mov, Opcode::Mov, Opcode::Send]);

        let new_payload = b.instruction(id).src(0).unwrap();
        let tmp = b.operand(new_payload).base_declare().unwrap();
        assert_ne!(tmp, p);
        assert_eq!(b.declare(tmp).sub_reg_align(), SubRegAlign::Grf);
        let second = b.instruction(b.instruction_list()[1]);
        let src = b.operand(second.src(0).unwrap()).as_src().unwrap().clone();
        assert_eq!((src.row_off, src.sub_reg_off), (1, 2));
    }

    #[test]
    fn test_aligned_payload_is_used_directly() {
        let mut b = builder();
        let null = b.create_null_dst(ElemType::UD);
        let payload = grf_payload(&mut b);
        let msg = SendMessage::new(Sfid::DpDc, SendAccess::Read, 0);
        let id = b
            .create_send_for_cisa(None, ExecSize::SIMD8, null, payload, &msg, InstOptions::NONE, false)
            .unwrap();
        assert_eq!(b.instruction(id).src(0), Some(payload));
    }
}
