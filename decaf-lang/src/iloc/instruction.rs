use std::fmt;

use super::{LabelId, Operand};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Sub,
    Mult,
    Div,
    AddI,
    MultI,
    And,
    Or,
    LoadI,
    Load,
    LoadAI,
    LoadAO,
    Store,
    StoreAI,
    StoreAO,
    I2I,
    Jump,
    Cbr,
    CmpLT,
    CmpLE,
    CmpEQ,
    CmpGE,
    CmpGT,
    CmpNE,
    Not,
    Neg,
    Label,
    Push,
    Pop,
    Call,
    Return,
    Print,
    Nop,
    Phi,
}

/// What an operand position must hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperandKind {
    Register,
    IntConst,
    JumpLabel,
    CallLabel,
    /// a jump or call label
    AnyLabel,
    /// a register, an integer or a string
    Printable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    Neither,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot {
    pub kind: OperandKind,
    pub access: Access,
}

const fn slot(kind: OperandKind, access: Access) -> Slot {
    Slot { kind, access }
}

const R: Slot = slot(OperandKind::Register, Access::Read);
const W: Slot = slot(OperandKind::Register, Access::Write);
const K: Slot = slot(OperandKind::IntConst, Access::Neither);
const KR: Slot = slot(OperandKind::IntConst, Access::Read);
const J: Slot = slot(OperandKind::JumpLabel, Access::Neither);
const C: Slot = slot(OperandKind::CallLabel, Access::Neither);
const L: Slot = slot(OperandKind::AnyLabel, Access::Neither);
const P: Slot = slot(OperandKind::Printable, Access::Read);

impl Opcode {
    pub const ALL: [Opcode; 34] = [
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mult,
        Opcode::Div,
        Opcode::AddI,
        Opcode::MultI,
        Opcode::And,
        Opcode::Or,
        Opcode::LoadI,
        Opcode::Load,
        Opcode::LoadAI,
        Opcode::LoadAO,
        Opcode::Store,
        Opcode::StoreAI,
        Opcode::StoreAO,
        Opcode::I2I,
        Opcode::Jump,
        Opcode::Cbr,
        Opcode::CmpLT,
        Opcode::CmpLE,
        Opcode::CmpEQ,
        Opcode::CmpGE,
        Opcode::CmpGT,
        Opcode::CmpNE,
        Opcode::Not,
        Opcode::Neg,
        Opcode::Label,
        Opcode::Push,
        Opcode::Pop,
        Opcode::Call,
        Opcode::Return,
        Opcode::Print,
        Opcode::Nop,
        Opcode::Phi,
    ];

    /// Operand contract of the opcode: one slot per operand position.
    pub fn signature(self) -> &'static [Slot] {
        use Opcode::*;
        match self {
            Add | Sub | Mult | Div | And | Or | CmpLT | CmpLE | CmpEQ | CmpGE | CmpGT | CmpNE
            | LoadAO | Phi => &[R, R, W],
            StoreAO => &[R, R, R],
            AddI | MultI | LoadAI => &[R, K, W],
            LoadI => &[KR, W],
            Load | I2I | Not | Neg => &[R, W],
            Store => &[R, R],
            StoreAI => &[R, R, K],
            Jump => &[J],
            Cbr => &[R, J, J],
            Call => &[C],
            Label => &[L],
            Push => &[R],
            Pop => &[W],
            Print => &[P],
            Return | Nop => &[],
        }
    }

    pub fn arity(self) -> usize {
        self.signature().len()
    }

    pub fn is_branch(self) -> bool {
        matches!(self, Opcode::Jump | Opcode::Cbr)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
    /// Source variable the instruction touches, for debugging.
    pub var_name: Option<String>,
    pub comment: Option<String>,
}

impl Instruction {
    pub fn new(opcode: Opcode, operands: impl IntoIterator<Item = Operand>) -> Self {
        Self {
            opcode,
            operands: operands.into_iter().collect(),
            var_name: None,
            comment: None,
        }
    }
    pub fn label(label: Operand) -> Self {
        Self::new(Opcode::Label, [label])
    }
    pub fn jump(target: Operand) -> Self {
        Self::new(Opcode::Jump, [target])
    }
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
    pub fn with_var_name(mut self, name: impl Into<String>) -> Self {
        self.var_name = Some(name.into());
        self
    }

    pub fn is_branch(&self) -> bool {
        self.opcode.is_branch()
    }

    /// Jump label ids this instruction may transfer control to.
    pub fn jump_targets(&self) -> Vec<LabelId> {
        let positions: &[usize] = match self.opcode {
            Opcode::Jump => &[0],
            Opcode::Cbr => &[1, 2],
            _ => &[],
        };
        positions
            .iter()
            .filter_map(|&i| self.operands.get(i).and_then(Operand::as_jump_label))
            .collect()
    }

    /// The jump label defined by a `LABEL` instruction.
    pub fn defined_label(&self) -> Option<LabelId> {
        match self.opcode {
            Opcode::Label => self.operands.first().and_then(Operand::as_jump_label),
            _ => None,
        }
    }

    fn operands_with(&self, access: Access) -> impl Iterator<Item = &Operand> {
        self.opcode
            .signature()
            .iter()
            .zip(self.operands.iter())
            .filter(move |(slot, _)| slot.access == access)
            .map(|(_, op)| op)
    }

    /// Operands whose values the instruction uses. Literals in read positions
    /// only show up when `include_literals` is set.
    pub fn read_operands(&self, include_literals: bool) -> Vec<&Operand> {
        self.operands_with(Access::Read)
            .filter(|op| op.is_register() || (include_literals && op.is_literal()))
            .collect()
    }

    pub fn write_operands(&self) -> Vec<&Operand> {
        self.operands_with(Access::Write).collect()
    }

    /// Checks arity and operand kinds against the opcode's signature.
    pub fn validate(&self) -> Result<(), InstructionError> {
        let signature = self.opcode.signature();
        let error = |reason| InstructionError {
            opcode: self.opcode,
            reason,
            text: self.to_string().trim_start().to_string(),
        };
        if signature.len() != self.operands.len() {
            return Err(error(InvalidReason::Arity {
                expected: signature.len(),
                found: self.operands.len(),
            }));
        }
        for (slot, op) in signature.iter().zip(self.operands.iter()) {
            let ok = match slot.kind {
                OperandKind::Register => op.is_register(),
                OperandKind::IntConst => matches!(op, Operand::IntConst(_)),
                OperandKind::JumpLabel => matches!(op, Operand::JumpLabel(_)),
                OperandKind::CallLabel => matches!(op, Operand::CallLabel(_)),
                OperandKind::AnyLabel => matches!(op, Operand::JumpLabel(_) | Operand::CallLabel(_)),
                OperandKind::Printable => op.is_register() || op.is_literal(),
            };
            if !ok {
                return Err(error(InvalidReason::Operand(slot.kind, op.clone())));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvalidReason {
    Arity { expected: usize, found: usize },
    Operand(OperandKind, Operand),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstructionError {
    pub opcode: Opcode,
    pub reason: InvalidReason,
    /// rendering of the offending instruction
    pub text: String,
}

impl fmt::Display for InstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            InvalidReason::Arity { expected, found } => write!(
                f,
                "Invalid instruction (expected {expected} operands but found {found}): {}",
                self.text
            ),
            InvalidReason::Operand(OperandKind::Register, op) => {
                write!(f, "Invalid operand \"{op}\" (expected register): {}", self.text)
            }
            InvalidReason::Operand(OperandKind::AnyLabel, op) => {
                write!(f, "Invalid label \"{op}\": {}", self.text)
            }
            InvalidReason::Operand(OperandKind::Printable, op) => {
                write!(f, "Invalid parameter \"{op}\": {}", self.text)
            }
            InvalidReason::Operand(_, op) => write!(f, "Invalid operand \"{op}\": {}", self.text),
        }
    }
}

impl std::error::Error for InstructionError {}

#[cfg(test)]
mod test {
    use super::*;

    fn r(i: u32) -> Operand {
        Operand::VirtualReg(i)
    }

    /// One well-formed instance of every opcode.
    fn sample(opcode: Opcode) -> Instruction {
        let ops: Vec<Operand> = opcode
            .signature()
            .iter()
            .enumerate()
            .map(|(i, slot)| match slot.kind {
                OperandKind::Register | OperandKind::Printable => r(i as u32 + 1),
                OperandKind::IntConst => Operand::int(8),
                OperandKind::JumpLabel | OperandKind::AnyLabel => Operand::JumpLabel(i as u32 + 1),
                OperandKind::CallLabel => Operand::call_label("f"),
            })
            .collect();
        Instruction::new(opcode, ops)
    }

    #[test]
    fn read_and_write_positions_are_disjoint() {
        for opcode in Opcode::ALL {
            let inst = sample(opcode);
            assert!(inst.validate().is_ok(), "{opcode:?}");
            let reads = inst.read_operands(true);
            let writes = inst.write_operands();
            for w in writes.iter() {
                assert!(
                    !reads.iter().any(|rd| std::ptr::eq(*rd, *w)),
                    "{opcode:?} reads and writes the same position"
                );
            }
            assert!(reads.len() + writes.len() <= opcode.arity());
        }
    }

    #[test]
    fn read_write_sets() {
        let add = Instruction::new(Opcode::Add, [r(1), r(2), r(3)]);
        assert_eq!(add.read_operands(false), vec![&r(1), &r(2)]);
        assert_eq!(add.write_operands(), vec![&r(3)]);

        let store_ao = Instruction::new(Opcode::StoreAO, [r(1), r(2), r(3)]);
        assert_eq!(store_ao.read_operands(false).len(), 3);
        assert!(store_ao.write_operands().is_empty());

        let load_i = Instruction::new(Opcode::LoadI, [Operand::int(5), r(1)]);
        assert!(load_i.read_operands(false).is_empty());
        assert_eq!(load_i.read_operands(true), vec![&Operand::int(5)]);
        assert_eq!(load_i.write_operands(), vec![&r(1)]);

        let add_i = Instruction::new(Opcode::AddI, [Operand::SP, Operand::int(-4), Operand::SP]);
        assert_eq!(add_i.read_operands(true), vec![&Operand::SP]);
        assert_eq!(add_i.write_operands(), vec![&Operand::SP]);

        let store_ai = Instruction::new(Opcode::StoreAI, [r(1), Operand::BP, Operand::int(-4)]);
        assert_eq!(store_ai.read_operands(true), vec![&r(1), &Operand::BP]);

        let pop = Instruction::new(Opcode::Pop, [Operand::BP]);
        assert_eq!(pop.write_operands(), vec![&Operand::BP]);
        let push = Instruction::new(Opcode::Push, [r(4)]);
        assert_eq!(push.read_operands(false), vec![&r(4)]);

        for opcode in [Opcode::Label, Opcode::Jump, Opcode::Call, Opcode::Return, Opcode::Nop] {
            let inst = sample(opcode);
            assert!(inst.read_operands(true).is_empty());
            assert!(inst.write_operands().is_empty());
        }
    }

    #[test]
    fn rejects_wrong_arity() {
        for opcode in Opcode::ALL {
            let mut inst = sample(opcode);
            inst.operands.push(r(99));
            let err = inst.validate().unwrap_err();
            assert_eq!(
                err.reason,
                InvalidReason::Arity {
                    expected: opcode.arity(),
                    found: opcode.arity() + 1
                }
            );
        }
        let err = Instruction::new(Opcode::Return, [r(1)]).validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid instruction (expected 0 operands but found 1): return"
        );
    }

    #[test]
    fn rejects_wrong_kinds() {
        let err = Instruction::new(Opcode::Add, [r(1), Operand::int(2), r(3)])
            .validate()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid operand \"2\" (expected register): add r1, 2 => r3"
        );
        let err = Instruction::new(Opcode::AddI, [r(1), r(2), r(3)])
            .validate()
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid operand \"r2\": addI r1, r2 => r3");
        let err = Instruction::label(Operand::int(3)).validate().unwrap_err();
        assert_eq!(err.to_string(), "Invalid label \"3\": 3:");
        let err = Instruction::new(Opcode::Print, [Operand::JumpLabel(2)])
            .validate()
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid parameter \"l2\": print l2");
        assert!(Instruction::jump(Operand::call_label("main")).validate().is_err());
        assert!(Instruction::new(Opcode::Call, [Operand::JumpLabel(1)])
            .validate()
            .is_err());
        assert!(Instruction::new(Opcode::Print, [Operand::string("hi")])
            .validate()
            .is_ok());
        assert!(Instruction::label(Operand::call_label("main")).validate().is_ok());
    }

    #[test]
    fn clone_is_deep() {
        let original = Instruction::new(Opcode::I2I, [r(1), r(2)]).with_var_name("x");
        let mut renumbered = original.clone();
        renumbered.operands[0] = r(7);
        assert_eq!(original.operands[0], r(1));
        assert_ne!(original, renumbered);
    }

    #[test]
    fn jump_targets() {
        let cbr = Instruction::new(Opcode::Cbr, [r(1), Operand::JumpLabel(4), Operand::JumpLabel(5)]);
        assert_eq!(cbr.jump_targets(), vec![4, 5]);
        assert_eq!(Instruction::jump(Operand::JumpLabel(2)).jump_targets(), vec![2]);
        assert!(Instruction::label(Operand::JumpLabel(2)).jump_targets().is_empty());
        assert_eq!(Instruction::label(Operand::JumpLabel(2)).defined_label(), Some(2));
    }
}
