use std::fmt;

use itertools::Itertools;

use super::{Function, Instruction, Opcode, Operand, Program};

/// Column where trailing `// comment`s start.
const COMMENT_COLUMN: usize = 40;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    pub show_comments: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_comments: true,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::StackPtrReg => write!(f, "sp"),
            Operand::BasePtrReg => write!(f, "bp"),
            Operand::ReturnReg => write!(f, "ret"),
            Operand::VirtualReg(id) => write!(f, "r{id}"),
            Operand::JumpLabel(id) => write!(f, "l{id}"),
            Operand::CallLabel(name) => write!(f, "{name}"),
            Operand::IntConst(v) => write!(f, "{v}"),
            Operand::StrConst(s) => {
                let escaped = s
                    .chars()
                    .map(|c| match c {
                        '\\' => "\\\\".to_string(),
                        '"' => "\\\"".to_string(),
                        '\n' => "\\n".to_string(),
                        '\t' => "\\t".to_string(),
                        c => c.to_string(),
                    })
                    .join("");
                write!(f, "\"{escaped}\"")
            }
            Operand::Invalid => write!(f, "INVALID"),
        }
    }
}

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mult => "mult",
            Opcode::Div => "div",
            Opcode::AddI => "addI",
            Opcode::MultI => "multI",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::LoadI => "loadI",
            Opcode::Load => "load",
            Opcode::LoadAI => "loadAI",
            Opcode::LoadAO => "loadAO",
            Opcode::Store => "store",
            Opcode::StoreAI => "storeAI",
            Opcode::StoreAO => "storeAO",
            Opcode::I2I => "i2i",
            Opcode::Jump => "jump",
            Opcode::Cbr => "cbr",
            Opcode::CmpLT => "cmp_LT",
            Opcode::CmpLE => "cmp_LE",
            Opcode::CmpEQ => "cmp_EQ",
            Opcode::CmpGE => "cmp_GE",
            Opcode::CmpGT => "cmp_GT",
            Opcode::CmpNE => "cmp_NE",
            Opcode::Not => "not",
            Opcode::Neg => "neg",
            Opcode::Label => "label",
            Opcode::Push => "push",
            Opcode::Pop => "pop",
            Opcode::Call => "call",
            Opcode::Return => "return",
            Opcode::Print => "print",
            Opcode::Nop => "nop",
            Opcode::Phi => "phi",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

impl Instruction {
    fn operand_text(&self, i: usize) -> String {
        self.operands
            .get(i)
            .unwrap_or(&Operand::Invalid)
            .to_string()
    }

    /// `+k` or `-k` for address offsets.
    fn offset_text(&self, i: usize) -> String {
        match self.operands.get(i) {
            Some(Operand::IntConst(v)) if *v < 0 => v.to_string(),
            _ => format!("+{}", self.operand_text(i)),
        }
    }

    fn body(&self) -> String {
        let m = self.opcode.mnemonic();
        let op = |i| self.operand_text(i);
        match self.opcode {
            Opcode::Label => format!("{}:", op(0)),
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mult
            | Opcode::Div
            | Opcode::AddI
            | Opcode::MultI
            | Opcode::And
            | Opcode::Or
            | Opcode::CmpLT
            | Opcode::CmpLE
            | Opcode::CmpEQ
            | Opcode::CmpGE
            | Opcode::CmpGT
            | Opcode::CmpNE
            | Opcode::Phi => format!("  {m} {}, {} => {}", op(0), op(1), op(2)),
            Opcode::LoadI | Opcode::I2I | Opcode::Not | Opcode::Neg => {
                format!("  {m} {} => {}", op(0), op(1))
            }
            Opcode::Load => format!("  {m} [{}] => {}", op(0), op(1)),
            Opcode::LoadAI => format!("  {m} [{}{}] => {}", op(0), self.offset_text(1), op(2)),
            Opcode::LoadAO => format!("  {m} [{}+{}] => {}", op(0), op(1), op(2)),
            Opcode::Store => format!("  {m} {} => [{}]", op(0), op(1)),
            Opcode::StoreAI => format!("  {m} {} => [{}{}]", op(0), op(1), self.offset_text(2)),
            Opcode::StoreAO => format!("  {m} {} => [{}+{}]", op(0), op(1), op(2)),
            Opcode::Cbr => format!("  {m} {} => {}, {}", op(0), op(1), op(2)),
            Opcode::Jump | Opcode::Push | Opcode::Pop | Opcode::Call | Opcode::Print => {
                format!("  {m} {}", op(0))
            }
            Opcode::Return | Opcode::Nop => format!("  {m}"),
        }
    }

    pub fn render(&self, opts: &RenderOptions) -> String {
        let mut line = self.to_string();
        match &self.comment {
            Some(comment) if opts.show_comments && !comment.is_empty() => {
                let width = COMMENT_COLUMN.max(line.chars().count());
                line = format!("{line:<width$}// {comment}");
            }
            _ => {}
        }
        line
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.body())?;
        if let Some(name) = &self.var_name {
            write!(f, " {{{name}}}")?;
        }
        Ok(())
    }
}

impl Function {
    pub fn render(&self, opts: &RenderOptions) -> String {
        std::iter::once(format!("{}:", self.name()))
            .chain(self.instructions.iter().map(|i| i.render(opts)))
            .join("\n")
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(&RenderOptions { show_comments: false }))
    }
}

impl Program {
    pub fn render(&self, opts: &RenderOptions) -> String {
        self.functions.iter().map(|func| func.render(opts)).join("\n\n")
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(&RenderOptions { show_comments: false }))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::symbol::Symbol;
    use crate::ast::Type;

    fn r(i: u32) -> Operand {
        Operand::VirtualReg(i)
    }

    #[test]
    fn mnemonics() {
        let cases = [
            (Instruction::new(Opcode::Add, [r(1), r(2), r(3)]), "  add r1, r2 => r3"),
            (Instruction::new(Opcode::Sub, [r(1), r(2), r(3)]), "  sub r1, r2 => r3"),
            (Instruction::new(Opcode::Mult, [r(1), r(2), r(3)]), "  mult r1, r2 => r3"),
            (Instruction::new(Opcode::Div, [r(1), r(2), r(3)]), "  div r1, r2 => r3"),
            (Instruction::new(Opcode::AddI, [Operand::SP, Operand::int(-8), Operand::SP]), "  addI sp, -8 => sp"),
            (Instruction::new(Opcode::MultI, [r(1), Operand::int(4), r(2)]), "  multI r1, 4 => r2"),
            (Instruction::new(Opcode::And, [r(1), r(2), r(3)]), "  and r1, r2 => r3"),
            (Instruction::new(Opcode::Or, [r(1), r(2), r(3)]), "  or r1, r2 => r3"),
            (Instruction::new(Opcode::LoadI, [Operand::int(7), r(1)]), "  loadI 7 => r1"),
            (Instruction::new(Opcode::Load, [r(1), r(2)]), "  load [r1] => r2"),
            (Instruction::new(Opcode::LoadAI, [Operand::BP, Operand::int(-4), r(2)]), "  loadAI [bp-4] => r2"),
            (Instruction::new(Opcode::LoadAI, [Operand::BP, Operand::int(8), r(2)]), "  loadAI [bp+8] => r2"),
            (Instruction::new(Opcode::LoadAO, [r(1), r(2), r(3)]), "  loadAO [r1+r2] => r3"),
            (Instruction::new(Opcode::Store, [r(1), r(2)]), "  store r1 => [r2]"),
            (Instruction::new(Opcode::StoreAI, [r(1), Operand::BP, Operand::int(-12)]), "  storeAI r1 => [bp-12]"),
            (Instruction::new(Opcode::StoreAI, [r(1), Operand::BP, Operand::int(0)]), "  storeAI r1 => [bp+0]"),
            (Instruction::new(Opcode::StoreAO, [r(1), r(2), r(3)]), "  storeAO r1 => [r2+r3]"),
            (Instruction::new(Opcode::I2I, [Operand::SP, Operand::BP]), "  i2i sp => bp"),
            (Instruction::jump(Operand::JumpLabel(3)), "  jump l3"),
            (Instruction::new(Opcode::Cbr, [r(1), Operand::JumpLabel(1), Operand::JumpLabel(2)]), "  cbr r1 => l1, l2"),
            (Instruction::new(Opcode::CmpLT, [r(1), r(2), r(3)]), "  cmp_LT r1, r2 => r3"),
            (Instruction::new(Opcode::CmpLE, [r(1), r(2), r(3)]), "  cmp_LE r1, r2 => r3"),
            (Instruction::new(Opcode::CmpEQ, [r(1), r(2), r(3)]), "  cmp_EQ r1, r2 => r3"),
            (Instruction::new(Opcode::CmpGE, [r(1), r(2), r(3)]), "  cmp_GE r1, r2 => r3"),
            (Instruction::new(Opcode::CmpGT, [r(1), r(2), r(3)]), "  cmp_GT r1, r2 => r3"),
            (Instruction::new(Opcode::CmpNE, [r(1), r(2), r(3)]), "  cmp_NE r1, r2 => r3"),
            (Instruction::new(Opcode::Not, [r(1), r(2)]), "  not r1 => r2"),
            (Instruction::new(Opcode::Neg, [r(1), r(2)]), "  neg r1 => r2"),
            (Instruction::label(Operand::JumpLabel(4)), "l4:"),
            (Instruction::label(Operand::call_label("main")), "main:"),
            (Instruction::new(Opcode::Push, [Operand::BP]), "  push bp"),
            (Instruction::new(Opcode::Pop, [Operand::BP]), "  pop bp"),
            (Instruction::new(Opcode::Call, [Operand::call_label("add")]), "  call add"),
            (Instruction::new(Opcode::Return, []), "  return"),
            (Instruction::new(Opcode::Print, [Operand::string("a\"b\n")]), "  print \"a\\\"b\\n\""),
            (Instruction::new(Opcode::Nop, []), "  nop"),
            (Instruction::new(Opcode::Phi, [r(1), r(2), r(3)]), "  phi r1, r2 => r3"),
        ];
        for (inst, text) in cases {
            assert_eq!(inst.to_string(), text);
        }
    }

    #[test]
    fn debug_name_and_comment() {
        let inst = Instruction::new(Opcode::LoadAI, [Operand::BP, Operand::int(-4), r(1)])
            .with_var_name("a")
            .with_comment("load a");
        assert_eq!(inst.to_string(), "  loadAI [bp-4] => r1 {a}");
        let rendered = inst.render(&RenderOptions::default());
        assert_eq!(rendered, format!("{:<40}// load a", "  loadAI [bp-4] => r1 {a}"));
        assert_eq!(rendered.find("//"), Some(40));
        assert_eq!(
            inst.render(&RenderOptions { show_comments: false }),
            "  loadAI [bp-4] => r1 {a}"
        );
        let empty = Instruction::new(Opcode::Nop, []).with_comment("");
        assert_eq!(empty.render(&RenderOptions::default()), "  nop");
    }

    #[test]
    fn listings() {
        let f = |name: &str| {
            Function::new(
                Symbol::function(name, Type::Int, vec![]),
                0,
                vec![
                    Instruction::new(Opcode::LoadI, [Operand::int(1), Operand::RET]),
                    Instruction::new(Opcode::Return, []),
                ],
            )
        };
        let mut prog = Program::default();
        prog.add_function(f("one"));
        prog.add_function(f("main"));
        assert_eq!(
            prog.to_string(),
            "one:\n  loadI 1 => ret\n  return\n\nmain:\n  loadI 1 => ret\n  return"
        );
    }
}
