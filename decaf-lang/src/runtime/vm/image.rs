use std::collections::HashMap;

use crate::iloc::{Instruction, LabelId, Operand, Program};
use crate::runtime::ErrorKind;

/// Every function of a program laid out in one instruction array, each headed
/// by a label carrying its name, with lookup tables for calls and jumps.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CodeImage {
    pub code: Vec<Instruction>,
    call_targets: HashMap<String, usize>,
    jump_targets: HashMap<LabelId, usize>,
}

impl CodeImage {
    /// Fails when a function name or a jump label is defined twice.
    pub fn load(program: &Program) -> Result<Self, ErrorKind> {
        let mut image = Self::default();
        for func in program.functions.iter() {
            let entry = image.code.len();
            if image
                .call_targets
                .insert(func.name().to_string(), entry)
                .is_some()
            {
                return Err(ErrorKind::DuplicateFunction(func.name().to_string()));
            }
            image
                .code
                .push(Instruction::label(Operand::call_label(func.name())));
            for inst in func.instructions.iter() {
                if let Some(label) = inst.defined_label() {
                    if image.jump_targets.insert(label, image.code.len()).is_some() {
                        return Err(ErrorKind::DuplicateLabel(label));
                    }
                }
                image.code.push(inst.clone());
            }
        }
        Ok(image)
    }
    pub fn get_call_target(&self, name: &str) -> Option<usize> {
        self.call_targets.get(name).copied()
    }
    pub fn get_jump_target(&self, label: LabelId) -> Option<usize> {
        self.jump_targets.get(&label).copied()
    }
    pub fn fetch(&self, ip: i32) -> Option<&Instruction> {
        usize::try_from(ip).ok().and_then(|i| self.code.get(i))
    }
}

impl std::fmt::Display for CodeImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, inst) in self.code.iter().enumerate() {
            writeln!(f, "{i:4}: {inst}")?;
        }
        Ok(())
    }
}
