//! Basic blocks and control-flow graphs over a function's linear code.
//!
//! Blocks live in a slot map and refer to each other by key, so graph edits
//! never have to fight over shared ownership. Each block owns copies of its
//! instructions; the function's linear list is left untouched until
//! [`Cfg::flatten`] writes a new one.
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use itertools::Itertools;
use slotmap::{new_key_type, SlotMap};

use super::{IdAllocator, Instruction, LabelId, Opcode, Operand};
use crate::utils::{error::ReportableError, metadata::Span};

new_key_type! {pub struct BlockKey;}

#[derive(Clone, Debug, PartialEq)]
pub struct BasicBlock {
    pub id: u32,
    pub instructions: Vec<Instruction>,
    pub predecessors: Vec<BlockKey>,
    pub successors: Vec<BlockKey>,
}

impl BasicBlock {
    fn new(id: u32) -> Self {
        Self {
            id,
            instructions: vec![],
            predecessors: vec![],
            successors: vec![],
        }
    }
    pub fn leading_label(&self) -> Option<LabelId> {
        self.instructions.first().and_then(Instruction::defined_label)
    }
    /// Whether control may run off the end of the block into whatever follows it.
    pub fn falls_through(&self) -> bool {
        !self.instructions.last().is_some_and(Instruction::is_branch)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CfgError {
    UnresolvedLabel(LabelId),
    DuplicateLabel(LabelId),
    EmptyBlock(u32),
    MissingLeadingLabel(u32),
}

impl fmt::Display for CfgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CfgError::UnresolvedLabel(id) => write!(f, "jump to undefined label l{id}"),
            CfgError::DuplicateLabel(id) => write!(f, "label l{id} is defined more than once"),
            CfgError::EmptyBlock(id) => write!(f, "basic block B{id} has no instructions"),
            CfgError::MissingLeadingLabel(id) => {
                write!(f, "basic block B{id} is a jump target but does not start with a label")
            }
        }
    }
}

impl std::error::Error for CfgError {}

impl ReportableError for CfgError {
    fn get_labels(&self) -> Vec<(Span, String)> {
        vec![]
    }
}

#[derive(Clone, Debug)]
pub struct Cfg {
    blocks: SlotMap<BlockKey, BasicBlock>,
    /// All blocks in the order they appeared in the linear code.
    order: Vec<BlockKey>,
    entry: BlockKey,
}

impl Cfg {
    /// Splits `instructions` at every leader and links the resulting blocks.
    /// Each jump label may be defined only once.
    pub fn build(instructions: &[Instruction], ids: &mut IdAllocator) -> Result<Self, CfgError> {
        let mut blocks = SlotMap::with_key();
        let entry = blocks.insert(BasicBlock::new(ids.new_block_id()));
        let mut order = vec![entry];
        let mut by_label = HashMap::new();
        let mut current = entry;

        let prevs = std::iter::once(None).chain(instructions.iter().map(Some));
        for (prev, inst) in prevs.zip(instructions) {
            let is_leader = prev.is_some_and(|p| p.is_branch() || inst.opcode == Opcode::Label);
            if is_leader {
                current = blocks.insert(BasicBlock::new(ids.new_block_id()));
                order.push(current);
            }
            if let Some(label) = inst.defined_label() {
                if by_label.insert(label, current).is_some() {
                    return Err(CfgError::DuplicateLabel(label));
                }
            }
            blocks[current].instructions.push(inst.clone());
        }

        let mut cfg = Self {
            blocks,
            order,
            entry,
        };
        for (pos, &key) in cfg.order.clone().iter().enumerate() {
            let block = &cfg.blocks[key];
            let targets = if block.falls_through() {
                cfg.order.get(pos + 1).copied().into_iter().collect_vec()
            } else {
                let last = block.instructions.last().map(Instruction::jump_targets);
                last.unwrap_or_default()
                    .into_iter()
                    .map(|label| by_label.get(&label).copied().ok_or(CfgError::UnresolvedLabel(label)))
                    .collect::<Result<Vec<_>, _>>()?
            };
            for target in targets {
                cfg.add_edge(key, target);
            }
        }
        Ok(cfg)
    }

    pub fn entry(&self) -> BlockKey {
        self.entry
    }
    pub fn len(&self) -> usize {
        self.order.len()
    }
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
    pub fn block(&self, key: BlockKey) -> &BasicBlock {
        &self.blocks[key]
    }
    pub fn block_mut(&mut self, key: BlockKey) -> &mut BasicBlock {
        &mut self.blocks[key]
    }
    /// Blocks in their original program order.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockKey, &BasicBlock)> {
        self.order.iter().map(|&k| (k, &self.blocks[k]))
    }
    pub fn find_by_label(&self, label: LabelId) -> Option<BlockKey> {
        self.blocks()
            .find(|(_, b)| b.leading_label() == Some(label))
            .map(|(k, _)| k)
    }

    /// Adds `from -> to` unless the edge already exists.
    pub fn add_edge(&mut self, from: BlockKey, to: BlockKey) {
        if !self.blocks[from].successors.contains(&to) {
            self.blocks[from].successors.push(to);
        }
        if !self.blocks[to].predecessors.contains(&from) {
            self.blocks[to].predecessors.push(from);
        }
    }

    /// Breadth-first order from the entry; unreachable blocks are left out.
    pub fn traversal_order(&self) -> Vec<BlockKey> {
        let mut queue = VecDeque::from([self.entry]);
        let mut handled = HashSet::new();
        let mut res = vec![];
        while let Some(key) = queue.pop_front() {
            if !handled.insert(key) {
                continue;
            }
            res.push(key);
            queue.extend(
                self.blocks[key]
                    .successors
                    .iter()
                    .filter(|s| !handled.contains(*s)),
            );
        }
        res
    }

    /// Lays the reachable blocks out in traversal order. A block that used to
    /// fall through into a block which is no longer placed right after it gets
    /// an explicit jump to that block's label.
    pub fn flatten(&self) -> Result<Vec<Instruction>, CfgError> {
        let order = self.traversal_order();
        let mut code = vec![];
        for (i, &key) in order.iter().enumerate() {
            let block = &self.blocks[key];
            if block.instructions.is_empty() {
                return Err(CfgError::EmptyBlock(block.id));
            }
            code.extend(block.instructions.iter().cloned());
            if !block.falls_through() {
                continue;
            }
            if let [next] = block.successors.as_slice() {
                if order.get(i + 1) == Some(next) {
                    continue;
                }
                let target = &self.blocks[*next];
                if target.instructions.is_empty() {
                    return Err(CfgError::EmptyBlock(target.id));
                }
                let label = target
                    .leading_label()
                    .ok_or(CfgError::MissingLeadingLabel(target.id))?;
                code.push(Instruction::jump(Operand::JumpLabel(label)).with_comment("new jump"));
            }
        }
        Ok(code)
    }
}

impl fmt::Display for Cfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name_of = |keys: &[BlockKey]| keys.iter().map(|k| format!("B{}", self.blocks[*k].id)).join(" ");
        for (key, block) in self.blocks() {
            let entry = if key == self.entry { " (entry)" } else { "" };
            writeln!(
                f,
                "B{}{entry}  preds: [{}]  succs: [{}]",
                block.id,
                name_of(block.predecessors.as_slice()),
                name_of(block.successors.as_slice())
            )?;
            for inst in block.instructions.iter() {
                writeln!(f, "{inst}")?;
            }
        }
        Ok(())
    }
}
