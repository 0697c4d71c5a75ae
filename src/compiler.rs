//! Block program compiler.
//!
//! Turns an ordered block list into a [`CompiledProgram`]: the executable
//! instruction list plus summary statistics and a readable listing. The
//! transform is pure and total; malformed nesting (an unmatched `loop-end`,
//! an unterminated `loop-start`) only changes how the listing is indented
//! and how durations are multiplied, it never fails.

use serde::Serialize;

use crate::blocks::{Block, BlockKind};

/// One executable step: the block's parameters, where it came from and how
/// deeply it is nested in loops.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    pub index: usize,
    pub block_id: u32,
    pub depth: usize,
    pub kind: BlockKind,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledProgram {
    instructions: Vec<Instruction>,
    compiled: String,
    block_count: usize,
    loop_count: usize,
    estimated_duration_ms: f64,
}

impl CompiledProgram {
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn instruction(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    /// Line-per-instruction listing, loop bodies indented two spaces per level.
    pub fn compiled(&self) -> &str {
        &self.compiled
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    pub fn loop_count(&self) -> usize {
        self.loop_count
    }

    pub fn estimated_duration_ms(&self) -> f64 {
        self.estimated_duration_ms
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn summary(&self) -> String {
        effect_summary(self)
    }
}

pub fn compile(blocks: &[Block]) -> CompiledProgram {
    let mut instructions = Vec::with_capacity(blocks.len());
    let mut lines = Vec::with_capacity(blocks.len());
    // Iteration counts of the loops enclosing the current block
    let mut open_loops: Vec<u32> = Vec::new();
    let mut loop_count = 0;
    let mut estimated_duration_ms = 0.0;

    for (index, block) in blocks.iter().enumerate() {
        if block.kind == BlockKind::LoopEnd {
            open_loops.pop();
        }

        let depth = open_loops.len();
        let repeats: f64 = open_loops.iter().map(|count| f64::from(*count)).product();
        estimated_duration_ms += block.kind.nominal_duration_ms() * repeats;

        lines.push(format!("{}{index}: {}", "  ".repeat(depth), block.kind));
        instructions.push(Instruction {
            index,
            block_id: block.id,
            depth,
            kind: block.kind.clone(),
        });

        if let BlockKind::LoopStart(params) = &block.kind {
            loop_count += 1;
            open_loops.push(params.iterations());
        }
    }

    CompiledProgram {
        instructions,
        compiled: lines.join("\n"),
        block_count: blocks.len(),
        loop_count,
        estimated_duration_ms,
    }
}

/// Single-line digest, e.g. `7 blocks · 2 loops · ~4.2s`.
pub fn effect_summary(program: &CompiledProgram) -> String {
    format!(
        "{} · {} · ~{:.1}s",
        plural(program.block_count, "block"),
        plural(program.loop_count, "loop"),
        program.estimated_duration_ms / 1000.0
    )
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
