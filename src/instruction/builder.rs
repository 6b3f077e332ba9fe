//! Incremental construction of an optimized [`Chunk`].

use tracing::trace;

use super::{Chunk, Instruction};

/// Builds a [`Chunk`] one source operation at a time, optimizing as it goes.
///
/// Local rewrites happen on every append (see [`ChunkBuilder::optimized_push`]),
/// loop-level ones when a loop is closed. Misusing the builder (closing a loop
/// that was never opened, finalizing with open loops) is a bug in the caller
/// and panics.
#[derive(Debug, Default)]
pub struct ChunkBuilder {
    ins: Vec<Instruction>,
    // indices of the StartLoop instructions of currently open loops
    loop_stack: Vec<usize>,
    // pointer movement not yet materialized into an instruction
    offset: isize,
}

impl ChunkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether every opened loop has been closed.
    pub fn can_finalize(&self) -> bool {
        self.loop_stack.is_empty()
    }

    pub fn finalize(self) -> Chunk {
        assert!(
            self.can_finalize(),
            "chunk builder: can't finalize chunk because of {} unclosed loop(s)",
            self.loop_stack.len()
        );

        Chunk {
            instructions: self.ins.into_boxed_slice(),
        }
    }

    pub fn change_value(&mut self, delta: i8) {
        self.optimized_push(Instruction::ChangeValue {
            offset: self.offset,
            delta,
        });
    }

    pub fn change_pointer(&mut self, delta: isize) {
        self.offset += delta;
    }

    pub fn input_byte(&mut self) {
        self.optimized_push(Instruction::InputByte {
            offset: self.offset,
        });
    }

    pub fn output_byte(&mut self) {
        self.ins.push(Instruction::OutputByte {
            offset: self.offset,
        });
    }

    pub fn start_loop(&mut self) {
        self.loop_stack.push(self.ins.len());
        self.ins.push(Instruction::StartLoop {
            offset: self.offset,
        });
        self.offset = 0;
    }

    pub fn end_loop(&mut self) {
        let Some(start) = self.loop_stack.pop() else {
            panic!("chunk builder: unexpected end of loop, no loop is open");
        };
        let Instruction::StartLoop { offset: entry } = self.ins[start] else {
            unreachable!("loop stack points at {:?}", self.ins[start]);
        };

        if self.is_dead_loop(start, entry) {
            trace!(start, entry, "removing loop that is never entered");
            self.ins.truncate(start);
            self.offset = entry;
            return;
        }

        if self.is_clear_loop(start) {
            trace!(start, entry, "replacing clear loop");
            self.ins.truncate(start);
            self.offset = entry;
            self.optimized_push(Instruction::SetValue {
                offset: entry,
                value: 0,
            });
            return;
        }

        self.ins.push(Instruction::EndLoop {
            offset: self.offset,
        });
        self.offset = 0;
    }

    // All cells start at zero, so a loop in front of everything never runs. The
    // same holds right after a loop (it only exits on a zero cell) or a clear
    // of the cell the loop tests.
    fn is_dead_loop(&self, start: usize, entry: isize) -> bool {
        let Some(prev) = start.checked_sub(1).map(|idx| &self.ins[idx]) else {
            return true;
        };
        if prev.mem_offset() != entry {
            return false;
        }

        matches!(
            prev,
            Instruction::SetValue { value: 0, .. } | Instruction::EndLoop { .. }
        )
    }

    // `[-]`, `[+]` and friends: the body leaves the pointer where it was and only
    // changes the tested cell, so the loop just zeroes it.
    fn is_clear_loop(&self, start: usize) -> bool {
        self.offset == 0
            && matches!(
                self.ins[start + 1..],
                [Instruction::ChangeValue { offset: 0, .. }]
            )
    }

    /// Appends `ins`, merging it with (or letting it replace) the previous
    /// instruction when both act on the same cell.
    ///
    /// After a merge or replacement the result is pushed again, so it keeps
    /// folding into earlier writes of the same cell. A replaced `Input Byte` is
    /// never read: `,+,.` consumes one byte of input, not two.
    fn optimized_push(&mut self, ins: Instruction) {
        if let Instruction::ChangeValue { delta: 0, .. } = ins {
            return;
        }

        let Some(&last) = self.ins.last() else {
            self.ins.push(ins);
            return;
        };
        if last.mem_offset() != ins.mem_offset() {
            self.ins.push(ins);
            return;
        }

        match (last, ins) {
            (
                Instruction::ChangeValue { delta: prev, .. },
                Instruction::ChangeValue { offset, delta },
            ) => {
                self.ins.pop();
                self.optimized_push(Instruction::ChangeValue {
                    offset,
                    delta: prev.wrapping_add(delta),
                });
            }
            (
                Instruction::SetValue { value, .. },
                Instruction::ChangeValue { offset, delta },
            ) => {
                self.ins.pop();
                self.optimized_push(Instruction::SetValue {
                    offset,
                    value: value.wrapping_add_signed(delta),
                });
            }
            (
                Instruction::ChangeValue { .. }
                | Instruction::SetValue { .. }
                | Instruction::InputByte { .. },
                Instruction::SetValue { .. } | Instruction::InputByte { .. },
            ) => {
                // whatever the last write was, it's overwritten now
                self.ins.pop();
                self.optimized_push(ins);
            }
            _ => self.ins.push(ins),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ChunkBuilder;
    use crate::instruction::{Chunk, Instruction};
    use arbitrary::Arbitrary;
    use arbtest::arbtest;
    use assert2::{assert, check};

    use Instruction::*;

    #[derive(Debug, Clone, Copy, Arbitrary)]
    enum Op {
        Inc,
        Dec,
        Left,
        Right,
        Read,
        Write,
        Loop,
    }

    /// Feed arbitrary (but balanced) operations to a builder.
    fn build(ops: &[Op], depth: usize) -> ChunkBuilder {
        fn feed(builder: &mut ChunkBuilder, ops: &[Op], depth: usize) {
            for (idx, op) in ops.iter().enumerate() {
                match op {
                    Op::Inc => builder.change_value(1),
                    Op::Dec => builder.change_value(-1),
                    Op::Left => builder.change_pointer(-1),
                    Op::Right => builder.change_pointer(1),
                    Op::Read => builder.input_byte(),
                    Op::Write => builder.output_byte(),
                    Op::Loop if depth > 0 => {
                        // the loop body is a slice of what follows
                        let body = &ops[idx + 1..(idx + 4).min(ops.len())];
                        builder.start_loop();
                        feed(builder, body, depth - 1);
                        builder.end_loop();
                    }
                    Op::Loop => {}
                }
            }
        }

        let mut builder = ChunkBuilder::new();
        feed(&mut builder, ops, depth);
        builder
    }

    fn chunk(f: impl FnOnce(&mut ChunkBuilder)) -> Vec<Instruction> {
        let mut builder = ChunkBuilder::new();
        f(&mut builder);
        builder.finalize().as_slice().to_vec()
    }

    #[test]
    fn pointer_moves_are_folded_into_offsets() {
        let ins = chunk(|b| {
            b.change_pointer(1);
            b.change_pointer(1);
            b.change_value(1);
            b.change_pointer(-3);
            b.output_byte();
        });
        check!(
            ins == [
                ChangeValue {
                    offset: 2,
                    delta: 1
                },
                OutputByte { offset: -1 }
            ]
        );
    }

    #[test]
    fn merges_value_changes() {
        let ins = chunk(|b| {
            b.change_value(1);
            b.change_value(1);
            b.change_value(1);
            b.change_pointer(1);
            b.change_value(-1);
            b.change_value(-1);
        });
        check!(
            ins == [
                ChangeValue {
                    offset: 0,
                    delta: 3
                },
                ChangeValue {
                    offset: 1,
                    delta: -2
                }
            ]
        );
    }

    #[test]
    fn value_changes_wrap() {
        let ins = chunk(|b| {
            b.change_value(127);
            b.change_value(1);
        });
        check!(
            ins == [ChangeValue {
                offset: 0,
                delta: -128
            }]
        );
    }

    #[test]
    fn cancelling_changes_vanish() {
        let ins = chunk(|b| {
            b.output_byte();
            b.change_value(1);
            b.change_value(-1);
            b.change_value(0);
        });
        check!(ins == [OutputByte { offset: 0 }]);
    }

    #[test]
    fn output_is_never_merged() {
        let ins = chunk(|b| {
            b.change_value(1);
            b.output_byte();
            b.output_byte();
            b.change_value(1);
        });
        check!(ins.len() == 4);
    }

    #[test]
    fn set_absorbs_changes() {
        let ins = chunk(|b| {
            b.change_value(1);
            b.start_loop();
            b.change_value(-1);
            b.end_loop();
            b.change_value(-1);
            b.change_value(-1);
        });
        check!(ins == [SetValue { offset: 0, value: 254 }]);
    }

    #[test]
    fn input_supersedes_previous_writes() {
        let ins = chunk(|b| {
            b.change_value(5);
            b.input_byte();
        });
        check!(ins == [InputByte { offset: 0 }]);

        // the exposed instruction is checked again
        let ins = chunk(|b| {
            b.input_byte();
            b.change_value(1);
            b.input_byte();
        });
        check!(ins == [InputByte { offset: 0 }]);
    }

    #[test]
    fn first_loop_is_dead() {
        let ins = chunk(|b| {
            b.change_pointer(3);
            b.start_loop();
            b.change_pointer(1);
            b.output_byte();
            b.end_loop();
            b.change_value(1);
        });
        check!(
            ins == [ChangeValue {
                offset: 3,
                delta: 1
            }]
        );
    }

    #[test]
    fn loop_after_loop_is_dead() {
        let ins = chunk(|b| {
            b.change_value(1);
            b.start_loop();
            b.change_pointer(1);
            b.end_loop();
            b.start_loop();
            b.output_byte();
            b.end_loop();
        });
        check!(
            ins == [
                ChangeValue {
                    offset: 0,
                    delta: 1
                },
                StartLoop { offset: 0 },
                EndLoop { offset: 1 }
            ]
        );
    }

    #[test]
    fn loop_after_loop_elsewhere_is_kept() {
        let ins = chunk(|b| {
            b.change_value(1);
            b.start_loop();
            b.change_pointer(1);
            b.end_loop();
            b.change_pointer(1);
            b.start_loop();
            b.output_byte();
            b.end_loop();
        });
        check!(ins.len() == 6);
        check!(ins[3] == StartLoop { offset: 1 });
    }

    #[test]
    fn loop_after_clear_is_dead() {
        let ins = chunk(|b| {
            b.input_byte();
            b.change_pointer(1);
            b.change_value(1);
            b.start_loop();
            b.change_value(-1);
            b.end_loop();
            b.start_loop();
            b.output_byte();
            b.end_loop();
            b.change_pointer(-1);
            b.output_byte();
        });
        check!(
            ins == [
                InputByte { offset: 0 },
                SetValue { offset: 1, value: 0 },
                OutputByte { offset: 0 }
            ]
        );
    }

    #[test]
    fn clear_loop_needs_single_change_at_entry() {
        // `[>+<]` changes a neighbour, not the tested cell
        let ins = chunk(|b| {
            b.input_byte();
            b.start_loop();
            b.change_pointer(1);
            b.change_value(1);
            b.change_pointer(-1);
            b.end_loop();
        });
        check!(
            ins == [
                InputByte { offset: 0 },
                StartLoop { offset: 0 },
                ChangeValue {
                    offset: 1,
                    delta: 1
                },
                EndLoop { offset: 0 }
            ]
        );

        // an empty body is just a loop
        let ins = chunk(|b| {
            b.input_byte();
            b.start_loop();
            b.end_loop();
        });
        check!(ins == [InputByte { offset: 0 }, StartLoop { offset: 0 }, EndLoop { offset: 0 }]);
    }

    #[test]
    fn clear_loop_keeps_entry_offset() {
        let ins = chunk(|b| {
            b.output_byte();
            b.change_pointer(2);
            b.start_loop();
            b.change_value(1);
            b.end_loop();
            b.change_value(7);
        });
        check!(
            ins == [
                OutputByte { offset: 0 },
                SetValue { offset: 2, value: 7 }
            ]
        );
    }

    #[test]
    fn nested_loops_restore_offsets() {
        let ins = chunk(|b| {
            b.input_byte();
            b.start_loop();
            b.change_pointer(1);
            b.start_loop();
            b.change_value(-1);
            b.end_loop();
            b.change_pointer(1);
            b.output_byte();
            b.end_loop();
        });
        check!(
            ins == [
                InputByte { offset: 0 },
                StartLoop { offset: 0 },
                SetValue { offset: 1, value: 0 },
                OutputByte { offset: 2 },
                EndLoop { offset: 2 }
            ]
        );
    }

    #[test]
    #[should_panic(expected = "no loop is open")]
    fn end_loop_without_start_panics() {
        ChunkBuilder::new().end_loop();
    }

    #[test]
    #[should_panic(expected = "unclosed loop")]
    fn finalize_with_open_loop_panics() {
        let mut builder = ChunkBuilder::new();
        builder.start_loop();
        builder.finalize();
    }

    #[test]
    fn net_value_change_is_one_instruction() {
        arbtest(|u| {
            let steps: Vec<bool> = u.arbitrary()?;
            let ins = chunk(|b| {
                for &inc in &steps {
                    b.change_value(if inc { 1 } else { -1 });
                }
            });

            let net = steps
                .iter()
                .fold(0i8, |acc, &inc| acc.wrapping_add(if inc { 1 } else { -1 }));
            if net == 0 {
                assert!(ins.is_empty());
            } else {
                assert!(ins == [ChangeValue { offset: 0, delta: net }]);
            }
            Ok(())
        });
    }

    #[test]
    fn optimizing_twice_changes_nothing() {
        arbtest(|u| {
            let ops: Vec<Op> = u.arbitrary()?;
            let optimized: Chunk = build(&ops, 3).finalize();

            let mut again = ChunkBuilder::new();
            for &ins in optimized.iter() {
                match ins {
                    ChangeValue { .. } | SetValue { .. } | InputByte { .. } => {
                        again.optimized_push(ins)
                    }
                    OutputByte { .. } | StartLoop { .. } | EndLoop { .. } => again.ins.push(ins),
                }
            }

            assert!(again.ins == optimized.as_slice());
            Ok(())
        });
    }

    #[test]
    fn loops_stay_balanced() {
        arbtest(|u| {
            let ops: Vec<Op> = u.arbitrary()?;
            let optimized = build(&ops, 3).finalize();

            let mut depth = 0usize;
            for ins in &optimized {
                match ins {
                    StartLoop { .. } => depth += 1,
                    EndLoop { .. } => {
                        assert!(depth > 0);
                        depth -= 1;
                    }
                    _ => {}
                }
            }
            assert!(depth == 0);
            Ok(())
        });
    }
}
