use std::collections::HashSet;

use crate::code::{IRCode, MAIN_LABEL};

/// Maximum number of fixed-point rounds before giving up (§4.9); a genuine
/// program never needs more than a handful.
const MAX_ITERATIONS: u32 = 256;

/// Truncate every block's ops to end at its first terminator. Returns
/// whether anything changed.
fn eliminate_unreachable_ops(code: &mut IRCode) -> bool {
    let mut changed = false;

    for block in code.blocks_mut() {
        if let Some(cut) = block.ops.iter().position(|op| op.is_terminator()) {
            if cut + 1 < block.ops.len() {
                block.ops.truncate(cut + 1);
                changed = true;
            }
        }
    }

    changed
}

/// Drop blocks unreachable from `.main`, where a block is reachable if it
/// is referenced by a label op somewhere reachable, or it immediately
/// follows a reachable block that does not end in a terminator
/// (fall-through). Returns whether anything changed.
fn eliminate_unreachable_blocks(code: &mut IRCode) -> bool {
    let blocks = code.blocks();
    let mut reachable: HashSet<String> = HashSet::new();
    let mut frontier = vec![MAIN_LABEL.to_string()];

    while let Some(label) = frontier.pop() {
        if !reachable.insert(label.clone()) {
            continue;
        }

        let Some(index) = blocks.iter().position(|b| b.label == label) else {
            continue;
        };
        let block = &blocks[index];

        for op in &block.ops {
            if let Some(target) = op.label_ref() {
                if !reachable.contains(target) {
                    frontier.push(target.to_string());
                }
            }
        }

        let falls_through = block.ops.last().map(|op| !op.is_terminator()).unwrap_or(true);
        if falls_through {
            if let Some(next) = blocks.get(index + 1) {
                if !reachable.contains(&next.label) {
                    frontier.push(next.label.clone());
                }
            }
        }
    }

    let before = code.blocks().len();
    code.retain_blocks(|label| reachable.contains(label));
    code.blocks().len() != before
}

/// Run the optimizer's fixed-point loop (§4.9): repeatedly truncate
/// unreachable ops within blocks and drop unreachable blocks until neither
/// pass changes anything, or the iteration bound is hit.
pub fn optimize(code: &mut IRCode) {
    let mut iterations = MAX_ITERATIONS;

    loop {
        if iterations == 0 {
            break;
        }
        iterations -= 1;

        let a = eliminate_unreachable_ops(code);
        let b = eliminate_unreachable_blocks(code);

        if !a && !b {
            break;
        }
    }
}
