use crate::op::IROp;

/// Label of the program's entry block (§3).
pub const MAIN_LABEL: &str = ".main";
/// Sentinel label marking the end of the code segment, used by the
/// serializer to place the string table (§3).
pub const END_LABEL: &str = ".end";

/// A labeled, ordered run of [`IROp`]s. Labels are unique within a program.
#[derive(Clone, Debug, PartialEq)]
pub struct IRBlock {
    pub label: String,
    pub ops: Vec<IROp>,
}

impl IRBlock {
    fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ops: Vec::new(),
        }
    }
}

/// An IR program under construction: an ordered list of blocks plus a
/// "cursor" block that `emit` appends to.
///
/// New blocks are appended at the end (for functions and out-of-line
/// intrinsic bodies) or inserted immediately after the cursor (for inline
/// control-flow targets, so a block's continuation reads next to it).
pub struct IRCode {
    blocks: Vec<IRBlock>,
    /// The cursor, tracked by label rather than index: inserting a block
    /// ahead of the cursor in the list must never silently move it.
    cursor: String,
    label_count: u32,
}

impl Default for IRCode {
    fn default() -> Self {
        Self::new()
    }
}

impl IRCode {
    pub fn new() -> Self {
        Self {
            blocks: vec![IRBlock::new(MAIN_LABEL)],
            cursor: MAIN_LABEL.to_string(),
            label_count: 0,
        }
    }

    pub fn blocks(&self) -> &[IRBlock] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut [IRBlock] {
        &mut self.blocks
    }

    /// Keep only blocks whose label satisfies `keep`. The cursor is left
    /// alone — callers only prune after codegen has finished with it.
    pub fn retain_blocks(&mut self, keep: impl Fn(&str) -> bool) {
        self.blocks.retain(|b| keep(&b.label));
    }

    pub fn into_blocks(self) -> Vec<IRBlock> {
        self.blocks
    }

    fn index_of(&self, label: &str) -> usize {
        self.blocks
            .iter()
            .position(|b| b.label == label)
            .expect("cursor label always names a block created through this IRCode")
    }

    /// The cursor block's label.
    pub fn current_label(&self) -> &str {
        &self.cursor
    }

    /// Move the cursor to the block named `label`. No-op if it does not
    /// exist (callers only ever pass labels they themselves created).
    pub fn set_cursor(&mut self, label: &str) {
        if self.blocks.iter().any(|b| b.label == label) {
            self.cursor = label.to_string();
        }
    }

    /// Append an op to the cursor block.
    pub fn emit(&mut self, op: IROp) {
        let index = self.index_of(&self.cursor.clone());
        self.blocks[index].ops.push(op);
    }

    fn next_label(&mut self, hint: &str) -> String {
        self.label_count += 1;
        format!(".L{}_{hint}", self.label_count)
    }

    /// Append a fresh block at the end of the program and move the cursor
    /// to it, returning its label. Used for functions and out-of-line
    /// intrinsic bodies, which are never fallen into.
    pub fn append_block(&mut self, hint: &str) -> String {
        let label = self.next_label(hint);
        self.blocks.push(IRBlock::new(label.clone()));
        self.cursor = label.clone();
        label
    }

    /// Append a fresh block at the end of the program under an exact,
    /// caller-chosen label (rather than a counter-generated one) and move
    /// the cursor to it. Used for function and intrinsic blocks, whose
    /// labels must be predictable before the block exists (a forward
    /// reference stores the label in the symbol table before the body is
    /// visited).
    pub fn append_named_block(&mut self, label: impl Into<String>) -> String {
        let label = label.into();
        self.blocks.push(IRBlock::new(label.clone()));
        self.cursor = label.clone();
        label
    }

    /// Insert a fresh block directly after the cursor block and return its
    /// label, without moving the cursor. Used for inline branch targets
    /// (`if`/`while`/short-circuit join points) so the generated listing
    /// keeps related blocks adjacent.
    pub fn insert_block_after_cursor(&mut self, hint: &str) -> String {
        let after = self.cursor.clone();
        self.insert_block_after(&after, hint)
    }

    /// Insert a fresh block directly after the block named `after` and
    /// return its label, without moving the cursor. Lets callers control
    /// relative ordering of several join blocks precisely (e.g. an
    /// `if`/`else` join must follow the `else` block, not the `then`
    /// block), since the serializer concatenates blocks in list order and a
    /// non-terminated block falls through into whatever follows it.
    pub fn insert_block_after(&mut self, after: &str, hint: &str) -> String {
        let label = self.next_label(hint);
        let index = self
            .blocks
            .iter()
            .position(|b| b.label == after)
            .map(|i| i + 1)
            .unwrap_or(self.blocks.len());
        self.blocks.insert(index, IRBlock::new(label.clone()));
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_a_single_main_block() {
        let code = IRCode::new();
        assert_eq!(code.blocks().len(), 1);
        assert_eq!(code.blocks()[0].label, MAIN_LABEL);
        assert_eq!(code.current_label(), MAIN_LABEL);
    }

    #[test]
    fn insert_after_cursor_lands_immediately_after_it() {
        let mut code = IRCode::new();
        let else_label = code.insert_block_after_cursor("else");
        let end_label = code.insert_block_after(&else_label, "end");

        let labels: Vec<&str> = code.blocks().iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, [MAIN_LABEL, else_label.as_str(), end_label.as_str()]);
    }

    #[test]
    fn append_block_moves_the_cursor_and_does_not_disturb_earlier_inserts() {
        let mut code = IRCode::new();
        let end_label = code.insert_block_after_cursor("end");
        code.set_cursor(MAIN_LABEL);

        let func_label = code.append_block("func_f");
        assert_eq!(code.current_label(), func_label);

        code.set_cursor(&end_label);
        assert_eq!(code.current_label(), end_label);
    }

    #[test]
    fn emit_appends_to_the_cursor_block_only() {
        let mut code = IRCode::new();
        let other = code.append_block("other");
        code.emit(IROp::Halt);
        code.set_cursor(MAIN_LABEL);
        code.emit(IROp::Return);

        let main = &code.blocks()[0];
        assert_eq!(main.ops, vec![IROp::Return]);
        let other_block = code.blocks().iter().find(|b| b.label == other).unwrap();
        assert_eq!(other_block.ops, vec![IROp::Halt]);
    }
}
