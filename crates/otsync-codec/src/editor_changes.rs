use otsync_collab::OtArg;
use otsync_collab::OtOp;

/// One content-change event as reported by an editor host: `range_offset`
/// and `range_length` are UTF-16 code-unit offsets into the
/// *pre-batch, original* document — not the document as modified by any
/// earlier change in the same batch (§4.3's "as-supplied by the editor"
/// note).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditorChange {
    pub range_offset: usize,
    pub range_length: usize,
    pub text: String,
}

impl EditorChange {
    #[must_use]
    pub fn new(range_offset: usize, range_length: usize, text: impl Into<String>) -> Self {
        Self { range_offset, range_length, text: text.into() }
    }
}

/// Translate a batch of editor content changes into OT ops, in the order
/// an editor host would emit them: for each change, a delete component
/// (if the replaced range was non-empty) followed by an insert component
/// (if the replacement text is non-empty). A change that replaces nothing
/// with nothing contributes no op.
#[must_use]
pub fn editor_changes_to_ops(changes: &[EditorChange]) -> Vec<OtOp> {
    let mut ops = Vec::new();
    for change in changes {
        if change.range_length > 0 {
            ops.push(OtOp::Indexed(change.range_offset, OtArg::Delete(change.range_length)));
        }
        if !change.text.is_empty() {
            ops.push(OtOp::Indexed(change.range_offset, OtArg::Insert(change.text.clone())));
        }
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_insert_emits_only_an_insert_op() {
        let ops = editor_changes_to_ops(&[EditorChange::new(5, 0, "hi")]);
        assert_eq!(ops, vec![OtOp::Indexed(5, OtArg::Insert("hi".into()))]);
    }

    #[test]
    fn pure_delete_emits_only_a_delete_op() {
        let ops = editor_changes_to_ops(&[EditorChange::new(5, 3, "")]);
        assert_eq!(ops, vec![OtOp::Indexed(5, OtArg::Delete(3))]);
    }

    #[test]
    fn replace_emits_delete_then_insert() {
        let ops = editor_changes_to_ops(&[EditorChange::new(5, 3, "xyz")]);
        assert_eq!(
            ops,
            vec![OtOp::Indexed(5, OtArg::Delete(3)), OtOp::Indexed(5, OtArg::Insert("xyz".into()))]
        );
    }

    #[test]
    fn empty_change_emits_nothing() {
        let ops = editor_changes_to_ops(&[EditorChange::new(5, 0, "")]);
        assert!(ops.is_empty());
    }

    #[test]
    fn multiple_changes_preserve_event_order() {
        let ops = editor_changes_to_ops(&[EditorChange::new(0, 1, "a"), EditorChange::new(10, 0, "b")]);
        assert_eq!(
            ops,
            vec![
                OtOp::Indexed(0, OtArg::Delete(1)),
                OtOp::Indexed(0, OtArg::Insert("a".into())),
                OtOp::Indexed(10, OtArg::Insert("b".into())),
            ]
        );
    }
}
