use otsync_collab::OtArg;
use otsync_collab::OtOp;
use otsync_collab::Range;
use otsync_collab::TextEdit;

use crate::position::byte_offset_for_utf16;
use crate::position::position_at;

/// Translate a sequence of OT op components into editor [`TextEdit`]s,
/// addressing positions against `doc_data` as it stands *before this op
/// list is applied* (§4.3). Each component is interpreted against the
/// document as left by the components before it in the same list — this
/// is how ShareDB op components themselves compose — so positions are
/// recomputed against a running copy rather than all against the original
/// text.
#[must_use]
pub fn sharedb_to_editor(doc_data: &str, ops: &[OtOp]) -> Vec<TextEdit> {
    let mut edits = Vec::new();
    let mut text = doc_data.to_string();

    for op in ops {
        match op {
            OtOp::Arg(OtArg::Insert(s)) => apply_insert(&mut text, &mut edits, 0, s),
            OtOp::Arg(OtArg::Delete(n)) => apply_delete(&mut text, &mut edits, 0, *n),
            OtOp::Indexed(index, OtArg::Insert(s)) => apply_insert(&mut text, &mut edits, *index, s),
            OtOp::Indexed(index, OtArg::Delete(n)) => apply_delete(&mut text, &mut edits, *index, *n),
            OtOp::Replace(index, ins, del) => {
                apply_delete(&mut text, &mut edits, *index, *del);
                apply_insert(&mut text, &mut edits, *index, ins);
            }
        }
    }
    edits
}

fn apply_delete(text: &mut String, edits: &mut Vec<TextEdit>, index: usize, len: usize) {
    let start_pos = position_at(text, index);
    let end_pos = position_at(text, index + len);
    let start_byte = byte_offset_for_utf16(text, index);
    let end_byte = byte_offset_for_utf16(text, index + len);
    edits.push(TextEdit::new(Range::new(start_pos, end_pos), ""));
    text.replace_range(start_byte..end_byte, "");
}

fn apply_insert(text: &mut String, edits: &mut Vec<TextEdit>, index: usize, s: &str) {
    let pos = position_at(text, index);
    let byte = byte_offset_for_utf16(text, index);
    edits.push(TextEdit::new(Range::empty_at(pos), s));
    text.insert_str(byte, s);
}

#[cfg(test)]
mod tests {
    use otsync_collab::Position;

    use super::*;

    #[test]
    fn insert_op_produces_an_empty_range_edit() {
        let edits = sharedb_to_editor("hello", &[OtOp::Indexed(5, OtArg::Insert(" world".into()))]);
        assert_eq!(
            edits,
            vec![TextEdit::new(Range::empty_at(Position::new(0, 5)), " world")]
        );
    }

    #[test]
    fn delete_op_produces_a_non_empty_range_edit_with_empty_text() {
        let edits = sharedb_to_editor("hello world", &[OtOp::Indexed(5, OtArg::Delete(6))]);
        assert_eq!(
            edits,
            vec![TextEdit::new(Range::new(Position::new(0, 5), Position::new(0, 11)), "")]
        );
    }

    #[test]
    fn replace_op_expands_to_delete_then_insert_at_same_index() {
        let edits = sharedb_to_editor("AXC", &[OtOp::Replace(0, "ABC".into(), 3)]);
        assert_eq!(
            edits,
            vec![
                TextEdit::new(Range::new(Position::new(0, 0), Position::new(0, 3)), ""),
                TextEdit::new(Range::empty_at(Position::new(0, 0)), "ABC"),
            ]
        );
    }

    #[test]
    fn successive_ops_compose_against_the_running_document() {
        let edits = sharedb_to_editor(
            "hello",
            &[
                OtOp::Indexed(5, OtArg::Insert(" world".into())),
                OtOp::Indexed(0, OtArg::Insert(">> ".into())),
            ],
        );
        assert_eq!(edits[1], TextEdit::new(Range::empty_at(Position::new(0, 0)), ">> "));
    }
}
