use otsync_collab::OtArg;
use otsync_collab::OtOp;

/// Compute the minimal single-replace OT op that turns `old` into `new`:
/// find the longest common prefix `P` and suffix `S` (with `P + S`
/// clamped to `min(len(old), len(new))` so they never overlap), then
/// replace the `len(old) - P - S` characters between them with whatever
/// of `new` falls between the same two boundaries.
///
/// Used by `otsync-project`'s `write` to shrink a whole-buffer replace
/// into the smallest edit that reproduces it, instead of submitting a
/// full delete-and-reinsert every time the editor hands over an entire
/// new file body.
#[must_use]
pub fn minimal_diff(old: &str, new: &str) -> OtOp {
    let old_units: Vec<u16> = old.encode_utf16().collect();
    let new_units: Vec<u16> = new.encode_utf16().collect();
    let max_shared = old_units.len().min(new_units.len());

    let mut prefix = 0usize;
    while prefix < max_shared && old_units[prefix] == new_units[prefix] {
        prefix += 1;
    }

    let mut suffix = 0usize;
    while suffix < max_shared - prefix
        && old_units[old_units.len() - 1 - suffix] == new_units[new_units.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let del_len = old_units.len() - prefix - suffix;
    let insert_units = &new_units[prefix..new_units.len() - suffix];
    let insert_text = String::from_utf16_lossy(insert_units);

    OtOp::Replace(prefix, insert_text, del_len)
}

/// Decompose a [`minimal_diff`] result back into a `[index, arg]` pair
/// when it is a pure insert or pure delete, matching the wire shapes a
/// real OT server would rather receive than a `Replace` with a zero-length
/// side. `otsync-project::write` prefers this when one side is empty.
#[must_use]
pub fn minimal_diff_op(old: &str, new: &str) -> OtOp {
    match minimal_diff(old, new) {
        OtOp::Replace(index, ins, 0) => OtOp::Indexed(index, OtArg::Insert(ins)),
        OtOp::Replace(index, ins, del) if ins.is_empty() => OtOp::Indexed(index, OtArg::Delete(del)),
        other => other,
    }
}
