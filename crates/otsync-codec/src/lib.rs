//! Lossless translation between editor text edits and ShareDB-style OT
//! ops — the one piece of the sync engine with no I/O and no shared
//! state, so it is kept as a small crate of pure functions rather than
//! folded into `otsync-project`.

mod diff;
mod editor_changes;
mod position;
mod sharedb;

pub use diff::minimal_diff;
pub use diff::minimal_diff_op;
pub use editor_changes::editor_changes_to_ops;
pub use editor_changes::EditorChange;
pub use position::byte_offset_for_utf16;
pub use position::position_at;
pub use position::utf16_len;
pub use sharedb::sharedb_to_editor;

#[cfg(test)]
mod roundtrip_tests {
    use otsync_collab::fake::FakeEditorHost;
    use otsync_collab::OtArg;
    use otsync_collab::OtOp;

    use super::*;

    #[tokio::test]
    async fn editor_changes_then_sharedb_reproduces_final_text() {
        // A single content change's offsets are unambiguous: no other
        // change in the batch can have shifted the document underneath it.
        let doc = "the quick fox";
        let changes = [EditorChange::new(4, 5, "slow")];
        let ops = editor_changes_to_ops(&changes);
        assert_eq!(
            ops,
            vec![
                OtOp::Indexed(4, OtArg::Delete(5)),
                OtOp::Indexed(4, OtArg::Insert("slow".into())),
            ]
        );

        let host = FakeEditorHost::new();
        let path = camino::Utf8PathBuf::from("scratch.txt");
        host.open_buffer(&path, doc);
        let edits = sharedb_to_editor(doc, &ops);
        host.apply_edits(&path, edits).await.unwrap();
        assert_eq!(host.open_buffer_contents(&path).await.unwrap().as_deref(), Some("the slow fox"));
    }
}
