use serde::Deserialize;
use serde::Serialize;

use crate::ids::ItemId;
use crate::ids::UniqueId;

/// Server-side description of one tree node, as handed back by the REST
/// API and the messenger.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Asset {
    pub unique_id: UniqueId,
    pub item_id: ItemId,
    pub kind: AssetKind,
    pub name: String,
    /// Ancestor ids, root-to-leaf. May contain duplicates (the server
    /// sometimes repeats an ancestor); callers must deduplicate, preserving
    /// first-occurrence order, before folding this into a path.
    pub path: Vec<ItemId>,
    /// `None` for folders.
    pub file: Option<AssetFile>,
    pub branch_id: String,
}

impl Asset {
    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.file.is_none()
    }
}

/// The file-backed half of a non-folder [`Asset`]: its storage filename and
/// the MD5 hash of the content last persisted to the server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetFile {
    pub filename: Option<String>,
    pub hash: Option<String>,
}

/// Asset type classification, fixed by the extension table in §4.1's
/// `create` operation.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Folder,
    Script,
    Css,
    Html,
    Json,
    Shader,
    Text,
}

impl AssetKind {
    /// Derive `(kind, mime)` from a file extension, per the fixed table:
    /// `css`→css/text-css, `html`→html/text-html, `json`→json/application-json,
    /// `js`|`mjs`→script/text-plain, `txt`→text/text-plain,
    /// `glsl`→shader/text-x-glsl. Anything else defaults to `text`/`text/plain`
    /// — the caller is responsible for forcing a `.txt` suffix on the name
    /// in that case (see `otsync_project::create`).
    #[must_use]
    pub fn from_extension(ext: Option<&str>) -> (Self, &'static str) {
        match ext {
            Some("css") => (Self::Css, "text/css"),
            Some("html") => (Self::Html, "text/html"),
            Some("json") => (Self::Json, "application/json"),
            Some("js" | "mjs") => (Self::Script, "text/plain"),
            Some("txt") => (Self::Text, "text/plain"),
            Some("glsl") => (Self::Shader, "text/x-glsl"),
            _ => (Self::Text, "text/plain"),
        }
    }
}

/// A branch of a project, as returned by `projectBranches`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_map_to_fixed_table() {
        assert_eq!(AssetKind::from_extension(Some("css")), (AssetKind::Css, "text/css"));
        assert_eq!(AssetKind::from_extension(Some("html")), (AssetKind::Html, "text/html"));
        assert_eq!(
            AssetKind::from_extension(Some("json")),
            (AssetKind::Json, "application/json")
        );
        assert_eq!(AssetKind::from_extension(Some("js")), (AssetKind::Script, "text/plain"));
        assert_eq!(AssetKind::from_extension(Some("mjs")), (AssetKind::Script, "text/plain"));
        assert_eq!(AssetKind::from_extension(Some("txt")), (AssetKind::Text, "text/plain"));
        assert_eq!(AssetKind::from_extension(Some("glsl")), (AssetKind::Shader, "text/x-glsl"));
    }

    #[test]
    fn unknown_extension_defaults_to_text() {
        assert_eq!(AssetKind::from_extension(Some("rs")), (AssetKind::Text, "text/plain"));
        assert_eq!(AssetKind::from_extension(None), (AssetKind::Text, "text/plain"));
    }
}
