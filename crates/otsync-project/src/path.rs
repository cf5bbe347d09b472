use std::collections::HashSet;

use otsync_collab::ItemId;
use otsync_collab::UniqueId;

use crate::bimap::IdBimap;
use crate::error::ProjectError;

/// Fold an asset's ancestor id sequence into a slash-joined path (§4.1's
/// `_assetPath`), resolving each ancestor's name via `name_of`. The server
/// sometimes repeats an ancestor id in `path`; this dedups via an
/// order-preserving set before folding, per §9's documented decision to
/// leave deep aliasing undefined rather than guess at server intent.
pub fn fold_path(
    bimap: &IdBimap,
    ancestors: &[ItemId],
    leaf_name: &str,
    name_of: impl Fn(UniqueId) -> Option<String>,
) -> Result<String, ProjectError> {
    let mut seen = HashSet::with_capacity(ancestors.len());
    let mut segments = Vec::with_capacity(ancestors.len() + 1);
    for &item_id in ancestors {
        if !seen.insert(item_id) {
            continue;
        }
        let unique_id = bimap
            .unique_for(item_id)
            .ok_or(ProjectError::MissingAssetMapping { unique_id: UniqueId::new(0), item_id })?;
        let name =
            name_of(unique_id).ok_or(ProjectError::MissingAssetMapping { unique_id, item_id })?;
        segments.push(name);
    }
    segments.push(leaf_name.to_string());
    Ok(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn dedups_repeated_ancestor_ids_preserving_first_occurrence() {
        let mut bimap = IdBimap::default();
        bimap.insert(ItemId::new(1), UniqueId::new(10));
        bimap.insert(ItemId::new(2), UniqueId::new(20));
        let names: HashMap<UniqueId, &str> =
            HashMap::from([(UniqueId::new(10), "src"), (UniqueId::new(20), "lib")]);

        let path = fold_path(
            &bimap,
            &[ItemId::new(1), ItemId::new(1), ItemId::new(2)],
            "a.js",
            |id| names.get(&id).map(|s| (*s).to_string()),
        )
        .unwrap();
        assert_eq!(path, "src/lib/a.js");
    }

    #[test]
    fn missing_ancestor_mapping_is_an_error() {
        let bimap = IdBimap::default();
        let err = fold_path(&bimap, &[ItemId::new(9)], "a.js", |_| None);
        assert!(matches!(err, Err(ProjectError::MissingAssetMapping { .. })));
    }
}
