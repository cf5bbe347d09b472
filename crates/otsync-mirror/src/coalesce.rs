use camino::Utf8PathBuf;

/// One raw disk event, queued for the 10-ms coalescing window (§4.2's
/// "Disk watcher with coalescing").
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum DeferOp {
    Created(Utf8PathBuf),
    Changed(Utf8PathBuf),
    Deleted(Utf8PathBuf),
}

/// A queued batch resolved into the higher-level operation the model
/// should actually perform, after rename-pair detection.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ResolvedOp {
    Create(Utf8PathBuf),
    Change(Utf8PathBuf),
    Delete(Utf8PathBuf),
    Rename(Utf8PathBuf, Utf8PathBuf),
}

impl ResolvedOp {
    /// The dependency-scheduler key this operation should be dispatched
    /// under: its target path, or — for a rename — the destination (§4.2
    /// step 3 dispatches a rename by where it lands).
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            ResolvedOp::Create(path) | ResolvedOp::Change(path) | ResolvedOp::Delete(path) => path.as_str(),
            ResolvedOp::Rename(_, to) => to.as_str(),
        }
    }
}

fn parent_of(path: &Utf8PathBuf) -> &str {
    match path.as_str().rfind('/') {
        Some(index) => &path.as_str()[..index],
        None => "",
    }
}

fn leaf_of(path: &Utf8PathBuf) -> &str {
    match path.as_str().rfind('/') {
        Some(index) => &path.as_str()[index + 1..],
        None => path.as_str(),
    }
}

fn looks_like_a_rename(from: &Utf8PathBuf, to: &Utf8PathBuf) -> bool {
    parent_of(from) == parent_of(to) || leaf_of(from) == leaf_of(to)
}

/// Walks a coalescer-queue snapshot folding adjacent delete+create (or
/// create+delete) pairs that share a parent or leaf name into a single
/// rename (§4.2's drain procedure, step 2; S3).
#[must_use]
pub fn resolve(ops: Vec<DeferOp>) -> Vec<ResolvedOp> {
    let mut resolved = Vec::with_capacity(ops.len());
    let mut i = 0;
    while i < ops.len() {
        if i + 1 < ops.len() {
            let pair = match (&ops[i], &ops[i + 1]) {
                (DeferOp::Deleted(from), DeferOp::Created(to)) => Some((from.clone(), to.clone())),
                (DeferOp::Created(to), DeferOp::Deleted(from)) => Some((from.clone(), to.clone())),
                _ => None,
            };
            if let Some((from, to)) = pair {
                if looks_like_a_rename(&from, &to) {
                    resolved.push(ResolvedOp::Rename(from, to));
                    i += 2;
                    continue;
                }
            }
        }
        resolved.push(match &ops[i] {
            DeferOp::Created(path) => ResolvedOp::Create(path.clone()),
            DeferOp::Changed(path) => ResolvedOp::Change(path.clone()),
            DeferOp::Deleted(path) => ResolvedOp::Delete(path.clone()),
        });
        i += 1;
    }
    resolved
}
