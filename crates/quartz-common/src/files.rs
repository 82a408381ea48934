use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use serde::Serialize;

/// Stable identifier of an input source file. 0 is reserved as invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct InputFileId(pub u32);

impl InputFileId {
    pub const INVALID: InputFileId = InputFileId(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// How a file entered the compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InputFileKind {
    /// Supplied by the driver on the command line.
    CoreUnit,
    /// Pulled in during parsing via an `@include` directive.
    Included,
}

/// Parse state of an input file. No file ever transitions back from
/// Finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InputFileState {
    Pending,
    Finished,
}

/// One entry in the input-file worklist.
#[derive(Debug, Clone, Serialize)]
pub struct InputFile {
    pub id: InputFileId,
    pub path: PathBuf,
    pub kind: InputFileKind,
    pub state: InputFileState,
}

/// An output path paired with its id, mirroring the input queue.
#[derive(Debug, Clone, Serialize)]
pub struct OutputFile {
    pub id: u32,
    pub path: PathBuf,
}

/// The ordered worklist of input files.
///
/// Core units are seeded by the driver; included files are appended by
/// the parser in FIFO order of their first appearance in a directive.
/// Ids are handed out monotonically starting at 1.
#[derive(Debug, Default, Serialize)]
pub struct FileQueue {
    files: Vec<InputFile>,
    /// Maps queued paths to their id, for include deduplication.
    #[serde(skip)]
    path_index: FxHashMap<PathBuf, InputFileId>,
    next_id: u32,
}

impl FileQueue {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            path_index: FxHashMap::default(),
            next_id: 1,
        }
    }

    fn push(&mut self, path: PathBuf, kind: InputFileKind) -> InputFileId {
        let id = InputFileId(self.next_id);
        self.next_id += 1;
        self.path_index.insert(path.clone(), id);
        self.files.push(InputFile {
            id,
            path,
            kind,
            state: InputFileState::Pending,
        });
        id
    }

    /// Append a core unit supplied by the driver.
    pub fn push_core_unit(&mut self, path: impl Into<PathBuf>) -> InputFileId {
        self.push(path.into(), InputFileKind::CoreUnit)
    }

    /// Append a file discovered through an include directive.
    ///
    /// A path that is already queued (under either kind) is not queued
    /// again; the existing id is returned instead.
    pub fn push_include(&mut self, path: impl Into<PathBuf>) -> InputFileId {
        let path = path.into();
        if let Some(existing) = self.path_index.get(&path) {
            return *existing;
        }
        self.push(path, InputFileKind::Included)
    }

    pub fn get(&self, id: InputFileId) -> Option<&InputFile> {
        self.files.iter().find(|f| f.id == id)
    }

    /// Path of a queued file, for diagnostics.
    pub fn path_of(&self, id: InputFileId) -> Option<&Path> {
        self.get(id).map(|f| f.path.as_path())
    }

    /// First Pending file of the given kind, if any. Marks it Finished
    /// before returning: the state flip is worklist bookkeeping, not a
    /// success indicator.
    pub fn take_next_pending(&mut self, kind: InputFileKind) -> Option<(InputFileId, PathBuf)> {
        let file = self
            .files
            .iter_mut()
            .find(|f| f.state == InputFileState::Pending && f.kind == kind)?;
        file.state = InputFileState::Finished;
        Some((file.id, file.path.clone()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &InputFile> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_from_one() {
        let mut q = FileQueue::new();
        let a = q.push_core_unit("a.qz");
        let b = q.push_core_unit("b.qz");
        let c = q.push_include("c.qz");
        assert_eq!(a, InputFileId(1));
        assert_eq!(b, InputFileId(2));
        assert_eq!(c, InputFileId(3));
    }

    #[test]
    fn include_dedupes_by_path() {
        let mut q = FileQueue::new();
        let a = q.push_include("lib.qz");
        let b = q.push_include("lib.qz");
        assert_eq!(a, b);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn include_of_core_unit_path_is_ignored() {
        let mut q = FileQueue::new();
        let core = q.push_core_unit("main.qz");
        let inc = q.push_include("main.qz");
        assert_eq!(core, inc);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn take_next_pending_marks_finished() {
        let mut q = FileQueue::new();
        q.push_core_unit("main.qz");
        q.push_include("lib.qz");

        let (id, path) = q.take_next_pending(InputFileKind::CoreUnit).unwrap();
        assert_eq!(path, PathBuf::from("main.qz"));
        assert_eq!(q.get(id).unwrap().state, InputFileState::Finished);

        // No more core units; the include is still pending.
        assert!(q.take_next_pending(InputFileKind::CoreUnit).is_none());
        let (inc_id, _) = q.take_next_pending(InputFileKind::Included).unwrap();
        assert_eq!(q.get(inc_id).unwrap().state, InputFileState::Finished);
        assert!(q.take_next_pending(InputFileKind::Included).is_none());
    }

    #[test]
    fn includes_drain_in_fifo_order() {
        let mut q = FileQueue::new();
        q.push_include("first.qz");
        q.push_include("second.qz");
        q.push_include("third.qz");

        let (_, p1) = q.take_next_pending(InputFileKind::Included).unwrap();
        let (_, p2) = q.take_next_pending(InputFileKind::Included).unwrap();
        let (_, p3) = q.take_next_pending(InputFileKind::Included).unwrap();
        assert_eq!(p1, PathBuf::from("first.qz"));
        assert_eq!(p2, PathBuf::from("second.qz"));
        assert_eq!(p3, PathBuf::from("third.qz"));
    }
}
