//! Source positions and the file set.
//!
//! Every token and AST node carries a [`Pos`], a compact offset into a
//! [`FileSet`]. Each file added to the set owns a disjoint `[base, base+size]`
//! range of global positions, so a bare `Pos` is enough to recover the file,
//! line, and column it came from.

use std::fmt;

/// A compact source position: an offset into the global position space of a
/// [`FileSet`].
///
/// `Pos::NONE` (the zero value) means "no position" and is used for
/// synthesized nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Pos(pub(crate) u32);

impl Pos {
    /// The absent position.
    pub const NONE: Pos = Pos(0);

    /// Returns true if this is a real position.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self != Self::NONE
    }
}

/// A resolved position: file name, 1-based line, 1-based column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilePos {
    pub name: String,
    pub line: u32,
    pub column: u32,
}

impl FilePos {
    /// Returns true if the position carries line information.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.line > 0
    }
}

impl fmt::Display for FilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            if self.is_valid() {
                write!(f, "{}:{}", self.line, self.column)
            } else {
                f.write_str("-")
            }
        } else if self.is_valid() {
            write!(f, "{}:{}:{}", self.name, self.line, self.column)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// A single source file registered in a [`FileSet`].
///
/// Line offsets are recorded by the scanner as it encounters newlines;
/// position lookup binary-searches them.
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    base: u32,
    size: u32,
    /// Byte offsets of line starts. Always begins with 0 (line 1).
    line_offsets: Vec<u32>,
}

impl SourceFile {
    fn new(name: String, base: u32, size: u32) -> Self {
        Self {
            name,
            base,
            size,
            line_offsets: vec![0],
        }
    }

    /// Returns the file name as given to [`FileSet::add_file`].
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the file's base offset in the global position space.
    #[must_use]
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Converts a byte offset within this file to a global [`Pos`].
    ///
    /// # Panics
    ///
    /// Panics if `offset` is past the end of the file; offsets come from the
    /// scanner which never reads past EOF.
    #[must_use]
    pub fn pos(&self, offset: usize) -> Pos {
        let offset = u32::try_from(offset).expect("file offset exceeds u32");
        assert!(offset <= self.size, "offset past end of file");
        Pos(self.base + offset)
    }

    /// Records the start of a new line at the given byte offset.
    ///
    /// Offsets must be added in increasing order; duplicates are ignored.
    pub fn add_line(&mut self, offset: usize) {
        let offset = offset as u32;
        if *self.line_offsets.last().unwrap_or(&0) < offset && offset <= self.size {
            self.line_offsets.push(offset);
        }
    }

    /// Returns true if `pos` falls within this file's range.
    #[must_use]
    pub fn contains(&self, pos: Pos) -> bool {
        pos.0 >= self.base && pos.0 <= self.base + self.size
    }

    /// Resolves a global position to file/line/column.
    ///
    /// Returns the zero `FilePos` (with the file name set) for `Pos::NONE`.
    #[must_use]
    pub fn position(&self, pos: Pos) -> FilePos {
        if !pos.is_valid() {
            return FilePos {
                name: self.name.clone(),
                line: 0,
                column: 0,
            };
        }
        let offset = pos.0 - self.base;
        // The line is the last recorded line start at or before the offset.
        let line_idx = match self.line_offsets.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        FilePos {
            name: self.name.clone(),
            line: line_idx as u32 + 1,
            column: offset - self.line_offsets[line_idx] + 1,
        }
    }
}

/// Identifier for a file within a [`FileSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileId(usize);

/// A set of source files sharing one global position space.
///
/// Pure data with no failure modes: adding a file reserves the next disjoint
/// `[base, base+size]` range, and resolving a position binary-searches the
/// registered files.
#[derive(Debug, Default)]
pub struct FileSet {
    base: u32,
    files: Vec<SourceFile>,
}

impl FileSet {
    /// Creates an empty file set. The global position space starts at 1 so
    /// that `Pos(0)` stays reserved for "no position".
    #[must_use]
    pub fn new() -> Self {
        Self { base: 1, files: vec![] }
    }

    /// Adds a file of `size` bytes, reserving its position range.
    pub fn add_file(&mut self, name: impl Into<String>, size: usize) -> FileId {
        let size = u32::try_from(size).expect("file size exceeds u32");
        let file = SourceFile::new(name.into(), self.base, size);
        // +1 so that a position just past EOF still maps into this file.
        self.base += size + 1;
        self.files.push(file);
        FileId(self.files.len() - 1)
    }

    /// Returns a file by id.
    #[must_use]
    pub fn file(&self, id: FileId) -> &SourceFile {
        &self.files[id.0]
    }

    /// Returns a file by id, mutably. The scanner uses this to record lines.
    pub fn file_mut(&mut self, id: FileId) -> &mut SourceFile {
        &mut self.files[id.0]
    }

    /// Finds the file containing a global position.
    #[must_use]
    pub fn find(&self, pos: Pos) -> Option<&SourceFile> {
        if !pos.is_valid() {
            return None;
        }
        // Files are ordered by base; binary search for the last base <= pos.
        let idx = self.files.partition_point(|f| f.base() <= pos.0);
        if idx == 0 {
            return None;
        }
        let file = &self.files[idx - 1];
        file.contains(pos).then_some(file)
    }

    /// Resolves a global position to file/line/column, or the zero position
    /// if it does not belong to any registered file.
    #[must_use]
    pub fn position(&self, pos: Pos) -> FilePos {
        match self.find(pos) {
            Some(file) => file.position(pos),
            None => FilePos::default(),
        }
    }
}
