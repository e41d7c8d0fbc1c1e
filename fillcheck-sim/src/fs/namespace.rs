//! In-memory directory tree and sector allocation map.

use crate::bitset::SectorBitSet;
use crate::block::SECTOR_SIZE;
use std::collections::BTreeMap;

/// Directory entries held by one directory sector (32-byte entries).
pub(crate) const ENTRIES_PER_SECTOR: usize = SECTOR_SIZE / 32;

/// Longest accepted entry name.
const MAX_NAME_LEN: usize = 255;

/// Index of a node in the [`Namespace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct NodeId(usize);

/// The root directory always occupies slot zero.
pub(crate) const ROOT: NodeId = NodeId(0);

#[derive(Debug)]
pub(crate) enum NodeKind {
    Directory {
        entries: BTreeMap<String, NodeId>,
        /// Sectors reserved for this directory's entries
        sectors: Vec<u64>,
    },
    File {
        sectors: Vec<u64>,
        len: u64,
    },
}

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) name: String,
    pub(crate) parent: NodeId,
    pub(crate) kind: NodeKind,
}

/// Directory tree of the volume.
#[derive(Debug)]
pub(crate) struct Namespace {
    nodes: Vec<Node>,
}

impl Namespace {
    pub(crate) fn new(root_sector: u64) -> Self {
        Self {
            nodes: vec![Node {
                name: "/".to_string(),
                parent: ROOT,
                kind: NodeKind::Directory {
                    entries: BTreeMap::new(),
                    sectors: vec![root_sector],
                },
            }],
        }
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn is_directory(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Directory { .. })
    }

    pub(crate) fn is_file(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::File { .. })
    }

    /// Look up `name` (already normalized) in directory `dir`.
    pub(crate) fn lookup(&self, dir: NodeId, name: &str) -> Option<NodeId> {
        match &self.node(dir).kind {
            NodeKind::Directory { entries, .. } => entries.get(name).copied(),
            NodeKind::File { .. } => None,
        }
    }

    /// Split `path` into its parent directory and normalized leaf name.
    ///
    /// Relative paths start at `cwd`; a leading `/` starts at the root.
    pub(crate) fn resolve(&self, cwd: NodeId, path: &str) -> Option<(NodeId, String)> {
        let (mut dir, rest) = match path.strip_prefix('/') {
            Some(rest) => (ROOT, rest),
            None => (cwd, path),
        };
        let mut components: Vec<&str> = rest
            .split('/')
            .filter(|c| !c.is_empty() && *c != ".")
            .collect();
        let leaf = components.pop()?;
        for component in components {
            dir = if component == ".." {
                self.node(dir).parent
            } else {
                let next = self.lookup(dir, &normalize_name(component)?)?;
                if !self.is_directory(next) {
                    return None;
                }
                next
            };
        }
        Some((dir, normalize_name(leaf)?))
    }

    /// Whether adding one more entry to `dir` needs another entry sector.
    pub(crate) fn needs_entry_sector(&self, dir: NodeId) -> bool {
        match &self.node(dir).kind {
            NodeKind::Directory { entries, sectors } => {
                entries.len() >= sectors.len() * ENTRIES_PER_SECTOR
            }
            NodeKind::File { .. } => false,
        }
    }

    /// Reserve `lba` for the entries of directory `dir`.
    pub(crate) fn add_entry_sector(&mut self, dir: NodeId, lba: u64) {
        if let NodeKind::Directory { sectors, .. } = &mut self.nodes[dir.0].kind {
            sectors.push(lba);
        }
    }

    /// Insert a new node called `name` under `dir`.
    pub(crate) fn insert(&mut self, dir: NodeId, name: String, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.clone(),
            parent: dir,
            kind,
        });
        if let NodeKind::Directory { entries, .. } = &mut self.nodes[dir.0].kind {
            entries.insert(name, id);
        }
        id
    }

    /// Data sectors and length of file `id`.
    pub(crate) fn file_extent(&self, id: NodeId) -> Option<(&[u64], u64)> {
        match &self.node(id).kind {
            NodeKind::File { sectors, len } => Some((sectors, *len)),
            NodeKind::Directory { .. } => None,
        }
    }

    pub(crate) fn push_file_sector(&mut self, id: NodeId, lba: u64) {
        if let NodeKind::File { sectors, .. } = &mut self.nodes[id.0].kind {
            sectors.push(lba);
        }
    }

    pub(crate) fn grow_file(&mut self, id: NodeId, bytes: u64) {
        if let NodeKind::File { len, .. } = &mut self.nodes[id.0].kind {
            *len += bytes;
        }
    }
}

/// Validate an entry name and fold it to the stored (upper-case) form.
pub(crate) fn normalize_name(name: &str) -> Option<String> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name != "."
        && name != ".."
        && !name.contains(['/', '\0']);
    valid.then(|| name.to_ascii_uppercase())
}

/// First-fit sector allocator.
#[derive(Debug)]
pub(crate) struct Allocator {
    map: SectorBitSet,
    hint: usize,
    full: bool,
}

impl Allocator {
    pub(crate) fn new(sectors: u64) -> Self {
        Self {
            map: SectorBitSet::new(sectors as usize),
            hint: 0,
            full: false,
        }
    }

    /// Mark `lba` as used without searching.
    pub(crate) fn reserve(&mut self, lba: u64) {
        self.map.set(lba as usize);
    }

    /// Allocate a free sector. Once this fails the volume stays full.
    pub(crate) fn allocate(&mut self) -> Option<u64> {
        let found = self
            .map
            .first_clear_from(self.hint)
            .or_else(|| self.map.first_clear_from(0));
        match found {
            Some(idx) => {
                self.map.set(idx);
                self.hint = idx + 1;
                Some(idx as u64)
            }
            None => {
                self.full = true;
                None
            }
        }
    }

    pub(crate) fn is_full(&self) -> bool {
        self.full
    }

    pub(crate) fn free_sectors(&self) -> u64 {
        (self.map.len() - self.map.count_set()) as u64
    }
}
