//! Node identifiers and the ordered node-name map.

use indexmap::IndexMap;

/// Identifier for a circuit node.
///
/// Node 0 is the ground reference. Non-ground nodes map to MNA matrix
/// indices as `id - 1`; ground is excluded from the system entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// The ground reference node.
    pub const GROUND: NodeId = NodeId(0);

    /// Create a node id from a raw index (0 = ground).
    pub fn new(id: u32) -> Self {
        NodeId(id)
    }

    /// Whether this is the ground reference.
    pub fn is_ground(self) -> bool {
        self.0 == 0
    }

    /// Raw node number (0 = ground).
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// MNA matrix index for this node, or `None` for ground.
    pub fn mna_index(self) -> Option<usize> {
        if self.is_ground() {
            None
        } else {
            Some((self.0 - 1) as usize)
        }
    }
}

/// Ordered mapping from node names to [`NodeId`]s.
///
/// Names are interned in first-seen order so matrix indices are stable and
/// output columns follow the order nodes appear in the circuit. The names
/// `"0"`, `"gnd"` and `"GND"` are reserved for ground.
#[derive(Debug, Clone, Default)]
pub struct NodeMap {
    names: IndexMap<String, NodeId>,
}

impl NodeMap {
    /// Create an empty node map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a name refers to the ground reference.
    pub fn is_ground_name(name: &str) -> bool {
        name == "0" || name.eq_ignore_ascii_case("gnd")
    }

    /// Intern a node name, returning its id.
    pub fn intern(&mut self, name: &str) -> NodeId {
        if Self::is_ground_name(name) {
            return NodeId::GROUND;
        }
        if let Some(&id) = self.names.get(name) {
            return id;
        }
        let id = NodeId::new(self.names.len() as u32 + 1);
        self.names.insert(name.to_string(), id);
        id
    }

    /// Look up an already-interned node by name.
    pub fn get(&self, name: &str) -> Option<NodeId> {
        if Self::is_ground_name(name) {
            return Some(NodeId::GROUND);
        }
        self.names.get(name).copied()
    }

    /// Number of non-ground nodes.
    pub fn num_nodes(&self) -> usize {
        self.names.len()
    }

    /// Iterate over non-ground node names in MNA index order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(|s| s.as_str())
    }
}
