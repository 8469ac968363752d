//! The per-sample property tree.
//!
//! An [`ArbitraryTree`] pairs every [`Property`] of the sampled type with its
//! current generation state. It is built fresh for each sample, mutated by
//! manipulations and then compiled bottom-up into one arbitrary. Nodes live in
//! an arena; resizing a container detaches trailing children without
//! invalidating any [`NodeId`].

use crate::arbitrary::ValueArbitrary;
use crate::data::{FailureMode, Source};
use crate::engine::Shared;
use crate::error::{Result, TamarinError};
use crate::manipulation::{self, Customizer, PostCondition};
use crate::path::{Path, Segment};
use crate::property::Property;
use crate::reflect::{TypeDescriptor, TypeKind};
use crate::value::Value;
use std::fmt;
use tracing::warn;

/// Index of a node in its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// How a node produces its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Generated directly by a leaf or registered arbitrary.
    Leaf,
    Record,
    Sequence,
    Set,
    Map,
    /// One key/value pair of a map.
    Entry,
    Tuple,
    Array,
    /// A type without structure, built by a registered construction strategy.
    Constructed,
}

/// What path resolution does with a node frozen to null at the depth limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CutOff {
    /// Grow the node one level past the limit.
    Expand,
    /// Drop the branch; the path reaches nothing there.
    Skip,
}

impl NodeKind {
    pub fn is_resizable(self) -> bool {
        matches!(self, NodeKind::Sequence | NodeKind::Set | NodeKind::Map)
    }

    fn is_indexable(self) -> bool {
        matches!(
            self,
            NodeKind::Sequence | NodeKind::Set | NodeKind::Map | NodeKind::Tuple | NodeKind::Array
        )
    }
}

/// Current value source of a node. The latest SET-family write replaces it.
#[derive(Debug, Clone)]
pub enum Assignment {
    /// Generate from the leaf arbitrary or by folding the children.
    Generated,
    Fixed(Value),
    Arbitrary(ValueArbitrary),
}

/// Mutable per-sample state of one property.
#[derive(Debug, Clone)]
pub struct ArbitraryNode {
    property: Property,
    kind: NodeKind,
    depth: usize,
    children: Vec<NodeId>,
    assignment: Assignment,
    null_probability: f64,
    size_range: Option<(usize, usize)>,
    post_conditions: Vec<PostCondition>,
    customizers: Vec<Customizer>,
    leaf: Option<ValueArbitrary>,
    cut_off: bool,
}

impl ArbitraryNode {
    fn new(property: Property, kind: NodeKind, depth: usize, null_probability: f64) -> Self {
        ArbitraryNode {
            property,
            kind,
            depth,
            children: Vec::new(),
            assignment: Assignment::Generated,
            null_probability,
            size_range: None,
            post_conditions: Vec::new(),
            customizers: Vec::new(),
            leaf: None,
            cut_off: false,
        }
    }

    pub fn property(&self) -> &Property {
        &self.property
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    pub fn null_probability(&self) -> f64 {
        self.null_probability
    }

    /// Element-count range the current size was drawn from.
    pub fn size_range(&self) -> Option<(usize, usize)> {
        self.size_range
    }

    pub fn post_conditions(&self) -> &[PostCondition] {
        &self.post_conditions
    }

    pub fn customizers(&self) -> &[Customizer] {
        &self.customizers
    }

    /// Whether the node was frozen to null at the depth limit.
    pub fn is_cut_off(&self) -> bool {
        self.cut_off
    }

    pub(crate) fn leaf(&self) -> Option<&ValueArbitrary> {
        self.leaf.as_ref()
    }

    pub(crate) fn set_assignment(&mut self, assignment: Assignment) {
        self.assignment = assignment;
    }

    pub(crate) fn set_null_probability(&mut self, probability: f64) {
        self.null_probability = probability;
    }

    pub(crate) fn set_size_range(&mut self, min: usize, max: usize) {
        self.size_range = Some((min, max));
    }

    pub(crate) fn push_post_condition(&mut self, condition: PostCondition) {
        self.post_conditions.push(condition);
    }

    pub(crate) fn push_customizer(&mut self, customizer: Customizer) {
        self.customizers.push(customizer);
    }
}

/// Arena of nodes rooted at one property.
#[derive(Clone)]
pub struct ArbitraryTree {
    nodes: Vec<ArbitraryNode>,
    root: NodeId,
}

impl fmt::Debug for ArbitraryTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArbitraryTree")
            .field("nodes", &self.nodes.len())
            .field("root", &self.node(self.root).property.to_string())
            .finish()
    }
}

impl ArbitraryTree {
    /// Resolve the tree for `root`, build its leaf arbitraries and apply the
    /// default specs registered for the types it contains.
    pub(crate) fn build(shared: &Shared, root: Property, source: &mut Source) -> Result<Self> {
        let mut tree = ArbitraryTree {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        tree.root = tree.grow(shared, root, 0, source)?;
        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &ArbitraryNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut ArbitraryNode {
        &mut self.nodes[id.0]
    }

    fn push(&mut self, node: ArbitraryNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn grow(
        &mut self,
        shared: &Shared,
        property: Property,
        depth: usize,
        source: &mut Source,
    ) -> Result<NodeId> {
        check_recursion(shared, &property, depth)?;
        if shared.options.failure_mode != FailureMode::BestEffort || depth == 0 {
            return self.grow_node(shared, property, depth, source, false);
        }
        let fallback = property.clone();
        match self.grow_node(shared, property, depth, source, false) {
            Ok(id) => Ok(id),
            Err(error) => {
                warn!(property = %fallback, %error, "substituting null for unbuildable node");
                let mut node = ArbitraryNode::new(fallback, NodeKind::Leaf, depth, 1.0);
                node.assignment = Assignment::Fixed(Value::Null);
                Ok(self.push(node))
            }
        }
    }

    fn grow_node(
        &mut self,
        shared: &Shared,
        property: Property,
        depth: usize,
        source: &mut Source,
        past_limit: bool,
    ) -> Result<NodeId> {
        let ty = property.ty().clone();
        let null_probability = if property.is_nullable() {
            shared.options.null_probability
        } else {
            0.0
        };

        if let Some(registered) = shared.arbitraries.get(&ty.key()) {
            let mut node = ArbitraryNode::new(property, NodeKind::Leaf, depth, null_probability);
            node.leaf = Some(registered.clone());
            return Ok(self.push(node));
        }

        let kind = node_kind(shared, &ty);
        let cut_off = depth >= shared.options.max_depth;
        if cut_off && !past_limit && property.is_nullable() && kind != NodeKind::Leaf {
            let mut node = ArbitraryNode::new(property, NodeKind::Leaf, depth, 1.0);
            node.assignment = Assignment::Fixed(Value::Null);
            node.cut_off = true;
            return Ok(self.push(node));
        }

        let mut node = ArbitraryNode::new(property, kind, depth, null_probability);
        let children: Vec<Property> = match kind {
            NodeKind::Leaf => {
                node.leaf = Some(shared.leaves.generate(&node.property)?);
                Vec::new()
            }
            NodeKind::Constructed => Vec::new(),
            NodeKind::Record | NodeKind::Tuple | NodeKind::Array | NodeKind::Entry => {
                shared.resolver.resolve_checked(&ty)?.to_vec()
            }
            NodeKind::Sequence | NodeKind::Set | NodeKind::Map => {
                let (min, mut max) = shared.leaves.size_range(&node.property)?;
                if cut_off {
                    max = min;
                }
                if let Some(distinct) = element_cardinality(&ty) {
                    max = max.min(distinct).max(min);
                }
                node.size_range = Some((min, max));
                let size = source.int_in(min as i128, max as i128) as usize;
                (0..size)
                    .map(|i| container_child(shared, &node.property, kind, i))
                    .collect::<Result<_>>()?
            }
        };

        let id = self.push(node);
        for child in children {
            let child_id = self.grow(shared, child, depth + 1, source)?;
            self.nodes[id.0].children.push(child_id);
        }

        if let Some(spec) = shared.specs.get(&ty.key()) {
            manipulation::apply(self, shared, id, spec.manipulations(), source, CutOff::Skip)?;
        }
        Ok(id)
    }

    /// Grow a node that was frozen at the depth limit one level past it.
    /// Its own children are cut off again.
    pub(crate) fn expand(&mut self, shared: &Shared, id: NodeId, source: &mut Source) -> Result<()> {
        let node = self.node(id);
        if !node.cut_off {
            return Ok(());
        }
        let (property, depth) = (node.property.clone(), node.depth);
        check_recursion(shared, &property, depth)?;
        let grown = self.grow_node(shared, property, depth, source, true)?;
        self.nodes.swap(id.0, grown.0);
        Ok(())
    }

    /// Change the element count of a container node, synthesizing new
    /// elements or detaching trailing ones.
    pub(crate) fn resize(
        &mut self,
        shared: &Shared,
        id: NodeId,
        size: usize,
        source: &mut Source,
    ) -> Result<()> {
        let node = self.node(id);
        if !node.kind.is_resizable() {
            return Err(TamarinError::InvalidManipulation {
                path: node.property.to_string(),
                reason: format!("`{}` has no variable size", node.property.ty()),
            });
        }
        let current = node.children.len();
        if size <= current {
            self.nodes[id.0].children.truncate(size);
            return Ok(());
        }
        let (property, kind, depth) = (node.property.clone(), node.kind, node.depth);
        for i in current..size {
            let child = container_child(shared, &property, kind, i)?;
            let child_id = self.grow(shared, child, depth + 1, source)?;
            self.nodes[id.0].children.push(child_id);
        }
        Ok(())
    }

    /// Assign a value to a node, decomposing composite values into their
    /// children so later manipulations of the children still apply.
    pub(crate) fn assign(
        &mut self,
        shared: &Shared,
        id: NodeId,
        value: Value,
        source: &mut Source,
    ) -> Result<()> {
        if value.is_null() {
            self.node_mut(id).null_probability = 1.0;
            return Ok(());
        }
        let kind = self.node(id).kind;
        let value = match (kind, value) {
            (NodeKind::Record, Value::Record(fields)) => {
                for (name, field_value) in fields {
                    let child = self
                        .child_named(id, &name)
                        .ok_or_else(|| self.invalid(id, format!("no field `{name}`")))?;
                    self.assign(shared, child, field_value, source)?;
                }
                None
            }
            (NodeKind::Sequence | NodeKind::Set, Value::Seq(items) | Value::Set(items)) => {
                self.resize(shared, id, items.len(), source)?;
                self.assign_children(shared, id, items, source)?;
                None
            }
            (NodeKind::Map, Value::Map(entries)) => {
                self.resize(shared, id, entries.len(), source)?;
                let pairs = entries
                    .into_iter()
                    .map(|(key, value)| Value::Tuple(vec![key, value]))
                    .collect();
                self.assign_children(shared, id, pairs, source)?;
                None
            }
            (
                NodeKind::Tuple | NodeKind::Array | NodeKind::Entry,
                Value::Tuple(items) | Value::Seq(items),
            ) => {
                let arity = self.node(id).children.len();
                if items.len() != arity {
                    return Err(self.invalid(
                        id,
                        format!("expected {} elements, got {}", arity, items.len()),
                    ));
                }
                self.assign_children(shared, id, items, source)?;
                None
            }
            (_, other) => Some(other),
        };
        let node = self.node_mut(id);
        node.null_probability = 0.0;
        node.assignment = match value {
            Some(whole) => Assignment::Fixed(whole),
            None => Assignment::Generated,
        };
        Ok(())
    }

    fn assign_children(
        &mut self,
        shared: &Shared,
        id: NodeId,
        items: Vec<Value>,
        source: &mut Source,
    ) -> Result<()> {
        let children = self.node(id).children.clone();
        for (child, item) in children.into_iter().zip(items) {
            self.assign(shared, child, item, source)?;
        }
        Ok(())
    }

    fn child_named(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.node(id)
            .children
            .iter()
            .copied()
            .find(|child| self.node(*child).property.name() == Some(name))
    }

    fn invalid(&self, id: NodeId, reason: String) -> TamarinError {
        TamarinError::InvalidManipulation {
            path: self.node(id).property.to_string(),
            reason,
        }
    }

    /// Nodes addressed by `path`, relative to `from`, in tree order.
    pub fn resolve(&self, from: NodeId, path: &Path) -> Result<Vec<NodeId>> {
        let mut current = vec![from];
        for segment in path.segments() {
            let mut next = Vec::new();
            for id in current {
                self.step(id, segment, path, &mut next)?;
            }
            current = next;
        }
        Ok(current)
    }

    /// Like [`resolve`](Self::resolve), handling nodes cut off at the depth
    /// limit per `cut_off`. Under [`CutOff::Skip`] cut-off targets are
    /// dropped as well.
    pub(crate) fn resolve_growing(
        &mut self,
        shared: &Shared,
        from: NodeId,
        path: &Path,
        cut_off: CutOff,
        source: &mut Source,
    ) -> Result<Vec<NodeId>> {
        let mut current = vec![from];
        for segment in path.segments() {
            let mut next = Vec::new();
            for id in current {
                if self.node(id).cut_off {
                    match cut_off {
                        CutOff::Expand => self.expand(shared, id, source)?,
                        CutOff::Skip => continue,
                    }
                }
                self.step(id, segment, path, &mut next)?;
            }
            current = next;
        }
        if cut_off == CutOff::Skip {
            current.retain(|id| !self.node(*id).cut_off);
        }
        Ok(current)
    }

    fn step(&self, id: NodeId, segment: &Segment, path: &Path, out: &mut Vec<NodeId>) -> Result<()> {
        let node = self.node(id);
        let fail = |reason: String| TamarinError::PathResolution {
            path: path.to_string(),
            type_name: node.property.ty().name().to_string(),
            reason,
        };
        match segment {
            Segment::Field(name) => {
                if !matches!(node.kind, NodeKind::Record | NodeKind::Entry) {
                    return Err(fail(format!("field `{name}` on a node without fields")));
                }
                let child = self
                    .child_named(id, name)
                    .ok_or_else(|| fail(format!("no field `{name}`")))?;
                out.push(child);
            }
            Segment::Index(index) => {
                if !node.kind.is_indexable() {
                    return Err(fail(format!("index {index} on a node without elements")));
                }
                let child = node.children.get(*index).ok_or_else(|| {
                    fail(format!(
                        "index {} is out of bounds for size {}",
                        index,
                        node.children.len()
                    ))
                })?;
                out.push(*child);
            }
            Segment::Key(key) => {
                if node.kind != NodeKind::Map {
                    return Err(fail(format!("key `{key}` on a node that is not a map")));
                }
                let before = out.len();
                for entry in &node.children {
                    let matches = self.node(*entry).children.first().is_some_and(|k| {
                        match &self.node(*k).assignment {
                            Assignment::Fixed(value) => value.key_text().as_deref() == Some(key),
                            _ => false,
                        }
                    });
                    if matches {
                        out.push(*entry);
                    }
                }
                if out.len() == before {
                    return Err(fail(format!("no entry with key `{key}`")));
                }
            }
            Segment::Wildcard => {
                if !node.kind.is_indexable() {
                    return Err(fail("wildcard on a node without elements".to_string()));
                }
                out.extend(node.children.iter().copied());
            }
        }
        Ok(())
    }
}

fn check_recursion(shared: &Shared, property: &Property, depth: usize) -> Result<()> {
    let recursion_limit = shared.options.max_depth * 4 + 16;
    if depth > recursion_limit {
        return Err(TamarinError::Resolution {
            type_name: property.ty().name().to_string(),
            reason: format!("recursion deeper than {recursion_limit} levels"),
        });
    }
    Ok(())
}

fn node_kind(shared: &Shared, ty: &TypeDescriptor) -> NodeKind {
    match ty.kind() {
        TypeKind::Record(_) => NodeKind::Record,
        TypeKind::Sequence(_) => NodeKind::Sequence,
        TypeKind::Set(_) => NodeKind::Set,
        TypeKind::Map(_, _) => NodeKind::Map,
        TypeKind::Tuple(_) if ty.key().is_entry() => NodeKind::Entry,
        TypeKind::Tuple(_) => NodeKind::Tuple,
        TypeKind::Array(_, _) => NodeKind::Array,
        TypeKind::Opaque if shared.strategy_targets.contains(&ty.key()) => NodeKind::Constructed,
        _ => NodeKind::Leaf,
    }
}

fn container_child(
    shared: &Shared,
    container: &Property,
    kind: NodeKind,
    index: usize,
) -> Result<Property> {
    if kind == NodeKind::Map {
        shared.resolver.entry(container, index)
    } else {
        shared.resolver.element(container, index)
    }
}

/// Number of distinct set elements or map keys, when small and known.
fn element_cardinality(container: &TypeDescriptor) -> Option<usize> {
    let element = match container.kind() {
        TypeKind::Set(element) | TypeKind::Map(element, _) => element,
        _ => return None,
    };
    match element().kind() {
        TypeKind::Bool => Some(2),
        TypeKind::Enum(variants) => Some(variants.len()),
        _ => None,
    }
}
