//! Implements a directed multigraph.
//!
//! Vertices live in an arena keyed by their `usize` index, and edges refer
//! to vertices by index. Cycles are therefore cheap: a back edge is just
//! another entry in the edge list. Parallel edges between the same pair of
//! vertices are permitted, and edges keep their insertion order.

use rustc_hash::FxHashSet;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::export::GraphExport;
use crate::Error;

pub trait Vertex: Clone {
    // The index of this vertex.
    fn index(&self) -> usize;
    // The stable name of this vertex in exported graphs.
    fn name(&self) -> String {
        self.index().to_string()
    }
    // A human-readable label for exported graphs.
    fn dot_label(&self) -> String;
    // Fill color hint for exported graphs.
    fn dot_fill_color(&self) -> Option<String> {
        None
    }
}

pub trait Edge: Clone {
    /// The index of the head vertex.
    fn head(&self) -> usize;
    /// The index of the tail vertex.
    fn tail(&self) -> usize;
    /// A label for exported graphs, or an empty string for none.
    fn dot_label(&self) -> String;
}

/// A directed graph.
#[derive(Clone, Debug, Serialize)]
pub struct Graph<V: Vertex, E: Edge> {
    vertices: BTreeMap<usize, V>,
    edges: Vec<E>,
    // Outgoing edge indices, by vertex index.
    successors: BTreeMap<usize, Vec<usize>>,
    // Incoming edge indices, by vertex index.
    predecessors: BTreeMap<usize, Vec<usize>>,
}

impl<V, E> Default for Graph<V, E>
where
    V: Vertex,
    E: Edge,
{
    fn default() -> Self {
        Graph::new()
    }
}

impl<V, E> Graph<V, E>
where
    V: Vertex,
    E: Edge,
{
    pub fn new() -> Graph<V, E> {
        Graph {
            vertices: BTreeMap::new(),
            edges: Vec::new(),
            successors: BTreeMap::new(),
            predecessors: BTreeMap::new(),
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Returns true if the vertex with the given index exists in this graph
    pub fn has_vertex(&self, index: usize) -> bool {
        self.vertices.contains_key(&index)
    }

    /// Inserts a vertex into the graph.
    /// # Errors
    /// Error if the vertex already exists by index.
    pub fn insert_vertex(&mut self, v: V) -> Result<(), Error> {
        if self.vertices.contains_key(&v.index()) {
            return Err("duplicate vertex index".into());
        }
        self.successors.insert(v.index(), Vec::new());
        self.predecessors.insert(v.index(), Vec::new());
        self.vertices.insert(v.index(), v);
        Ok(())
    }

    /// Inserts an edge into the graph, and returns the index of the edge.
    ///
    /// The edge is registered with both its head's outgoing list and its
    /// tail's incoming list.
    /// # Errors
    /// Error if either the head or the tail vertex does not exist.
    pub fn insert_edge(&mut self, edge: E) -> Result<usize, Error> {
        if !self.vertices.contains_key(&edge.head()) {
            return Err(Error::GraphVertexNotFound(edge.head()));
        }
        if !self.vertices.contains_key(&edge.tail()) {
            return Err(Error::GraphVertexNotFound(edge.tail()));
        }

        let index = self.edges.len();
        self.successors
            .entry(edge.head())
            .or_default()
            .push(index);
        self.predecessors
            .entry(edge.tail())
            .or_default()
            .push(index);
        self.edges.push(edge);

        Ok(index)
    }

    /// Returns true if at least one edge leads from head to tail.
    pub fn has_edge(&self, head: usize, tail: usize) -> bool {
        self.successors
            .get(&head)
            .map(|out| out.iter().any(|&e| self.edges[e].tail() == tail))
            .unwrap_or(false)
    }

    /// Fetches a vertex from the graph by index.
    pub fn vertex(&self, index: usize) -> Result<&V, Error> {
        self.vertices
            .get(&index)
            .ok_or(Error::GraphVertexNotFound(index))
    }

    // Fetches a mutable instance of a vertex.
    pub fn vertex_mut(&mut self, index: usize) -> Result<&mut V, Error> {
        self.vertices
            .get_mut(&index)
            .ok_or(Error::GraphVertexNotFound(index))
    }

    /// Returns all vertices in the graph, ordered by index.
    pub fn vertices(&self) -> Vec<&V> {
        self.vertices.values().collect()
    }

    /// Get a reference to every `Edge` in the `Graph`, in insertion order.
    pub fn edges(&self) -> Vec<&E> {
        self.edges.iter().collect()
    }

    /// Return all edges out for a vertex
    pub fn edges_out(&self, index: usize) -> Result<Vec<&E>, Error> {
        self.successors
            .get(&index)
            .map(|out| out.iter().map(|e| &self.edges[*e]).collect())
            .ok_or(Error::GraphVertexNotFound(index))
    }

    /// Return all edges in for a vertex
    pub fn edges_in(&self, index: usize) -> Result<Vec<&E>, Error> {
        self.predecessors
            .get(&index)
            .map(|incoming| incoming.iter().map(|e| &self.edges[*e]).collect())
            .ok_or(Error::GraphVertexNotFound(index))
    }

    /// Returns all immediate successors of a vertex from the graph.
    pub fn successors(&self, index: usize) -> Result<Vec<&V>, Error> {
        Ok(self
            .successor_indices(index)?
            .into_iter()
            .map(|successor| &self.vertices[&successor])
            .collect())
    }

    /// Returns all immediate predecessors of a vertex from the graph.
    pub fn predecessors(&self, index: usize) -> Result<Vec<&V>, Error> {
        Ok(self
            .predecessor_indices(index)?
            .into_iter()
            .map(|predecessor| &self.vertices[&predecessor])
            .collect())
    }

    /// Returns the indices of all immediate successors of a vertex, in
    /// edge insertion order and without duplicates.
    pub fn successor_indices(&self, index: usize) -> Result<Vec<usize>, Error> {
        if !self.vertices.contains_key(&index) {
            return Err(Error::GraphVertexNotFound(index));
        }
        Ok(self.successor_list(index))
    }

    /// Returns the indices of all immediate predecessors of a vertex, in
    /// edge insertion order and without duplicates.
    pub fn predecessor_indices(&self, index: usize) -> Result<Vec<usize>, Error> {
        let incoming = self
            .predecessors
            .get(&index)
            .ok_or(Error::GraphVertexNotFound(index))?;

        let mut indices = Vec::with_capacity(incoming.len());
        for edge in incoming {
            let head = self.edges[*edge].head();
            if !indices.contains(&head) {
                indices.push(head);
            }
        }
        Ok(indices)
    }

    fn successor_list(&self, index: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = Vec::new();
        if let Some(out) = self.successors.get(&index) {
            for edge in out {
                let tail = self.edges[*edge].tail();
                if !indices.contains(&tail) {
                    indices.push(tail);
                }
            }
        }
        indices
    }

    /// Computes the set of vertices unreachable from the given index.
    pub fn unreachable_vertices(&self, index: usize) -> Result<FxHashSet<usize>, Error> {
        let reachable_vertices = self.reachable_vertices(index)?;
        Ok(self
            .vertices
            .keys()
            .filter(|index| !reachable_vertices.contains(index))
            .cloned()
            .collect())
    }

    /// Computes the set of vertices reachable from the given index.
    pub fn reachable_vertices(&self, index: usize) -> Result<FxHashSet<usize>, Error> {
        if !self.has_vertex(index) {
            return Err(Error::GraphVertexNotFound(index));
        }

        let mut reachable_vertices: FxHashSet<usize> = FxHashSet::default();
        let mut queue: Vec<usize> = vec![index];

        reachable_vertices.insert(index);

        while let Some(vertex) = queue.pop() {
            for succ in self.successor_list(vertex) {
                if reachable_vertices.insert(succ) {
                    queue.push(succ)
                }
            }
        }

        Ok(reachable_vertices)
    }

    /// Compute the post order of all vertices reachable from root
    pub fn compute_post_order(&self, root: usize) -> Result<Vec<usize>, Error> {
        if !self.has_vertex(root) {
            return Err(Error::GraphVertexNotFound(root));
        }

        let mut visited: FxHashSet<usize> = FxHashSet::default();
        let mut order: Vec<usize> = Vec::new();

        // Each frame holds a vertex and the successors still to be walked,
        // reversed so that popping yields them in edge order.
        let pending = |index: usize| -> Vec<usize> {
            let mut successors = self.successor_list(index);
            successors.reverse();
            successors
        };

        let mut stack: Vec<(usize, Vec<usize>)> = vec![(root, pending(root))];
        visited.insert(root);

        loop {
            let next = match stack.last_mut() {
                Some((_, successors)) => successors.pop(),
                None => break,
            };
            match next {
                Some(successor) => {
                    if visited.insert(successor) {
                        stack.push((successor, pending(successor)));
                    }
                }
                None => {
                    if let Some((node, _)) = stack.pop() {
                        order.push(node);
                    }
                }
            }
        }

        Ok(order)
    }

    /// Compute the reverse post order of all vertices reachable from root
    pub fn compute_reverse_post_order(&self, root: usize) -> Result<Vec<usize>, Error> {
        let mut order = self.compute_post_order(root)?;
        order.reverse();
        Ok(order)
    }

    /// Determines if the graph is acyclic
    pub fn is_acyclic(&self, root: usize) -> bool {
        let mut permanent_marks: FxHashSet<usize> = FxHashSet::default();
        let mut temporary_marks: FxHashSet<usize> = FxHashSet::default();

        fn dfs_is_acyclic<V: Vertex, E: Edge>(
            graph: &Graph<V, E>,
            node: usize,
            permanent_marks: &mut FxHashSet<usize>,
            temporary_marks: &mut FxHashSet<usize>,
        ) -> bool {
            if permanent_marks.contains(&node) {
                return true;
            }
            if temporary_marks.contains(&node) {
                return false;
            }

            temporary_marks.insert(node);
            let successors_are_acyclic = graph.successor_list(node).into_iter().all(|successor| {
                dfs_is_acyclic(graph, successor, permanent_marks, temporary_marks)
            });
            if !successors_are_acyclic {
                return false;
            }
            temporary_marks.remove(&node);

            permanent_marks.insert(node);
            true
        }

        if !self.has_vertex(root) {
            return true;
        }
        dfs_is_acyclic(self, root, &mut permanent_marks, &mut temporary_marks)
    }

    /// Returns the node and edge lists of this graph for an external sink.
    pub fn export(&self) -> GraphExport {
        let mut export = GraphExport::new();

        for vertex in self.vertices.values() {
            export.add_node(vertex.name(), vertex.dot_label(), vertex.dot_fill_color());
        }

        for edge in &self.edges {
            let label = edge.dot_label();
            export.add_edge(
                self.vertices[&edge.head()].name(),
                self.vertices[&edge.tail()].name(),
                if label.is_empty() { None } else { Some(label) },
            );
        }

        export
    }

    /// Returns a string in the graphviz format
    pub fn dot_graph(&self) -> String {
        self.export().to_dot()
    }
}
