use std::collections::VecDeque;
use std::sync::Arc;

use conduit_primitives::DataType;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use super::converter::{Converter, ConverterChain, same_converter};
use super::strategy::{RegistryAction, ResolutionStrategy};

const DEFAULT_MAX_DEPTH: usize = 4;

struct Edge {
	from: DataType,
	to: DataType,
	converter: Arc<dyn Converter>,
}

/// Directed conversion graph: one vertex per data type, one edge per
/// `(source type, converter)`.
#[derive(Default)]
struct Graph {
	edges: Vec<Edge>,
	vertices: FxHashMap<DataType, usize>,
}

impl Graph {
	fn add(&mut self, converter: &Arc<dyn Converter>) -> bool {
		if self.edges.iter().any(|e| same_converter(&e.converter, converter)) {
			return false;
		}
		let to = converter.return_type().clone();
		for from in converter.source_types() {
			self.acquire(from);
			self.acquire(&to);
			self.edges.push(Edge {
				from: from.clone(),
				to: to.clone(),
				converter: converter.clone(),
			});
		}
		true
	}

	fn remove(&mut self, converter: &Arc<dyn Converter>) -> bool {
		let mut dropped = Vec::new();
		self.edges.retain(|e| {
			let keep = !same_converter(&e.converter, converter);
			if !keep {
				dropped.push((e.from.clone(), e.to.clone()));
			}
			keep
		});
		for (from, to) in &dropped {
			self.release(from);
			self.release(to);
		}
		!dropped.is_empty()
	}

	fn acquire(&mut self, vertex: &DataType) {
		*self.vertices.entry(vertex.clone()).or_default() += 1;
	}

	fn release(&mut self, vertex: &DataType) {
		if let Some(count) = self.vertices.get_mut(vertex) {
			*count -= 1;
			if *count == 0 {
				self.vertices.remove(vertex);
			}
		}
	}

	fn has_direct(&self, source: &DataType, target: &DataType) -> bool {
		self.edges
			.iter()
			.any(|e| e.from.is_compatible_with(source) && target.is_compatible_with(&e.to))
	}

	/// Breadth-first search for the shortest multi-hop path, in edge insertion order.
	fn shortest_path(&self, source: &DataType, target: &DataType, max_depth: usize) -> Option<Vec<Arc<dyn Converter>>> {
		let mut seen = FxHashSet::default();
		seen.insert(source.clone());
		let mut queue: VecDeque<(&DataType, SmallVec<[usize; 4]>)> = VecDeque::new();

		for (idx, edge) in self.edges.iter().enumerate() {
			if edge.from.is_compatible_with(source) && seen.insert(edge.to.clone()) {
				queue.push_back((&edge.to, SmallVec::from_slice(&[idx])));
			}
		}

		while let Some((at, path)) = queue.pop_front() {
			if path.len() >= max_depth {
				continue;
			}
			for (idx, edge) in self.edges.iter().enumerate() {
				if !edge.from.is_compatible_with(at) {
					continue;
				}
				let mut next = path.clone();
				next.push(idx);
				if target.is_compatible_with(&edge.to) {
					return Some(next.iter().map(|&i| self.edges[i].converter.clone()).collect());
				}
				if seen.insert(edge.to.clone()) {
					queue.push_back((&edge.to, next));
				}
			}
		}
		None
	}
}

/// Strategy that composes converters along the shortest path in the conversion graph.
///
/// Only answers pairs that need two or more hops; single-converter pairs are
/// left to the direct strategies so their ranking rules stay authoritative.
pub struct GraphStrategy {
	graph: RwLock<Graph>,
	max_depth: usize,
}

impl Default for GraphStrategy {
	fn default() -> Self {
		Self::new()
	}
}

impl GraphStrategy {
	pub fn new() -> Self {
		Self::with_max_depth(DEFAULT_MAX_DEPTH)
	}

	/// Limits chains to at most `max_depth` converters.
	pub fn with_max_depth(max_depth: usize) -> Self {
		Self {
			graph: RwLock::new(Graph::default()),
			max_depth: max_depth.max(2),
		}
	}

	pub fn vertex_count(&self) -> usize {
		self.graph.read().vertices.len()
	}

	pub fn edge_count(&self) -> usize {
		self.graph.read().edges.len()
	}

	pub fn contains_vertex(&self, data_type: &DataType) -> bool {
		self.graph.read().vertices.contains_key(data_type)
	}
}

impl ResolutionStrategy for GraphStrategy {
	fn name(&self) -> &str {
		"graph"
	}

	fn resolve(&self, source: &DataType, target: &DataType) -> Option<Arc<dyn Converter>> {
		let graph = self.graph.read();
		if graph.has_direct(source, target) {
			return None;
		}
		let links = graph.shortest_path(source, target, self.max_depth)?;
		tracing::trace!(%source, %target, hops = links.len(), "graph path found");
		let chain = ConverterChain::new(links)?;
		Some(Arc::new(chain))
	}

	fn converter_changed(&self, converter: &Arc<dyn Converter>, action: RegistryAction) {
		let mut graph = self.graph.write();
		let changed = match action {
			RegistryAction::Added => graph.add(converter),
			RegistryAction::Removed => graph.remove(converter),
		};
		if changed {
			tracing::trace!(converter = converter.name(), ?action, edges = graph.edges.len(), "conversion graph updated");
		}
	}
}
