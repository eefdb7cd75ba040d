use crate::flow::{FlowDefinition, NodeId, VariableId};
use ahash::AHashMap;

/// Precomputed traversal structure for one run: an arena of node records
/// addressed by integer index, adjacency and in-degree over those indices,
/// and the input-port to output-port wiring over `VariableId`s.
///
/// Arena order equals the node-list order of the definition, which makes the
/// ready-queue tie-break (FIFO discovery order) deterministic.
///
/// Edges referencing a port id absent from the declared ports of either
/// endpoint are filtered out before indexing. The editor is expected to keep
/// edges consistent; stale data must not crash the executor, so invalid
/// edges are silently excluded. When several surviving edges target the same
/// input port, the last one in list order wins.
#[derive(Debug)]
pub struct GraphIndex {
    ids: Vec<NodeId>,
    index_of: AHashMap<NodeId, usize>,
    successors: Vec<Vec<usize>>,
    in_degree: Vec<usize>,
    source_of_input: AHashMap<VariableId, VariableId>,
}

impl GraphIndex {
    pub fn build(flow: &FlowDefinition) -> Self {
        let ids: Vec<NodeId> = flow.nodes.iter().map(|n| n.id.clone()).collect();
        let index_of: AHashMap<NodeId, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        // Declared port ownership, used to validate edge endpoints.
        let mut output_owner: AHashMap<&str, usize> = AHashMap::new();
        let mut input_owner: AHashMap<&str, usize> = AHashMap::new();
        for (i, node) in flow.nodes.iter().enumerate() {
            for port in node.config.output_ports() {
                output_owner.insert(port.id.as_str(), i);
            }
            for port in node.config.input_ports() {
                input_owner.insert(port.id.as_str(), i);
            }
        }

        // Surviving edge per input port, last-in-list wins.
        let mut winner: AHashMap<&str, usize> = AHashMap::new();
        for (e, edge) in flow.edges.iter().enumerate() {
            let source = index_of.get(&edge.source_node_id).copied();
            let target = index_of.get(&edge.target_node_id).copied();
            let (Some(source), Some(target)) = (source, target) else {
                continue;
            };
            if output_owner.get(edge.source_output_port_id.as_str()) != Some(&source) {
                continue;
            }
            if input_owner.get(edge.target_input_port_id.as_str()) != Some(&target) {
                continue;
            }
            winner.insert(edge.target_input_port_id.as_str(), e);
        }

        // Adjacency follows edge-list order so the ready queue discovers
        // simultaneously released successors reproducibly.
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
        let mut in_degree: Vec<usize> = vec![0; ids.len()];
        let mut source_of_input: AHashMap<VariableId, VariableId> = AHashMap::new();
        for (e, edge) in flow.edges.iter().enumerate() {
            if winner.get(edge.target_input_port_id.as_str()) != Some(&e) {
                continue;
            }
            let source = index_of.get(&edge.source_node_id).copied();
            let target = index_of.get(&edge.target_node_id).copied();
            let (Some(source), Some(target)) = (source, target) else {
                continue;
            };
            successors[source].push(target);
            in_degree[target] += 1;
            source_of_input.insert(
                edge.target_input_port_id.clone(),
                edge.source_output_port_id.clone(),
            );
        }

        Self {
            ids,
            index_of,
            successors,
            in_degree,
            source_of_input,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn node_id(&self, index: usize) -> &NodeId {
        &self.ids[index]
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.index_of.get(id).copied()
    }

    pub fn in_degree(&self, index: usize) -> usize {
        self.in_degree[index]
    }

    pub fn successors(&self, index: usize) -> &[usize] {
        &self.successors[index]
    }

    /// The output port feeding the given input port, if connected.
    pub fn source_of_input(&self, input_port: &str) -> Option<&VariableId> {
        self.source_of_input.get(input_port)
    }
}
