use crate::decomposition::{ArcElement, Decomposition, MatrixElement};

/// The contracted directed multigraph underlying a decomposition: one arc
/// per matrix row/column, marker edges contracted away. Adjacency is kept
/// CSR-style per tail node.
#[derive(Debug)]
pub struct Digraph {
    num_nodes: usize,
    arcs: Vec<DigraphArc>,
    out_start: Vec<usize>,
    out_arcs: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigraphArc {
    pub tail: usize,
    pub head: usize,
    pub element: MatrixElement,
}

impl Digraph {
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn arcs(&self) -> &[DigraphArc] {
        &self.arcs
    }

    /// Arcs leaving `node`, as indices into [`Self::arcs`].
    pub fn outgoing(&self, node: usize) -> &[usize] {
        &self.out_arcs[self.out_start[node]..self.out_start[node + 1]]
    }

    fn from_arcs(num_nodes: usize, arcs: Vec<DigraphArc>) -> Digraph {
        let mut out_start = vec![0usize; num_nodes + 1];
        for arc in &arcs {
            out_start[arc.tail + 1] += 1;
        }
        for i in 0..num_nodes {
            out_start[i + 1] += out_start[i];
        }
        let mut out_arcs = vec![0usize; arcs.len()];
        let mut next = out_start.clone();
        for (i, arc) in arcs.iter().enumerate() {
            out_arcs[next[arc.tail]] = i;
            next[arc.tail] += 1;
        }
        Digraph {
            num_nodes,
            arcs,
            out_start,
            out_arcs,
        }
    }
}

impl Decomposition {
    /// Assemble the directed multigraph the decomposition stands for. Node
    /// numbering is arbitrary; each arc carries its originating row or
    /// column id.
    pub fn create_digraph(&mut self) -> Digraph {
        let mut num_nodes = 0usize;
        let mut arcs: Vec<DigraphArc> = Vec::new();

        let live: Vec<usize> = self.live_members().collect();
        // component_members reuses the shared member marks, so track
        // already-emitted members separately
        let mut emitted = vec![false; self.members.len()];
        for member in live {
            if emitted[member] {
                continue;
            }
            let members = self.component_members(member);
            for &m in &members {
                emitted[m] = true;
            }
            let view = self.merge_view(&members, &[]);
            for arc in &view.arcs {
                let element = match arc.element {
                    ArcElement::Row(r) => MatrixElement::Row(r),
                    ArcElement::Col(c) => MatrixElement::Col(c),
                    ArcElement::Marker { .. } => {
                        unreachable!("marker left after contracting a whole component")
                    }
                };
                arcs.push(DigraphArc {
                    tail: num_nodes + arc.tail,
                    head: num_nodes + arc.head,
                    element,
                });
            }
            num_nodes += view.num_nodes;
        }

        Digraph::from_arcs(num_nodes, arcs)
    }
}
