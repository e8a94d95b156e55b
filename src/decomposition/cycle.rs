use crate::decomposition::{ArcElement, Decomposition, MemberKind};
use crate::union_find::UnionFind;

/// A set of members glued along their internal twin markers: the piece of
/// the realized graph those members stand for. Markers to members outside
/// the set survive as arcs; internal markers disappear.
#[derive(Debug)]
pub(crate) struct MergedGraph {
    pub(crate) num_nodes: usize,
    pub(crate) arcs: Vec<MergedArc>,
}

#[derive(Debug, Clone)]
pub(crate) struct MergedArc {
    /// Source arc in the arena.
    pub(crate) arc: usize,
    pub(crate) element: ArcElement,
    pub(crate) tail: usize,
    pub(crate) head: usize,
}

impl MergedGraph {
    pub(crate) fn find_arc(&self, arc: usize) -> Option<&MergedArc> {
        self.arcs.iter().find(|a| a.arc == arc)
    }
}

impl Decomposition {
    /// All members of the connected component (of the member forest)
    /// containing `start`.
    pub(crate) fn component_members(&mut self, start: usize) -> Vec<usize> {
        let start = self.find_member(start);
        self.member_mark.begin(self.members.len());
        self.member_mark.set(start, 1);
        let mut stack = vec![start];
        let mut collected = Vec::new();
        while let Some(m) = stack.pop() {
            collected.push(m);
            for &a in &self.members[m].arcs.clone() {
                if let ArcElement::Marker { twin } = self.arcs[a].element {
                    let other = self.find_member(self.arcs[twin].member);
                    if self.member_mark.get(other).is_none() {
                        self.member_mark.set(other, 1);
                        stack.push(other);
                    }
                }
            }
        }
        collected
    }

    /// Walk the cycle graph of a series member and report, per arc, whether
    /// it points along the traversal direction. Rebuilding the cycle in a
    /// different order must preserve exactly this orientation sense.
    pub(crate) fn series_forwardness(&self, member: usize) -> Vec<(usize, bool)> {
        let num_nodes = self.members[member].num_nodes;
        let mut incident: Vec<Vec<usize>> = vec![Vec::new(); num_nodes];
        for &arc in &self.members[member].arcs {
            incident[self.arcs[arc].tail].push(arc);
            incident[self.arcs[arc].head].push(arc);
        }

        let mut order = Vec::with_capacity(self.members[member].arcs.len());
        let mut node = self.arcs[self.members[member].arcs[0]].tail;
        let mut previous = usize::MAX;
        loop {
            let arc = *incident[node]
                .iter()
                .find(|&&a| a != previous)
                .expect("series member is not a closed cycle");
            let forward = self.arcs[arc].tail == node;
            order.push((arc, forward));
            node = if forward {
                self.arcs[arc].head
            } else {
                self.arcs[arc].tail
            };
            previous = arc;
            if order.len() == self.members[member].arcs.len() {
                break;
            }
        }
        order
    }

    /// Glue `members` into one graph. `series_layout` optionally replaces a
    /// series member's stored cyclic order with the given one (orientation
    /// per arc is preserved); this is the reordering freedom of series
    /// members made explicit.
    pub(crate) fn merge_view(
        &self,
        members: &[usize],
        series_layout: &[(usize, Vec<usize>)],
    ) -> MergedGraph {
        // local edge lists, series members possibly rebuilt
        let mut local: Vec<(usize, Vec<(usize, usize, usize)>, usize)> = Vec::new();
        for &m in members {
            let layout = series_layout.iter().find(|&&(lm, _)| lm == m);
            match layout {
                Some((_, order)) => {
                    debug_assert_eq!(self.members[m].kind, MemberKind::Series);
                    debug_assert_eq!(order.len(), self.members[m].arcs.len());
                    let forwardness = self.series_forwardness(m);
                    let k = order.len();
                    let edges = order
                        .iter()
                        .enumerate()
                        .map(|(i, &arc)| {
                            let forward = forwardness
                                .iter()
                                .find(|&&(a, _)| a == arc)
                                .expect("layout arc not in member")
                                .1;
                            if forward {
                                (arc, i, (i + 1) % k)
                            } else {
                                (arc, (i + 1) % k, i)
                            }
                        })
                        .collect();
                    local.push((m, edges, k));
                }
                None => {
                    let edges = self.members[m]
                        .arcs
                        .iter()
                        .map(|&arc| (arc, self.arcs[arc].tail, self.arcs[arc].head))
                        .collect();
                    local.push((m, edges, self.members[m].num_nodes));
                }
            }
        }

        let mut offset = vec![0usize; members.len()];
        let mut total = 0usize;
        for (i, &(_, _, nodes)) in local.iter().enumerate() {
            offset[i] = total;
            total += nodes;
        }
        let member_position = |view: &Decomposition, member: usize| -> Option<usize> {
            members
                .iter()
                .position(|&m| view.find_member_no_compress(m) == member)
        };

        // glue twin markers whose both sides are in the set
        let mut nodes = UnionFind::new(total);
        let mut internal: Vec<bool> = vec![false; self.arcs.len()];
        for (i, (_, edges, _)) in local.iter().enumerate() {
            for &(arc, tail, head) in edges {
                if internal[arc] {
                    continue;
                }
                if let ArcElement::Marker { twin } = self.arcs[arc].element {
                    let other = self.find_member_no_compress(self.arcs[twin].member);
                    if let Some(j) = member_position(self, other) {
                        let twin_edge = local[j]
                            .1
                            .iter()
                            .find(|&&(a, _, _)| a == twin)
                            .copied()
                            .expect("twin not in its member's edge list");
                        nodes.union(offset[i] + tail, offset[j] + twin_edge.1);
                        nodes.union(offset[i] + head, offset[j] + twin_edge.2);
                        internal[arc] = true;
                        internal[twin] = true;
                    }
                }
            }
        }

        // compact the glued node classes
        let mut class_id = vec![usize::MAX; total];
        let mut num_nodes = 0usize;
        let mut arcs = Vec::new();
        for (i, (_, edges, _)) in local.iter().enumerate() {
            for &(arc, tail, head) in edges {
                if internal[arc] {
                    continue;
                }
                let mut endpoints = [0usize; 2];
                for (slot, node) in [(0, tail), (1, head)] {
                    let root = nodes.find(offset[i] + node);
                    if class_id[root] == usize::MAX {
                        class_id[root] = num_nodes;
                        num_nodes += 1;
                    }
                    endpoints[slot] = class_id[root];
                }
                arcs.push(MergedArc {
                    arc,
                    element: self.arcs[arc].element,
                    tail: endpoints[0],
                    head: endpoints[1],
                });
            }
        }

        MergedGraph { num_nodes, arcs }
    }

    /// Collapse a glued member subtree into its first member: the view
    /// becomes that member's internal graph, internal markers die, and the
    /// other members are unioned away. The caller re-canonicalizes after
    /// inserting the new arcs.
    pub(crate) fn collapse_subtree(&mut self, members: &[usize], view: &MergedGraph) -> usize {
        let survivor = members[0];

        let mut in_view = vec![false; self.arcs.len()];
        for arc in &view.arcs {
            in_view[arc.arc] = true;
        }
        for &m in members {
            for &a in &self.members[m].arcs.clone() {
                if !in_view[a] {
                    debug_assert!(self.arcs[a].element.is_marker());
                    self.kill_arc(a);
                }
            }
            self.members[m].arcs.clear();
        }

        for arc in &view.arcs {
            self.arcs[arc.arc].tail = arc.tail;
            self.arcs[arc.arc].head = arc.head;
            self.arcs[arc.arc].member = survivor;
            self.members[survivor].arcs.push(arc.arc);
        }
        self.members[survivor].num_nodes = view.num_nodes;
        self.members[survivor].kind = MemberKind::Rigid;
        for &m in &members[1..] {
            self.union_into(survivor, m);
        }
        survivor
    }

    /// Recompute the fundamental cycle the decomposition claims for `col`
    /// and compare it, as a signed set, against the given row support.
    /// Diagnostic only; observable state is untouched.
    pub fn verify_cycle(&mut self, col: usize, entries: &[(usize, i8)]) -> bool {
        let Some(col_arc) = self.col_arc_id(col) else {
            return false;
        };
        if entries
            .iter()
            .any(|&(row, value)| !self.contains_row(row) || (value != 1 && value != -1))
        {
            return false;
        }

        let member = self.arc_member(col_arc);
        let members = self.component_members(member);
        let view = self.merge_view(&members, &[]);

        let col_edge = view.find_arc(col_arc).expect("column arc not realized");
        let (from, to) = (col_edge.head, col_edge.tail);

        // the tree path from head to tail over row arcs; row arcs form a
        // forest, so a plain BFS finds the unique path
        let mut incoming: Vec<Option<(usize, bool)>> = vec![None; view.num_nodes];
        let mut visited = vec![false; view.num_nodes];
        let mut queue = std::collections::VecDeque::new();
        visited[from] = true;
        queue.push_back(from);
        while let Some(node) = queue.pop_front() {
            if node == to {
                break;
            }
            for (i, arc) in view.arcs.iter().enumerate() {
                if !arc.element.is_row() {
                    continue;
                }
                let next = if arc.tail == node {
                    Some((arc.head, true))
                } else if arc.head == node {
                    Some((arc.tail, false))
                } else {
                    None
                };
                if let Some((next, forward)) = next {
                    if !visited[next] {
                        visited[next] = true;
                        incoming[next] = Some((i, forward));
                        queue.push_back(next);
                    }
                }
            }
        }

        if from != to && !visited[to] {
            return false;
        }

        let mut cycle: Vec<(usize, i8)> = Vec::new();
        let mut node = to;
        while node != from {
            let (arc_index, forward) = incoming[node].expect("broken BFS parent chain");
            let arc = &view.arcs[arc_index];
            let row = match arc.element {
                ArcElement::Row(r) => r,
                _ => unreachable!(),
            };
            cycle.push((row, if forward { 1 } else { -1 }));
            node = if forward { arc.tail } else { arc.head };
        }

        if cycle.len() != entries.len() {
            return false;
        }
        cycle
            .iter()
            .all(|&(row, sign)| entries.iter().any(|&e| e == (row, sign)))
    }
}
