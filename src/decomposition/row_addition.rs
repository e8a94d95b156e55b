use crate::decomposition::cycle::MergedGraph;
use crate::decomposition::{ArcElement, Decomposition, MemberKind};
use crate::union_find::ParityUnionFind;

/// Per-component result of planning a row addition: the member subtree, its
/// glued view, the node to split and the side of every arc incident to it
/// (false keeps the arc at the tail of the new row arc, true moves it to
/// the head).
#[derive(Debug)]
struct RowComponentPlan {
    members: Vec<usize>,
    view: MergedGraph,
    split_node: usize,
    /// (view arc index, move tail endpoint, move head endpoint); loop
    /// columns are the only arcs whose endpoints may part ways.
    moved: Vec<(usize, bool, bool)>,
}

impl Decomposition {
    /// Row addition after input validation. The new row is a tree arc; it is
    /// realizable iff some vertex of the realized graph can be split so that
    /// exactly the touched columns' cycles cross the split, with matching
    /// signs.
    pub(crate) fn add_row_checked(&mut self, row: usize, entries: &[(usize, i8)]) -> bool {
        let mut existing: Vec<(usize, i8, usize)> = Vec::new();
        let mut fresh: Vec<(usize, i8)> = Vec::new();
        for &(col, sign) in entries {
            match self.col_arc_id(col) {
                Some(arc) => existing.push((col, sign, arc)),
                None => fresh.push((col, sign)),
            }
        }

        if existing.is_empty() {
            self.build_fresh_bond(row, &fresh);
            return true;
        }

        let plans = match self.plan_row_addition(&existing) {
            Some(plans) => plans,
            None => return false,
        };
        self.commit_row_addition(row, &fresh, plans);
        true
    }

    /// A brand-new component: the row arc plus one parallel arc per co-added
    /// column, each column's fundamental cycle being exactly the new row.
    fn build_fresh_bond(&mut self, row: usize, fresh: &[(usize, i8)]) {
        let member = self.new_member(MemberKind::Series, 2);
        self.new_arc(member, ArcElement::Row(row), 0, 1);
        for &(col, sign) in fresh {
            if sign > 0 {
                self.new_arc(member, ArcElement::Col(col), 1, 0);
            } else {
                self.new_arc(member, ArcElement::Col(col), 0, 1);
            }
        }
        self.canonicalize(member);
    }

    fn plan_row_addition(&mut self, existing: &[(usize, i8, usize)]) -> Option<Vec<RowComponentPlan>> {
        let mut touched_members: Vec<usize> = Vec::new();
        for &(_, _, arc) in existing {
            let member = self.arc_member(arc);
            if !touched_members.contains(&member) {
                touched_members.push(member);
            }
        }

        let mut plans = Vec::new();
        let mut assigned: Vec<bool> = vec![false; touched_members.len()];
        for first in 0..touched_members.len() {
            if assigned[first] {
                continue;
            }
            let component = self.component_members(touched_members[first]);
            let in_component: Vec<usize> = touched_members
                .iter()
                .copied()
                .filter(|m| component.contains(m))
                .collect();
            for (i, m) in touched_members.iter().enumerate() {
                if in_component.contains(m) {
                    assigned[i] = true;
                }
            }

            let subtree = self.steiner_subtree(&component, &in_component);
            let view = self.merge_view(&subtree, &[]);

            let touched: Vec<(usize, i8)> = existing
                .iter()
                .filter(|&&(_, _, arc)| {
                    let m = self.find_member_no_compress(self.arcs[arc].member);
                    subtree.contains(&m)
                })
                .map(|&(_, sign, arc)| (arc, sign))
                .collect();

            let (split_node, moved) = self.witness_vertex_split(&view, &touched)?;
            plans.push(RowComponentPlan {
                members: subtree,
                view,
                split_node,
                moved,
            });
        }
        Some(plans)
    }

    /// Does the subtree behind `marker` (away from the merged region)
    /// realize a row path between the marker's endpoints? Such a marker acts
    /// as a tree edge of the glued view; all others act like columns.
    fn marker_expands_to_tree(&mut self, marker: usize, cache: &mut Vec<(usize, bool)>) -> bool {
        if let Some(&(_, known)) = cache.iter().find(|&&(m, _)| m == marker) {
            return known;
        }
        let twin = self.twin_of(marker);
        let member = self.arc_member(twin);

        // local spanning-forest reachability from the twin's tail to its
        // head, using rows and recursively tree-like markers
        let num_nodes = self.members[member].num_nodes;
        let arcs = self.members[member].arcs.clone();
        let mut reached = vec![false; num_nodes];
        let mut stack = vec![self.arcs[twin].tail];
        reached[self.arcs[twin].tail] = true;
        while let Some(node) = stack.pop() {
            for &a in &arcs {
                if a == twin {
                    continue;
                }
                let tree_like = match self.arcs[a].element {
                    ArcElement::Row(_) => true,
                    ArcElement::Col(_) => false,
                    ArcElement::Marker { .. } => self.marker_expands_to_tree(a, cache),
                };
                if !tree_like {
                    continue;
                }
                let (tail, head) = (self.arcs[a].tail, self.arcs[a].head);
                for (from, to) in [(tail, head), (head, tail)] {
                    if reached[from] && !reached[to] {
                        reached[to] = true;
                        stack.push(to);
                    }
                }
            }
        }
        let result = reached[self.arcs[twin].head];
        cache.push((marker, result));
        result
    }

    /// Search for a vertex of the glued view whose incident arcs can be
    /// two-colored so that exactly the touched columns' fundamental cycles
    /// cross, each in the direction its sign prescribes. Returns the vertex
    /// and the arcs that move to the new side.
    fn witness_vertex_split(
        &mut self,
        view: &MergedGraph,
        touched: &[(usize, i8)],
    ) -> Option<(usize, Vec<(usize, bool, bool)>)> {
        debug_assert!(!touched.is_empty());

        // classify view arcs: tree arcs span the local spanning forest
        let mut marker_cache: Vec<(usize, bool)> = Vec::new();
        let tree_like: Vec<bool> = view
            .arcs
            .iter()
            .map(|arc| match arc.element {
                ArcElement::Row(_) => true,
                ArcElement::Col(_) => false,
                ArcElement::Marker { .. } => self.marker_expands_to_tree(arc.arc, &mut marker_cache),
            })
            .collect();

        // adjacency over tree arcs for path computations
        let mut tree_incident: Vec<Vec<usize>> = vec![Vec::new(); view.num_nodes];
        for (i, arc) in view.arcs.iter().enumerate() {
            if tree_like[i] {
                tree_incident[arc.tail].push(i);
                tree_incident[arc.head].push(i);
            }
        }

        // the fundamental cycle of every cotree arc, as an ordered arc walk
        // from its head back to its tail (the direction of the cycle)
        let mut cycles: Vec<Option<Vec<usize>>> = Vec::new();
        for (i, arc) in view.arcs.iter().enumerate() {
            if tree_like[i] {
                cycles.push(None);
            } else {
                cycles.push(Some(Self::tree_walk(
                    view,
                    &tree_incident,
                    arc.head,
                    arc.tail,
                )?));
            }
        }

        let touched_index: Vec<usize> = touched
            .iter()
            .map(|&(arc, _)| view.arcs.iter().position(|a| a.arc == arc).expect("touched arc not in view"))
            .collect();

        // every touched cycle passes through the split vertex, so candidates
        // are the vertices of the first touched cycle
        let first = touched_index[0];
        let mut candidates: Vec<usize> = vec![view.arcs[first].head, view.arcs[first].tail];
        for &step in cycles[first].as_ref().unwrap() {
            for node in [view.arcs[step].tail, view.arcs[step].head] {
                if !candidates.contains(&node) {
                    candidates.push(node);
                }
            }
        }

        'candidate: for &node in &candidates {
            let incident: Vec<usize> = view
                .arcs
                .iter()
                .enumerate()
                .filter(|(_, a)| a.tail == node || a.head == node)
                .map(|(i, _)| i)
                .collect();
            let slot_of = |i: usize| incident.iter().position(|&x| x == i);

            let mut sides = ParityUnionFind::new(incident.len());
            // orientation votes: (slot, must_be_head_side)
            let mut votes: Vec<(usize, bool)> = Vec::new();
            // (view arc index, move tail to the new head-side node)
            let mut split_loops: Vec<(usize, bool)> = Vec::new();

            for (i, arc) in view.arcs.iter().enumerate() {
                if tree_like[i] {
                    continue;
                }
                let is_touched = touched.iter().find(|&&(a, _)| a == arc.arc).copied();

                if arc.tail == arc.head {
                    // loop columns have an empty fundamental cycle; a touched
                    // one must sit at the split vertex and gets its endpoints
                    // pulled apart, an untouched one stays a loop
                    if let Some((_, sign)) = is_touched {
                        if arc.tail != node {
                            continue 'candidate;
                        }
                        split_loops.push((i, sign > 0));
                    }
                    continue;
                }

                // the two arcs of the cycle walk incident to `node`, in
                // cycle order (walk direction head -> tail, closed by the
                // cotree arc itself)
                let walk = cycles[i].as_ref().unwrap();
                let mut full: Vec<usize> = Vec::with_capacity(walk.len() + 1);
                full.push(i);
                full.extend_from_slice(walk);

                let mut entering: Option<usize> = None;
                let mut leaving: Option<usize> = None;
                let mut at = view.arcs[i].tail; // cycle starts at the cotree tail
                for &step in &full {
                    let arc = &view.arcs[step];
                    let next = if arc.tail == at { arc.head } else { arc.tail };
                    if next == node {
                        entering = Some(step);
                    }
                    if at == node {
                        leaving = Some(step);
                    }
                    at = next;
                }
                debug_assert_eq!(at, view.arcs[i].tail);

                match (entering, leaving, is_touched) {
                    (Some(p), Some(q), Some((_, sign))) => {
                        let (p, q) = (slot_of(p).unwrap(), slot_of(q).unwrap());
                        if !sides.constrain(p, q, true) {
                            continue 'candidate;
                        }
                        // sign +1: the cycle runs from the tail side to the
                        // head side of the new row arc, so the entering arc
                        // keeps the tail
                        votes.push((p, sign < 0));
                    }
                    (Some(p), Some(q), None) => {
                        let (p, q) = (slot_of(p).unwrap(), slot_of(q).unwrap());
                        if !sides.constrain(p, q, false) {
                            continue 'candidate;
                        }
                    }
                    (None, None, Some(_)) => {
                        // a touched column whose cycle avoids this vertex
                        continue 'candidate;
                    }
                    (None, None, None) => {}
                    _ => unreachable!("cycle enters and leaves a vertex together"),
                }
            }

            // resolve orientation votes: within one parity class all votes
            // must agree after accounting for relative parity
            let mut class_flip: Vec<(usize, bool)> = Vec::new();
            let mut consistent = true;
            for &(slot, to_head) in &votes {
                let (root, parity) = sides.find(slot);
                let flip = to_head != parity;
                match class_flip.iter().find(|&&(r, _)| r == root) {
                    Some(&(_, existing)) if existing != flip => {
                        consistent = false;
                        break;
                    }
                    Some(_) => {}
                    None => class_flip.push((root, flip)),
                }
            }
            if !consistent {
                continue 'candidate;
            }

            let mut moved = Vec::new();
            for (slot, &index) in incident.iter().enumerate() {
                if split_loops.iter().any(|&(i, _)| i == index) {
                    continue;
                }
                let (root, parity) = sides.find(slot);
                let flip = class_flip
                    .iter()
                    .find(|&&(r, _)| r == root)
                    .map(|&(_, f)| f)
                    .unwrap_or(false);
                if parity != flip {
                    moved.push((index, true, true));
                }
            }
            for &(index, tail_to_head) in &split_loops {
                moved.push((index, tail_to_head, !tail_to_head));
            }
            return Some((node, moved));
        }
        None
    }

    /// Ordered walk over tree arcs from `from` to `to`; None when the two
    /// nodes are not connected by tree arcs.
    fn tree_walk(
        view: &MergedGraph,
        tree_incident: &[Vec<usize>],
        from: usize,
        to: usize,
    ) -> Option<Vec<usize>> {
        if from == to {
            return Some(Vec::new());
        }
        let mut incoming: Vec<Option<usize>> = vec![None; view.num_nodes];
        let mut visited = vec![false; view.num_nodes];
        let mut queue = std::collections::VecDeque::new();
        visited[from] = true;
        queue.push_back(from);
        'bfs: while let Some(node) = queue.pop_front() {
            for &i in &tree_incident[node] {
                let arc = &view.arcs[i];
                let next = if arc.tail == node { arc.head } else { arc.tail };
                if !visited[next] {
                    visited[next] = true;
                    incoming[next] = Some(i);
                    queue.push_back(next);
                    if next == to {
                        break 'bfs;
                    }
                }
            }
        }
        if !visited[to] {
            return None;
        }
        let mut walk = Vec::new();
        let mut node = to;
        while node != from {
            let i = incoming[node].expect("broken BFS parent chain");
            let arc = &view.arcs[i];
            walk.push(i);
            node = if arc.tail == node { arc.head } else { arc.tail };
        }
        walk.reverse();
        Some(walk)
    }

    /// Split each plan's vertex, then attach the row: either directly
    /// (single component, no new columns) or through a fresh bond carrying
    /// the row, one connector marker per component and one arc per co-added
    /// column.
    fn commit_row_addition(
        &mut self,
        row: usize,
        fresh: &[(usize, i8)],
        plans: Vec<RowComponentPlan>,
    ) {
        let direct = plans.len() == 1 && fresh.is_empty();

        let mut split: Vec<(usize, usize, usize)> = Vec::new(); // (member, tail node, head node)
        for plan in &plans {
            let member = self.collapse_subtree(&plan.members, &plan.view);
            let tail_node = plan.split_node;
            let head_node = self.members[member].num_nodes;
            self.members[member].num_nodes += 1;
            for &(index, move_tail, move_head) in &plan.moved {
                let arc = plan.view.arcs[index].arc;
                if move_tail && self.arcs[arc].tail == tail_node {
                    self.arcs[arc].tail = head_node;
                }
                if move_head && self.arcs[arc].head == tail_node {
                    self.arcs[arc].head = head_node;
                }
            }
            split.push((member, tail_node, head_node));
        }

        if direct {
            let (member, tail_node, head_node) = split[0];
            self.new_arc(member, ArcElement::Row(row), tail_node, head_node);
            self.canonicalize(member);
            return;
        }

        // bond: the row, one connector per component, one arc per new column
        let bond = self.new_member(MemberKind::Parallel, 2);
        self.new_arc(bond, ArcElement::Row(row), 0, 1);
        for &(member, tail_node, head_node) in &split {
            self.new_marker_pair(bond, 0, 1, member, tail_node, head_node);
        }
        for &(col, sign) in fresh {
            if sign > 0 {
                self.new_arc(bond, ArcElement::Col(col), 1, 0);
            } else {
                self.new_arc(bond, ArcElement::Col(col), 0, 1);
            }
        }

        for (member, _, _) in split {
            self.canonicalize(member);
        }
        let bond_member = self.find_member(bond);
        self.canonicalize(bond_member);
    }
}
