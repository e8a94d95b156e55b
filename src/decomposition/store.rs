use crate::decomposition::{
    Arc, ArcElement, Decomposition, Member, MemberKind, EMPTY,
};

/// Arena-level operations: member/arc creation, the union-find over member
/// slots, and the normalization pass that restores minimality after a graft.
impl Decomposition {
    pub(crate) fn new_member(&mut self, kind: MemberKind, num_nodes: usize) -> usize {
        let id = self.members.len();
        self.members.push(Member {
            kind,
            arcs: Vec::new(),
            num_nodes,
            alive: true,
        });
        self.representative.push(EMPTY);
        id
    }

    pub(crate) fn new_arc(
        &mut self,
        member: usize,
        element: ArcElement,
        tail: usize,
        head: usize,
    ) -> usize {
        let id = self.arcs.len();
        self.arcs.push(Arc {
            element,
            member,
            tail,
            head,
            alive: true,
        });
        self.members[member].arcs.push(id);
        self.link_element(element, id);
        id
    }

    /// Create a twin marker pair joining `member_a` and `member_b`. Twins are
    /// glued head-to-head and tail-to-tail, so the given endpoints must refer
    /// to the same two underlying vertices on both sides.
    pub(crate) fn new_marker_pair(
        &mut self,
        member_a: usize,
        tail_a: usize,
        head_a: usize,
        member_b: usize,
        tail_b: usize,
        head_b: usize,
    ) -> (usize, usize) {
        let a = self.arcs.len();
        let b = a + 1;
        self.arcs.push(Arc {
            element: ArcElement::Marker { twin: b },
            member: member_a,
            tail: tail_a,
            head: head_a,
            alive: true,
        });
        self.arcs.push(Arc {
            element: ArcElement::Marker { twin: a },
            member: member_b,
            tail: tail_b,
            head: head_b,
            alive: true,
        });
        self.members[member_a].arcs.push(a);
        self.members[member_b].arcs.push(b);
        (a, b)
    }

    /// Representative member slot, with two-pass path compression. Ranks are
    /// stored as negative numbers in the representative's own slot.
    pub(crate) fn find_member(&mut self, start: usize) -> usize {
        let mut current = start;
        while self.representative[current] >= 0 {
            current = self.representative[current] as usize;
        }
        let root = current;

        current = start;
        while self.representative[current] >= 0 {
            let next = self.representative[current] as usize;
            self.representative[current] = root as isize;
            current = next;
        }
        root
    }

    pub(crate) fn find_member_no_compress(&self, start: usize) -> usize {
        let mut current = start;
        while self.representative[current] >= 0 {
            current = self.representative[current] as usize;
        }
        current
    }

    /// Union `from` (a representative) into `into` (a representative), which
    /// stays the representative and keeps the member data.
    pub(crate) fn union_into(&mut self, into: usize, from: usize) {
        debug_assert!(self.representative[into] < 0);
        debug_assert!(self.representative[from] < 0);
        debug_assert_ne!(into, from);
        let merged_rank = self.representative[into].min(self.representative[from] - 1);
        self.representative[into] = merged_rank;
        self.representative[from] = into as isize;
        self.members[from].alive = false;
    }

    pub(crate) fn arc_member(&mut self, arc: usize) -> usize {
        let slot = self.arcs[arc].member;
        let root = self.find_member(slot);
        self.arcs[arc].member = root;
        root
    }

    pub(crate) fn twin_of(&self, marker: usize) -> usize {
        match self.arcs[marker].element {
            ArcElement::Marker { twin } => twin,
            _ => unreachable!("twin_of on a matrix arc"),
        }
    }

    /// Remove `arc` from `member`'s arc list without killing it.
    pub(crate) fn detach_arc(&mut self, member: usize, arc: usize) {
        let position = self.members[member]
            .arcs
            .iter()
            .position(|&a| a == arc)
            .expect("arc not in member");
        self.members[member].arcs.swap_remove(position);
    }

    pub(crate) fn kill_arc(&mut self, arc: usize) {
        self.arcs[arc].alive = false;
    }

    /// Renumber the nodes actually used by `member`'s arcs to 0..n.
    pub(crate) fn compact_nodes(&mut self, member: usize) {
        self.node_mark.begin(self.members[member].num_nodes);
        let mut next = 0isize;
        let arcs = self.members[member].arcs.clone();
        for arc in arcs {
            for endpoint in [self.arcs[arc].tail, self.arcs[arc].head] {
                if self.node_mark.get(endpoint).is_none() {
                    self.node_mark.set(endpoint, next);
                    next += 1;
                }
            }
            self.arcs[arc].tail = self.node_mark.get(self.arcs[arc].tail).unwrap() as usize;
            self.arcs[arc].head = self.node_mark.get(self.arcs[arc].head).unwrap() as usize;
        }
        self.members[member].num_nodes = next as usize;
    }

    fn node_degrees(&self, member: usize) -> Vec<usize> {
        let mut degree = vec![0usize; self.members[member].num_nodes];
        for &arc in &self.members[member].arcs {
            degree[self.arcs[arc].tail] += 1;
            degree[self.arcs[arc].head] += 1;
        }
        degree
    }

    fn is_bond(&self, member: usize) -> bool {
        let arcs = &self.members[member].arcs;
        let first = self.arcs[arcs[0]].clone();
        let pair = (first.tail.min(first.head), first.tail.max(first.head));
        arcs.iter().all(|&a| {
            let arc = &self.arcs[a];
            (arc.tail.min(arc.head), arc.tail.max(arc.head)) == pair
        })
    }

    fn is_cycle(&self, member: usize) -> bool {
        // connectedness is implied for our 2-connected member graphs, so a
        // uniform degree of two suffices
        self.node_degrees(member).iter().all(|&d| d == 2)
    }

    /// Move every arc of a (tail, head) parallel class of at least two arcs
    /// into a fresh parallel child, leaving one marker behind. Returns the
    /// child when a proper class exists.
    fn extract_parallel_class(&mut self, member: usize) -> Option<usize> {
        let arcs = self.members[member].arcs.clone();
        let mut class: Vec<usize> = Vec::new();
        let mut class_pair = (0usize, 0usize);
        'outer: for (i, &a) in arcs.iter().enumerate() {
            let arc = &self.arcs[a];
            let pair = (arc.tail.min(arc.head), arc.tail.max(arc.head));
            for &b in &arcs[i + 1..] {
                let other = &self.arcs[b];
                if (other.tail.min(other.head), other.tail.max(other.head)) == pair {
                    class_pair = pair;
                    class = arcs
                        .iter()
                        .copied()
                        .filter(|&x| {
                            let arc = &self.arcs[x];
                            (arc.tail.min(arc.head), arc.tail.max(arc.head)) == pair
                        })
                        .collect();
                    break 'outer;
                }
            }
        }
        if class.is_empty() || class.len() == self.members[member].arcs.len() {
            return None;
        }

        let (u, v) = class_pair;
        let child = self.new_member(MemberKind::Parallel, 2);
        for &a in &class {
            self.detach_arc(member, a);
            let tail = if self.arcs[a].tail == u { 0 } else { 1 };
            self.arcs[a].tail = tail;
            self.arcs[a].head = 1 - tail;
            self.arcs[a].member = child;
            self.members[child].arcs.push(a);
        }
        self.new_marker_pair(member, u, v, child, 0, 1);
        Some(child)
    }

    /// Split a maximal chain of arcs through degree-two nodes into a fresh
    /// series child, leaving one marker behind. Returns the child when a
    /// chain of at least two arcs exists.
    fn extract_series_chain(&mut self, member: usize) -> Option<usize> {
        let degree = self.node_degrees(member);
        let num_nodes = self.members[member].num_nodes;

        // adjacency restricted to what the walk needs
        let mut incident: Vec<Vec<usize>> = vec![Vec::new(); num_nodes];
        for &arc in &self.members[member].arcs {
            incident[self.arcs[arc].tail].push(arc);
            incident[self.arcs[arc].head].push(arc);
        }

        let start = (0..num_nodes).find(|&n| degree[n] == 2)?;

        // walk both directions from `start` while interior nodes have degree 2
        let mut chain: Vec<usize> = Vec::new();
        let mut endpoints = [0usize; 2];
        for (direction, slot) in [(0usize, 0usize), (1, 1)] {
            let mut previous_arc = incident[start][direction];
            let mut node = start;
            loop {
                let arc = &self.arcs[previous_arc];
                let next = if arc.tail == node { arc.head } else { arc.tail };
                if direction == 0 {
                    chain.insert(0, previous_arc);
                } else {
                    chain.push(previous_arc);
                }
                if degree[next] != 2 || next == start {
                    endpoints[slot] = next;
                    break;
                }
                previous_arc = *incident[next]
                    .iter()
                    .find(|&&a| a != previous_arc)
                    .expect("degree-two node with one incident arc");
                node = next;
            }
        }
        debug_assert!(chain.len() >= 2);
        debug_assert_ne!(endpoints[0], endpoints[1], "member graph lost 2-connectivity");

        let (p, q) = (endpoints[0], endpoints[1]);
        let child = self.new_member(MemberKind::Series, chain.len() + 1);

        // child nodes 0..=k along the chain, node 0 being the copy of p
        let mut node_at = p;
        let mut local = 0usize;
        for &a in &chain {
            self.detach_arc(member, a);
            let arc = &self.arcs[a];
            let (tail, head, next_node) = if arc.tail == node_at {
                (local, local + 1, arc.head)
            } else {
                (local + 1, local, arc.tail)
            };
            self.arcs[a].tail = tail;
            self.arcs[a].head = head;
            self.arcs[a].member = child;
            self.members[child].arcs.push(a);
            node_at = next_node;
            local += 1;
        }
        debug_assert_eq!(node_at, q);

        self.new_marker_pair(member, p, q, child, 0, chain.len());
        self.compact_nodes(member);
        Some(child)
    }

    /// Merge a two-arc member into the member on the other side of its
    /// marker: the surviving arc takes over the twin's place. Returns the
    /// member that absorbed the arc, or None for a markerless root pair.
    fn contract_two_arc(&mut self, member: usize) -> Option<usize> {
        let arcs = self.members[member].arcs.clone();
        debug_assert!(arcs.len() <= 2);
        let marker = *arcs.iter().find(|&&a| self.arcs[a].element.is_marker())?;
        let survivor = *arcs.iter().find(|&&a| a != marker)?;

        let twin = self.twin_of(marker);
        let target = self.arc_member(twin);

        let aligned = self.arcs[survivor].tail == self.arcs[marker].tail;
        let (twin_tail, twin_head) = (self.arcs[twin].tail, self.arcs[twin].head);
        if aligned {
            self.arcs[survivor].tail = twin_tail;
            self.arcs[survivor].head = twin_head;
        } else {
            self.arcs[survivor].tail = twin_head;
            self.arcs[survivor].head = twin_tail;
        }
        self.arcs[survivor].member = target;

        self.detach_arc(target, twin);
        self.kill_arc(twin);
        self.kill_arc(marker);
        self.members[member].arcs.clear();
        self.members[target].arcs.push(survivor);
        self.union_into(target, member);
        Some(target)
    }

    /// Contract the marker between `member` and the twin's member, pulling
    /// every arc of the twin side into `member`. Used to merge like-kind
    /// neighbors and the member chains of the augmentation algorithms.
    pub(crate) fn absorb_through_marker(&mut self, member: usize, marker: usize) {
        let twin = self.twin_of(marker);
        let other = self.arc_member(twin);
        debug_assert_ne!(member, other);

        // twin endpoints are glued: head to head, tail to tail
        let offset = self.members[member].num_nodes;
        self.node_mark.begin(self.members[other].num_nodes);
        self.node_mark
            .set(self.arcs[twin].tail, self.arcs[marker].tail as isize);
        self.node_mark
            .set(self.arcs[twin].head, self.arcs[marker].head as isize);

        let mut next = offset as isize;
        let moved = self.members[other].arcs.clone();
        for arc in moved {
            if arc == twin {
                continue;
            }
            for side in [self.arcs[arc].tail, self.arcs[arc].head] {
                if self.node_mark.get(side).is_none() {
                    self.node_mark.set(side, next);
                    next += 1;
                }
            }
            self.arcs[arc].tail = self.node_mark.get(self.arcs[arc].tail).unwrap() as usize;
            self.arcs[arc].head = self.node_mark.get(self.arcs[arc].head).unwrap() as usize;
            self.arcs[arc].member = member;
            self.members[member].arcs.push(arc);
        }
        self.members[member].num_nodes = next as usize;

        self.detach_arc(member, marker);
        self.kill_arc(marker);
        self.kill_arc(twin);
        self.members[other].arcs.clear();
        self.union_into(member, other);
        self.compact_nodes(member);
    }

    /// Merge every series-series / parallel-parallel marker adjacency of
    /// `member`; a minimal decomposition has no like-kind pairs.
    fn absorb_like_neighbors(&mut self, member: usize) -> usize {
        loop {
            let kind = self.members[member].kind;
            if kind == MemberKind::Rigid {
                return member;
            }
            let marker = self.members[member].arcs.iter().copied().find(|&a| {
                if !self.arcs[a].element.is_marker() {
                    return false;
                }
                let twin = self.twin_of(a);
                let other = self.find_member_no_compress(self.arcs[twin].member);
                other != member && self.members[other].kind == kind
            });
            match marker {
                Some(marker) => self.absorb_through_marker(member, marker),
                None => return member,
            }
        }
    }

    /// Restore canonical form for `member` after a structural change:
    /// classify it, split off parallel classes and series chains, contract a
    /// degenerate two-arc remainder, and merge like-kind neighbors.
    pub(crate) fn canonicalize(&mut self, member: usize) -> usize {
        let mut member = self.find_member(member);
        self.compact_nodes(member);
        let mut children: Vec<usize> = Vec::new();
        loop {
            let n = self.members[member].arcs.len();
            if n == 0 {
                self.members[member].alive = false;
                return member;
            }
            if n <= 2 {
                match self.contract_two_arc(member) {
                    Some(target) => {
                        member = target;
                        continue;
                    }
                    None => {
                        // a root pair (or lone arc); a two-cycle counts as series
                        self.members[member].kind = MemberKind::Series;
                        return member;
                    }
                }
            }
            if self.is_bond(member) {
                self.members[member].kind = MemberKind::Parallel;
                break;
            }
            if self.is_cycle(member) {
                self.members[member].kind = MemberKind::Series;
                break;
            }
            if let Some(child) = self.extract_parallel_class(member) {
                children.push(child);
                continue;
            }
            if let Some(child) = self.extract_series_chain(member) {
                children.push(child);
                continue;
            }
            self.members[member].kind = MemberKind::Rigid;
            break;
        }
        // extracted children may themselves sit next to a like-kind member
        // through a marker that moved into them
        for child in children {
            let child = self.find_member(child);
            if self.members[child].alive {
                self.absorb_like_neighbors(child);
            }
        }
        let member = self.find_member(member);
        self.absorb_like_neighbors(member)
    }

    pub(crate) fn live_members(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.members.len())
            .filter(|&m| self.representative[m] < 0 && self.members[m].alive)
    }

    /// Debug query: no like-kind marker adjacency, and every member below a
    /// parent has at least three arcs. Must hold after every accepted
    /// mutation.
    pub fn is_minimal(&self) -> bool {
        for m in self.live_members() {
            let kind = self.members[m].kind;
            let mut has_marker = false;
            for &a in &self.members[m].arcs {
                if !self.arcs[a].element.is_marker() {
                    continue;
                }
                has_marker = true;
                let twin = self.twin_of(a);
                let other = self.find_member_no_compress(self.arcs[twin].member);
                if other != m && kind != MemberKind::Rigid && self.members[other].kind == kind {
                    return false;
                }
            }
            if has_marker && self.members[m].arcs.len() < 3 {
                return false;
            }
        }
        true
    }

    /// Unlink the rows and columns of an abandoned block and drop its
    /// members, so the instance can keep growing with later blocks.
    pub fn remove_component(&mut self, rows: &[usize], cols: &[usize]) {
        let mut doomed: Vec<usize> = Vec::new();
        self.member_mark.begin(self.members.len());

        let seeds: Vec<usize> = rows
            .iter()
            .filter_map(|&r| self.row_arc_id(r))
            .chain(cols.iter().filter_map(|&c| self.col_arc_id(c)))
            .collect();
        for arc in seeds {
            let member = self.arc_member(arc);
            if self.member_mark.get(member).is_some() {
                continue;
            }
            // collect the whole connected component of the member forest
            self.member_mark.set(member, 1);
            let mut stack = vec![member];
            while let Some(m) = stack.pop() {
                doomed.push(m);
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
        }

        for m in doomed {
            for &a in &self.members[m].arcs.clone() {
                match self.arcs[a].element {
                    ArcElement::Row(r) => self.row_arc[r] = EMPTY,
                    ArcElement::Col(c) => self.col_arc[c] = EMPTY,
                    ArcElement::Marker { .. } => {}
                }
                self.kill_arc(a);
            }
            self.members[m].arcs.clear();
            self.members[m].alive = false;
        }
    }
}
