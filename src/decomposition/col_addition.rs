use crate::decomposition::cycle::MergedGraph;
use crate::decomposition::{ArcElement, Decomposition, MemberKind};

/// Per-component result of the planning phase of a column addition: the
/// member subtree to merge, the series reorderings applied to it, the glued
/// view, and the endpoints of the witnessed row path. `start` is where the
/// fundamental cycle enters the component, `end` where it leaves.
#[derive(Debug)]
struct ColComponentPlan {
    members: Vec<usize>,
    view: MergedGraph,
    start: usize,
    end: usize,
}

impl Decomposition {
    /// Column addition after input validation. Returns false (and leaves the
    /// decomposition untouched) when the column cannot be realized as a
    /// fundamental cycle.
    pub(crate) fn add_col_checked(&mut self, col: usize, entries: &[(usize, i8)]) -> bool {
        let mut existing: Vec<(usize, i8, usize)> = Vec::new();
        let mut fresh: Vec<(usize, i8)> = Vec::new();
        for &(row, sign) in entries {
            match self.row_arc_id(row) {
                Some(arc) => existing.push((row, sign, arc)),
                None => fresh.push((row, sign)),
            }
        }

        if existing.is_empty() {
            self.build_fresh_cycle(col, &fresh);
            return true;
        }

        let plans = match self.plan_col_addition(&existing) {
            Some(plans) => plans,
            None => return false,
        };
        self.commit_col_addition(col, &fresh, plans);
        true
    }

    /// A brand-new component: the column and its (possibly empty) set of new
    /// rows form one directed cycle. A column with no rows at all is a
    /// self-loop.
    fn build_fresh_cycle(&mut self, col: usize, fresh: &[(usize, i8)]) {
        let k = fresh.len();
        if k == 0 {
            let member = self.new_member(MemberKind::Series, 1);
            self.new_arc(member, ArcElement::Col(col), 0, 0);
            return;
        }
        // nodes 0..=k around the cycle; the fundamental cycle leaves the
        // column head at node 1 and walks back to its tail at node 0
        let member = self.new_member(MemberKind::Series, k + 1);
        self.new_arc(member, ArcElement::Col(col), 0, 1);
        for (i, &(row, sign)) in fresh.iter().enumerate() {
            let from = i + 1;
            let to = (i + 2) % (k + 1);
            if sign > 0 {
                self.new_arc(member, ArcElement::Row(row), from, to);
            } else {
                self.new_arc(member, ArcElement::Row(row), to, from);
            }
        }
        self.canonicalize(member);
    }

    /// Validate the addition and assemble one plan per touched component.
    /// Nothing is mutated beyond union-find compression.
    fn plan_col_addition(&mut self, existing: &[(usize, i8, usize)]) -> Option<Vec<ColComponentPlan>> {
        // touched members, deduplicated, with their touched arcs
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

            // series members may reorder their cycle freely; put every
            // touched arc and every marker into the merged region
            // consecutively so the row path can run through them
            let mut layouts: Vec<(usize, Vec<usize>)> = Vec::new();
            for &m in &subtree {
                if self.members[m].kind != MemberKind::Series {
                    continue;
                }
                let mut relevant: Vec<usize> = Vec::new();
                let mut rest: Vec<usize> = Vec::new();
                for &a in &self.members[m].arcs.clone() {
                    let is_relevant = existing.iter().any(|&(_, _, t)| t == a)
                        || match self.arcs[a].element {
                            ArcElement::Marker { twin } => {
                                let other = self.find_member(self.arcs[twin].member);
                                subtree.contains(&other)
                            }
                            _ => false,
                        };
                    if is_relevant {
                        relevant.push(a);
                    } else {
                        rest.push(a);
                    }
                }
                if !rest.is_empty() && !relevant.is_empty() {
                    relevant.extend(rest);
                    layouts.push((m, relevant));
                }
            }

            let view = self.merge_view(&subtree, &layouts);

            let component_rows: Vec<(usize, i8)> = existing
                .iter()
                .filter(|&&(_, _, arc)| {
                    let m = self.find_member_no_compress(self.arcs[arc].member);
                    subtree.contains(&m)
                })
                .map(|&(_, sign, arc)| (arc, sign))
                .collect();

            let (start, end) = Self::witness_row_path(&view, &component_rows)?;
            plans.push(ColComponentPlan {
                members: subtree,
                view,
                start,
                end,
            });
        }
        Some(plans)
    }

    /// The minimal subtree of the member forest spanning `targets`;
    /// `component` is the full component containing them.
    pub(crate) fn steiner_subtree(&mut self, component: &[usize], targets: &[usize]) -> Vec<usize> {
        debug_assert!(!targets.is_empty());
        let root = targets[0];

        // parent pointers from a BFS over the member forest
        self.member_mark.begin(self.members.len());
        self.member_mark.set(root, root as isize);
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(root);
        while let Some(m) = queue.pop_front() {
            for &a in &self.members[m].arcs.clone() {
                if let ArcElement::Marker { twin } = self.arcs[a].element {
                    let other = self.find_member(self.arcs[twin].member);
                    if self.member_mark.get(other).is_none() {
                        self.member_mark.set(other, m as isize);
                        queue.push_back(other);
                    }
                }
            }
        }
        debug_assert!(component.iter().all(|&m| self.member_mark.get(m).is_some()));

        let mut subtree: Vec<usize> = vec![root];
        for &target in targets {
            let mut m = target;
            while !subtree.contains(&m) {
                subtree.push(m);
                m = self.member_mark.get(m).expect("target outside component") as usize;
            }
        }
        subtree
    }

    /// Check that the touched row arcs form one simple open path in the
    /// glued graph, with every prescribed sign matching the traversal
    /// direction (up to flipping the whole walk). Returns the walk's start
    /// and end nodes.
    fn witness_row_path(view: &MergedGraph, rows: &[(usize, i8)]) -> Option<(usize, usize)> {
        debug_assert!(!rows.is_empty());
        let mut degree = vec![0usize; view.num_nodes];
        let mut incident: Vec<Vec<usize>> = vec![Vec::new(); view.num_nodes];
        for (i, arc) in view.arcs.iter().enumerate() {
            if rows.iter().any(|&(a, _)| a == arc.arc) {
                degree[arc.tail] += 1;
                degree[arc.head] += 1;
                incident[arc.tail].push(i);
                incident[arc.head].push(i);
            }
        }

        if degree.iter().any(|&d| d > 2) {
            return None;
        }
        let mut endpoints = (0..view.num_nodes).filter(|&n| degree[n] == 1);
        let start = endpoints.next()?;
        let end = endpoints.next()?;
        if endpoints.next().is_some() {
            return None;
        }

        // walk the path from `start`, accumulating sign agreement
        let mut agree = 0usize;
        let mut disagree = 0usize;
        let mut visited = 0usize;
        let mut node = start;
        let mut previous = usize::MAX;
        loop {
            let Some(&index) = incident[node].iter().find(|&&i| i != previous) else {
                break;
            };
            let arc = &view.arcs[index];
            let forward = arc.tail == node;
            let sign = rows
                .iter()
                .find(|&&(a, _)| a == arc.arc)
                .expect("walk left the row path")
                .1;
            if (sign > 0) == forward {
                agree += 1;
            } else {
                disagree += 1;
            }
            visited += 1;
            node = if forward { arc.head } else { arc.tail };
            previous = index;
            if node == end {
                break;
            }
        }

        // connectivity: the walk must consume every touched row
        if visited != rows.len() {
            return None;
        }
        if agree == rows.len() {
            Some((start, end))
        } else if disagree == rows.len() {
            Some((end, start))
        } else {
            None
        }
    }

    /// Replace the members of each plan by one merged member, then attach
    /// the column: either directly (single component, no new rows) or on a
    /// fresh series spine carrying the column, one marker per component and
    /// one arc per new row.
    fn commit_col_addition(
        &mut self,
        col: usize,
        fresh: &[(usize, i8)],
        plans: Vec<ColComponentPlan>,
    ) {
        let direct = plans.len() == 1 && fresh.is_empty();

        let mut merged: Vec<(usize, usize, usize)> = Vec::new(); // (member, start, end)
        for plan in &plans {
            let member = self.collapse_subtree(&plan.members, &plan.view);
            merged.push((member, plan.start, plan.end));
        }

        if direct {
            let (member, start, end) = merged[0];
            // the cycle leaves the column head at the path start
            self.new_arc(member, ArcElement::Col(col), end, start);
            self.canonicalize(member);
            return;
        }

        // series spine: the column, one connector marker per component, one
        // arc per new row
        let total = 1 + merged.len() + fresh.len();
        let spine = self.new_member(MemberKind::Series, total);
        self.new_arc(spine, ArcElement::Col(col), 0, 1);
        let mut position = 1usize;
        for &(member, start, end) in &merged {
            let from = position;
            let to = (position + 1) % total;
            self.new_marker_pair(spine, from, to, member, start, end);
            position += 1;
        }
        for &(row, sign) in fresh {
            let from = position;
            let to = (position + 1) % total;
            if sign > 0 {
                self.new_arc(spine, ArcElement::Row(row), from, to);
            } else {
                self.new_arc(spine, ArcElement::Row(row), to, from);
            }
            position += 1;
        }
        debug_assert_eq!(position, total);

        for (member, _, _) in merged {
            self.canonicalize(member);
        }
        let spine_member = self.find_member(spine);
        self.canonicalize(spine_member);
    }

}

#[cfg(test)]
mod tests {
    use crate::decomposition::testing::{run_column_case, Expect};
    use rstest::rstest;

    #[rstest]
    #[case::single_column(
        "+1 \
         +1 \
         -1 ",
        3, 1, Expect::Network
    )]
    #[case::second_column_sign_conflict(
        "+1 +1 \
         +1  0 \
         -1 +1 ",
        3, 2, Expect::NotNetwork
    )]
    #[case::second_column_sign_conflict_negated(
        "+1 -1 \
         +1  0 \
         -1 -1 ",
        3, 2, Expect::NotNetwork
    )]
    fn small_verdicts(
        #[case] grid: &str,
        #[case] nrows: usize,
        #[case] ncols: usize,
        #[case] expect: Expect,
    ) {
        run_column_case(grid, nrows, ncols, expect);
    }

    #[rstest]
    #[case::interior(
        "+1 -1 \
         +1  0 \
          0  0 ",
        3, 2
    )]
    #[case::interior_first_negated(
        "-1 -1 \
         +1  0 \
          0  0 ",
        3, 2
    )]
    #[case::interior_second_negated(
        "-1 +1 \
         +1  0 \
          0  0 ",
        3, 2
    )]
    #[case::overlap_and_tail(
        "+1 -1 \
         +1  0 \
          0 +1 ",
        3, 2
    )]
    #[case::overlap_and_tail_same_sign(
        "+1 +1 \
         +1  0 \
          0 +1 ",
        3, 2
    )]
    #[case::overlap_and_tail_negated(
        "-1 -1 \
         +1  0 \
          0 +1 ",
        3, 2
    )]
    #[case::single_shared_row(
        "+1 +1 \
          0  0 \
          0  0 ",
        3, 2
    )]
    #[case::single_shared_row_opposite(
        "+1 -1 \
          0  0 \
          0  0 ",
        3, 2
    )]
    #[case::shared_row_plus_new(
        "+1 +1 \
          0  0 \
          0 +1 ",
        3, 2
    )]
    #[case::shared_row_plus_new_opposite(
        "+1 -1 \
          0  0 \
          0 +1 ",
        3, 2
    )]
    #[case::proper_subpath(
        "+1 -1 \
         +1  0 \
         -1 +1 \
          0  0 ",
        4, 2
    )]
    #[case::proper_subpath_same_sign(
        "+1 +1 \
         +1  0 \
         -1 -1 \
          0  0 ",
        4, 2
    )]
    #[case::subpath_with_extension(
        "+1 +1 \
         +1  0 \
         -1 -1 \
          0 +1 ",
        4, 2
    )]
    #[case::subpath_with_extension_opposite(
        "+1 -1 \
         +1  0 \
         -1 +1 \
          0 +1 ",
        4, 2
    )]
    #[case::full_overlap(
        "+1 +1 \
         +1 +1 \
         -1 -1 \
          0  0 ",
        4, 2
    )]
    #[case::full_overlap_opposite(
        "+1 -1 \
         +1 -1 \
         -1 +1 \
          0  0 ",
        4, 2
    )]
    #[case::full_overlap_with_extension(
        "+1 +1 \
         +1 +1 \
         -1 -1 \
          0 +1 ",
        4, 2
    )]
    #[case::full_overlap_with_extension_opposite(
        "+1 -1 \
         +1 -1 \
         -1 +1 \
          0 +1 ",
        4, 2
    )]
    #[case::negated_proper_subpath(
        "-1 -1 \
         -1  0 \
         +1 +1 \
          0  0 ",
        4, 2
    )]
    #[case::negated_subpath_with_extension(
        "-1 -1 \
         -1  0 \
         +1 +1 \
          0 +1 ",
        4, 2
    )]
    fn series_splits(#[case] grid: &str, #[case] nrows: usize, #[case] ncols: usize) {
        run_column_case(grid, nrows, ncols, Expect::Network);
    }

    #[rstest]
    #[case::four_parallel("1 1 1 -1 ", 1, 4)]
    #[case::parallel_then_split(
        "1 1  1 -1 \
         0 0 -1  0 ",
        2, 4
    )]
    #[case::parallel_then_split_same_sign(
        "1 1 1 1 \
         0 0 1 0 ",
        2, 4
    )]
    fn parallel_extension(#[case] grid: &str, #[case] nrows: usize, #[case] ncols: usize) {
        run_column_case(grid, nrows, ncols, Expect::Network);
    }

    #[rstest]
    #[case::two_blocks(
        "0 -1 -1 \
         1  0  1 ",
        2, 3
    )]
    #[case::two_blocks_mixed_signs(
        "0 1 -1 \
         1 0  1 ",
        2, 3
    )]
    #[case::two_blocks_negated(
        " 0 1 1 \
         -1 0 1 ",
        2, 3
    )]
    fn component_merging(#[case] grid: &str, #[case] nrows: usize, #[case] ncols: usize) {
        run_column_case(grid, nrows, ncols, Expect::Network);
    }

    #[rstest]
    #[case::a(
        "0  1  1 \
         1 -1 -1 \
        -1  1 -1 ",
        3, 3
    )]
    #[case::b(
        "0 -1 -1 \
         1  0  1 \
         0  0  0 ",
        3, 3
    )]
    #[case::c(
        "0 -1  1 \
         1 -1 -1 \
         0  0  1 ",
        3, 3
    )]
    #[case::d(
        " 1 -1  1 \
         -1  1  0 \
          0  1 -1 ",
        3, 3
    )]
    #[case::e(
        " 0  1  1 \
          0  1  0 \
         -1 -1 -1 ",
        3, 3
    )]
    #[case::f(
        "-1 1 -1 \
         -1 1 -1 \
         -1 0 -1 ",
        3, 3
    )]
    #[case::g(
        " 1 1 -1 \
          0 1  1 \
         -1 0  0 ",
        3, 3
    )]
    #[case::h(
        "1  1 -1 \
         0 -1  1 \
         1  0  0 ",
        3, 3
    )]
    #[case::i(
        "-1  0  0 \
         -1 -1 -1 \
         -1 -1 -1 ",
        3, 3
    )]
    #[case::j(
        "-1 1 -1 \
         -1 1 -1 \
          1 0 -1 ",
        3, 3
    )]
    #[case::k(
        "-1 1 0 \
         -1 0 1 \
          0 1 1 ",
        3, 3
    )]
    fn three_by_three(#[case] grid: &str, #[case] nrows: usize, #[case] ncols: usize) {
        run_column_case(grid, nrows, ncols, Expect::Either);
    }

    #[rstest]
    #[case::six_by_three_a(
        " 1 -1  1 \
         -1  1 -1 \
         -1  1  0 \
          0  1  1 \
          1  0 -1 \
          0 -1 -1 ",
        6, 3
    )]
    #[case::six_by_three_b(
        " 1 -1  1 \
         -1  1  0 \
          0  1 -1 \
          0 -1  0 \
          0  1  0 \
          0  0  1 ",
        6, 3
    )]
    #[case::three_by_four(
        " 0 -1 1  1 \
         -1 -1 0  0 \
          1  0 1 -1 ",
        3, 4
    )]
    #[case::three_by_five(
        "0  1  1  0  1 \
         0 -1 -1 -1 -1 \
         1 -1  0 -1 -1 ",
        3, 5
    )]
    fn wide_and_tall(#[case] grid: &str, #[case] nrows: usize, #[case] ncols: usize) {
        run_column_case(grid, nrows, ncols, Expect::Either);
    }

    #[rstest]
    #[case::a(
        "0  0 1 1  0  1  0  1 \
         0  0 0 0  0 -1  1 -1 \
         1 -1 0 0  1  1  0  0 \
         0  0 1 1 -1  0 -1  0 ",
        4, 8
    )]
    #[case::b(
        "0  1 0 -1  0  0 -1  0 \
         1  1 0  0  1  1 -1  1 \
         0 -1 0  0 -1 -1  0 -1 \
         0  1 1 -1  1  0 -1 -1 ",
        4, 8
    )]
    #[case::c(
        "-1 1 -1  0 -1  0 -1  0 \
         -1 0 -1  0  1 -1  1  1 \
          0 0 -1  1 -1 -1  0  0 \
         -1 1  0 -1  0 -1  1 -1 ",
        4, 8
    )]
    #[case::d(
        "-1  0 1  1 0  1  0  0 \
          0 -1 0 -1 1  0 -1 -1 \
         -1 -1 1  0 1  1 -1 -1 \
          0  0 0 -1 0 -1  1 -1 ",
        4, 8
    )]
    #[case::e(
        " 0  0 0 -1 -1 -1 0 -1 \
         -1 -1 0  0  1  1 -1 0 \
          0  0 1  0 -1 -1 0 -1 \
          0  0 1 -1 -1  0 0 -1 ",
        4, 8
    )]
    #[case::f(
        "-1  0  0  1 1 1  0 -1 \
          0 -1 -1  0 0 1  0 -1 \
          0  0  1 -1 0 0  1  1 \
          0 -1 -1  1 1 1 -1  0 ",
        4, 8
    )]
    #[case::g(
        "0  0 1 1  1  0  1  0 \
         0 -1 1 1  1  1 -1  0 \
         1  0 0 0  1  0  1  1 \
         1 -1 1 0 -1 -1 -1 -1 ",
        4, 8
    )]
    fn four_by_eight(#[case] grid: &str, #[case] nrows: usize, #[case] ncols: usize) {
        run_column_case(grid, nrows, ncols, Expect::Either);
    }

    #[rstest]
    #[case::four_by_four(
        "-1 +1 -1  0 \
         -1  0 -1  0 \
          0  0 -1 +1 \
         -1 +1  0 -1 ",
        4, 4
    )]
    #[case::a(
        " 0  1  1 0  0 \
          0 -1 -1 1  0 \
          0  0 -1 1  0 \
         -1 -1  0 0 -1 \
         -1 -1 -1 1  0 ",
        5, 5
    )]
    #[case::b(
        "-1 0 1  1 -1 \
         -1 1 1  1  0 \
          0 0 1  1  1 \
         -1 1 0 -1  0 \
         -1 1 0  0 -1 ",
        5, 5
    )]
    #[case::c(
        " 0  1  1 0 -1 \
          0 -1  0 1 -1 \
          1  1  1 0  1 \
          0  0  1 1  0 \
         -1  0 -1 0  1 ",
        5, 5
    )]
    #[case::d(
        "1 -1 -1  1  0 \
         0  0 -1  1 -1 \
         1 -1  0  0  1 \
         0  1  1 -1  0 \
         0 -1  0  1  0 ",
        5, 5
    )]
    #[case::e(
        " 0  1 0  1  1 \
         -1  1 1  0  0 \
          0  0 0 -1 -1 \
          1 -1 0  0 -1 \
         -1  1 0  1  1 ",
        5, 5
    )]
    #[case::f(
        " 0 -1  1  0  0 \
         -1  0 -1  0  0 \
          0 -1  1  1 -1 \
         -1  1 -1 -1  0 \
          1  0  0 -1  0 ",
        5, 5
    )]
    #[case::g(
        " 1  0  1  0  0 \
          0 -1  0  1  0 \
          0  1 -1 -1  0 \
         -1  0 -1 -1 -1 \
         -1 -1  0  1 -1 ",
        5, 5
    )]
    #[case::h(
        " 1 1  1 -1  0 \
          1 0  0  0 -1 \
         -1 0 -1  1  1 \
          0 0  0 -1 -1 \
          1 1  0 -1  0 ",
        5, 5
    )]
    #[case::i(
        "1 -1  0 -1 1 \
         1 -1 -1 -1 1 \
         0  0 -1  0 0 \
         0 -1 -1  0 0 \
         1  0  0  0 1 ",
        5, 5
    )]
    fn five_by_five(#[case] grid: &str, #[case] nrows: usize, #[case] ncols: usize) {
        run_column_case(grid, nrows, ncols, Expect::Either);
    }
}
