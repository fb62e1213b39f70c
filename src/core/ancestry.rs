//! core::ancestry
//!
//! Read-only ancestry queries over the commit graph.
//!
//! # Queries
//!
//! - [`Ancestry::ancestors`] - breadth-first ancestor enumeration, nearest first
//! - [`Ancestry::is_ancestor`] - reflexive reachability test
//! - [`Ancestry::merge_base`] - first breadth-first ancestor of `a` reachable from `b`
//! - [`Ancestry::commits_between`] - commits in `to` but not in `from`, oldest first
//!
//! # Partial graphs
//!
//! Snapshots may be shallow, so a walk can run into parent ids that are not
//! in the store. `ancestors` fails with [`RepoError::NotFound`] in that case.
//! `is_ancestor` and `merge_base` instead abandon the branch that hit the
//! missing commit and keep searching: a `true` found anywhere wins, and an
//! exhausted search is `false` rather than an error. Only a missing starting
//! commit is reported.
//!
//! # Merge bases
//!
//! The merge base returned is *a* common ancestor, found by scanning `a` and
//! then its ancestors nearest-first. In histories with criss-cross merges it
//! is not necessarily the unique lowest common ancestor.
//!
//! # Cost
//!
//! All walks use explicit work queues (no recursion) and visited sets, so
//! they terminate even on malformed cyclic imports. An optional node limit
//! bounds the work of a single query.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use super::error::RepoError;
use super::graph::CommitGraph;
use super::types::{CommitId, Timestamp};

/// Ancestry query engine over a borrowed commit graph.
///
/// Stateless beyond the graph it reads; cheap to construct per query.
#[derive(Debug, Clone, Copy)]
pub struct Ancestry<'a> {
    commits: &'a CommitGraph,
    limit: Option<usize>,
}

impl<'a> Ancestry<'a> {
    /// Create an engine with no traversal limit.
    pub fn new(commits: &'a CommitGraph) -> Self {
        Self {
            commits,
            limit: None,
        }
    }

    /// Bound the number of commits a single query may visit.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    fn check_limit(&self, start: &str, visited: usize) -> Result<(), RepoError> {
        match self.limit {
            Some(limit) if visited > limit => Err(RepoError::TraversalLimit {
                start: start.to_string(),
                limit,
            }),
            _ => Ok(()),
        }
    }

    /// All ancestors of `commit`, breadth-first, nearest first.
    ///
    /// The commit itself is excluded. Parents are visited in recorded order.
    /// Each ancestor is reported once, at its first (shallowest) discovery.
    ///
    /// # Errors
    ///
    /// - [`RepoError::NotFound`] if `commit` or any commit reached is missing
    ///
    /// # Example
    ///
    /// ```
    /// use reviewgraph::core::ancestry::Ancestry;
    /// use reviewgraph::repo::fixture;
    ///
    /// let repo = fixture::review_repo();
    /// let engine = Ancestry::new(repo.commits());
    /// let ancestors: Vec<String> = engine
    ///     .ancestors("E")
    ///     .unwrap()
    ///     .into_iter()
    ///     .map(String::from)
    ///     .collect();
    /// assert_eq!(ancestors, ["D", "B", "C", "A"]);
    /// ```
    pub fn ancestors(&self, commit: &str) -> Result<Vec<CommitId>, RepoError> {
        let start = self.commits.get(commit)?;

        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(commit);
        let mut queue: VecDeque<&CommitId> = VecDeque::new();
        for parent in &start.parents {
            if seen.insert(parent.as_str()) {
                queue.push_back(parent);
            }
        }

        let mut result = Vec::new();
        while let Some(current) = queue.pop_front() {
            result.push(current.clone());
            self.check_limit(commit, result.len())?;
            for parent in self.commits.parents(current.as_str())? {
                if seen.insert(parent.as_str()) {
                    queue.push_back(parent);
                }
            }
        }

        tracing::trace!(%commit, count = result.len(), "enumerated ancestors");
        Ok(result)
    }

    /// Check whether `ancestor` is reachable from `descendant`.
    ///
    /// A commit is its own ancestor. The walk is depth-first along the
    /// parent chain, first parent first.
    ///
    /// # Errors
    ///
    /// - [`RepoError::NotFound`] if `descendant` is missing (and differs
    ///   from `ancestor`). Missing commits deeper in the walk are skipped.
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool, RepoError> {
        if ancestor == descendant {
            return Ok(true);
        }
        let root = self.commits.get(descendant)?;

        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&CommitId> = root.parents.iter().rev().collect();

        while let Some(current) = stack.pop() {
            if current.as_str() == ancestor {
                return Ok(true);
            }
            if !visited.insert(current.as_str()) {
                continue;
            }
            self.check_limit(descendant, visited.len())?;
            match self.commits.get(current.as_str()) {
                Ok(commit) => stack.extend(commit.parents.iter().rev()),
                Err(_) => {
                    tracing::trace!(missing = %current, %descendant, "skipping missing commit");
                }
            }
        }

        Ok(false)
    }

    /// Find a common ancestor of `a` and `b`.
    ///
    /// Candidates are `a` itself followed by its ancestors in breadth-first
    /// order; the first one that is an ancestor of `b` is returned. Returns
    /// `Ok(None)` when no candidate qualifies.
    ///
    /// # Errors
    ///
    /// - [`RepoError::NotFound`] if enumerating `a`'s ancestors hits a
    ///   missing commit. Failures while testing candidates against `b` are
    ///   treated as "not an ancestor".
    ///
    /// # Example
    ///
    /// ```
    /// use reviewgraph::core::ancestry::Ancestry;
    /// use reviewgraph::repo::fixture;
    ///
    /// let repo = fixture::review_repo();
    /// let engine = Ancestry::new(repo.commits());
    /// assert_eq!(engine.merge_base("I", "J").unwrap().unwrap().as_str(), "F");
    /// assert_eq!(engine.merge_base("J", "J").unwrap().unwrap().as_str(), "J");
    /// ```
    pub fn merge_base(&self, a: &str, b: &str) -> Result<Option<CommitId>, RepoError> {
        let ancestors = self.ancestors(a)?;
        let start = self
            .commits
            .id(a)
            .cloned()
            .ok_or_else(|| RepoError::not_found(a))?;

        let from_b: HashSet<&str> = match self.reachable(b) {
            Ok(set) => set,
            Err(RepoError::NotFound { .. }) => HashSet::from([b]),
            Err(e) => return Err(e),
        };

        let base = std::iter::once(start)
            .chain(ancestors)
            .find(|candidate| from_b.contains(candidate.as_str()));

        tracing::debug!(%a, %b, base = ?base.as_ref().map(CommitId::as_str), "merge base");
        Ok(base)
    }

    /// Every id reachable from `start`, including `start` itself.
    ///
    /// Ids of missing commits are included (they were reached) but not
    /// expanded. Only a missing `start` is an error.
    fn reachable<'b>(&self, start: &'b str) -> Result<HashSet<&'b str>, RepoError>
    where
        'a: 'b,
    {
        let root = self.commits.get(start)?;
        let mut reached: HashSet<&'b str> = HashSet::new();
        reached.insert(start);
        let mut stack: Vec<&'a CommitId> = root.parents.iter().collect();

        while let Some(current) = stack.pop() {
            if !reached.insert(current.as_str()) {
                continue;
            }
            self.check_limit(start, reached.len())?;
            if let Ok(commit) = self.commits.get(current.as_str()) {
                stack.extend(commit.parents.iter());
            }
        }

        Ok(reached)
    }

    /// List the commits reachable from `to` but not from `from`.
    ///
    /// `from` is exclusive and `to` inclusive. If `from` is not an ancestor
    /// of `to`, their merge base is used as the starting point instead; with
    /// no merge base at all, everything reachable from `to` is listed.
    ///
    /// The list is chronological: parents always precede children, and
    /// commits that are otherwise unordered are sorted by timestamp, then id.
    ///
    /// # Errors
    ///
    /// - [`RepoError::NotFound`] if `to` or `from` is missing
    pub fn commits_between(&self, from: &str, to: &str) -> Result<Vec<CommitId>, RepoError> {
        let start = if self.is_ancestor(from, to)? {
            self.commits.id(from).cloned()
        } else {
            self.merge_base(from, to)?
        };

        let excluded = match &start {
            Some(start) => self.reachable(start.as_str())?,
            None => HashSet::new(),
        };
        let included: HashSet<&str> = self
            .reachable(to)?
            .into_iter()
            .filter(|id| !excluded.contains(id) && self.commits.contains(id))
            .collect();

        let mut pending: HashMap<&str, usize> = HashMap::new();
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for &id in &included {
            let parents = self.commits.parents(id)?;
            let mut count = 0;
            for parent in parents.iter().filter(|p| included.contains(p.as_str())) {
                children.entry(parent.as_str()).or_default().push(id);
                count += 1;
            }
            pending.insert(id, count);
        }

        let key = |id: &str| -> Result<(Timestamp, CommitId), RepoError> {
            let commit = self.commits.get(id)?;
            let id = self
                .commits
                .id(id)
                .cloned()
                .ok_or_else(|| RepoError::not_found(id))?;
            Ok((commit.time, id))
        };

        let mut ready: BTreeSet<(Timestamp, CommitId)> = BTreeSet::new();
        for (&id, &count) in &pending {
            if count == 0 {
                ready.insert(key(id)?);
            }
        }

        let mut ordered = Vec::with_capacity(included.len());
        while let Some(next) = ready.pop_first() {
            let (_, id) = &next;
            if let Some(kids) = children.get(id.as_str()) {
                for &child in kids {
                    if let Some(count) = pending.get_mut(child) {
                        *count -= 1;
                        if *count == 0 {
                            ready.insert(key(child)?);
                        }
                    }
                }
            }
            ordered.push(next.1);
        }

        tracing::debug!(%from, %to, count = ordered.len(), "listed commits between");
        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::Commit;

    fn id(s: &str) -> CommitId {
        CommitId::new(s).unwrap()
    }

    /// Build a graph from (id, time, parents) triples, in insertion order.
    fn graph(spec: &[(&str, i64, &[&str])]) -> CommitGraph {
        let mut graph = CommitGraph::new();
        for (name, time, parents) in spec {
            graph
                .put_commit(
                    id(name),
                    Commit::new(
                        *name,
                        Timestamp::from_seconds(*time),
                        parents.iter().map(|p| id(p)).collect(),
                    ),
                )
                .unwrap();
        }
        graph
    }

    /// A--B--D--E--F--J with C off A merged into D, G off E, H merges G and F.
    fn review_dag() -> CommitGraph {
        graph(&[
            ("A", 0, &[]),
            ("B", 1, &["A"]),
            ("C", 1, &["A"]),
            ("D", 2, &["B", "C"]),
            ("E", 3, &["D"]),
            ("F", 4, &["E"]),
            ("G", 4, &["E"]),
            ("H", 5, &["G", "F"]),
            ("I", 6, &["H"]),
            ("J", 6, &["F"]),
        ])
    }

    fn names(ids: Vec<CommitId>) -> Vec<String> {
        ids.into_iter().map(String::from).collect()
    }

    mod ancestors {
        use super::*;

        #[test]
        fn root_has_none() {
            let g = review_dag();
            assert!(Ancestry::new(&g).ancestors("A").unwrap().is_empty());
        }

        #[test]
        fn breadth_first_nearest_first() {
            let g = review_dag();
            let result = names(Ancestry::new(&g).ancestors("I").unwrap());
            assert_eq!(result, ["H", "G", "F", "E", "D", "B", "C", "A"]);
        }

        #[test]
        fn diamond_reported_once() {
            let g = review_dag();
            let result = names(Ancestry::new(&g).ancestors("D").unwrap());
            assert_eq!(result, ["B", "C", "A"]);
        }

        #[test]
        fn missing_start_is_not_found() {
            let g = review_dag();
            assert_eq!(
                Ancestry::new(&g).ancestors("Z").unwrap_err(),
                RepoError::NotFound { id: "Z".into() }
            );
        }

        #[test]
        fn missing_parent_is_not_found() {
            let mut g = CommitGraph::new();
            g.import(vec![(
                id("B"),
                Commit::new("B", Timestamp::from_seconds(1), vec![id("A")]),
            )])
            .unwrap();
            assert_eq!(
                Ancestry::new(&g).ancestors("B").unwrap_err(),
                RepoError::NotFound { id: "A".into() }
            );
        }

        #[test]
        fn limit_is_enforced() {
            let g = review_dag();
            let err = Ancestry::new(&g)
                .with_limit(Some(3))
                .ancestors("I")
                .unwrap_err();
            assert!(matches!(err, RepoError::TraversalLimit { limit: 3, .. }));
            assert!(Ancestry::new(&g).with_limit(Some(8)).ancestors("I").is_ok());
        }
    }

    mod is_ancestor {
        use super::*;

        #[test]
        fn reflexive() {
            let g = review_dag();
            let engine = Ancestry::new(&g);
            for c in ["A", "D", "H", "J"] {
                assert!(engine.is_ancestor(c, c).unwrap());
            }
        }

        #[test]
        fn follows_all_parents() {
            let g = review_dag();
            let engine = Ancestry::new(&g);
            assert!(engine.is_ancestor("A", "J").unwrap());
            assert!(engine.is_ancestor("C", "I").unwrap());
            assert!(engine.is_ancestor("F", "H").unwrap());
            // G descends from E, and E from the merge D of B and C
            assert!(engine.is_ancestor("C", "G").unwrap());
        }

        #[test]
        fn unrelated_is_false() {
            let g = review_dag();
            let engine = Ancestry::new(&g);
            assert!(!engine.is_ancestor("G", "J").unwrap());
            assert!(!engine.is_ancestor("J", "A").unwrap());
        }

        #[test]
        fn missing_descendant_is_error() {
            let g = review_dag();
            assert!(matches!(
                Ancestry::new(&g).is_ancestor("A", "Z"),
                Err(RepoError::NotFound { .. })
            ));
        }

        #[test]
        fn missing_branch_is_suppressed() {
            // M merges X (missing from the view) and B
            let mut g = review_dag();
            g.import(vec![(
                id("M"),
                Commit::new("M", Timestamp::from_seconds(9), vec![id("X"), id("B")]),
            )])
            .unwrap();
            let engine = Ancestry::new(&g);
            assert!(engine.is_ancestor("A", "M").unwrap());
            assert!(!engine.is_ancestor("C", "M").unwrap());
            // The missing id itself was reached
            assert!(engine.is_ancestor("X", "M").unwrap());
        }

        #[test]
        fn terminates_on_cyclic_import() {
            let mut g = CommitGraph::new();
            g.import(vec![
                (id("P"), Commit::new("P", Timestamp::from_seconds(0), vec![id("Q")])),
                (id("Q"), Commit::new("Q", Timestamp::from_seconds(0), vec![id("P")])),
            ])
            .unwrap();
            assert!(!Ancestry::new(&g).is_ancestor("R", "P").unwrap());
        }
    }

    mod merge_base {
        use super::*;

        #[test]
        fn review_branch_against_master() {
            let g = review_dag();
            let base = Ancestry::new(&g).merge_base("I", "J").unwrap().unwrap();
            assert_eq!(base.as_str(), "F");
        }

        #[test]
        fn self_merge_base() {
            let g = review_dag();
            let engine = Ancestry::new(&g);
            for c in ["A", "E", "I"] {
                assert_eq!(engine.merge_base(c, c).unwrap().unwrap().as_str(), c);
            }
        }

        #[test]
        fn ancestor_is_its_own_merge_base() {
            let g = review_dag();
            let base = Ancestry::new(&g).merge_base("E", "J").unwrap().unwrap();
            assert_eq!(base.as_str(), "E");
        }

        #[test]
        fn disjoint_histories_have_none() {
            let g = graph(&[("A", 0, &[]), ("B", 1, &["A"]), ("X", 0, &[]), ("Y", 1, &["X"])]);
            assert_eq!(Ancestry::new(&g).merge_base("B", "Y").unwrap(), None);
        }

        #[test]
        fn missing_other_side_yields_none() {
            let g = review_dag();
            assert_eq!(Ancestry::new(&g).merge_base("I", "Z").unwrap(), None);
        }

        #[test]
        fn missing_first_side_is_error() {
            let g = review_dag();
            assert!(Ancestry::new(&g).merge_base("Z", "I").is_err());
        }
    }

    mod commits_between {
        use super::*;

        #[test]
        fn linear_range() {
            let g = review_dag();
            let result = names(Ancestry::new(&g).commits_between("D", "J").unwrap());
            assert_eq!(result, ["E", "F", "J"]);
        }

        #[test]
        fn uses_merge_base_when_not_ancestor() {
            let g = review_dag();
            // J is not an ancestor of I; the merge base F is used instead
            let result = names(Ancestry::new(&g).commits_between("J", "I").unwrap());
            assert_eq!(result, ["G", "H", "I"]);
        }

        #[test]
        fn parents_precede_children() {
            let g = review_dag();
            let result = names(Ancestry::new(&g).commits_between("A", "E").unwrap());
            assert_eq!(result, ["B", "C", "D", "E"]);
        }

        #[test]
        fn empty_when_equal() {
            let g = review_dag();
            assert!(Ancestry::new(&g).commits_between("F", "F").unwrap().is_empty());
        }

        #[test]
        fn disjoint_lists_everything() {
            let g = graph(&[("A", 0, &[]), ("X", 0, &[]), ("Y", 1, &["X"])]);
            let result = names(Ancestry::new(&g).commits_between("A", "Y").unwrap());
            assert_eq!(result, ["X", "Y"]);
        }
    }
}
