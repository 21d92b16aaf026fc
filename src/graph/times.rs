//! Effective modification times.
//!
//! `effective(f) = max(mtime(f), effective(d) for d in deps(f))`. The graph
//! may contain include cycles, so the walk runs Tarjan's strongly connected
//! components algorithm: every member of a cycle shares one value, the max
//! over the whole component and everything it reaches.

use super::builder::DependencyGraph;
use super::modified_time;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    InProgress { index: usize, low: usize },
    Done,
}

struct Tarjan<'g> {
    nodes: Vec<&'g Path>,
    edges: Vec<Vec<usize>>,
    own: Vec<SystemTime>,
    state: Vec<Visit>,
    stack: Vec<usize>,
    next_index: usize,
    effective: Vec<SystemTime>,
}

impl<'g> Tarjan<'g> {
    fn new(graph: &'g DependencyGraph) -> Self {
        let nodes: Vec<&Path> = graph.files.keys().map(PathBuf::as_path).collect();
        let lookup: HashMap<&Path, usize> =
            nodes.iter().enumerate().map(|(i, p)| (*p, i)).collect();

        let mut edges = Vec::with_capacity(nodes.len());
        let mut own = Vec::with_capacity(nodes.len());
        for file in graph.files.values() {
            let mut time = file.last_modified.unwrap_or(UNIX_EPOCH);
            let mut targets = Vec::new();
            for dep in &file.dependencies {
                match lookup.get(dep.as_path()) {
                    Some(&i) => targets.push(i),
                    // not part of the graph: count its own time only
                    None => time = time.max(modified_time(dep).unwrap_or(UNIX_EPOCH)),
                }
            }
            edges.push(targets);
            own.push(time);
        }

        let count = nodes.len();
        Self {
            nodes,
            edges,
            own,
            state: vec![Visit::Unvisited; count],
            stack: Vec::new(),
            next_index: 0,
            effective: vec![UNIX_EPOCH; count],
        }
    }

    fn set_low(&mut self, node: usize, value: usize) {
        if let Visit::InProgress { index, low } = self.state[node] {
            self.state[node] = Visit::InProgress {
                index,
                low: low.min(value),
            };
        }
    }

    fn enter(&mut self, node: usize) {
        let index = self.next_index;
        self.next_index += 1;
        self.state[node] = Visit::InProgress { index, low: index };
        self.stack.push(node);
    }

    /// Depth-first walk from `start` on an explicit frame stack, so deep
    /// include chains don't exhaust the thread stack.
    fn visit(&mut self, start: usize) {
        // (node, next edge to look at)
        let mut frames = vec![(start, 0usize)];
        self.enter(start);

        while let Some(frame) = frames.last_mut() {
            let (node, edge) = *frame;
            if let Some(&next) = self.edges[node].get(edge) {
                frame.1 += 1;
                match self.state[next] {
                    Visit::Unvisited => {
                        self.enter(next);
                        frames.push((next, 0));
                    }
                    Visit::InProgress { index, .. } => self.set_low(node, index),
                    Visit::Done => {}
                }
                continue;
            }

            frames.pop();
            if let Visit::InProgress { index, low } = self.state[node]
                && index == low
            {
                self.close_component(node);
            }
            // `node` is either Done or still on the stack as part of its parent's component
            if let Some(&(parent, _)) = frames.last()
                && let Visit::InProgress { low, .. } = self.state[node]
            {
                self.set_low(parent, low);
            }
        }
    }

    /// Pop the component rooted at `root` and give all members one time.
    fn close_component(&mut self, root: usize) {
        let split = self
            .stack
            .iter()
            .rposition(|&n| n == root)
            .unwrap_or(0);
        let members: Vec<usize> = self.stack.drain(split..).collect();

        // Successors outside the component are Done, so their times are final.
        let mut time = UNIX_EPOCH;
        for &member in &members {
            time = time.max(self.own[member]);
            for &next in &self.edges[member] {
                if self.state[next] == Visit::Done {
                    time = time.max(self.effective[next]);
                }
            }
        }

        for &member in &members {
            self.effective[member] = time;
            self.state[member] = Visit::Done;
        }
    }

    fn run(mut self) -> HashMap<&'g Path, SystemTime> {
        for node in 0..self.nodes.len() {
            if self.state[node] == Visit::Unvisited {
                self.visit(node);
            }
        }
        debug_assert!(self.stack.is_empty());

        self.nodes
            .iter()
            .copied()
            .zip(self.effective.iter().copied())
            .collect()
    }
}

impl DependencyGraph {
    /// Fill in `effective` for every file in the graph.
    pub fn compute_effective_times(&mut self) {
        let times: Vec<(PathBuf, SystemTime)> = Tarjan::new(self)
            .run()
            .into_iter()
            .map(|(path, time)| (path.to_path_buf(), time))
            .collect();

        for (path, time) in times {
            if let Some(file) = self.files.get_mut(&path) {
                file.effective = Some(time);
            }
        }
    }

    /// Effective time of `path`, if it is in the graph and times were computed.
    pub fn effective_time(&self, path: &Path) -> Option<SystemTime> {
        self.files.get(path).and_then(|f| f.effective)
    }

    /// Newest effective time across the whole graph.
    pub fn newest_effective_time(&self) -> Option<SystemTime> {
        self.files.values().filter_map(|f| f.effective).max()
    }
}
