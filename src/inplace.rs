//! Rewriting a sequential command list into one that reconstructs V
//! in-place over a buffer that starts out holding R (Burns, Long &
//! Stockmeyer, IEEE TKDE 2003, Section 4).
//!
//! A copy command reads from R while the buffer still holds reference
//! bytes and writes into its eventual position in V; if some other copy's
//! write lands inside a still-unread source range, the two commands have
//! an ordering constraint. Collecting all such constraints gives a
//! dependency digraph (the "Copy Read/Write Intersection", or CRWI,
//! graph) whose topological order is a safe execution schedule. Graphs
//! with a cycle have no such schedule; breaking a cycle means picking one
//! copy in it and replacing it with an add that carries the same bytes
//! read straight out of R before anything overwrites them.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::types::{Command, CyclePolicy, PlacedCommand};

/// A copy command annotated with where in the output buffer it lands.
#[derive(Clone, Copy)]
struct PlannedCopy {
    src: usize,
    dst: usize,
    length: usize,
}

/// An add command annotated with where in the output buffer it lands.
struct PlannedAdd {
    dst: usize,
    data: Vec<u8>,
}

/// Walk the command list once, giving every command its absolute write
/// offset in the reconstructed output.
fn plan_writes(commands: &[Command]) -> (Vec<PlannedCopy>, Vec<PlannedAdd>) {
    let mut copies = Vec::new();
    let mut adds = Vec::new();
    let mut write_pos = 0usize;

    for cmd in commands {
        match cmd {
            Command::Copy { offset, length } => {
                copies.push(PlannedCopy { src: *offset, dst: write_pos, length: *length });
                write_pos += length;
            }
            Command::Add { data } => {
                adds.push(PlannedAdd { dst: write_pos, data: data.clone() });
                write_pos += data.len();
            }
        }
    }
    (copies, adds)
}

/// The CRWI dependency digraph over a set of planned copies: `edges[i]`
/// lists the copies that must run before copy `i` (because `i` reads a
/// range some `edges[i][_]` writes into), and `in_degree[j]` counts how
/// many such predecessors `j` still has.
struct DependencyGraph {
    edges: Vec<Vec<usize>>,
    in_degree: Vec<usize>,
    edge_count: usize,
}

impl DependencyGraph {
    /// Build the digraph with an O(n log n + E) sweep: writes are sorted
    /// once by start offset, then each read range is located in that
    /// sorted order with two binary searches instead of an O(n) scan.
    ///
    /// Write ranges never overlap each other (every output byte is
    /// written exactly once), which is what makes the two-binary-search
    /// trick exact: every write whose start falls inside `[src, src+len)`
    /// necessarily overlaps it, and at most one write starting before
    /// `src` can still reach into it.
    fn from_copies(copies: &[PlannedCopy]) -> Self {
        let n = copies.len();
        let mut edges: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut in_degree = vec![0usize; n];
        let mut edge_count = 0usize;

        let mut by_write_start: Vec<usize> = (0..n).collect();
        by_write_start.sort_unstable_by_key(|&j| copies[j].dst);
        let write_starts: Vec<usize> = by_write_start.iter().map(|&j| copies[j].dst).collect();

        fn link(reader: usize, writer: usize, edges: &mut [Vec<usize>], in_degree: &mut [usize], edge_count: &mut usize) {
            if reader != writer {
                edges[reader].push(writer);
                in_degree[writer] += 1;
                *edge_count += 1;
            }
        }

        for i in 0..n {
            let read_start = copies[i].src;
            let read_end = read_start + copies[i].length;

            let first_inside = write_starts.partition_point(|&ws| ws < read_start);
            let first_past = write_starts.partition_point(|&ws| ws < read_end);

            // The write immediately before the window can still overlap it
            // if its own range extends past `read_start`.
            if first_inside > 0 {
                let j = by_write_start[first_inside - 1];
                let overlaps = copies[j].dst + copies[j].length > read_start;
                if overlaps {
                    link(i, j, &mut edges, &mut in_degree, &mut edge_count);
                }
            }
            for &j in &by_write_start[first_inside..first_past] {
                link(i, j, &mut edges, &mut in_degree, &mut edge_count);
            }
        }

        DependencyGraph { edges, in_degree, edge_count }
    }

    fn len(&self) -> usize {
        self.edges.len()
    }
}

/// Strongly connected components of a graph given as an adjacency list,
/// found with Tarjan's one-pass algorithm (R.E. Tarjan, "Depth-first
/// search and linear graph algorithms," SIAM J. Comput. 1(2), 1972), run
/// iteratively so recursion depth never tracks input size.
///
/// Components come back sink-first (the reverse of topological order);
/// nothing downstream of this function needs a particular order since it
/// only cares which vertices share a non-trivial component.
struct TarjanScc {
    order: Vec<usize>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
}

impl TarjanScc {
    fn run(graph: &DependencyGraph) -> Vec<Vec<usize>> {
        let n = graph.len();
        let mut finder = TarjanScc { order: vec![usize::MAX; n], lowlink: vec![0; n], on_stack: vec![false; n] };
        let mut next_index = 0usize;
        let mut component_stack: Vec<usize> = Vec::new();
        let mut components: Vec<Vec<usize>> = Vec::new();
        let mut frames: Vec<(usize, usize)> = Vec::new(); // (vertex, next edge to visit)

        for root in 0..n {
            if finder.order[root] != usize::MAX {
                continue;
            }
            finder.visit(root, &mut next_index, &mut component_stack);
            frames.push((root, 0));

            while let Some(&(v, edge_ptr)) = frames.last() {
                if edge_ptr < graph.edges[v].len() {
                    let w = graph.edges[v][edge_ptr];
                    frames.last_mut().unwrap().1 += 1;
                    if finder.order[w] == usize::MAX {
                        finder.visit(w, &mut next_index, &mut component_stack);
                        frames.push((w, 0));
                    } else if finder.on_stack[w] {
                        finder.lowlink[v] = finder.lowlink[v].min(finder.order[w]);
                    }
                } else {
                    frames.pop();
                    if let Some(&(parent, _)) = frames.last() {
                        finder.lowlink[parent] = finder.lowlink[parent].min(finder.lowlink[v]);
                    }
                    if finder.lowlink[v] == finder.order[v] {
                        components.push(finder.pop_component(v, &mut component_stack));
                    }
                }
            }
        }

        components
    }

    fn visit(&mut self, v: usize, next_index: &mut usize, component_stack: &mut Vec<usize>) {
        self.order[v] = *next_index;
        self.lowlink[v] = *next_index;
        *next_index += 1;
        self.on_stack[v] = true;
        component_stack.push(v);
    }

    fn pop_component(&mut self, root: usize, component_stack: &mut Vec<usize>) -> Vec<usize> {
        let mut component = Vec::new();
        loop {
            let w = component_stack.pop().unwrap();
            self.on_stack[w] = false;
            component.push(w);
            if w == root {
                return component;
            }
        }
    }
}

/// Finds one cycle at a time within a single non-trivial SCC, reusing DFS
/// state across repeated calls as vertices get removed (each "localmin"
/// cycle-breaking step needs one representative cycle, converts its
/// cheapest member, and asks again).
///
/// Three things make repeated calls cheap instead of quadratic in the
/// SCC's size:
///
/// - membership is checked via a `scc_id` lookup (O(1)) instead of
///   rebuilding a membership set per call;
/// - `color = 2` ("fully explored, no cycle found through here") is
///   never reset — removing a vertex can only delete edges, never create
///   a cycle, so a subgraph explored cycle-free under more vertices stays
///   cycle-free under fewer;
/// - the outer scan resumes from where the previous call left off rather
///   than restarting at the SCC's first vertex.
///
/// Together these bound total work across every call against one SCC to
/// O(|SCC| + edges within it), not O(|SCC| x cycles broken).
struct CycleScanner<'g> {
    graph: &'g DependencyGraph,
    scc_id: Vec<usize>,
    color: Vec<u8>,
}

impl<'g> CycleScanner<'g> {
    fn new(graph: &'g DependencyGraph, scc_id: Vec<usize>) -> Self {
        let n = graph.len();
        CycleScanner { graph, scc_id, color: vec![0u8; n] }
    }

    /// Search `members` (one SCC's vertex list) for a cycle among the
    /// still-live vertices, starting from `members[*scan_start]`.
    ///
    /// On success, every vertex visited en route to the cycle has its
    /// color reset to 0 (unexplored) so a later call can revisit it once
    /// the cycle's victim is gone; vertices marked fully explored
    /// (`color = 2`) are left untouched. On failure `*scan_start` is left
    /// at `members.len()`.
    fn find_cycle(&mut self, members: &[usize], my_id: usize, removed: &[bool], scan_start: &mut usize) -> Option<Vec<usize>> {
        let mut path: Vec<usize> = Vec::new();

        while *scan_start < members.len() {
            let start = members[*scan_start];
            if removed[start] || self.color[start] != 0 {
                *scan_start += 1;
                continue;
            }

            self.color[start] = 1;
            path.push(start);
            let mut frames: Vec<(usize, usize)> = vec![(start, 0)];

            while let Some(&(v, _)) = frames.last() {
                match self.advance_from(v, my_id, removed, &mut frames) {
                    Advance::FoundCycle(w) => {
                        let cycle_start = path.iter().position(|&x| x == w).unwrap();
                        let cycle = path[cycle_start..].to_vec();
                        for &u in &path {
                            self.color[u] = 0;
                        }
                        return Some(cycle);
                    }
                    Advance::Descended(w) => path.push(w),
                    Advance::Exhausted => {
                        frames.pop();
                        self.color[v] = 2;
                        path.pop();
                    }
                }
            }

            *scan_start += 1;
        }

        None
    }

    /// Look at the next unexplored neighbor edge of `v` within its SCC,
    /// classifying what the caller's DFS should do about it.
    fn advance_from(&self, v: usize, my_id: usize, removed: &[bool], frames: &mut Vec<(usize, usize)>) -> Advance {
        let (_, edge_ptr) = *frames.last().unwrap();
        let mut next_ptr = edge_ptr;
        while next_ptr < self.graph.edges[v].len() {
            let w = self.graph.edges[v][next_ptr];
            next_ptr += 1;
            if self.scc_id[w] != my_id || removed[w] {
                continue;
            }
            if self.color[w] == 1 {
                return Advance::FoundCycle(w);
            }
            if self.color[w] == 0 {
                frames.last_mut().unwrap().1 = next_ptr;
                frames.push((w, 0));
                return Advance::Descended(w);
            }
        }
        frames.last_mut().unwrap().1 = next_ptr;
        Advance::Exhausted
    }
}

enum Advance {
    FoundCycle(usize),
    Descended(usize),
    Exhausted,
}

/// Per-SCC bookkeeping the localmin policy needs: which non-trivial
/// component each vertex belongs to, and how many of each component's
/// vertices are still live.
struct SccBook {
    members: Vec<Vec<usize>>,
    id_of: Vec<usize>,
    live_count: Vec<usize>,
}

impl SccBook {
    fn build(components: &[Vec<usize>], n: usize) -> Self {
        let mut id_of = vec![usize::MAX; n];
        let mut members = Vec::new();
        let mut live_count = Vec::new();
        for component in components {
            if component.len() > 1 {
                let id = members.len();
                for &v in component {
                    id_of[v] = id;
                }
                live_count.push(component.len());
                members.push(component.clone());
            }
        }
        SccBook { members, id_of, live_count }
    }

    fn mark_removed(&mut self, v: usize) {
        if self.id_of[v] != usize::MAX {
            self.live_count[self.id_of[v]] -= 1;
        }
    }
}

/// Kahn's algorithm over the CRWI graph with a deterministic tie-break: of
/// all currently-ready vertices, the shortest copy (by length, then
/// index) is scheduled first. When no vertex is ready but some remain,
/// the graph has stalled on a cycle.
struct Scheduler {
    removed: Vec<bool>,
    in_degree: Vec<usize>,
    ready: BinaryHeap<Reverse<(usize, usize)>>,
    topo_order: Vec<usize>,
    /// Vertices accounted for so far, whether scheduled as a copy
    /// (`topo_order`) or converted to an add by cycle-breaking. Every
    /// vertex contributes exactly once, so this is what `is_done` checks
    /// against `n` — `topo_order.len()` alone would never reach `n` in a
    /// graph with any cycle, since converted vertices never enter it.
    processed: usize,
}

impl Scheduler {
    fn new(graph: &DependencyGraph, copies: &[PlannedCopy]) -> Self {
        let n = graph.len();
        let mut ready = BinaryHeap::new();
        for i in 0..n {
            if graph.in_degree[i] == 0 {
                ready.push(Reverse((copies[i].length, i)));
            }
        }
        Scheduler {
            removed: vec![false; n],
            in_degree: graph.in_degree.clone(),
            ready,
            topo_order: Vec::with_capacity(n),
            processed: 0,
        }
    }

    /// Mark `v` done, update its SCC's live-member count, and relax its
    /// outgoing edges, pushing any neighbor that just reached in-degree
    /// zero onto the ready heap.
    ///
    /// Every vertex that leaves the graph — scheduled copy or converted
    /// victim alike — must update `book`, since [`pick_victim`]'s
    /// localmin search relies on a component's live count reaching zero
    /// to know it can skip that component entirely.
    fn mark_done(&mut self, v: usize, graph: &DependencyGraph, copies: &[PlannedCopy], book: &mut SccBook) {
        self.removed[v] = true;
        self.processed += 1;
        book.mark_removed(v);
        for &w in &graph.edges[v] {
            if !self.removed[w] {
                self.in_degree[w] -= 1;
                if self.in_degree[w] == 0 {
                    self.ready.push(Reverse((copies[w].length, w)));
                }
            }
        }
    }

    /// Drain every vertex currently at in-degree zero, in shortest-copy-first
    /// order, appending each to the topological order as it's freed.
    fn drain_ready(&mut self, graph: &DependencyGraph, copies: &[PlannedCopy], book: &mut SccBook) {
        while let Some(Reverse((_, v))) = self.ready.pop() {
            if self.removed[v] {
                continue;
            }
            self.topo_order.push(v);
            self.mark_done(v, graph, copies, book);
        }
    }

    fn is_done(&self, n: usize) -> bool {
        self.processed >= n
    }
}

/// Tally of what a conversion run actually did, for diagnostics.
#[derive(Debug, Default)]
pub struct InplaceStats {
    pub num_copies: usize,
    pub num_adds: usize,
    pub edges: usize,
    pub cycles_broken: usize,
    pub copies_converted: usize,
    pub bytes_converted: usize,
}

/// Pick the next copy to convert from copy to add when the scheduler has
/// stalled, per the requested [`CyclePolicy`].
///
/// `Constant` always takes the lowest-indexed live vertex — cheap and
/// deterministic, but blind to how expensive that vertex's copy is.
/// `Localmin` instead finds an actual cycle (scoped to one SCC at a time
/// via [`CycleScanner`]) and converts its shortest member, which tends to
/// waste fewer bytes overall since the victim is guaranteed to break the
/// stall it's chosen for.
fn pick_victim(
    policy: CyclePolicy,
    n: usize,
    removed: &[bool],
    graph: &DependencyGraph,
    copies: &[PlannedCopy],
    book: &SccBook,
    scanner: &mut CycleScanner,
    scc_ptr: &mut usize,
    scan_pos: &mut usize,
) -> usize {
    match policy {
        CyclePolicy::Constant => (0..n).find(|&i| !removed[i]).unwrap(),
        CyclePolicy::Localmin => loop {
            while *scc_ptr < book.members.len() && book.live_count[*scc_ptr] == 0 {
                *scc_ptr += 1;
                *scan_pos = 0;
            }
            if *scc_ptr >= book.members.len() {
                break (0..n).find(|&i| !removed[i]).unwrap();
            }
            match scanner.find_cycle(&book.members[*scc_ptr], *scc_ptr, removed, scan_pos) {
                Some(cycle) => break *cycle.iter().min_by_key(|&&i| (copies[i].length, i)).unwrap(),
                None => {
                    *scc_ptr += 1;
                    *scan_pos = 0;
                }
            }
        },
    }
}

/// Rewrite `commands` (a sequential delta against `r`) into commands that
/// reconstruct the same output when applied over a buffer initialized
/// with `r`, with no separate output buffer.
///
/// 1. Give every command its absolute write offset.
/// 2. Build the CRWI dependency digraph over the copies.
/// 3. Topologically sort it (Kahn); each time the frontier runs dry with
///    vertices left, the remainder is one or more cycles — convert one
///    copy per stall to an add (`policy` picks which) and continue.
/// 4. Emit copies in schedule order, then all adds (original plus any
///    created by cycle-breaking).
pub fn make_inplace(r: &[u8], commands: &[Command], policy: CyclePolicy) -> (Vec<PlacedCommand>, InplaceStats) {
    let mut stats = InplaceStats::default();
    if commands.is_empty() {
        return (Vec::new(), stats);
    }

    let (copies, mut adds) = plan_writes(commands);
    let n = copies.len();
    if n == 0 {
        stats.num_adds = adds.len();
        let result = adds.into_iter().map(|a| PlacedCommand::Add { dst: a.dst, data: a.data }).collect();
        return (result, stats);
    }

    let graph = DependencyGraph::from_copies(&copies);
    stats.edges = graph.edge_count;

    let components = TarjanScc::run(&graph);
    let mut book = SccBook::build(&components, n);
    let mut scanner = CycleScanner::new(&graph, book.id_of.clone());

    let mut scheduler = Scheduler::new(&graph, &copies);
    let mut scc_ptr = 0usize;
    let mut scan_pos = 0usize;

    while !scheduler.is_done(n) {
        scheduler.drain_ready(&graph, &copies, &mut book);
        if scheduler.is_done(n) {
            break;
        }

        let victim = pick_victim(policy, n, &scheduler.removed, &graph, &copies, &book, &mut scanner, &mut scc_ptr, &mut scan_pos);

        let PlannedCopy { src, dst, length } = copies[victim];
        adds.push(PlannedAdd { dst, data: r[src..src + length].to_vec() });
        stats.cycles_broken += 1;
        stats.copies_converted += 1;
        stats.bytes_converted += length;

        // The victim becomes an add, not a scheduled copy, so it's marked
        // done without entering topo_order. Relaxing its outgoing edges
        // still unblocks downstream copies exactly as a normal schedule
        // step would.
        scheduler.mark_done(victim, &graph, &copies, &mut book);
    }

    let mut result: Vec<PlacedCommand> = Vec::with_capacity(scheduler.topo_order.len() + adds.len());
    for &i in &scheduler.topo_order {
        let PlannedCopy { src, dst, length } = copies[i];
        result.push(PlacedCommand::Copy { src, dst, length });
    }
    stats.num_copies = scheduler.topo_order.len();

    for a in adds {
        result.push(PlacedCommand::Add { dst: a.dst, data: a.data });
    }
    stats.num_adds = result.len() - stats.num_copies;

    tracing::debug!(
        num_copies = stats.num_copies,
        num_adds = stats.num_adds,
        edges = stats.edges,
        cycles_broken = stats.cycles_broken,
        bytes_converted = stats.bytes_converted,
        ?policy,
        "in-place conversion complete"
    );

    (result, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::apply_delta_inplace;

    #[test]
    fn no_overlap_needs_no_conversion() {
        // Copy1 reads r[0,5) and writes dst[0,5); Copy2 reads r[15,20) and
        // writes dst[5,10). Copy1's read never touches Copy2's write range
        // and vice versa, so the CRWI digraph has no edges at all.
        let r = b"ABCDEFGHIJKLMNOPQRST".to_vec();
        let commands = vec![
            Command::Copy { offset: 0, length: 5 },
            Command::Copy { offset: 15, length: 5 },
        ];
        let (placed, stats) = make_inplace(&r, &commands, CyclePolicy::Localmin);
        assert_eq!(stats.cycles_broken, 0);
        let v = apply_delta_inplace(&r, &placed, 10).unwrap();
        assert_eq!(&v, b"ABCDEPQRST");
    }

    #[test]
    fn cyclic_dependency_forces_one_conversion() {
        // Copy A reads [5,10) and writes [0,5); copy B reads [0,5) and
        // writes [5,10) — each must run before the other overwrites its
        // source, a genuine cycle in the CRWI digraph.
        let r = b"ABCDEFGHIJ".to_vec();
        let cyclic = vec![
            Command::Copy { offset: 5, length: 5 }, // dst 0..5, reads [5,10)
            Command::Copy { offset: 0, length: 5 }, // dst 5..10, reads [0,5)
        ];
        let (placed, stats) = make_inplace(&r, &cyclic, CyclePolicy::Localmin);
        assert_eq!(stats.cycles_broken, 1);
        let v = apply_delta_inplace(&r, &placed, 10).unwrap();
        assert_eq!(&v, b"FGHIJABCDE");
    }

    #[test]
    fn constant_and_localmin_both_produce_correct_output() {
        let r = b"0123456789".to_vec();
        let cyclic = vec![
            Command::Copy { offset: 5, length: 5 },
            Command::Copy { offset: 0, length: 5 },
        ];
        for policy in [CyclePolicy::Localmin, CyclePolicy::Constant] {
            let (placed, _) = make_inplace(&r, &cyclic, policy);
            let v = apply_delta_inplace(&r, &placed, 10).unwrap();
            assert_eq!(&v, b"5678901234");
        }
    }
}
