//! Flow orchestrator: orders link transport and node integration so that
//! inter-node mixing respects causality even under overflow.

use crate::error::{SolverError, SolverResult};
use gf_network::{Link, PortDirection, SolverNode};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Incomplete,
    Overflowing,
    Complete,
}

/// Drives one pass of `compute_flows` over all links, then interleaves link
/// `transport_flows` and node `integrate_flows` honoring the readiness rule:
///
/// - a link may transport once every node at one of its source ports is
///   either complete or not overflowing;
/// - a node may integrate once every link flowing into it has transported.
///
/// When a node is not overflowing, outflow links take the node's previous
/// content state before the node's inflows are mixed in. When a node is
/// overflowing, its inflows are mixed in before the outflowing links update,
/// so those links take the node's final mixed state.
///
/// Loops of mutually overflowing nodes would deadlock this rule, so when no
/// progress is made the first still-incomplete link is forced to transport
/// early. That breaks the cycle at the cost of a warned conservation error
/// in its source nodes. If even forcing cannot finish the pass, the update
/// fails rather than loop forever.
pub struct FlowOrchestrator {
    link_states: Vec<bool>,
    node_states: Vec<NodeState>,
    num_incomplete_links: usize,
}

impl FlowOrchestrator {
    pub fn new(num_links: usize, num_nodes: usize) -> Self {
        Self {
            link_states: vec![false; num_links],
            node_states: vec![NodeState::Incomplete; num_nodes],
            num_incomplete_links: 0,
        }
    }

    /// Transport and integrate all flows for one major step.
    pub fn update<N: SolverNode>(
        &mut self,
        nodes: &mut [N],
        links: &mut [Box<dyn Link<N>>],
        dt: f64,
    ) -> SolverResult<()> {
        // Links compute molar rates, determine flow directions relative to
        // the nodes, and schedule outflows with their source nodes.
        self.link_states.clear();
        self.link_states.resize(links.len(), false);
        for link in links.iter_mut() {
            link.compute_flows(nodes, dt);
        }
        self.num_incomplete_links = links.len();

        // All nodes start incomplete except Ground, which never integrates.
        let ground = nodes.len() - 1;
        self.node_states.clear();
        self.node_states.resize(nodes.len(), NodeState::Incomplete);
        self.node_states[ground] = NodeState::Complete;
        for (i, node) in nodes.iter().take(ground).enumerate() {
            if node.is_overflowing(dt) {
                self.node_states[i] = NodeState::Overflowing;
            }
        }

        loop {
            // Complete all links whose source nodes are ready for outflow
            // (complete, or not overflowing).
            for (i, link) in links.iter_mut().enumerate() {
                if !self.link_states[i] && self.link_source_nodes_ready(link.as_ref()) {
                    link.transport_flows(nodes, dt);
                    self.link_states[i] = true;
                }
            }

            // Complete all nodes whose input links have transported.
            for node_index in 0..ground {
                if self.node_states[node_index] != NodeState::Complete
                    && self.node_input_links_complete(node_index, links)
                {
                    nodes[node_index].integrate_flows(dt);
                    self.node_states[node_index] = NodeState::Complete;
                }
            }

            if self.check_all_complete(nodes, links, dt)? {
                return Ok(());
            }
        }
    }

    /// Completion check with stall breaking. Returns true when every link
    /// and node has completed. When the incomplete-link count stops
    /// decreasing the first incomplete link transports early; if none is
    /// left to force while nodes remain stuck, the pass fails.
    fn check_all_complete<N: SolverNode>(
        &mut self,
        nodes: &mut [N],
        links: &mut [Box<dyn Link<N>>],
        dt: f64,
    ) -> SolverResult<bool> {
        let incomplete_links = self.link_states.iter().filter(|done| !**done).count();
        if incomplete_links == 0 && self.all_nodes_complete() {
            self.num_incomplete_links = 0;
            return Ok(true);
        }

        if incomplete_links >= self.num_incomplete_links {
            let Some(forced) = self.link_states.iter().position(|done| !done) else {
                return Err(SolverError::TransportStalled {
                    what: "all links complete but some nodes cannot integrate",
                });
            };
            links[forced].transport_flows(nodes, dt);
            self.link_states[forced] = true;
            warn!(
                link = links[forced].name(),
                "early overflow transport; conservation errors may result"
            );
        }
        self.num_incomplete_links = incomplete_links;
        Ok(false)
    }

    fn all_nodes_complete(&self) -> bool {
        // Ground sits last and is always complete.
        self.node_states[..self.node_states.len() - 1]
            .iter()
            .all(|state| *state == NodeState::Complete)
    }

    /// A link is ready when none of its source nodes is overflowing and
    /// incomplete.
    fn link_source_nodes_ready<N: SolverNode>(&self, link: &dyn Link<N>) -> bool {
        for (port, direction) in link.port_directions().iter().enumerate() {
            if matches!(direction, PortDirection::Source | PortDirection::Both)
                && self.node_states[link.node_map()[port]] == NodeState::Overflowing
            {
                return false;
            }
        }
        true
    }

    /// A node is ready when every link flowing into it has transported.
    fn node_input_links_complete<N: SolverNode>(
        &self,
        node: usize,
        links: &[Box<dyn Link<N>>],
    ) -> bool {
        for (i, link) in links.iter().enumerate() {
            if self.link_states[i] {
                continue;
            }
            for (port, direction) in link.port_directions().iter().enumerate() {
                if link.node_map()[port] == node
                    && matches!(direction, PortDirection::Sink | PortDirection::Both)
                {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gf_network::LinkStamp;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Node stub with scripted overflow state, recording integration order.
    struct ScriptNode {
        name: String,
        overflowing: bool,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl ScriptNode {
        fn new(name: &str, overflowing: bool, log: &Rc<RefCell<Vec<String>>>) -> Self {
            Self {
                name: name.into(),
                overflowing,
                log: log.clone(),
            }
        }
    }

    impl SolverNode for ScriptNode {
        fn name(&self) -> &str {
            &self.name
        }
        fn potential(&self) -> f64 {
            0.0
        }
        fn set_potential(&mut self, _potential: f64) {}
        fn previous_potential(&self) -> f64 {
            0.0
        }
        fn schedule_outflux(&mut self, _flux: f64) {}
        fn is_overflowing(&self, _dt: f64) -> bool {
            self.overflowing
        }
        fn integrate_flows(&mut self, _dt: f64) {
            self.log.borrow_mut().push(format!("node {}", self.name));
        }
        fn reset_flows(&mut self) {}
        fn set_network_capacitance_request(&mut self, _flux: f64) {}
        fn network_capacitance_request(&self) -> f64 {
            0.0
        }
        fn set_network_capacitance(&mut self, _capacitance: f64) {}
    }

    /// Two-port link with fixed directions, recording transport order.
    struct ScriptLink {
        name: String,
        map: Vec<usize>,
        stamp: LinkStamp,
        directions: Vec<PortDirection>,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl ScriptLink {
        fn flow(
            name: &str,
            from: usize,
            to: usize,
            log: &Rc<RefCell<Vec<String>>>,
        ) -> Box<dyn Link<ScriptNode>> {
            Box::new(Self {
                name: name.into(),
                map: vec![from, to],
                stamp: LinkStamp::new(2),
                directions: vec![PortDirection::Source, PortDirection::Sink],
                log: log.clone(),
            })
        }
    }

    impl Link<ScriptNode> for ScriptLink {
        fn name(&self) -> &str {
            &self.name
        }
        fn node_map(&self) -> &[usize] {
            &self.map
        }
        fn stamp(&self) -> &LinkStamp {
            &self.stamp
        }
        fn stamp_mut(&mut self) -> &mut LinkStamp {
            &mut self.stamp
        }
        fn port_directions(&self) -> &[PortDirection] {
            &self.directions
        }
        fn step(&mut self, _nodes: &mut [ScriptNode], _dt: f64) {}
        fn compute_flows(&mut self, _nodes: &mut [ScriptNode], _dt: f64) {}
        fn transport_flows(&mut self, _nodes: &mut [ScriptNode], _dt: f64) {
            self.log.borrow_mut().push(format!("link {}", self.name));
        }
    }

    #[test]
    fn nominal_chain_transports_then_integrates() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut nodes = vec![
            ScriptNode::new("a", false, &log),
            ScriptNode::new("b", false, &log),
            ScriptNode::new("ground", false, &log),
        ];
        let mut links = vec![ScriptLink::flow("ab", 0, 1, &log)];

        let mut orchestrator = FlowOrchestrator::new(links.len(), nodes.len());
        orchestrator.update(&mut nodes, &mut links, 0.1).unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["link ab", "node a", "node b"]
        );
    }

    #[test]
    fn downstream_of_overflow_waits_for_mixed_state() {
        // a overflows into b: the a->b link must wait until a has
        // integrated (mixed its inflows) before transporting.
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut nodes = vec![
            ScriptNode::new("src", false, &log),
            ScriptNode::new("a", true, &log),
            ScriptNode::new("b", false, &log),
            ScriptNode::new("ground", false, &log),
        ];
        let mut links = vec![
            ScriptLink::flow("ab", 1, 2, &log),
            ScriptLink::flow("srca", 0, 1, &log),
        ];

        let mut orchestrator = FlowOrchestrator::new(links.len(), nodes.len());
        orchestrator.update(&mut nodes, &mut links, 0.1).unwrap();

        let entries = log.borrow();
        let pos = |what: &str| entries.iter().position(|e| e == what).unwrap();
        // The overflowing node's inputs transport and it integrates before
        // its outflow link moves anything.
        assert!(pos("link srca") < pos("node a"));
        assert!(pos("node a") < pos("link ab"));
        assert!(pos("link ab") < pos("node b"));
    }

    #[test]
    fn mutually_overflowing_nodes_break_cycle_with_forced_transport() {
        // a and b overflow into each other: neither outflow link is ever
        // ready, so the orchestrator must force one to complete early.
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut nodes = vec![
            ScriptNode::new("a", true, &log),
            ScriptNode::new("b", true, &log),
            ScriptNode::new("ground", false, &log),
        ];
        let mut links = vec![
            ScriptLink::flow("ab", 0, 1, &log),
            ScriptLink::flow("ba", 1, 0, &log),
        ];

        let mut orchestrator = FlowOrchestrator::new(links.len(), nodes.len());
        orchestrator.update(&mut nodes, &mut links, 0.1).unwrap();

        // Everything still completes exactly once.
        let entries = log.borrow();
        assert_eq!(entries.iter().filter(|e| *e == "link ab").count(), 1);
        assert_eq!(entries.iter().filter(|e| *e == "link ba").count(), 1);
        assert_eq!(entries.iter().filter(|e| *e == "node a").count(), 1);
        assert_eq!(entries.iter().filter(|e| *e == "node b").count(), 1);
    }

    #[test]
    fn ground_only_links_complete_immediately() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut nodes = vec![
            ScriptNode::new("a", false, &log),
            ScriptNode::new("ground", false, &log),
        ];
        let mut links = vec![ScriptLink::flow("ag", 0, 1, &log)];
        let mut orchestrator = FlowOrchestrator::new(links.len(), nodes.len());
        orchestrator.update(&mut nodes, &mut links, 0.1).unwrap();
        assert_eq!(*log.borrow(), vec!["link ag", "node a"]);
    }
}
