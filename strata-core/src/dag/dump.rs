//! Structure Dumps
//!
//! Human-readable structure info for a single node and a serde snapshot of
//! the whole graph.

use std::collections::VecDeque;
use std::fmt::Write as _;

use indexmap::IndexMap;
use serde::Serialize;

use super::{Dag, NodeId, NodeKind};
use crate::error::Result;
use crate::value::{Value, ValueType};

/// Serializable view of one node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub name: String,
    pub kind: &'static str,
    pub value_type: ValueType,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_value: Option<Value>,
    pub touched: bool,
    pub needs_update: bool,
    pub clamped: bool,
    /// Cached log-probability, stochastic nodes only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ln_probability: Option<f64>,
    pub references: usize,
    pub parents: Vec<String>,
    pub children: Vec<String>,
}

impl Dag {
    /// Snapshot a node without triggering recomputation.
    pub fn snapshot(&self, id: NodeId) -> Result<NodeSnapshot> {
        let node = self.node(id)?;
        Ok(NodeSnapshot {
            name: self.name_of(id),
            kind: node.kind.label(),
            value_type: node.value_type,
            value: node.value.clone(),
            stored_value: node.stored_value.clone(),
            touched: node.touched,
            needs_update: node.needs_update,
            clamped: node.is_clamped(),
            ln_probability: node.stochastic().map(|s| s.ln_prob),
            references: node.references.get(),
            parents: node.parents().map(|p| self.name_of(p)).collect(),
            children: node.children().map(|c| self.name_of(c)).collect(),
        })
    }

    /// All live nodes with parents before children.
    ///
    /// Kahn's algorithm over distinct parent edges.
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut in_degree: IndexMap<NodeId, usize> = IndexMap::with_capacity(self.len());
        let mut queue = VecDeque::new();
        for id in self.ids() {
            let Some(node) = self.get(id) else { continue };
            let mut parents: Vec<NodeId> = node.parents().collect();
            parents.sort_unstable();
            parents.dedup();
            in_degree.insert(id, parents.len());
            if parents.is_empty() {
                queue.push_back(id);
            }
        }

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(id) = queue.pop_front() {
            order.push(id);
            let Some(node) = self.get(id) else { continue };
            for child in node.children() {
                if let Some(degree) = in_degree.get_mut(&child) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        queue.push_back(child);
                    }
                }
            }
        }
        order
    }

    /// Pretty JSON array of every node's snapshot, in topological order.
    ///
    /// Non-finite numbers serialize as `null`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let snapshots: Vec<NodeSnapshot> = self
            .topological_order()
            .into_iter()
            .filter_map(|id| self.snapshot(id).ok())
            .collect();
        serde_json::to_string_pretty(&snapshots)
    }

    /// Text dump of a node's structure. `verbose` adds bookkeeping fields.
    pub fn structure_info(&self, id: NodeId, verbose: bool) -> Result<String> {
        let node = self.node(id)?;
        let mut out = String::new();
        let flag = |b: bool| if b { "TRUE" } else { "FALSE" };

        // writing into a String cannot fail
        if verbose {
            let _ = writeln!(out, "_dagNode      = {} <{}>", self.name_of(id), id);
        }
        let dag_type = match &node.kind {
            NodeKind::Constant => "Constant DAG node",
            NodeKind::Deterministic { .. } => "Deterministic DAG node",
            NodeKind::Stochastic(_) => "Stochastic DAG node",
            NodeKind::Container { .. } => "Container DAG node",
            NodeKind::Member { .. } => "Member DAG node",
            NodeKind::Converter { .. } => "Converter DAG node",
        };
        let _ = writeln!(out, "_dagType      = {dag_type}");
        let _ = writeln!(out, "_valueType    = {}", node.value_type);

        if verbose {
            let _ = writeln!(out, "_refCount     = {}", node.references.get());
            match &node.kind {
                NodeKind::Deterministic { function } => {
                    let _ = writeln!(out, "_function     = <{}>", function.name());
                }
                NodeKind::Stochastic(state) => {
                    let _ = writeln!(out, "_distribution = <{}>", state.distribution.name());
                }
                _ => {}
            }
            let _ = writeln!(out, "_touched      = {}", flag(node.touched));
        }

        if let Some(state) = node.stochastic() {
            let _ = writeln!(out, "_clamped      = {}", flag(state.clamped));
            let _ = writeln!(out, "_value        = {}", node.value);
            let _ = writeln!(out, "_lnProb       = {}", state.ln_prob);
            if verbose && node.touched {
                if let Some(stored) = &node.stored_value {
                    let _ = writeln!(out, "_storedValue  = {stored}");
                }
                if let Some(stored) = state.stored_ln_prob {
                    let _ = writeln!(out, "_storedLnProb = {stored}");
                }
            }
        }

        let parents: Vec<String> = node.parents().map(|p| self.name_of(p)).collect();
        let children: Vec<String> = node.children().map(|c| self.name_of(c)).collect();
        let _ = writeln!(out, "_parents      = [ {} ]", parents.join(", "));
        let _ = writeln!(out, "_children     = [ {} ]", children.join(", "));
        Ok(out)
    }
}
