use std::collections::{HashMap, HashSet, VecDeque};

use skewadjust_core::error::{Result, SkewError};
use skewadjust_core::ids::{SpanId, TraceId};
use skewadjust_core::model::jaeger::Trace;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallNode {
    pub span_id: SpanId,
    pub children: Vec<CallNode>,
}

#[derive(Debug, Clone)]
pub struct CallTree {
    pub roots: Vec<CallNode>,
    parents: HashMap<SpanId, SpanId>,
    children: HashMap<SpanId, Vec<SpanId>>,
    order: Vec<SpanId>,
}

pub fn parent_map<'a>(
    trace_id: &TraceId,
    spans: impl IntoIterator<Item = (&'a SpanId, &'a [SpanId])>,
) -> Result<HashMap<SpanId, SpanId>> {
    let mut parents: HashMap<SpanId, SpanId> = HashMap::new();
    for (span_id, children) in spans {
        for child in children {
            if let Some(existing) = parents.get(child)
                && existing != span_id
            {
                return Err(SkewError::ParentConflict {
                    trace_id: trace_id.to_string(),
                    span_id: child.to_string(),
                    first_parent: existing.to_string(),
                    second_parent: span_id.to_string(),
                });
            }
            parents.insert(child.clone(), span_id.clone());
        }
    }
    Ok(parents)
}

impl CallTree {
    pub fn build(trace: &Trace) -> Result<Self> {
        let mut children: HashMap<SpanId, Vec<SpanId>> = HashMap::new();
        let mut ids = Vec::with_capacity(trace.spans.len());
        for span in &trace.spans {
            if children.contains_key(&span.span_id) {
                warn!(
                    trace_id = %trace.trace_id,
                    span_id = %span.span_id,
                    "duplicate span id in trace; keeping the first occurrence"
                );
                continue;
            }
            children.insert(span.span_id.clone(), span.child_span_ids.clone());
            ids.push(span.span_id.clone());
        }

        let parents = parent_map(
            &trace.trace_id,
            ids.iter()
                .map(|id| (id, children.get(id).map(Vec::as_slice).unwrap_or_default())),
        )?;
        if let Some(missing) = parents.keys().find(|child| !children.contains_key(*child)) {
            return Err(SkewError::UnknownSpan {
                trace_id: trace.trace_id.to_string(),
                span_id: missing.to_string(),
            });
        }

        let root_ids = ids
            .iter()
            .filter(|id| !parents.contains_key(*id))
            .cloned()
            .collect::<Vec<_>>();

        let mut order = Vec::with_capacity(ids.len());
        let mut visited: HashSet<SpanId> = root_ids.iter().cloned().collect();
        let mut queue: VecDeque<SpanId> = root_ids.iter().cloned().collect();
        while let Some(id) = queue.pop_front() {
            for child in children.get(&id).into_iter().flatten() {
                if !visited.insert(child.clone()) {
                    return Err(malformed(trace, child));
                }
                queue.push_back(child.clone());
            }
            order.push(id);
        }

        if let Some(stray) = ids.iter().find(|id| !visited.contains(*id)) {
            return Err(malformed(trace, stray));
        }

        let mut nodes: HashMap<SpanId, CallNode> = HashMap::with_capacity(order.len());
        for id in order.iter().rev() {
            let mut node = CallNode {
                span_id: id.clone(),
                children: Vec::new(),
            };
            for child in children.get(id).into_iter().flatten() {
                let built = nodes.remove(child).ok_or_else(|| {
                    SkewError::Internal(format!("call tree child {child} built out of order"))
                })?;
                node.children.push(built);
            }
            nodes.insert(id.clone(), node);
        }
        let roots = root_ids
            .iter()
            .filter_map(|id| nodes.remove(id))
            .collect::<Vec<_>>();

        Ok(Self {
            roots,
            parents,
            children,
            order,
        })
    }

    pub fn parent_of(&self, span_id: &SpanId) -> Option<&SpanId> {
        self.parents.get(span_id)
    }

    pub fn children_of(&self, span_id: &SpanId) -> &[SpanId] {
        self.children
            .get(span_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn breadth_first(&self) -> &[SpanId] {
        &self.order
    }

    pub fn edges(&self) -> impl Iterator<Item = (&SpanId, &SpanId)> + '_ {
        self.order
            .iter()
            .flat_map(move |parent| self.children_of(parent).iter().map(move |c| (parent, c)))
    }

    pub fn root_ids(&self) -> impl Iterator<Item = &SpanId> + '_ {
        self.roots.iter().map(|r| &r.span_id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn malformed(trace: &Trace, span_id: &SpanId) -> SkewError {
    SkewError::MalformedCallGraph {
        trace_id: trace.trace_id.to_string(),
        span_id: span_id.to_string(),
    }
}
