//! Reference graph checks run before the prepare phase.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::diagnostics::Diagnostic;
use crate::registry::TargetId;

use super::{Engine, EngineError};

/// Build the graph of target-valued fields, with an edge from each target to
/// every target it references.
pub(crate) fn reference_graph(engine: &Engine) -> DiGraph<TargetId, ()> {
  let mut graph = DiGraph::new();
  let ids = engine.registry().ids();
  let indices: HashMap<TargetId, NodeIndex> = ids.iter().map(|id| (*id, graph.add_node(*id))).collect();

  for id in &ids {
    let node = engine.node(*id);
    let data = node.data();
    for value in data.fields.values() {
      value.for_each_target(&mut |referenced| {
        if let Some(to) = indices.get(&referenced) {
          graph.add_edge(indices[id], *to, ());
        }
      });
    }
  }

  graph
}

/// Fail when target references loop back on themselves.
///
/// Preparing or expanding a target waits on the targets it references, so a
/// cycle would never complete.
pub(crate) fn verify_acyclic(engine: &Engine) -> Result<(), EngineError> {
  let graph = reference_graph(engine);
  match toposort(&graph, None) {
    Ok(_) => Ok(()),
    Err(cycle) => {
      let node = engine.node(graph[cycle.node_id()]);
      let data = node.snapshot();
      engine
        .diagnostics()
        .error(Diagnostic::new("target is part of a reference cycle").target(data.qualified.clone()).at(data.origin));
      Err(EngineError::CycleDetected(data.qualified))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::engine::Options;
  use crate::registry::{Declaration, TargetClass};

  #[test]
  fn acyclic_references_pass() {
    let engine = Engine::new(Options::default());
    let lib = engine.declare(Declaration::new(TargetClass::Dependency, "lib").field("kind", "static_library")).unwrap();
    engine
      .declare(Declaration::new(TargetClass::Dependency, "app").field("dependencies", vec![lib]))
      .unwrap();

    assert!(verify_acyclic(&engine).is_ok());
    assert_eq!(reference_graph(&engine).edge_count(), 1);
  }

  #[test]
  fn mutual_dependencies_are_a_cycle() {
    let engine = Engine::new(Options::default());
    let a = engine.declare(Declaration::new(TargetClass::Target, "a")).unwrap();
    let b = engine
      .declare(Declaration::new(TargetClass::Dependency, "b").field("dependencies", vec![a]))
      .unwrap();
    engine
      .declare(Declaration::new(TargetClass::Dependency, "a").field("dependencies", vec![b]))
      .unwrap();

    let err = verify_acyclic(&engine).unwrap_err();
    assert!(matches!(err, EngineError::CycleDetected(ref name) if name == "a" || name == "b"));
    assert_eq!(engine.diagnostics().count(), 1);
  }

  #[test]
  fn self_reference_is_a_cycle() {
    let engine = Engine::new(Options::default());
    let env = engine.declare(Declaration::new(TargetClass::Environment, "loop")).unwrap();
    engine
      .declare(Declaration::new(TargetClass::Environment, "loop").field("parent", env))
      .unwrap();

    assert!(matches!(verify_acyclic(&engine), Err(EngineError::CycleDetected(_))));
  }
}
