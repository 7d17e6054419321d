//! Dependency forest of the working set.

use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use std::sync::Arc;

use serde::Serialize;

use crate::engine::{Engine, EngineError};
use crate::lifecycle::BoxFuture;
use crate::registry::{TargetClass, TargetId};
use crate::target::dependency;

/// A node of the rendered forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
  pub name: String,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub children: Vec<TreeNode>,
}

impl TreeNode {
  pub fn leaf(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      children: Vec::new(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
  Target(TargetId),
  /// Alias names of a dependency.
  Label(String),
}

#[derive(Debug, Default)]
struct Edges {
  parents: Vec<Key>,
  children: Vec<Key>,
}

#[derive(Default)]
struct Graph {
  order: Vec<Key>,
  edges: HashMap<Key, Edges>,
  visited: HashSet<Key>,
}

impl Graph {
  fn entry(&mut self, key: &Key) -> &mut Edges {
    if !self.edges.contains_key(key) {
      self.order.push(key.clone());
    }
    self.edges.entry(key.clone()).or_default()
  }

  fn link(&mut self, parent: &Key, child: &Key) {
    let edges = self.entry(parent);
    if !edges.children.contains(child) {
      edges.children.push(child.clone());
    }
    let edges = self.entry(child);
    if !edges.parents.contains(parent) {
      edges.parents.push(parent.clone());
    }
  }
}

/// Expand `targets` and arrange everything they reference into a forest.
///
/// Roots are the nodes nobody references. A node reachable through several
/// paths lists its children under its first occurrence only.
pub async fn forest(engine: &Arc<Engine>, targets: &[TargetId]) -> Result<Vec<TreeNode>, EngineError> {
  let mut graph = Graph::default();
  for target in targets {
    engine.expand(*target).await?;
    visit(engine, &mut graph, *target).await?;
  }

  let mut on_tree = HashSet::new();
  let roots = graph
    .order
    .iter()
    .filter(|key| graph.edges[*key].parents.is_empty())
    .cloned()
    .collect::<Vec<_>>();
  Ok(
    roots
      .iter()
      .map(|root| build(engine, &graph, root, &mut on_tree))
      .collect(),
  )
}

fn visit<'a>(engine: &'a Arc<Engine>, graph: &'a mut Graph, id: TargetId) -> BoxFuture<'a, Result<(), EngineError>> {
  Box::pin(async move {
    let key = Key::Target(id);
    graph.entry(&key);
    if !graph.visited.insert(key.clone()) {
      return Ok(());
    }

    let mut children = Vec::new();
    match engine.node(id).class() {
      TargetClass::Environment => {
        let spec = engine.environment_spec(id)?;
        if let Some(parent) = spec.parent {
          visit(engine, graph, parent).await?;
          graph.link(&Key::Target(parent), &key);
        }
        children.extend(spec.archiver.into_iter().chain(spec.linker).map(Key::Target));
      }
      TargetClass::Dependency => {
        let spec = engine.dependency_spec(id)?;
        children.extend(spec.generator.map(Key::Target));
        children.extend(spec.aliases.iter().cloned().map(Key::Label));
        children.extend(dependency::dependencies(engine, id).await?.into_iter().map(Key::Target));
      }
      TargetClass::Filetype => children.push(Key::Target(engine.filetype_spec(id)?.generator)),
      TargetClass::Generator => children.push(Key::Target(engine.generator_spec(id)?.executor)),
      TargetClass::Builder => children.extend(engine.builder_spec(id)?.executor.map(Key::Target)),
      _ => {}
    }

    for child in children {
      if let Key::Target(child_id) = child {
        visit(engine, graph, child_id).await?;
      }
      graph.link(&key, &child);
    }
    Ok(())
  })
}

fn build(engine: &Engine, graph: &Graph, key: &Key, on_tree: &mut HashSet<Key>) -> TreeNode {
  let mut node = TreeNode::leaf(match key {
    Key::Target(id) => engine.node(*id).qualified(),
    Key::Label(label) => label.clone(),
  });
  if !on_tree.insert(key.clone()) {
    return node;
  }
  node.children = graph.edges[key]
    .children
    .iter()
    .map(|child| build(engine, graph, child, on_tree))
    .collect();
  node
}

/// Render a forest with box-drawing guides.
pub fn render(forest: &[TreeNode]) -> String {
  let mut out = String::new();
  for root in forest {
    let _ = writeln!(out, "{}", root.name);
    render_children(&mut out, &root.children, "");
  }
  out
}

fn render_children(out: &mut String, children: &[TreeNode], prefix: &str) {
  for (i, child) in children.iter().enumerate() {
    let last = i + 1 == children.len();
    let _ = writeln!(out, "{}{}{}", prefix, if last { "└── " } else { "├── " }, child.name);
    let nested = format!("{}{}", prefix, if last { "    " } else { "│   " });
    render_children(out, &child.children, &nested);
  }
}
