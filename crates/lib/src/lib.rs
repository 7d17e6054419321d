//! simba-lib: a build-graph engine driven by Lua recipes.
//!
//! Recipes declare typed targets (files, environments, generators,
//! dependencies, builders, ...) into a [`registry::Registry`]. The
//! [`engine::Engine`] validates them, expands the requested working set into a
//! dependency graph and hands it to a builder:
//! - [`execute::DirectBuilder`] runs generator commands itself, in parallel
//! - [`ninja::NinjaBuilder`] writes a `build.ninja` and runs ninja on it
//!
//! [`tree`] renders the same graph for inspection.

pub mod consts;
pub mod diagnostics;
pub mod engine;
pub mod execute;
pub mod lifecycle;
pub mod lua;
pub mod ninja;
pub mod platform;
pub mod pool;
pub mod recipes;
pub mod registry;
pub mod schema;
pub mod target;
pub mod template;
pub mod tree;
pub mod types;
pub mod util;

pub use engine::{Engine, EngineError, Options, RecipeLoader};
pub use lua::LuaRecipes;
