//! Registry and ordering of traits.

use crate::environment::Environment;
use crate::properties::TraitProperties;
use crate::traits::{
    DeployerTrait, DeploymentTrait, EnvironmentTrait, KnativeServiceTrait, Trait,
};
use integrator_core::{Error, Result};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Builds a trait instance from its configured properties.
pub type TraitFactory = fn(&TraitProperties<'_>) -> Result<Box<dyn Trait>>;

/// A registered trait and the ids of the traits it must run after.
#[derive(Clone, Copy)]
pub struct TraitDescriptor {
    pub id: &'static str,
    pub dependencies: &'static [&'static str],
    pub factory: TraitFactory,
}

fn builtin_descriptors() -> Vec<TraitDescriptor> {
    vec![
        TraitDescriptor {
            id: EnvironmentTrait::ID,
            dependencies: &[],
            factory: |p| Ok(Box::new(EnvironmentTrait::from_properties(p)?)),
        },
        TraitDescriptor {
            id: DeployerTrait::ID,
            dependencies: &[EnvironmentTrait::ID],
            factory: |p| Ok(Box::new(DeployerTrait::from_properties(p)?)),
        },
        TraitDescriptor {
            id: DeploymentTrait::ID,
            dependencies: &[DeployerTrait::ID],
            factory: |p| Ok(Box::new(DeploymentTrait::from_properties(p)?)),
        },
        TraitDescriptor {
            id: KnativeServiceTrait::ID,
            dependencies: &[DeployerTrait::ID, DeploymentTrait::ID],
            factory: |p| Ok(Box::new(KnativeServiceTrait::from_properties(p)?)),
        },
    ]
}

/// Traits in execution order.
pub struct TraitCatalog {
    ordered: Vec<TraitDescriptor>,
}

impl Default for TraitCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl TraitCatalog {
    /// The built-in traits: `environment`, `deployer`, `deployment` and
    /// `knative-service`.
    pub fn new() -> Self {
        Self {
            ordered: topological_sort(&builtin_descriptors()),
        }
    }

    /// Catalog over a custom trait list. Fails on duplicate ids, unknown
    /// dependencies and dependency cycles.
    pub fn with_traits(descriptors: Vec<TraitDescriptor>) -> Result<Self> {
        let mut ids = HashSet::new();
        for d in &descriptors {
            if !ids.insert(d.id) {
                return Err(Error::InvalidInput(format!("duplicate trait: {}", d.id)));
            }
        }

        for d in &descriptors {
            for &dep in d.dependencies {
                if !ids.contains(dep) {
                    return Err(Error::InvalidInput(format!(
                        "trait {} depends on unknown trait {dep}",
                        d.id
                    )));
                }
            }
        }

        if let Err(cycle) = detect_cycle(&descriptors) {
            return Err(Error::InvalidInput(format!(
                "cycle detected in trait dependencies: {cycle}"
            )));
        }

        Ok(Self {
            ordered: topological_sort(&descriptors),
        })
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.ordered.iter().map(|d| d.id).collect()
    }

    /// Fresh trait instances, in execution order, configured from the
    /// environment's merged trait configuration.
    pub fn resolve(&self, env: &Environment) -> Result<Vec<Box<dyn Trait>>> {
        let merged = env.merged_traits();
        let empty = Default::default();
        self.ordered
            .iter()
            .map(|d| {
                let values = merged.get(d.id).map(|t| &t.configuration).unwrap_or(&empty);
                (d.factory)(&TraitProperties::new(d.id, values))
            })
            .collect()
    }

    /// Run one pass: configure each trait in order and apply the ones that
    /// opt in. Any failure aborts the pass.
    pub async fn apply(&self, env: &mut Environment) -> Result<()> {
        let integration = env.name();

        for mut t in self.resolve(env)? {
            if env.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            if !t.configure(env).await? {
                debug!(%integration, trait_id = t.id(), "Trait skipped");
                continue;
            }

            t.apply(env)?;
            env.executed_traits.push(t.id().to_string());
            debug!(%integration, trait_id = t.id(), "Trait applied");
        }

        info!(
            %integration,
            traits = ?env.executed_traits,
            resources = env.resources.len(),
            "Trait pass complete"
        );
        Ok(())
    }
}

fn topological_sort(descriptors: &[TraitDescriptor]) -> Vec<TraitDescriptor> {
    let by_id: HashMap<&str, &TraitDescriptor> =
        descriptors.iter().map(|d| (d.id, d)).collect();
    let mut visited = HashSet::new();
    let mut result = Vec::new();

    for d in descriptors {
        topo_visit(d.id, &by_id, &mut visited, &mut result);
    }
    result
}

fn topo_visit(
    id: &str,
    by_id: &HashMap<&str, &TraitDescriptor>,
    visited: &mut HashSet<String>,
    result: &mut Vec<TraitDescriptor>,
) {
    if !visited.insert(id.to_string()) {
        return;
    }

    if let Some(d) = by_id.get(id) {
        for &dep in d.dependencies {
            topo_visit(dep, by_id, visited, result);
        }
        result.push(**d);
    }
}

fn detect_cycle(descriptors: &[TraitDescriptor]) -> std::result::Result<(), String> {
    let by_id: HashMap<&str, &TraitDescriptor> =
        descriptors.iter().map(|d| (d.id, d)).collect();
    let mut visited = HashSet::new();
    let mut stack = HashSet::new();

    for d in descriptors {
        if !visited.contains(d.id) {
            if let Some(cycle) = dfs_detect_cycle(d.id, &by_id, &mut visited, &mut stack) {
                return Err(cycle);
            }
        }
    }
    Ok(())
}

fn dfs_detect_cycle(
    id: &'static str,
    by_id: &HashMap<&str, &TraitDescriptor>,
    visited: &mut HashSet<&'static str>,
    stack: &mut HashSet<&'static str>,
) -> Option<String> {
    visited.insert(id);
    stack.insert(id);

    if let Some(d) = by_id.get(id) {
        for &dep in d.dependencies {
            if !visited.contains(dep) {
                if let Some(cycle) = dfs_detect_cycle(dep, by_id, visited, stack) {
                    return Some(cycle);
                }
            } else if stack.contains(dep) {
                return Some(format!("{id} -> {dep}"));
            }
        }
    }

    stack.remove(id);
    None
}
