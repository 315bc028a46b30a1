// src/resolver/mod.rs

//! Build-set resolution
//!
//! Starting from the requested names, recipes are located level by level:
//! every name in the current frontier is looked up in parallel, then the
//! declared dependencies of everything found form the next frontier. A
//! dependency with no recipe anywhere is either already satisfied by an
//! installed package, available from a binary repository, or an error.
//!
//! Once the frontier is empty the graph is checked for cycles, ordered
//! dependencies-first, and every entry gets a rebuild decision.

mod graph;
mod plan;

pub use graph::{BuildGraph, NodeId};
pub use plan::{BuildPlan, BuildSetEntry, Decision, RebuildMode, Role};

use crate::error::{Error, Result};
use crate::packages::{ArtifactStore, PackageManager};
use crate::recipe::{Dependency, DependencyKind};
use crate::source::{RecipeSource, SourceLocator};
use crate::version::vercmp;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Options that shape a build plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub rebuild: RebuildMode,
    /// Treat make-only dependencies like runtime ones
    pub install_all_dependencies: bool,
}

/// A name waiting to be located
struct Pending {
    name: String,
    /// Every declaring dependency with its declarer; empty for requested names
    via: Vec<(Dependency, String)>,
}

/// Resolves requested names into a build plan
pub struct Resolver<'a> {
    locator: &'a SourceLocator,
    packages: &'a dyn PackageManager,
    artifacts: &'a ArtifactStore,
}

impl<'a> Resolver<'a> {
    pub fn new(
        locator: &'a SourceLocator,
        packages: &'a dyn PackageManager,
        artifacts: &'a ArtifactStore,
    ) -> Self {
        Self {
            locator,
            packages,
            artifacts,
        }
    }

    /// Resolve the requested names into an ordered build plan
    pub fn resolve(&self, requests: &[String], options: &ResolveOptions) -> Result<BuildPlan> {
        let mut graph = BuildGraph::new();
        let mut sources: Vec<RecipeSource> = Vec::new();
        let mut edge_kinds: HashMap<(NodeId, NodeId), DependencyKind> = HashMap::new();
        let mut presatisfied: Vec<String> = Vec::new();
        let mut repo_provided: Vec<String> = Vec::new();
        let mut external: HashSet<String> = HashSet::new();
        // Names that resolved to a recipe already in the graph (split packages)
        let mut aliases: HashMap<String, NodeId> = HashMap::new();
        let mut explicit: HashSet<NodeId> = HashSet::new();

        let mut frontier: Vec<Pending> = Vec::new();
        for name in requests {
            if !frontier.iter().any(|p| &p.name == name) {
                frontier.push(Pending {
                    name: name.clone(),
                    via: Vec::new(),
                });
            }
        }

        // Edges whose target is still being located
        let mut unresolved_edges: Vec<(NodeId, String, DependencyKind)> = Vec::new();

        let mut level = 0;
        while !frontier.is_empty() {
            debug!("Resolution level {}: {} name(s)", level, frontier.len());
            let names: Vec<String> = frontier.iter().map(|p| p.name.clone()).collect();
            let located = self.locator.locate_all(&names);

            let mut added = Vec::new();
            for (pending, result) in frontier.into_iter().zip(located) {
                match result? {
                    Some(source) => {
                        let shared = sources
                            .iter()
                            .find(|s| s.path == source.path)
                            .and_then(|s| graph.get(&s.name));
                        let id = match shared {
                            Some(id) => {
                                debug!("{} is built by the recipe of {}", pending.name, graph.name(id));
                                aliases.insert(pending.name.clone(), id);
                                id
                            }
                            None => {
                                let id = graph.add_node(&pending.name);
                                sources.push(source);
                                added.push(id);
                                id
                            }
                        };
                        if pending.via.is_empty() {
                            explicit.insert(id);
                        }
                    }
                    None => {
                        if pending.via.is_empty() {
                            return Err(Error::PackageNotFound(pending.name));
                        }
                        for (dependency, required_by) in &pending.via {
                            self.check_external(
                                dependency,
                                required_by,
                                &mut presatisfied,
                                &mut repo_provided,
                            )?;
                        }
                        external.insert(pending.name);
                    }
                }
            }

            let mut next: Vec<Pending> = Vec::new();
            for id in added {
                let from = graph.name(id).to_string();
                for edge in sources[id.index()].dependency_edges() {
                    let dependency = edge.to;
                    let kind = dependency.kind;
                    // No recipe; each declarer's constraint must still be met
                    if external.contains(&dependency.name) {
                        self.check_external(
                            &dependency,
                            &from,
                            &mut presatisfied,
                            &mut repo_provided,
                        )?;
                        continue;
                    }

                    // Already located, directly or as another name of a split recipe
                    let target = lookup_node(&graph, &aliases, &dependency.name).or_else(|| {
                        sources
                            .iter()
                            .position(|s| s.recipe.provides_name(&dependency.name))
                            .and_then(|i| graph.get(&sources[i].name))
                    });
                    if let Some(target) = target {
                        record_edge(&mut graph, &mut edge_kinds, id, target, kind);
                        continue;
                    }

                    unresolved_edges.push((id, dependency.name.clone(), kind));
                    match next.iter_mut().find(|p| p.name == dependency.name) {
                        Some(pending) => pending.via.push((dependency, from.clone())),
                        None => next.push(Pending {
                            name: dependency.name.clone(),
                            via: vec![(dependency, from.clone())],
                        }),
                    }
                }
            }

            // Targets located in this level can be linked now
            unresolved_edges.retain(|(from, to, kind)| match lookup_node(&graph, &aliases, to) {
                Some(target) => {
                    record_edge(&mut graph, &mut edge_kinds, *from, target, *kind);
                    false
                }
                None => !external.contains(to),
            });

            frontier = next;
            level += 1;
        }

        let order = graph.topological_order()?;
        let roles = assign_roles(&graph, &order, &explicit, &edge_kinds, options);

        let mut entries = Vec::with_capacity(order.len());
        for (position, &id) in order.iter().enumerate() {
            let source = sources[id.index()].clone();
            let name = graph.name(id).to_string();
            let role = roles[id.index()];
            let known_version = self.known_version(&name)?;
            let decision = decide(&source, role, known_version.as_deref(), options.rebuild);

            match &decision {
                Decision::Build => info!(
                    "{} {} will be built ({})",
                    name,
                    source.version(),
                    role
                ),
                Decision::Skip { known_version } => info!(
                    "{} {} is up to date ({})",
                    name,
                    known_version,
                    role
                ),
            }

            entries.push(BuildSetEntry {
                name,
                position,
                decision,
                role,
                known_version,
                dependencies: graph
                    .dependencies(id)
                    .iter()
                    .map(|&d| graph.name(d).to_string())
                    .collect(),
                dependents: graph
                    .dependents(id)
                    .iter()
                    .map(|&d| graph.name(d).to_string())
                    .collect(),
                source,
            });
        }

        Ok(BuildPlan {
            entries,
            presatisfied,
            repo_provided,
        })
    }

    /// Check a dependency that has no recipe against the system
    ///
    /// Installed at an acceptable version makes it pre-satisfied; otherwise
    /// a binary repository has to provide it. A name that some declarer
    /// needs from a repository is listed as repo-provided only.
    fn check_external(
        &self,
        dependency: &Dependency,
        required_by: &str,
        presatisfied: &mut Vec<String>,
        repo_provided: &mut Vec<String>,
    ) -> Result<()> {
        let name = &dependency.name;
        if self.packages.satisfies(dependency)? {
            debug!("{} is satisfied by an installed package", dependency.raw);
            if !presatisfied.contains(name) && !repo_provided.contains(name) {
                presatisfied.push(name.clone());
            }
            return Ok(());
        }

        if self.packages.available_in_repos(dependency)? {
            debug!("{} is provided by a binary repository", dependency.raw);
            presatisfied.retain(|n| n != name);
            if !repo_provided.contains(name) {
                repo_provided.push(name.clone());
            }
            return Ok(());
        }

        Err(Error::UnresolvedDependency {
            name: name.clone(),
            required_by: required_by.to_string(),
        })
    }

    /// Newer of the installed version and the newest stored artifact
    fn known_version(&self, name: &str) -> Result<Option<String>> {
        let installed = self.packages.installed_version(name)?;
        let stored = self.artifacts.newest_version(name)?;

        Ok(match (installed, stored) {
            (Some(i), Some(s)) => Some(if vercmp(&s, &i) == Ordering::Greater { s } else { i }),
            (i, s) => i.or(s),
        })
    }
}

fn lookup_node(graph: &BuildGraph, aliases: &HashMap<String, NodeId>, name: &str) -> Option<NodeId> {
    graph.get(name).or_else(|| aliases.get(name).copied())
}

fn record_edge(
    graph: &mut BuildGraph,
    edge_kinds: &mut HashMap<(NodeId, NodeId), DependencyKind>,
    from: NodeId,
    to: NodeId,
    kind: DependencyKind,
) {
    graph.add_edge(from, to);
    let existing = edge_kinds.entry((from, to)).or_insert(kind);
    *existing = (*existing).max(kind);
}

/// Roles flow from dependents to dependencies
///
/// A make-only edge makes its target a make dependency; a runtime edge
/// passes on the role of its source, capped at `Dependency`. Each node keeps
/// the strongest role it receives.
fn assign_roles(
    graph: &BuildGraph,
    order: &[NodeId],
    explicit: &HashSet<NodeId>,
    edge_kinds: &HashMap<(NodeId, NodeId), DependencyKind>,
    options: &ResolveOptions,
) -> Vec<Role> {
    let mut roles = vec![Role::MakeDependency; graph.len()];

    for &id in order.iter().rev() {
        if explicit.contains(&id) {
            roles[id.index()] = Role::Explicit;
            continue;
        }

        roles[id.index()] = graph
            .dependents(id)
            .iter()
            .map(|&dependent| {
                match edge_kinds.get(&(dependent, id)) {
                    Some(DependencyKind::MakeOnly) if !options.install_all_dependencies => {
                        Role::MakeDependency
                    }
                    _ => roles[dependent.index()].min(Role::Dependency),
                }
            })
            .max()
            .unwrap_or(Role::Dependency);
    }

    roles
}

/// Build or skip, according to the rebuild mode
fn decide(
    source: &RecipeSource,
    role: Role,
    known_version: Option<&str>,
    mode: RebuildMode,
) -> Decision {
    let forced = match mode {
        RebuildMode::All => true,
        RebuildMode::Explicit => role == Role::Explicit,
        RebuildMode::Newer => false,
    };

    match known_version {
        Some(known) if !forced && vercmp(&source.version(), known) != Ordering::Greater => {
            Decision::Skip {
                known_version: known.to_string(),
            }
        }
        _ => Decision::Build,
    }
}
