//! Defaults-tree expansion and merging

use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};

use super::defaults::{parse_defaults, DefaultsEntry, Selection};
use super::error::ComposeError;
use super::merge::deep_merge;
use super::overrides::{apply_value_override, Override, OverrideKind};
use crate::source::{FragmentId, FragmentSource};
use crate::utils::{join_group, nest_at, package_from_group};

const COMMAND_LINE: &str = "command line";
const DEFAULT_MAX_PASSES: usize = 8;

/// One fragment application, in the order it was merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub fragment: FragmentId,
    pub package: String,
    pub origin: String,
    /// Where the override that selected this fragment was declared.
    pub selected_by: Option<String>,
}

/// Result of a composition: the merged tree and how it was built.
#[derive(Debug, Clone)]
pub struct Composition {
    pub config: Value,
    pub trace: Vec<TraceEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Choice {
    selection: Selection,
    declared_in: String,
}

#[derive(Debug)]
struct Declared {
    group: String,
    selection: Selection,
    declared_in: String,
    depth: usize,
    seq: usize,
}

#[derive(Debug, Clone)]
struct Appended {
    group: String,
    package: Option<String>,
    selection: Selection,
}

/// Command-line overrides split by what they act on.
#[derive(Debug, Default)]
struct Plan {
    selections: BTreeMap<String, Choice>,
    appended: Vec<Appended>,
    values: Vec<Override>,
}

enum Step {
    Child(Node),
    SelfBody,
}

struct Node {
    id: FragmentId,
    package: String,
    origin: String,
    selected_by: Option<String>,
    body: Mapping,
    steps: Vec<Step>,
}

/// Per-pass expansion state.
struct Expansion<'c> {
    choices: &'c BTreeMap<String, Choice>,
    appended: &'c [Appended],
    declared: Vec<Declared>,
    /// Groups with a regular selection entry, and the fragment declaring it.
    selected_groups: BTreeMap<String, String>,
    /// Errors raised while expanding; a later pass may select around them,
    /// so only the settled pass reports them.
    deferred: Vec<ComposeError>,
    stack: Vec<FragmentId>,
    seq: usize,
}

impl<'c> Expansion<'c> {
    fn new(choices: &'c BTreeMap<String, Choice>, appended: &'c [Appended]) -> Self {
        Self {
            choices,
            appended,
            declared: Vec::new(),
            selected_groups: BTreeMap::new(),
            deferred: Vec::new(),
            stack: Vec::new(),
            seq: 0,
        }
    }
}

struct GroupRequest<'a> {
    parent: &'a FragmentId,
    parent_package: &'a str,
    group: String,
    package: Option<String>,
    selection: Selection,
    optional: bool,
    depth: usize,
}

/// Resolve a `# @package` header against the fragment's group.
pub fn resolve_header_package(header: Option<&str>, group: &str) -> String {
    let default = package_from_group(group);
    let Some(header) = header else {
        return default;
    };
    match header {
        "_global_" => String::new(),
        "_group_" => default,
        other => {
            if let Some(rest) = other.strip_prefix("_global_.") {
                rest.to_string()
            } else if let Some(rest) = other.strip_prefix("_group_.") {
                join_package(&default, rest)
            } else {
                other.to_string()
            }
        }
    }
}

/// Resolve a `group@pkg` entry package, relative to the declaring fragment.
fn resolve_entry_package(package: &str, parent_package: &str) -> String {
    match package {
        "_global_" => String::new(),
        other => match other.strip_prefix("_global_.") {
            Some(rest) => rest.to_string(),
            None => join_package(parent_package, other),
        },
    }
}

fn join_package(prefix: &str, rest: &str) -> String {
    match (prefix.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{prefix}.{rest}"),
    }
}

/// Composes fragments served by a [`FragmentSource`].
pub struct Composer<'a> {
    source: &'a dyn FragmentSource,
    max_passes: usize,
}

impl<'a> Composer<'a> {
    pub fn new(source: &'a dyn FragmentSource) -> Self {
        Self { source, max_passes: DEFAULT_MAX_PASSES }
    }

    /// Compose the primary fragment with command-line overrides applied.
    pub fn compose(&self, primary: &str, overrides: &[Override]) -> Result<Composition, ComposeError> {
        let primary_id = FragmentId::parse(primary);
        let plan = self.plan(overrides)?;

        let mut choices = plan.selections.clone();
        let mut passes = 0;
        let (root, declared, selected_groups, deferred) = loop {
            passes += 1;
            if passes > self.max_passes {
                return Err(ComposeError::Unsettled { passes: self.max_passes });
            }
            let mut expansion = Expansion::new(&choices, &plan.appended);
            let root = self.expand_primary(&primary_id, &mut expansion)?;
            let settled = settle(&plan.selections, &expansion.declared);
            let Expansion { declared, selected_groups, deferred, .. } = expansion;
            if settled == choices {
                break (root, declared, selected_groups, deferred);
            }
            tracing::debug!(pass = passes, "group overrides changed, expanding again");
            choices = settled;
        };

        if let Some(err) = deferred.into_iter().next() {
            return Err(err);
        }
        for d in &declared {
            if !selected_groups.contains_key(&d.group) {
                return Err(ComposeError::UnknownOverrideGroup {
                    group: d.group.clone(),
                    declared_in: d.declared_in.clone(),
                });
            }
        }
        for group in plan.selections.keys() {
            if !selected_groups.contains_key(group) {
                return Err(ComposeError::UnknownOverrideGroup {
                    group: group.clone(),
                    declared_in: COMMAND_LINE.to_string(),
                });
            }
        }

        let mut config = Value::Mapping(Mapping::new());
        let mut trace = Vec::new();
        apply_node(root, &mut config, &mut trace);

        for ov in &plan.values {
            apply_value_override(&mut config, ov)?;
        }

        tracing::debug!(fragments = trace.len(), passes, "composition finished");
        Ok(Composition { config, trace })
    }

    /// Split command-line overrides into group selections and value edits.
    fn plan(&self, overrides: &[Override]) -> Result<Plan, ComposeError> {
        let mut plan = Plan::default();
        for ov in overrides {
            let group_name = ov.key.split('@').next().unwrap_or(&ov.key);
            let names_group = ov.may_name_group() && self.source.is_group(group_name);
            if !names_group {
                plan.values.push(ov.clone());
                continue;
            }
            let selection = ov.selection().ok_or_else(|| ComposeError::InvalidOverride {
                text: ov.text.clone(),
                reason: format!("'{}' is a group; expected an option name or null", group_name),
            })?;
            let group = crate::utils::normalize_group(group_name);
            match ov.kind {
                OverrideKind::Set | OverrideKind::Delete => {
                    plan.selections.insert(
                        group,
                        Choice { selection, declared_in: COMMAND_LINE.to_string() },
                    );
                }
                OverrideKind::Add | OverrideKind::ForceAdd => {
                    let package = ov.key.split_once('@').map(|(_, p)| p.to_string());
                    plan.appended.push(Appended { group, package, selection });
                }
            }
        }
        Ok(plan)
    }

    fn expand_primary(
        &self,
        id: &FragmentId,
        expansion: &mut Expansion<'_>,
    ) -> Result<Node, ComposeError> {
        match self.expand(id, None, None, 0, COMMAND_LINE, false, expansion)? {
            Some(node) => Ok(node),
            None => Err(expansion.deferred.pop().unwrap_or_else(|| {
                ComposeError::FragmentNotFound {
                    id: id.to_string(),
                    requested_by: COMMAND_LINE.to_string(),
                    searched: self.source.describe(),
                }
            })),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn expand(
        &self,
        id: &FragmentId,
        entry_package: Option<String>,
        selected_by: Option<String>,
        depth: usize,
        requested_by: &str,
        optional: bool,
        expansion: &mut Expansion<'_>,
    ) -> Result<Option<Node>, ComposeError> {
        if expansion.stack.contains(id) {
            let mut chain: Vec<String> = expansion.stack.iter().map(|f| f.to_string()).collect();
            chain.push(id.to_string());
            expansion.deferred.push(ComposeError::CyclicDefaults { chain: chain.join(" -> ") });
            return Ok(None);
        }

        let fragment = match self.source.load(id) {
            Ok(Some(fragment)) => fragment,
            Ok(None) => {
                if optional {
                    tracing::debug!(fragment = %id, "optional fragment not found, skipping");
                } else {
                    expansion.deferred.push(ComposeError::FragmentNotFound {
                        id: id.to_string(),
                        requested_by: requested_by.to_string(),
                        searched: self.source.describe(),
                    });
                }
                return Ok(None);
            }
            Err(err) => {
                expansion.deferred.push(err.into());
                return Ok(None);
            }
        };

        let entries = match fragment.defaults.as_ref().map(parse_defaults).transpose() {
            Ok(entries) => entries.unwrap_or_default(),
            Err(source) => {
                expansion
                    .deferred
                    .push(ComposeError::InvalidDefaults { id: id.to_string(), source });
                return Ok(None);
            }
        };
        let package = entry_package
            .unwrap_or_else(|| resolve_header_package(fragment.package.as_deref(), &id.group));
        let declared_in = id.to_string();

        expansion.stack.push(id.clone());
        let mut steps = Vec::new();
        let mut has_self = false;

        for entry in entries {
            match entry {
                DefaultsEntry::SelfMarker => {
                    steps.push(Step::SelfBody);
                    has_self = true;
                }
                DefaultsEntry::Override { group, selection } => {
                    expansion.seq += 1;
                    expansion.declared.push(Declared {
                        group: join_group(&id.group, &group),
                        selection,
                        declared_in: declared_in.clone(),
                        depth,
                        seq: expansion.seq,
                    });
                }
                DefaultsEntry::Config { path } => {
                    let child = FragmentId::relative_to(&id.group, &path);
                    if let Some(node) =
                        self.expand(&child, None, None, depth + 1, &declared_in, false, expansion)?
                    {
                        steps.push(Step::Child(node));
                    }
                }
                DefaultsEntry::Group { group, package: entry_pkg, selection, optional } => {
                    let request = GroupRequest {
                        parent: id,
                        parent_package: &package,
                        group: join_group(&id.group, &group),
                        package: entry_pkg,
                        selection,
                        optional,
                        depth,
                    };
                    if let Some(node) = self.expand_group(request, expansion)? {
                        steps.push(Step::Child(node));
                    }
                }
            }
        }

        if depth == 0 {
            let appended: &[Appended] = expansion.appended;
            for appended in appended.iter().cloned() {
                let request = GroupRequest {
                    parent: id,
                    parent_package: &package,
                    group: appended.group,
                    package: appended.package,
                    selection: appended.selection,
                    optional: false,
                    depth,
                };
                if let Some(node) = self.expand_group(request, expansion)? {
                    steps.push(Step::Child(node));
                }
            }
        }

        if !has_self {
            steps.push(Step::SelfBody);
        }
        expansion.stack.pop();

        Ok(Some(Node {
            id: id.clone(),
            package,
            origin: fragment.origin,
            selected_by,
            body: fragment.body,
            steps,
        }))
    }

    fn expand_group(
        &self,
        request: GroupRequest<'_>,
        expansion: &mut Expansion<'_>,
    ) -> Result<Option<Node>, ComposeError> {
        let parent_name = request.parent.to_string();
        expansion.selected_groups.entry(request.group.clone()).or_insert_with(|| parent_name.clone());

        let (selection, selected_by) = match expansion.choices.get(&request.group) {
            Some(choice) => (choice.selection.clone(), Some(choice.declared_in.clone())),
            None => (request.selection, None),
        };

        match selection {
            Selection::Null => {
                tracing::debug!(group = %request.group, "group deselected");
                Ok(None)
            }
            Selection::Mandatory => {
                expansion.deferred.push(ComposeError::MissingSelection {
                    group: request.group,
                    declared_in: parent_name,
                });
                Ok(None)
            }
            Selection::Option(name) => {
                let child = FragmentId::new(&request.group, &name);
                let package =
                    request.package.map(|p| resolve_entry_package(&p, request.parent_package));
                self.expand(
                    &child,
                    package,
                    selected_by,
                    request.depth + 1,
                    &parent_name,
                    request.optional,
                    expansion,
                )
            }
        }
    }
}

/// Pick the winning selection per group.
///
/// Command line beats everything; otherwise the shallowest declaration wins
/// and, at equal depth, the later one.
fn settle(cli: &BTreeMap<String, Choice>, declared: &[Declared]) -> BTreeMap<String, Choice> {
    let mut best: BTreeMap<String, &Declared> = BTreeMap::new();
    for d in declared {
        let replace = match best.get(&d.group) {
            None => true,
            Some(current) => d.depth < current.depth || (d.depth == current.depth && d.seq > current.seq),
        };
        if replace {
            best.insert(d.group.clone(), d);
        }
    }
    let mut out: BTreeMap<String, Choice> = best
        .into_iter()
        .map(|(group, d)| {
            (group, Choice { selection: d.selection.clone(), declared_in: d.declared_in.clone() })
        })
        .collect();
    for (group, choice) in cli {
        out.insert(group.clone(), choice.clone());
    }
    out
}

fn apply_node(node: Node, config: &mut Value, trace: &mut Vec<TraceEntry>) {
    let Node { id, package, origin, selected_by, body, steps } = node;
    let mut body = Some(body);
    for step in steps {
        match step {
            Step::Child(child) => apply_node(child, config, trace),
            Step::SelfBody => {
                if let Some(body) = body.take() {
                    tracing::debug!(fragment = %id, package = %package, "merging fragment");
                    deep_merge(config, nest_at(&package, Value::Mapping(body)));
                    trace.push(TraceEntry {
                        fragment: id.clone(),
                        package: package.clone(),
                        origin: origin.clone(),
                        selected_by: selected_by.clone(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::overrides::parse_overrides;
    use crate::source::MemorySource;
    use crate::utils::get_path;
    use similar_asserts::assert_eq;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).expect("yaml")
    }

    fn base_source() -> MemorySource {
        MemorySource::new()
            .with(
                "config",
                "defaults:\n  - _self_\n  - algo: default\n  - env: default\n  - buffer: default\n  - exp: null\nseed: 42\n",
            )
            .with("algo/default", "name: ???\ntotal_steps: 1000\n")
            .with("algo/dreamer_v3", "name: dreamer_v3\nreplay_ratio: 1\ndense_units: 1024\n")
            .with("algo/dreamer_v3_S", "name: dreamer_v3\nreplay_ratio: 1\ndense_units: 512\n")
            .with("algo/sac", "name: sac\nper_rank_batch_size: 256\noptimizer:\n  lr: 0.0003\n")
            .with("env/default", "id: ???\nnum_envs: 4\nwrapper:\n  domain_name: cheetah\n")
            .with("env/gym", "id: CartPole-v1\nwrapper:\n  id: CartPole-v1\n")
            .with(
                "env/dmc",
                "defaults:\n  - default\n  - _self_\nid: walker_walk\nwrapper:\n  domain_name: cartpole\n  from_pixels: true\n",
            )
            .with("buffer/default", "memmap: True\n")
            .with(
                "exp/dreamer_v3",
                "# @package _global_\ndefaults:\n  - override /algo: dreamer_v3\n  - override /env: gym\n  - _self_\nenv:\n  wrapper:\n    domain_name: hopper\n",
            )
            .with(
                "exp/walker",
                "# @package _global_\ndefaults:\n  - dreamer_v3\n  - override /algo: dreamer_v3_S\n  - override /env: dmc\n  - _self_\nenv:\n  wrapper:\n    domain_name: walker\nbuffer:\n  size: 10_000\n  checkpoint: True\n",
            )
    }

    fn compose(source: &MemorySource, overrides: &[&str]) -> Result<Composition, ComposeError> {
        let overrides = parse_overrides(overrides)?;
        Composer::new(source).compose("config", &overrides)
    }

    #[test]
    fn test_experiment_overrides_replace_group_selections() {
        let source = base_source();
        let out = compose(&source, &["exp=walker"]).expect("compose");

        assert_eq!(
            out.config["algo"],
            yaml("name: dreamer_v3\nreplay_ratio: 1\ndense_units: 512\n")
        );
        assert_eq!(out.config["env"]["wrapper"]["domain_name"], Value::from("walker"));
        assert_eq!(out.config["env"]["wrapper"]["from_pixels"], Value::Bool(true));
        assert_eq!(out.config["env"]["id"], Value::from("walker_walk"));
        assert_eq!(out.config["seed"], Value::from(42));
    }

    #[test]
    fn test_self_keys_deep_merge_over_base_buffer() {
        let source = base_source();
        let out = compose(&source, &["exp=walker"]).expect("compose");
        assert_eq!(out.config["buffer"], yaml("memmap: true\nsize: 10000\ncheckpoint: true\n"));
    }

    #[test]
    fn test_override_to_sac_then_self_keys() {
        let source = base_source().with(
            "exp/sac_walker",
            "# @package _global_\ndefaults:\n  - walker\n  - override /algo: sac\n  - _self_\nalgo:\n  optimizer:\n    eps: 1e-8\n",
        );
        let out = compose(&source, &["exp=sac_walker"]).expect("compose");
        assert_eq!(
            out.config["algo"],
            yaml("name: sac\nper_rank_batch_size: 256\noptimizer:\n  lr: 0.0003\n  eps: 1.0e-8\n")
        );
    }

    #[test]
    fn test_unknown_override_group_is_an_error() {
        let source = base_source().with(
            "exp/broken",
            "# @package _global_\ndefaults:\n  - override /nonexistent_group: x\n  - _self_\n",
        );
        let err = compose(&source, &["exp=broken"]).unwrap_err();
        match err {
            ComposeError::UnknownOverrideGroup { group, declared_in } => {
                assert_eq!(group, "nonexistent_group");
                assert_eq!(declared_in, "exp/broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_command_line_selection_beats_declared_override() {
        let source = base_source();
        let out = compose(&source, &["exp=walker", "algo=sac"]).expect("compose");
        assert_eq!(out.config["algo"]["name"], Value::from("sac"));
        let algo = out.trace.iter().find(|t| t.fragment.group == "algo").expect("algo applied");
        assert_eq!(algo.selected_by.as_deref(), Some("command line"));
    }

    #[test]
    fn test_trace_records_application_order() {
        let source = base_source();
        let out = compose(&source, &["exp=walker"]).expect("compose");
        let order: Vec<String> = out.trace.iter().map(|t| t.fragment.to_string()).collect();
        assert_eq!(
            order,
            vec![
                "config",
                "algo/dreamer_v3_S",
                "env/default",
                "env/dmc",
                "buffer/default",
                "exp/dreamer_v3",
                "exp/walker",
            ]
        );
        let env_default = &out.trace[2];
        assert_eq!(env_default.package, "env");
        assert_eq!(out.trace[6].package, "");
    }

    #[test]
    fn test_mandatory_selection_must_be_supplied() {
        let source = base_source().with(
            "config",
            "defaults:\n  - algo: default\n  - env: default\n  - exp: ???\n",
        );
        let err = compose(&source, &[]).unwrap_err();
        assert!(matches!(err, ComposeError::MissingSelection { ref group, .. } if group == "exp"));

        let out = compose(&source, &["exp=dreamer_v3"]).expect("compose");
        assert_eq!(out.config["algo"]["name"], Value::from("dreamer_v3"));
    }

    #[test]
    fn test_missing_fragment_is_an_error() {
        let source = base_source();
        let err = compose(&source, &["algo=ppo"]).unwrap_err();
        assert!(err.to_string().contains("could not find fragment 'algo/ppo'"));
    }

    #[test]
    fn test_optional_missing_fragment_is_skipped() {
        let source = base_source().with(
            "config",
            "defaults:\n  - optional algo: local\n  - buffer: default\n",
        );
        let out = compose(&source, &[]).expect("compose");
        assert!(out.config.get("algo").is_none());
        assert_eq!(out.config["buffer"]["memmap"], Value::Bool(true));
    }

    #[test]
    fn test_cyclic_defaults_are_fatal() {
        let source = MemorySource::new()
            .with("config", "defaults:\n  - algo: a\n")
            .with("algo/a", "defaults:\n  - b\nx: 1\n")
            .with("algo/b", "defaults:\n  - a\ny: 2\n");
        let err = compose(&source, &[]).unwrap_err();
        match err {
            ComposeError::CyclicDefaults { chain } => {
                assert_eq!(chain, "config -> algo/a -> algo/b -> algo/a")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fragments_replaced_by_overrides_are_not_reported() {
        let source = MemorySource::new()
            .with("config", "defaults:\n  - algo: default\n  - env: default\n  - buffer: default\n  - exp: x\n")
            .with("algo/default", "defaults:\n  - default\n")
            .with("algo/sac", "name: sac\n")
            .with("env/default", "id: [unclosed\n")
            .with("env/gym", "id: CartPole-v1\n")
            .with("buffer/default", "defaults:\n  - {a: 1, b: 2}\n")
            .with("buffer/small", "size: 100\n")
            .with(
                "exp/x",
                "# @package _global_\ndefaults:\n  - override /algo: sac\n  - override /env: gym\n  - override /buffer: small\n",
            );
        let out = compose(&source, &[]).expect("compose");
        assert_eq!(out.config["algo"]["name"], Value::from("sac"));
        assert_eq!(out.config["env"]["id"], Value::from("CartPole-v1"));
        assert_eq!(out.config["buffer"]["size"], Value::from(100));

        let err = compose(&source, &["algo=default"]).unwrap_err();
        assert!(matches!(err, ComposeError::CyclicDefaults { ref chain } if chain == "config -> algo/default -> algo/default"));
        let err = compose(&source, &["env=default"]).unwrap_err();
        assert!(matches!(err, ComposeError::Source(_)));
        let err = compose(&source, &["buffer=default"]).unwrap_err();
        assert!(matches!(err, ComposeError::InvalidDefaults { ref id, .. } if id == "buffer/default"));
    }

    #[test]
    fn test_later_override_wins_at_equal_depth() {
        let source = MemorySource::new()
            .with("config", "defaults:\n  - algo: default\n  - exp: first\n  - tweak: last\n")
            .with("algo/default", "name: default\n")
            .with("algo/sac", "name: sac\n")
            .with("algo/ppo", "name: ppo\n")
            .with("exp/first", "defaults:\n  - override /algo: sac\n")
            .with("exp/twice", "defaults:\n  - override /algo: ppo\n  - override /algo: sac\n")
            .with("tweak/last", "defaults:\n  - override /algo: ppo\n")
            .with("tweak/none", "{}\n");

        let out = compose(&source, &[]).expect("compose");
        assert_eq!(out.config["algo"]["name"], Value::from("ppo"));
        let algo = out.trace.iter().find(|t| t.fragment.group == "algo").expect("algo applied");
        assert_eq!(algo.selected_by.as_deref(), Some("tweak/last"));

        let out = compose(&source, &["exp=twice", "tweak=none"]).expect("compose");
        assert_eq!(out.config["algo"]["name"], Value::from("sac"));
    }

    #[test]
    fn test_overrides_that_never_settle_are_an_error() {
        let source = MemorySource::new()
            .with("config", "defaults:\n  - algo: a\n")
            .with("algo/a", "defaults:\n  - override /algo: b\n")
            .with("algo/b", "defaults:\n  - override /algo: a\n");
        let err = compose(&source, &[]).unwrap_err();
        assert!(matches!(err, ComposeError::Unsettled { passes: DEFAULT_MAX_PASSES }));

        let out = compose(&source, &["algo=b"]).expect("command line pins the group");
        let algo = out.trace.iter().find(|t| t.fragment.group == "algo").expect("algo applied");
        assert_eq!(algo.fragment.name, "b");
    }

    #[test]
    fn test_self_position_controls_precedence() {
        let self_first = MemorySource::new()
            .with("config", "defaults:\n  - _self_\n  - algo: sac\nalgo:\n  name: mine\n")
            .with("algo/sac", "name: sac\n");
        let out = compose(&self_first, &[]).expect("compose");
        assert_eq!(out.config["algo"]["name"], Value::from("sac"));

        let self_implicit = MemorySource::new()
            .with("config", "defaults:\n  - algo: sac\nalgo:\n  name: mine\n")
            .with("algo/sac", "name: sac\n");
        let out = compose(&self_implicit, &[]).expect("compose");
        assert_eq!(out.config["algo"]["name"], Value::from("mine"));
    }

    #[test]
    fn test_package_headers_and_entry_packages() {
        let source = MemorySource::new()
            .with(
                "config",
                "defaults:\n  - env: dmc\n  - env@eval_env: dmc\n  - fabric: gpu\n",
            )
            .with("env/dmc", "id: walker_walk\n")
            .with("fabric/gpu", "# @package _global_.fabric.accelerator_cfg\nname: cuda\n");
        let out = compose(&source, &[]).expect("compose");
        assert_eq!(get_path(&out.config, "env.id"), Some(&Value::from("walker_walk")));
        assert_eq!(get_path(&out.config, "eval_env.id"), Some(&Value::from("walker_walk")));
        assert_eq!(
            get_path(&out.config, "fabric.accelerator_cfg.name"),
            Some(&Value::from("cuda"))
        );
    }

    #[test]
    fn test_null_selection_and_command_line_deselect() {
        let source = base_source();
        let out = compose(&source, &["~buffer"]).expect("compose");
        assert!(out.config.get("buffer").is_none());
    }

    #[test]
    fn test_append_group_from_command_line() {
        let source = base_source().with(
            "config",
            "defaults:\n  - algo: default\n",
        );
        let err = compose(&source, &["env=dmc"]).unwrap_err();
        assert!(matches!(err, ComposeError::UnknownOverrideGroup { .. }));

        let out = compose(&source, &["+env=gym"]).expect("compose");
        assert_eq!(out.config["env"]["id"], Value::from("CartPole-v1"));
    }

    #[test]
    fn test_value_overrides_apply_after_merge() {
        let source = base_source();
        let out = compose(
            &source,
            &["exp=walker", "buffer.size=500", "+algo.learning_starts=1024", "~env.wrapper.from_pixels"],
        )
        .expect("compose");
        assert_eq!(out.config["buffer"]["size"], Value::from(500));
        assert_eq!(out.config["algo"]["learning_starts"], Value::from(1024));
        assert!(get_path(&out.config, "env.wrapper.from_pixels").is_none());

        let err = compose(&source, &["buffer.nope=1"]).unwrap_err();
        assert!(matches!(err, ComposeError::OverrideFailed { .. }));
    }

    #[test]
    fn test_group_override_needs_option_name() {
        let source = base_source();
        let err = compose(&source, &["algo=[a,b]"]).unwrap_err();
        assert!(matches!(err, ComposeError::InvalidOverride { .. }));
    }

    #[test]
    fn test_invalid_defaults_entry_names_fragment() {
        let source = base_source().with("algo/default", "defaults:\n  - {a: 1, b: 2}\n");
        let err = compose(&source, &[]).unwrap_err();
        assert!(err.to_string().contains("invalid defaults list in 'algo/default'"));
    }
}
