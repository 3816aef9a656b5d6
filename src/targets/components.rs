//! Typed components built from `_target_` mappings

use std::collections::BTreeSet;

use serde_yaml::{Mapping, Value};

use crate::source::parse::kind_of;

pub const TARGET_KEY: &str = "_target_";

/// Why a constructor rejected its keyword arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgError {
    Unexpected(String),
    Missing(String),
    WrongType { arg: String, expected: &'static str, found: &'static str },
    Invalid { arg: String, reason: String },
}

/// Keyword arguments of one `_target_` mapping.
///
/// Every accessor marks the key as consumed; [`Kwargs::finish`] rejects
/// whatever the constructor did not ask for.
pub struct Kwargs<'a> {
    map: &'a Mapping,
    seen: BTreeSet<String>,
}

impl<'a> Kwargs<'a> {
    pub fn new(map: &'a Mapping) -> Self {
        let mut seen = BTreeSet::new();
        seen.insert(TARGET_KEY.to_string());
        // Instantiation flags are accepted on every target.
        seen.insert("_partial_".to_string());
        seen.insert("_recursive_".to_string());
        seen.insert("_convert_".to_string());
        Self { map, seen }
    }

    fn take(&mut self, arg: &str) -> Option<&'a Value> {
        self.seen.insert(arg.to_string());
        match self.map.get(arg) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    fn wrong(arg: &str, expected: &'static str, found: &Value) -> ArgError {
        ArgError::WrongType { arg: arg.to_string(), expected, found: kind_of(found) }
    }

    /// Accept arguments that are passed through without checks.
    pub fn accept(&mut self, args: &[&str]) {
        self.seen.extend(args.iter().map(|a| a.to_string()));
    }

    pub fn raw(&mut self, arg: &str) -> Option<Value> {
        self.take(arg).cloned()
    }

    pub fn string(&mut self, arg: &str) -> Result<Option<String>, ArgError> {
        match self.take(arg) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(Self::wrong(arg, "a string", other)),
        }
    }

    pub fn required_string(&mut self, arg: &str) -> Result<String, ArgError> {
        self.string(arg)?.ok_or_else(|| ArgError::Missing(arg.to_string()))
    }

    pub fn boolean(&mut self, arg: &str) -> Result<Option<bool>, ArgError> {
        match self.take(arg) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(Self::wrong(arg, "a boolean", other)),
        }
    }

    pub fn unsigned(&mut self, arg: &str) -> Result<Option<u64>, ArgError> {
        match self.take(arg) {
            None => Ok(None),
            Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| ArgError::Invalid {
                arg: arg.to_string(),
                reason: format!("expected a non-negative integer, found {n}"),
            }),
            Some(other) => Err(Self::wrong(arg, "an integer", other)),
        }
    }

    pub fn float(&mut self, arg: &str) -> Result<Option<f64>, ArgError> {
        match self.take(arg) {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(other) => Err(Self::wrong(arg, "a number", other)),
        }
    }

    pub fn float_pair(&mut self, arg: &str) -> Result<Option<(f64, f64)>, ArgError> {
        let Some(value) = self.take(arg) else {
            return Ok(None);
        };
        let pair = value
            .as_sequence()
            .filter(|seq| seq.len() == 2)
            .and_then(|seq| Some((seq[0].as_f64()?, seq[1].as_f64()?)));
        pair.map(Some).ok_or_else(|| Self::wrong(arg, "a pair of numbers", value))
    }

    pub fn mapping(&mut self, arg: &str) -> Result<Option<&'a Mapping>, ArgError> {
        match self.take(arg) {
            None => Ok(None),
            Some(Value::Mapping(map)) => Ok(Some(map)),
            Some(other) => Err(Self::wrong(arg, "a mapping", other)),
        }
    }

    pub fn list(&mut self, arg: &str) -> Result<&'a [Value], ArgError> {
        match self.take(arg) {
            None => Ok(&[]),
            Some(Value::Sequence(seq)) => Ok(seq.as_slice()),
            Some(other) => Err(Self::wrong(arg, "a list", other)),
        }
    }

    /// Keyword arguments the constructor never asked for.
    pub fn finish(self) -> Result<(), ArgError> {
        let extra = self
            .map
            .keys()
            .filter_map(Value::as_str)
            .find(|key| !self.seen.contains(*key));
        match extra {
            Some(key) => Err(ArgError::Unexpected(key.to_string())),
            None => Ok(()),
        }
    }
}

/// Target named by a nested `_target_` mapping, or a plain string.
fn nested_target(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Mapping(map) => map.get(TARGET_KEY).and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn nested_targets(arg: &str, values: &[Value]) -> Result<Vec<String>, ArgError> {
    values
        .iter()
        .map(|v| {
            nested_target(v).ok_or_else(|| ArgError::Invalid {
                arg: arg.to_string(),
                reason: format!("expected a component, found {}", kind_of(v)),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Mean,
    Sum,
    Max,
    Min,
    Cat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NanStrategy {
    Error,
    Warn,
    Ignore,
    Disable,
    Value(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub kind: MetricKind,
    pub sync_on_compute: bool,
    pub nan_strategy: NanStrategy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregator {
    pub metrics: Vec<String>,
    pub raise_on_missing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fabric {
    pub accelerator: String,
    pub devices: Value,
    pub num_nodes: u64,
    pub precision: Option<String>,
    pub strategy: String,
    pub callbacks: Vec<String>,
    pub plugins: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    Ddp { find_unused_parameters: bool },
    SingleDevice { device: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Plugin {
    LightningEnvironment,
    SlurmEnvironment { auto_requeue: bool },
    TorchElasticEnvironment,
    MixedPrecision { precision: String, device: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointCallback {
    pub keep_last: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    Adam,
    AdamW,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Optimizer {
    pub kind: OptimizerKind,
    pub lr: f64,
    pub eps: f64,
    pub weight_decay: f64,
    pub betas: (f64, f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnvWrapper {
    Dmc { domain_name: String, task_name: String, from_pixels: bool, from_vectors: bool },
    MineRl { id: String, height: u64, width: u64, multihot_inventory: bool },
    Gym { id: String, render_mode: Option<String> },
}

/// A constructed component.
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Metric(Metric),
    Aggregator(Aggregator),
    Fabric(Box<Fabric>),
    Strategy(Strategy),
    Plugin(Plugin),
    Callback(CheckpointCallback),
    Optimizer(Optimizer),
    EnvWrapper(EnvWrapper),
}

impl Component {
    pub fn kind(&self) -> &'static str {
        match self {
            Component::Metric(_) => "metric",
            Component::Aggregator(_) => "aggregator",
            Component::Fabric(_) => "fabric",
            Component::Strategy(_) => "strategy",
            Component::Plugin(_) => "plugin",
            Component::Callback(_) => "callback",
            Component::Optimizer(_) => "optimizer",
            Component::EnvWrapper(_) => "env",
        }
    }

    /// One-line description for reports.
    pub fn summary(&self) -> String {
        match self {
            Component::Metric(m) => format!("{:?} (sync_on_compute={})", m.kind, m.sync_on_compute),
            Component::Aggregator(a) => format!("{} metrics", a.metrics.len()),
            Component::Fabric(f) => format!(
                "{} x{} {}",
                f.accelerator,
                render_scalar(&f.devices),
                f.precision.as_deref().unwrap_or("32-true")
            ),
            Component::Strategy(Strategy::Ddp { .. }) => "ddp".to_string(),
            Component::Strategy(Strategy::SingleDevice { device }) => format!("single device {device}"),
            Component::Plugin(p) => format!("{p:?}"),
            Component::Callback(c) => match c.keep_last {
                Some(n) => format!("checkpoint, keep last {n}"),
                None => "checkpoint".to_string(),
            },
            Component::Optimizer(o) => format!("{:?} lr={}", o.kind, o.lr),
            Component::EnvWrapper(EnvWrapper::Dmc { domain_name, task_name, .. }) => {
                format!("dmc {domain_name}/{task_name}")
            }
            Component::EnvWrapper(EnvWrapper::MineRl { id, .. }) => format!("minerl {id}"),
            Component::EnvWrapper(EnvWrapper::Gym { id, .. }) => format!("gym {id}"),
        }
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Sequence(items) => {
            format!("[{}]", items.iter().map(render_scalar).collect::<Vec<_>>().join(", "))
        }
        other => kind_of(other).to_string(),
    }
}

fn metric(kind: MetricKind, kw: &mut Kwargs<'_>) -> Result<Component, ArgError> {
    let sync_on_compute = kw.boolean("sync_on_compute")?.unwrap_or(true);
    let nan_strategy = match kw.raw("nan_strategy") {
        None => NanStrategy::Warn,
        Some(Value::String(s)) => match s.as_str() {
            "error" => NanStrategy::Error,
            "warn" => NanStrategy::Warn,
            "ignore" => NanStrategy::Ignore,
            "disable" => NanStrategy::Disable,
            other => {
                return Err(ArgError::Invalid {
                    arg: "nan_strategy".to_string(),
                    reason: format!("unknown strategy '{other}'"),
                })
            }
        },
        Some(Value::Number(n)) => NanStrategy::Value(n.to_string()),
        Some(other) => return Err(Kwargs::wrong("nan_strategy", "a string or number", &other)),
    };
    Ok(Component::Metric(Metric { kind, sync_on_compute, nan_strategy }))
}

pub fn mean_metric(kw: &mut Kwargs<'_>) -> Result<Component, ArgError> {
    metric(MetricKind::Mean, kw)
}

pub fn sum_metric(kw: &mut Kwargs<'_>) -> Result<Component, ArgError> {
    metric(MetricKind::Sum, kw)
}

pub fn max_metric(kw: &mut Kwargs<'_>) -> Result<Component, ArgError> {
    metric(MetricKind::Max, kw)
}

pub fn min_metric(kw: &mut Kwargs<'_>) -> Result<Component, ArgError> {
    metric(MetricKind::Min, kw)
}

pub fn cat_metric(kw: &mut Kwargs<'_>) -> Result<Component, ArgError> {
    metric(MetricKind::Cat, kw)
}

pub fn metric_aggregator(kw: &mut Kwargs<'_>) -> Result<Component, ArgError> {
    let metrics = match kw.mapping("metrics")? {
        Some(map) => map.keys().filter_map(Value::as_str).map(str::to_string).collect(),
        None => Vec::new(),
    };
    let raise_on_missing = kw.boolean("raise_on_missing")?.unwrap_or(false);
    Ok(Component::Aggregator(Aggregator { metrics, raise_on_missing }))
}

pub fn fabric(kw: &mut Kwargs<'_>) -> Result<Component, ArgError> {
    let accelerator = kw.string("accelerator")?.unwrap_or_else(|| "auto".to_string());
    let devices = match kw.raw("devices") {
        None => Value::from(1),
        Some(v @ (Value::Number(_) | Value::String(_))) => v,
        Some(Value::Sequence(ids)) if !ids.is_empty() && ids.iter().all(|i| i.as_u64().is_some()) => {
            Value::Sequence(ids)
        }
        Some(other) => {
            return Err(Kwargs::wrong("devices", "an integer, string or list of device indices", &other))
        }
    };
    let num_nodes = kw.unsigned("num_nodes")?.unwrap_or(1);
    let precision = match kw.raw("precision") {
        None => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(other) => return Err(Kwargs::wrong("precision", "a string or integer", &other)),
    };
    let strategy = match kw.raw("strategy") {
        None => "auto".to_string(),
        Some(value) => nested_target(&value)
            .ok_or_else(|| Kwargs::wrong("strategy", "a string or component", &value))?,
    };
    let callbacks = nested_targets("callbacks", kw.list("callbacks")?)?;
    let plugins = nested_targets("plugins", kw.list("plugins")?)?;
    Ok(Component::Fabric(Box::new(Fabric {
        accelerator,
        devices,
        num_nodes,
        precision,
        strategy,
        callbacks,
        plugins,
    })))
}

pub fn ddp_strategy(kw: &mut Kwargs<'_>) -> Result<Component, ArgError> {
    let find_unused_parameters = kw.boolean("find_unused_parameters")?.unwrap_or(false);
    Ok(Component::Strategy(Strategy::Ddp { find_unused_parameters }))
}

pub fn single_device_strategy(kw: &mut Kwargs<'_>) -> Result<Component, ArgError> {
    let device = kw.string("device")?.unwrap_or_else(|| "cpu".to_string());
    Ok(Component::Strategy(Strategy::SingleDevice { device }))
}

pub fn lightning_environment(_kw: &mut Kwargs<'_>) -> Result<Component, ArgError> {
    Ok(Component::Plugin(Plugin::LightningEnvironment))
}

pub fn slurm_environment(kw: &mut Kwargs<'_>) -> Result<Component, ArgError> {
    let auto_requeue = kw.boolean("auto_requeue")?.unwrap_or(true);
    Ok(Component::Plugin(Plugin::SlurmEnvironment { auto_requeue }))
}

pub fn torch_elastic_environment(_kw: &mut Kwargs<'_>) -> Result<Component, ArgError> {
    Ok(Component::Plugin(Plugin::TorchElasticEnvironment))
}

pub fn mixed_precision(kw: &mut Kwargs<'_>) -> Result<Component, ArgError> {
    let precision = kw.required_string("precision")?;
    if precision != "16-mixed" && precision != "bf16-mixed" {
        return Err(ArgError::Invalid {
            arg: "precision".to_string(),
            reason: format!("expected '16-mixed' or 'bf16-mixed', found '{precision}'"),
        });
    }
    let device = kw.required_string("device")?;
    kw.accept(&["scaler"]);
    Ok(Component::Plugin(Plugin::MixedPrecision { precision, device }))
}

pub fn checkpoint_callback(kw: &mut Kwargs<'_>) -> Result<Component, ArgError> {
    let keep_last = kw.unsigned("keep_last")?;
    Ok(Component::Callback(CheckpointCallback { keep_last }))
}

fn optimizer(kind: OptimizerKind, kw: &mut Kwargs<'_>) -> Result<Component, ArgError> {
    let lr = kw.float("lr")?.unwrap_or(1e-3);
    if lr <= 0.0 {
        return Err(ArgError::Invalid {
            arg: "lr".to_string(),
            reason: format!("must be positive, found {lr}"),
        });
    }
    let eps = kw.float("eps")?.unwrap_or(1e-8);
    let default_decay = match kind {
        OptimizerKind::Adam => 0.0,
        OptimizerKind::AdamW => 1e-2,
    };
    let weight_decay = kw.float("weight_decay")?.unwrap_or(default_decay);
    let betas = kw.float_pair("betas")?.unwrap_or((0.9, 0.999));
    kw.accept(&["amsgrad", "foreach", "fused"]);
    Ok(Component::Optimizer(Optimizer { kind, lr, eps, weight_decay, betas }))
}

pub fn adam(kw: &mut Kwargs<'_>) -> Result<Component, ArgError> {
    optimizer(OptimizerKind::Adam, kw)
}

pub fn adamw(kw: &mut Kwargs<'_>) -> Result<Component, ArgError> {
    optimizer(OptimizerKind::AdamW, kw)
}

pub fn dmc_wrapper(kw: &mut Kwargs<'_>) -> Result<Component, ArgError> {
    let domain_name = kw.required_string("domain_name")?;
    let task_name = kw.required_string("task_name")?;
    let from_pixels = kw.boolean("from_pixels")?.unwrap_or(false);
    let from_vectors = kw.boolean("from_vectors")?.unwrap_or(true);
    if !from_pixels && !from_vectors {
        return Err(ArgError::Invalid {
            arg: "from_pixels".to_string(),
            reason: "at least one of from_pixels and from_vectors must be true".to_string(),
        });
    }
    kw.accept(&["width", "height", "seed", "channels_first", "visualize_reward", "camera_id"]);
    Ok(Component::EnvWrapper(EnvWrapper::Dmc { domain_name, task_name, from_pixels, from_vectors }))
}

pub fn minerl_wrapper(kw: &mut Kwargs<'_>) -> Result<Component, ArgError> {
    let id = kw.required_string("id")?;
    let height = kw.unsigned("height")?.unwrap_or(64);
    let width = kw.unsigned("width")?.unwrap_or(64);
    let multihot_inventory = kw.boolean("multihot_inventory")?.unwrap_or(true);
    kw.accept(&["pitch_limits", "seed", "sticky_attack", "sticky_jump", "break_speed_multiplier", "dense"]);
    Ok(Component::EnvWrapper(EnvWrapper::MineRl { id, height, width, multihot_inventory }))
}

pub fn gym_make(kw: &mut Kwargs<'_>) -> Result<Component, ArgError> {
    let id = kw.required_string("id")?;
    let render_mode = kw.string("render_mode")?;
    kw.accept(&["max_episode_steps"]);
    Ok(Component::EnvWrapper(EnvWrapper::Gym { id, render_mode }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(text: &str) -> Mapping {
        serde_yaml::from_str(text).expect("yaml")
    }

    #[test]
    fn test_kwargs_reports_unexpected_keys() {
        let m = map("_target_: x\nsync_on_compute: false\nbogus: 1\n");
        let mut kw = Kwargs::new(&m);
        assert_eq!(kw.boolean("sync_on_compute"), Ok(Some(false)));
        assert_eq!(kw.finish(), Err(ArgError::Unexpected("bogus".into())));
    }

    #[test]
    fn test_kwargs_type_errors_name_the_argument() {
        let m = map("lr: fast\n");
        let mut kw = Kwargs::new(&m);
        assert_eq!(
            kw.float("lr"),
            Err(ArgError::WrongType { arg: "lr".into(), expected: "a number", found: "a string" })
        );
    }

    #[test]
    fn test_null_argument_counts_as_absent() {
        let m = map("keep_last: null\n");
        let mut kw = Kwargs::new(&m);
        let built = checkpoint_callback(&mut kw).expect("build");
        kw.finish().expect("finish");
        assert_eq!(built, Component::Callback(CheckpointCallback { keep_last: None }));
    }

    #[test]
    fn test_fabric_collects_nested_targets() {
        let m = map(
            "accelerator: gpu\ndevices: 2\nprecision: bf16-mixed\nstrategy: ddp\n\
             callbacks:\n  - _target_: sheeprl.utils.callback.CheckpointCallback\n\
             plugins:\n  - _target_: lightning.fabric.plugins.environments.SLURMEnvironment\n",
        );
        let mut kw = Kwargs::new(&m);
        let Component::Fabric(f) = fabric(&mut kw).expect("fabric") else {
            panic!("expected fabric");
        };
        assert_eq!(f.strategy, "ddp");
        assert_eq!(f.callbacks, vec!["sheeprl.utils.callback.CheckpointCallback".to_string()]);
        assert_eq!(f.plugins.len(), 1);
        assert_eq!(f.precision.as_deref(), Some("bf16-mixed"));
    }

    #[test]
    fn test_fabric_devices_forms() {
        for (text, shown) in [("-1", "-1"), ("[0, 1]", "[0, 1]"), ("auto", "auto")] {
            let m = map(&format!("accelerator: gpu\ndevices: {text}\n"));
            let built = fabric(&mut Kwargs::new(&m)).expect("fabric");
            assert_eq!(built.summary(), format!("gpu x{shown} 32-true"));
        }
        let m = map("devices: [cuda]\n");
        let err = fabric(&mut Kwargs::new(&m)).unwrap_err();
        assert!(matches!(err, ArgError::WrongType { ref arg, .. } if arg == "devices"));
    }

    #[test]
    fn test_mixed_precision_requires_known_mode() {
        let m = map("precision: 8-mixed\ndevice: cuda\n");
        let err = mixed_precision(&mut Kwargs::new(&m)).unwrap_err();
        assert!(matches!(err, ArgError::Invalid { ref arg, .. } if arg == "precision"));
        let m = map("device: cuda\n");
        assert_eq!(mixed_precision(&mut Kwargs::new(&m)), Err(ArgError::Missing("precision".into())));
    }

    #[test]
    fn test_dmc_wrapper_needs_some_observation() {
        let m = map("domain_name: walker\ntask_name: walk\nfrom_pixels: false\nfrom_vectors: false\n");
        assert!(dmc_wrapper(&mut Kwargs::new(&m)).is_err());
        let m = map("domain_name: walker\ntask_name: walk\nfrom_pixels: true\n");
        let built = dmc_wrapper(&mut Kwargs::new(&m)).expect("dmc");
        assert_eq!(built.summary(), "dmc walker/walk");
    }
}
