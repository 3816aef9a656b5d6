//! Explicit table from `_target_` identifiers to constructors

use std::collections::BTreeMap;

use super::components::{self as c, ArgError, Component, Kwargs};

pub type Constructor = fn(&mut Kwargs<'_>) -> Result<Component, ArgError>;

#[derive(Clone)]
pub struct TargetRegistry {
    constructors: BTreeMap<String, Constructor>,
}

const BUILTINS: &[(&str, Constructor)] = &[
    ("torchmetrics.MeanMetric", c::mean_metric),
    ("torchmetrics.SumMetric", c::sum_metric),
    ("torchmetrics.MaxMetric", c::max_metric),
    ("torchmetrics.MinMetric", c::min_metric),
    ("torchmetrics.CatMetric", c::cat_metric),
    ("sheeprl.utils.metric.MetricAggregator", c::metric_aggregator),
    ("lightning.fabric.Fabric", c::fabric),
    ("lightning.fabric.strategies.DDPStrategy", c::ddp_strategy),
    ("lightning.fabric.strategies.SingleDeviceStrategy", c::single_device_strategy),
    ("lightning.fabric.plugins.environments.LightningEnvironment", c::lightning_environment),
    ("lightning.fabric.plugins.environments.SLURMEnvironment", c::slurm_environment),
    ("lightning.fabric.plugins.environments.TorchElasticEnvironment", c::torch_elastic_environment),
    ("lightning.fabric.plugins.precision.MixedPrecision", c::mixed_precision),
    ("sheeprl.utils.callback.CheckpointCallback", c::checkpoint_callback),
    ("torch.optim.Adam", c::adam),
    ("torch.optim.AdamW", c::adamw),
    ("sheeprl.envs.dmc.DMCWrapper", c::dmc_wrapper),
    ("sheeprl.envs.minerl.MineRLWrapper", c::minerl_wrapper),
    ("gymnasium.make", c::gym_make),
];

impl Default for TargetRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for (name, constructor) in BUILTINS {
            registry.register(name, *constructor);
        }
        registry
    }
}

impl TargetRegistry {
    pub fn empty() -> Self {
        Self { constructors: BTreeMap::new() }
    }

    /// Register or replace a constructor.
    pub fn register(&mut self, target: &str, constructor: Constructor) {
        self.constructors.insert(target.to_string(), constructor);
    }

    pub fn get(&self, target: &str) -> Option<Constructor> {
        self.constructors.get(target).copied()
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}
