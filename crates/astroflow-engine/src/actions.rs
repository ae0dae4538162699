use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use astroflow_core::error::Result;

use crate::environment::VariableEnvironment;
use crate::graph::{Node, NodeKind};

/// Full-scale ADU of a 16-bit camera.
const MAX_ADU: f64 = 65535.0;
/// Focuser travel range in steps.
const FOCUSER_RANGE: f64 = 1000.0;
/// Upper bound of a simulated half-flux diameter, in pixels.
const MAX_HFD: f64 = 10.0;

/// Side effect applied when a node is visited.
///
/// Called exactly once per visit, before the engine decides the node's
/// successor. Implementations for real hardware talk to the device here and
/// publish readings into the environment. An error stops the run.
pub trait NodeAction: Send + Sync + 'static {
    fn execute(&self, node: &Node, env: &mut VariableEnvironment) -> Result<()>;
}

/// Built-in device simulation.
///
/// SmartExposure binds `exposureTime` and `currentADU`; Focus binds
/// `focusPosition` and `hfdValue`. Every other kind is a no-op.
pub struct SimulatedActions {
    rng: Mutex<StdRng>,
}

impl SimulatedActions {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible readings for tests and demos.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn sample(&self, scale: f64) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen::<f64>() * scale
    }
}

impl Default for SimulatedActions {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeAction for SimulatedActions {
    fn execute(&self, node: &Node, env: &mut VariableEnvironment) -> Result<()> {
        match &node.kind {
            NodeKind::SmartExposure {
                exposure_config, ..
            } => {
                let exposure_time = exposure_config
                    .as_ref()
                    .map(|c| c.exposure_time)
                    .filter(|t| *t != 0.0 && !t.is_nan())
                    .unwrap_or(1.0);
                env.set_f64("exposureTime", exposure_time);
                env.set_f64("currentADU", self.sample(MAX_ADU));
            }
            NodeKind::Focus { .. } => {
                env.set_f64("focusPosition", self.sample(FOCUSER_RANGE));
                env.set_f64("hfdValue", self.sample(MAX_HFD));
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ExposureConfig, Params};

    fn exposure(time: Option<f64>) -> Node {
        Node::new(
            "exp",
            NodeKind::SmartExposure {
                exposure_config: time.map(|t| ExposureConfig {
                    exposure_time: t,
                    gain: None,
                    binning: None,
                    frame: None,
                    is_auto_exposure: false,
                }),
                params: Params::default(),
            },
        )
    }

    #[test]
    fn test_smart_exposure_binds_readings() {
        let actions = SimulatedActions::seeded(7);
        let mut env = VariableEnvironment::new();
        actions.execute(&exposure(Some(30.0)), &mut env).unwrap();

        assert_eq!(env.get_f64("exposureTime"), Some(30.0));
        let adu = env.get_f64("currentADU").unwrap();
        assert!((0.0..MAX_ADU).contains(&adu));
    }

    #[test]
    fn test_smart_exposure_default_time() {
        let actions = SimulatedActions::seeded(7);
        let mut env = VariableEnvironment::new();

        actions.execute(&exposure(None), &mut env).unwrap();
        assert_eq!(env.get_f64("exposureTime"), Some(1.0));

        actions.execute(&exposure(Some(0.0)), &mut env).unwrap();
        assert_eq!(env.get_f64("exposureTime"), Some(1.0));
    }

    #[test]
    fn test_focus_binds_readings() {
        let actions = SimulatedActions::seeded(1);
        let node = Node::new(
            "f",
            NodeKind::Focus {
                focus_method: Default::default(),
                step_size: Some(50.0),
                params: Params::default(),
            },
        );
        let mut env = VariableEnvironment::new();
        actions.execute(&node, &mut env).unwrap();

        let position = env.get_f64("focusPosition").unwrap();
        let hfd = env.get_f64("hfdValue").unwrap();
        assert!((0.0..FOCUSER_RANGE).contains(&position));
        assert!((0.0..MAX_HFD).contains(&hfd));
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let mut a = VariableEnvironment::new();
        let mut b = VariableEnvironment::new();
        SimulatedActions::seeded(99).execute(&exposure(None), &mut a).unwrap();
        SimulatedActions::seeded(99).execute(&exposure(None), &mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_other_kinds_are_noops() {
        let actions = SimulatedActions::new();
        let mut env = VariableEnvironment::new();
        for node in [Node::start("s"), Node::task("t"), Node::end("e")] {
            actions.execute(&node, &mut env).unwrap();
        }
        assert!(env.is_empty());
    }
}
