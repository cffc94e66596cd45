//! First-order optimizers for policy parameters

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Updates parameters in place from a loss gradient
pub trait Optimizer: Send + Sync {
    fn name(&self) -> &str;

    fn learning_rate(&self) -> f64;

    /// One descent step
    fn step(&mut self, params: &mut Array1<f64>, grad: &Array1<f64>);

    fn get_params(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name(),
            "learning_rate": self.learning_rate(),
        })
    }
}

/// Optimizer selection as it appears in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    #[default]
    Adam,
    Sgd,
}

impl OptimizerKind {
    pub fn build(self, learning_rate: f64) -> Box<dyn Optimizer> {
        match self {
            OptimizerKind::Adam => Box::new(Adam::new(learning_rate)),
            OptimizerKind::Sgd => Box::new(Sgd::new(learning_rate)),
        }
    }
}

impl std::str::FromStr for OptimizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "adam" => Ok(OptimizerKind::Adam),
            "sgd" => Ok(OptimizerKind::Sgd),
            other => Err(format!("Unknown optimizer: {other} (expected adam or sgd)")),
        }
    }
}

impl std::fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptimizerKind::Adam => write!(f, "adam"),
            OptimizerKind::Sgd => write!(f, "sgd"),
        }
    }
}

/// Plain gradient descent
pub struct Sgd {
    learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for Sgd {
    fn name(&self) -> &str {
        "sgd"
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn step(&mut self, params: &mut Array1<f64>, grad: &Array1<f64>) {
        params.scaled_add(-self.learning_rate, grad);
    }
}

/// Adam with bias-corrected moment estimates
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    m: Option<Array1<f64>>,
    v: Option<Array1<f64>>,
    t: i32,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            m: None,
            v: None,
            t: 0,
        }
    }

    pub fn steps(&self) -> i32 {
        self.t
    }
}

impl Optimizer for Adam {
    fn name(&self) -> &str {
        "adam"
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn step(&mut self, params: &mut Array1<f64>, grad: &Array1<f64>) {
        let m = self.m.get_or_insert_with(|| Array1::zeros(grad.len()));
        let v = self.v.get_or_insert_with(|| Array1::zeros(grad.len()));
        self.t += 1;

        *m = &*m * self.beta1 + grad * (1.0 - self.beta1);
        *v = &*v * self.beta2 + grad.mapv(|g| g * g) * (1.0 - self.beta2);

        let m_hat = &*m / (1.0 - self.beta1.powi(self.t));
        let v_hat = &*v / (1.0 - self.beta2.powi(self.t));

        let update = m_hat / v_hat.mapv(|x| x.sqrt() + self.epsilon);
        params.scaled_add(-self.learning_rate, &update);
    }

    fn get_params(&self) -> serde_json::Value {
        serde_json::json!({
            "name": "adam",
            "learning_rate": self.learning_rate,
            "beta1": self.beta1,
            "beta2": self.beta2,
            "epsilon": self.epsilon,
            "steps": self.t,
        })
    }
}
