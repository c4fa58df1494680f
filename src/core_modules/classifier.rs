// THEORY:
// The two pre-trained estimators, expressed as plain data plus the arithmetic needed to
// evaluate them. Nothing here learns; the parameters come from the artifact file.
//
// - `SvmModel` is a libsvm-style one-vs-one SVC. Every class pair (i, j) with i < j has
//   its own decision function; `predict` counts pair wins. When the artifact carries
//   Platt parameters, the pairwise sigmoids are coupled into one posterior vector with
//   the Wu-Lin-Weng method (the same one libsvm uses).
// - `KnnModel` stores its training set and votes among the k nearest samples under a
//   Minkowski distance.
//
// Ties always go to the lowest class index so results never depend on iteration order.

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

/// Pairwise probabilities are kept away from 0 and 1 before coupling.
const MIN_PAIRWISE_PROBABILITY: f64 = 1e-7;

pub trait Classifier {
    /// Width of the sample the model expects.
    fn n_features(&self) -> usize;
    fn n_classes(&self) -> usize;
    fn predict(&self, sample: ArrayView1<f64>) -> usize;
    /// Posterior over classes, or `None` when the model has no probability estimate.
    fn predict_proba(&self, sample: ArrayView1<f64>) -> Option<Array1<f64>>;
    /// Internal consistency of the stored parameters.
    fn validate(&self) -> Result<(), String>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ClassifierModel {
    Svm(SvmModel),
    Knn(KnnModel),
}

impl ClassifierModel {
    fn inner(&self) -> &dyn Classifier {
        match self {
            ClassifierModel::Svm(model) => model,
            ClassifierModel::Knn(model) => model,
        }
    }
}

impl Classifier for ClassifierModel {
    fn n_features(&self) -> usize {
        self.inner().n_features()
    }

    fn n_classes(&self) -> usize {
        self.inner().n_classes()
    }

    fn predict(&self, sample: ArrayView1<f64>) -> usize {
        self.inner().predict(sample)
    }

    fn predict_proba(&self, sample: ArrayView1<f64>) -> Option<Array1<f64>> {
        self.inner().predict_proba(sample)
    }

    fn validate(&self) -> Result<(), String> {
        self.inner().validate()
    }
}

/// Index of the largest value; the first one wins a tie.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (index, &value) in values.iter().enumerate() {
        if value > values[best] {
            best = index;
        }
    }
    best
}

// --- SVM ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Kernel {
    Linear,
    Rbf { gamma: f64 },
    Poly { gamma: f64, coef0: f64, degree: u32 },
    Sigmoid { gamma: f64, coef0: f64 },
}

impl Kernel {
    pub fn evaluate(&self, a: ArrayView1<f64>, b: &[f64]) -> f64 {
        let dot = || a.iter().zip(b).map(|(x, y)| x * y).sum::<f64>();
        match *self {
            Kernel::Linear => dot(),
            Kernel::Rbf { gamma } => {
                let squared: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
                (-gamma * squared).exp()
            }
            Kernel::Poly { gamma, coef0, degree } => (gamma * dot() + coef0).powi(degree as i32),
            Kernel::Sigmoid { gamma, coef0 } => (gamma * dot() + coef0).tanh(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        let finite = match *self {
            Kernel::Linear => true,
            Kernel::Rbf { gamma } => gamma.is_finite(),
            Kernel::Poly { gamma, coef0, .. } | Kernel::Sigmoid { gamma, coef0 } => {
                gamma.is_finite() && coef0.is_finite()
            }
        };
        if finite { Ok(()) } else { Err("kernel parameters must be finite".to_string()) }
    }
}

/// Platt sigmoid parameters, one `(a, b)` per class pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlattParameters {
    pub prob_a: Vec<f64>,
    pub prob_b: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmModel {
    pub kernel: Kernel,
    /// Support vectors grouped by class, in class order.
    pub support_vectors: Vec<Vec<f64>>,
    pub n_support: Vec<usize>,
    /// `(n_classes - 1) x n_sv` dual coefficients in libsvm layout.
    pub dual_coef: Vec<Vec<f64>>,
    /// One intercept per pair, pairs ordered (0,1), (0,2), ..., (1,2), ...
    pub intercept: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<PlattParameters>,
}

impl SvmModel {
    fn pair_count(&self) -> usize {
        let classes = self.n_support.len();
        classes * classes.saturating_sub(1) / 2
    }

    fn class_starts(&self) -> Vec<usize> {
        let mut starts = Vec::with_capacity(self.n_support.len());
        let mut offset = 0;
        for &count in &self.n_support {
            starts.push(offset);
            offset += count;
        }
        starts
    }

    /// Decision values for every pair, positive favours the first class of the pair.
    pub fn decision_values(&self, sample: ArrayView1<f64>) -> Vec<f64> {
        let kernel_values: Vec<f64> = self
            .support_vectors
            .iter()
            .map(|vector| self.kernel.evaluate(sample, vector))
            .collect();
        let starts = self.class_starts();
        let classes = self.n_support.len();

        let mut decisions = Vec::with_capacity(self.pair_count());
        let mut pair = 0;
        for i in 0..classes {
            for j in (i + 1)..classes {
                let mut sum = self.intercept[pair];
                for sv in starts[i]..starts[i] + self.n_support[i] {
                    sum += self.dual_coef[j - 1][sv] * kernel_values[sv];
                }
                for sv in starts[j]..starts[j] + self.n_support[j] {
                    sum += self.dual_coef[i][sv] * kernel_values[sv];
                }
                decisions.push(sum);
                pair += 1;
            }
        }
        decisions
    }
}

impl Classifier for SvmModel {
    fn n_features(&self) -> usize {
        self.support_vectors.first().map_or(0, Vec::len)
    }

    fn n_classes(&self) -> usize {
        self.n_support.len()
    }

    fn predict(&self, sample: ArrayView1<f64>) -> usize {
        let classes = self.n_classes();
        let mut votes = vec![0usize; classes];
        let decisions = self.decision_values(sample);
        let mut pair = 0;
        for i in 0..classes {
            for j in (i + 1)..classes {
                if decisions[pair] > 0.0 {
                    votes[i] += 1;
                } else {
                    votes[j] += 1;
                }
                pair += 1;
            }
        }
        let mut best = 0;
        for (class, &count) in votes.iter().enumerate() {
            if count > votes[best] {
                best = class;
            }
        }
        best
    }

    fn predict_proba(&self, sample: ArrayView1<f64>) -> Option<Array1<f64>> {
        let platt = self.probability.as_ref()?;
        let classes = self.n_classes();
        let decisions = self.decision_values(sample);

        let mut pairwise = vec![vec![0.0f64; classes]; classes];
        let mut pair = 0;
        for i in 0..classes {
            for j in (i + 1)..classes {
                let p = platt_sigmoid(decisions[pair], platt.prob_a[pair], platt.prob_b[pair])
                    .clamp(MIN_PAIRWISE_PROBABILITY, 1.0 - MIN_PAIRWISE_PROBABILITY);
                pairwise[i][j] = p;
                pairwise[j][i] = 1.0 - p;
                pair += 1;
            }
        }
        Some(Array1::from(couple_pairwise(&pairwise)))
    }

    fn validate(&self) -> Result<(), String> {
        let classes = self.n_support.len();
        if classes < 2 {
            return Err(format!("svm needs at least two classes, found {}", classes));
        }
        let total: usize = self.n_support.iter().sum();
        if total != self.support_vectors.len() || total == 0 {
            return Err(format!(
                "n_support sums to {} but {} support vectors are stored",
                total,
                self.support_vectors.len()
            ));
        }
        let width = self.n_features();
        if width == 0 || self.support_vectors.iter().any(|vector| vector.len() != width) {
            return Err("support vectors must share one non-zero width".to_string());
        }
        if self.dual_coef.len() != classes - 1 || self.dual_coef.iter().any(|row| row.len() != total) {
            return Err(format!("dual_coef must be {} x {}", classes - 1, total));
        }
        if self.intercept.len() != self.pair_count() {
            return Err(format!("expected {} intercepts, found {}", self.pair_count(), self.intercept.len()));
        }
        if let Some(platt) = &self.probability {
            if platt.prob_a.len() != self.pair_count() || platt.prob_b.len() != self.pair_count() {
                return Err("probability parameters must have one entry per class pair".to_string());
            }
        }
        self.kernel.validate()
    }
}

/// libsvm's numerically stable `1 / (1 + exp(decision * a + b))`.
fn platt_sigmoid(decision: f64, a: f64, b: f64) -> f64 {
    let f = decision * a + b;
    if f >= 0.0 {
        (-f).exp() / (1.0 + (-f).exp())
    } else {
        1.0 / (1.0 + f.exp())
    }
}

/// Wu, Lin & Weng (2004) second method: turns pairwise estimates `r[i][j] = P(i | i or j)`
/// into a single distribution.
pub fn couple_pairwise(r: &[Vec<f64>]) -> Vec<f64> {
    let k = r.len();
    let max_iterations = 100.max(k);
    let tolerance = 0.005 / k as f64;

    let mut q = vec![vec![0.0f64; k]; k];
    for t in 0..k {
        for j in 0..k {
            if j == t {
                continue;
            }
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = -r[j][t] * r[t][j];
        }
    }

    let mut p = vec![1.0 / k as f64; k];
    let mut qp = vec![0.0f64; k];
    for _ in 0..max_iterations {
        let mut pqp = 0.0;
        for t in 0..k {
            qp[t] = (0..k).map(|j| q[t][j] * p[j]).sum();
            pqp += p[t] * qp[t];
        }
        let max_error = qp.iter().map(|value| (value - pqp).abs()).fold(0.0f64, f64::max);
        if max_error < tolerance {
            break;
        }
        for t in 0..k {
            let diff = (-qp[t] + pqp) / q[t][t];
            p[t] += diff;
            pqp = (pqp + diff * (diff * q[t][t] + 2.0 * qp[t])) / ((1.0 + diff) * (1.0 + diff));
            for j in 0..k {
                qp[j] = (qp[j] + diff * q[t][j]) / (1.0 + diff);
                p[j] /= 1.0 + diff;
            }
        }
    }
    p
}

// --- KNN ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NeighbourWeights {
    Uniform,
    Distance,
}

fn default_minkowski_power() -> f64 {
    2.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnModel {
    pub k: usize,
    pub weights: NeighbourWeights,
    #[serde(default = "default_minkowski_power")]
    pub p: f64,
    pub fit_x: Vec<Vec<f64>>,
    /// Encoded class index of every training row.
    pub fit_y: Vec<usize>,
    pub n_classes: usize,
}

impl KnnModel {
    fn distance(&self, sample: ArrayView1<f64>, row: &[f64]) -> f64 {
        let deltas = sample.iter().zip(row).map(|(a, b)| (a - b).abs());
        if self.p == 1.0 {
            deltas.sum()
        } else if self.p == 2.0 {
            deltas.map(|d| d * d).sum::<f64>().sqrt()
        } else {
            deltas.map(|d| d.powf(self.p)).sum::<f64>().powf(1.0 / self.p)
        }
    }

    /// `(distance, training index)` of the k nearest rows, nearest first.
    fn neighbours(&self, sample: ArrayView1<f64>) -> Vec<(f64, usize)> {
        let mut distances: Vec<(f64, usize)> = self
            .fit_x
            .iter()
            .enumerate()
            .map(|(index, row)| (self.distance(sample, row), index))
            .collect();
        distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        distances.truncate(self.k.min(self.fit_x.len()));
        distances
    }

    fn class_weights(&self, sample: ArrayView1<f64>) -> Vec<f64> {
        let neighbours = self.neighbours(sample);
        let exact_match = neighbours.iter().any(|(distance, _)| *distance == 0.0);

        let mut weights = vec![0.0f64; self.n_classes];
        for (distance, index) in neighbours {
            let weight = match self.weights {
                NeighbourWeights::Uniform => 1.0,
                // An exact match takes the whole vote.
                NeighbourWeights::Distance if exact_match => {
                    if distance == 0.0 { 1.0 } else { 0.0 }
                }
                NeighbourWeights::Distance => 1.0 / distance,
            };
            weights[self.fit_y[index]] += weight;
        }
        weights
    }
}

impl Classifier for KnnModel {
    fn n_features(&self) -> usize {
        self.fit_x.first().map_or(0, Vec::len)
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict(&self, sample: ArrayView1<f64>) -> usize {
        argmax(&self.class_weights(sample))
    }

    fn predict_proba(&self, sample: ArrayView1<f64>) -> Option<Array1<f64>> {
        let weights = self.class_weights(sample);
        let total: f64 = weights.iter().sum();
        let total = if total > 0.0 { total } else { 1.0 };
        Some(weights.iter().map(|w| w / total).collect())
    }

    fn validate(&self) -> Result<(), String> {
        if self.k == 0 {
            return Err("k must be at least 1".to_string());
        }
        if self.n_classes == 0 {
            return Err("n_classes must be at least 1".to_string());
        }
        if self.fit_x.is_empty() || self.fit_x.len() != self.fit_y.len() {
            return Err(format!(
                "fit_x has {} rows but fit_y has {} labels",
                self.fit_x.len(),
                self.fit_y.len()
            ));
        }
        let width = self.n_features();
        if width == 0 || self.fit_x.iter().any(|row| row.len() != width) {
            return Err("training rows must share one non-zero width".to_string());
        }
        if let Some(label) = self.fit_y.iter().find(|&&label| label >= self.n_classes) {
            return Err(format!("training label {} is out of range for {} classes", label, self.n_classes));
        }
        if !(self.p.is_finite() && self.p >= 1.0) {
            return Err(format!("minkowski power must be >= 1, found {}", self.p));
        }
        Ok(())
    }
}
