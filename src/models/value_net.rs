//! Two-hidden-layer value network with an outcome-class head.
//!
//! ```text
//! x ──W1,b1──► SiLU ──W2,b2──► SiLU ──W3,b3──► softmax(4) ──· [+1, +2, -1, -2] ──► value
//! ```
//!
//! The four classes are win, mars win, loss, mars loss from the perspective
//! the features were encoded in. The value is the expected score, so it is
//! always a convex combination of the class scores and lies in `[-2, 2]`.
//!
//! All parameters live in one flat `Vec<f32>` laid out as
//! `W1 | b1 | W2 | b2 | W3 | b3`, row-major.

use std::fs;
use std::path::Path;

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::models::{Architecture, CheckpointError};
use crate::td::evaluator::Evaluator;

/// Number of outcome classes.
pub const NUM_OUTCOMES: usize = 4;

/// Score of each outcome class.
pub const OUTCOME_SCORES: [f32; NUM_OUTCOMES] = [1.0, 2.0, -1.0, -2.0];

const MAGIC: &[u8; 4] = b"NTDV";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 24;

/// Largest layer width accepted from a checkpoint header.
const MAX_LAYER: usize = 1 << 16;

/// Multilayer perceptron value function.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueNet {
    input: usize,
    hidden1: usize,
    hidden2: usize,
    params: Vec<f32>,
}

/// Offsets of each block inside the flat parameter vector.
#[derive(Debug, Clone, Copy)]
struct Layout {
    w1: usize,
    b1: usize,
    w2: usize,
    b2: usize,
    w3: usize,
    b3: usize,
    total: usize,
}

impl Layout {
    fn new(input: usize, h1: usize, h2: usize) -> Self {
        let w1 = 0;
        let b1 = w1 + h1 * input;
        let w2 = b1 + h1;
        let b2 = w2 + h2 * h1;
        let w3 = b2 + h2;
        let b3 = w3 + NUM_OUTCOMES * h2;
        let total = b3 + NUM_OUTCOMES;
        Self { w1, b1, w2, b2, w3, b3, total }
    }

    /// Layout for sizes read from an untrusted header, or `None` on overflow.
    fn checked(input: usize, h1: usize, h2: usize) -> Option<Self> {
        let b1 = h1.checked_mul(input)?;
        let w2 = b1.checked_add(h1)?;
        let b2 = w2.checked_add(h2.checked_mul(h1)?)?;
        let w3 = b2.checked_add(h2)?;
        let b3 = w3.checked_add(NUM_OUTCOMES.checked_mul(h2)?)?;
        let total = b3.checked_add(NUM_OUTCOMES)?;
        total.checked_mul(4)?;
        Some(Self { w1: 0, b1, w2, b2, w3, b3, total })
    }
}

/// Intermediate activations kept for backprop.
struct Activations {
    z1: Vec<f32>,
    a1: Vec<f32>,
    m1: Vec<f32>,
    z2: Vec<f32>,
    a2: Vec<f32>,
    m2: Vec<f32>,
    probs: [f32; NUM_OUTCOMES],
    value: f32,
}

fn sigmoid(z: f32) -> f32 {
    1.0 / (1.0 + (-z).exp())
}

fn silu(z: f32) -> f32 {
    z * sigmoid(z)
}

fn silu_grad(z: f32) -> f32 {
    let s = sigmoid(z);
    s * (1.0 + z * (1.0 - s))
}

impl ValueNet {
    /// Fresh network with uniform `±1/sqrt(fan_in)` initialisation.
    pub fn new(architecture: Architecture, input: usize, seed: u64) -> Self {
        let (hidden1, hidden2) = architecture.hidden_sizes();
        let layout = Layout::new(input, hidden1, hidden2);
        let mut params = vec![0.0f32; layout.total];
        let mut rng = StdRng::seed_from_u64(seed);

        let blocks = [
            (layout.w1, layout.b1, input),
            (layout.b1, layout.w2, input),
            (layout.w2, layout.b2, hidden1),
            (layout.b2, layout.w3, hidden1),
            (layout.w3, layout.b3, hidden2),
            (layout.b3, layout.total, hidden2),
        ];
        for (start, end, fan_in) in blocks {
            let bound = 1.0 / (fan_in.max(1) as f32).sqrt();
            let dist = Uniform::new_inclusive(-bound, bound);
            for p in &mut params[start..end] {
                *p = dist.sample(&mut rng);
            }
        }

        Self {
            input,
            hidden1,
            hidden2,
            params,
        }
    }

    /// Input feature length.
    pub fn input_len(&self) -> usize {
        self.input
    }

    /// Hidden layer sizes.
    pub fn hidden_sizes(&self) -> (usize, usize) {
        (self.hidden1, self.hidden2)
    }

    fn layout(&self) -> Layout {
        Layout::new(self.input, self.hidden1, self.hidden2)
    }

    /// Outcome-class probabilities for a position.
    pub fn outcome_probabilities(&self, features: &[f32]) -> [f32; NUM_OUTCOMES] {
        self.forward(features).probs
    }

    fn forward(&self, x: &[f32]) -> Activations {
        self.forward_scaled(x, vec![1.0; self.hidden1], vec![1.0; self.hidden2])
    }

    /// Forward pass with per-unit scales on the hidden activations: 0 for a
    /// dropped unit, `1 / (1 - rate)` for a kept one.
    fn forward_scaled(&self, x: &[f32], m1: Vec<f32>, m2: Vec<f32>) -> Activations {
        debug_assert_eq!(x.len(), self.input, "feature length mismatch");
        let l = self.layout();
        let p = &self.params;

        let mut z1 = vec![0f32; self.hidden1];
        let mut a1 = vec![0f32; self.hidden1];
        for i in 0..self.hidden1 {
            let row = &p[l.w1 + i * self.input..l.w1 + (i + 1) * self.input];
            let sum: f32 = row.iter().zip(x).map(|(w, v)| w * v).sum();
            z1[i] = sum + p[l.b1 + i];
            a1[i] = silu(z1[i]) * m1[i];
        }

        let mut z2 = vec![0f32; self.hidden2];
        let mut a2 = vec![0f32; self.hidden2];
        for j in 0..self.hidden2 {
            let row = &p[l.w2 + j * self.hidden1..l.w2 + (j + 1) * self.hidden1];
            let sum: f32 = row.iter().zip(&a1).map(|(w, v)| w * v).sum();
            z2[j] = sum + p[l.b2 + j];
            a2[j] = silu(z2[j]) * m2[j];
        }

        let mut logits = [0f32; NUM_OUTCOMES];
        for (k, logit) in logits.iter_mut().enumerate() {
            let row = &p[l.w3 + k * self.hidden2..l.w3 + (k + 1) * self.hidden2];
            let sum: f32 = row.iter().zip(&a2).map(|(w, v)| w * v).sum();
            *logit = sum + p[l.b3 + k];
        }

        // stable softmax
        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mut probs = [0f32; NUM_OUTCOMES];
        let mut denom = 0.0f32;
        for k in 0..NUM_OUTCOMES {
            probs[k] = (logits[k] - max).exp();
            denom += probs[k];
        }
        for prob in probs.iter_mut() {
            *prob /= denom;
        }

        let value = probs.iter().zip(OUTCOME_SCORES.iter()).map(|(p, s)| p * s).sum();

        Activations {
            z1,
            a1,
            m1,
            z2,
            a2,
            m2,
            probs,
            value,
        }
    }

    /// Save parameters as a binary blob.
    ///
    /// Format: magic `NTDV`, u32 version, u32 input, u32 hidden1,
    /// u32 hidden2, u32 outputs, then all parameters as little-endian f32.
    /// The file is written next to `path` and renamed into place so a failed
    /// write never clobbers the previous checkpoint.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CheckpointError> {
        let path = path.as_ref();
        let mut out = Vec::with_capacity(HEADER_LEN + self.params.len() * 4);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        for dim in [self.input, self.hidden1, self.hidden2, NUM_OUTCOMES] {
            out.extend_from_slice(&(dim as u32).to_le_bytes());
        }
        for &x in &self.params {
            out.extend_from_slice(&x.to_le_bytes());
        }

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &out).map_err(|e| CheckpointError::Io(format!("write {:?}: {e}", tmp)))?;
        fs::rename(&tmp, path).map_err(|e| CheckpointError::Io(format!("rename {:?}: {e}", path)))
    }

    /// Load a network from a binary blob.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError> {
        let path = path.as_ref();
        let buf = fs::read(path).map_err(|e| CheckpointError::Io(format!("read {:?}: {e}", path)))?;
        Self::from_bytes(&buf)
    }

    /// Parse a network from blob bytes.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, CheckpointError> {
        if buf.len() < HEADER_LEN {
            return Err(CheckpointError::Truncated);
        }
        if &buf[0..4] != MAGIC {
            return Err(CheckpointError::BadMagic);
        }
        let version = u32_le(&buf[4..8]);
        if version != VERSION {
            return Err(CheckpointError::UnsupportedVersion(version));
        }
        let input = u32_le(&buf[8..12]) as usize;
        let hidden1 = u32_le(&buf[12..16]) as usize;
        let hidden2 = u32_le(&buf[16..20]) as usize;
        let outputs = u32_le(&buf[20..24]) as usize;
        if outputs != NUM_OUTCOMES {
            return Err(CheckpointError::ShapeMismatch(format!(
                "{} outputs, expected {}",
                outputs, NUM_OUTCOMES
            )));
        }

        for (name, size) in [("input", input), ("hidden1", hidden1), ("hidden2", hidden2)] {
            if size == 0 || size > MAX_LAYER {
                return Err(CheckpointError::ShapeMismatch(format!(
                    "{} size {} must be in 1..={}",
                    name, size, MAX_LAYER
                )));
            }
        }
        let layout = Layout::checked(input, hidden1, hidden2).ok_or_else(|| {
            CheckpointError::ShapeMismatch(format!(
                "layer sizes ({}, {}, {}) overflow",
                input, hidden1, hidden2
            ))
        })?;
        let body = &buf[HEADER_LEN..];
        if body.len() != layout.total * 4 {
            return Err(CheckpointError::Truncated);
        }
        let params = body
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(Self {
            input,
            hidden1,
            hidden2,
            params,
        })
    }

    /// Load `path` if it exists and is non-empty, otherwise build a fresh
    /// network. A stored network of a different shape is an error.
    pub fn load_or_init<P: AsRef<Path>>(
        path: P,
        architecture: Architecture,
        input: usize,
        seed: u64,
    ) -> Result<Self, CheckpointError> {
        let path = path.as_ref();
        let fresh = match fs::metadata(path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };
        if fresh {
            return Ok(Self::new(architecture, input, seed));
        }

        let net = Self::load(path)?;
        let expected = (input, architecture.hidden_sizes());
        let found = (net.input, net.hidden_sizes());
        if expected != found {
            return Err(CheckpointError::ShapeMismatch(format!(
                "checkpoint has shape {:?}, expected {:?}",
                found, expected
            )));
        }
        Ok(net)
    }

    /// Load `path` with whatever hidden sizes it was saved with, or build a
    /// fresh `fallback` network when the file is missing or empty. Only the
    /// input length has to match.
    pub fn open<P: AsRef<Path>>(
        path: P,
        fallback: Architecture,
        input: usize,
        seed: u64,
    ) -> Result<Self, CheckpointError> {
        let path = path.as_ref();
        let fresh = match fs::metadata(path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };
        if fresh {
            return Ok(Self::new(fallback, input, seed));
        }

        let net = Self::load(path)?;
        if net.input != input {
            return Err(CheckpointError::ShapeMismatch(format!(
                "checkpoint takes {} inputs, expected {}",
                net.input, input
            )));
        }
        Ok(net)
    }

    /// Per-unit dropout scales for one hidden layer.
    fn dropout_scales(width: usize, rate: f32, rng: &mut dyn RngCore) -> Vec<f32> {
        let keep = 1.0 / (1.0 - rate);
        (0..width)
            .map(|_| if rng.gen::<f32>() < rate { 0.0 } else { keep })
            .collect()
    }

    fn backward(&self, features: &[f32], act: &Activations, grad: &mut [f32]) -> f32 {
        debug_assert_eq!(grad.len(), self.params.len());
        let l = self.layout();
        let p = &self.params;

        // d value / d logit_k = p_k (s_k - value)
        let mut dz3 = [0f32; NUM_OUTCOMES];
        for k in 0..NUM_OUTCOMES {
            dz3[k] = act.probs[k] * (OUTCOME_SCORES[k] - act.value);
        }

        let mut da2 = vec![0f32; self.hidden2];
        for k in 0..NUM_OUTCOMES {
            let row = l.w3 + k * self.hidden2;
            for j in 0..self.hidden2 {
                grad[row + j] = dz3[k] * act.a2[j];
                da2[j] += p[row + j] * dz3[k];
            }
            grad[l.b3 + k] = dz3[k];
        }

        let mut da1 = vec![0f32; self.hidden1];
        for j in 0..self.hidden2 {
            let dz2 = da2[j] * act.m2[j] * silu_grad(act.z2[j]);
            let row = l.w2 + j * self.hidden1;
            for i in 0..self.hidden1 {
                grad[row + i] = dz2 * act.a1[i];
                da1[i] += p[row + i] * dz2;
            }
            grad[l.b2 + j] = dz2;
        }

        for i in 0..self.hidden1 {
            let dz1 = da1[i] * act.m1[i] * silu_grad(act.z1[i]);
            let row = l.w1 + i * self.input;
            for (m, &x) in features.iter().enumerate() {
                grad[row + m] = dz1 * x;
            }
            grad[l.b1 + i] = dz1;
        }

        act.value
    }
}

fn u32_le(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

impl Evaluator for ValueNet {
    fn num_params(&self) -> usize {
        self.params.len()
    }

    fn evaluate(&self, features: &[f32]) -> f32 {
        self.forward(features).value
    }

    fn evaluate_with_grad(&self, features: &[f32], grad: &mut [f32]) -> f32 {
        let act = self.forward(features);
        self.backward(features, &act, grad)
    }

    fn evaluate_with_grad_dropout(
        &self,
        features: &[f32],
        grad: &mut [f32],
        dropout: f32,
        rng: &mut dyn RngCore,
    ) -> f32 {
        if dropout <= 0.0 {
            return self.evaluate_with_grad(features, grad);
        }
        let m1 = Self::dropout_scales(self.hidden1, dropout, rng);
        let m2 = Self::dropout_scales(self.hidden2, dropout, rng);
        let act = self.forward_scaled(features, m1, m2);
        self.backward(features, &act, grad)
    }

    fn params(&self) -> &[f32] {
        &self.params
    }

    fn params_mut(&mut self) -> &mut [f32] {
        &mut self.params
    }

    fn checkpoint(&self, path: &Path) -> Result<(), CheckpointError> {
        self.save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn small_net() -> ValueNet {
        ValueNet::new(Architecture::Custom { hidden1: 8, hidden2: 5 }, 6, 11)
    }

    fn sample_features(seed: u64) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..6).map(|_| rng.gen_range(0.0..1.0)).collect()
    }

    #[test]
    fn test_values_stay_within_score_range() {
        let mut net = small_net();
        // Blow up the output layer to push probabilities to the extremes.
        let n = net.params.len();
        for p in &mut net.params_mut()[n - 24..] {
            *p *= 50.0;
        }
        for seed in 0..20 {
            let v = net.evaluate(&sample_features(seed));
            assert!((-2.0..=2.0).contains(&v), "value {} out of range", v);
            let probs = net.outcome_probabilities(&sample_features(seed));
            let total: f32 = probs.iter().sum();
            assert!((total - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let net = small_net();
        let x = sample_features(3);
        let mut grad = vec![0.0; net.num_params()];
        let value = net.evaluate_with_grad(&x, &mut grad);
        assert!((value - net.evaluate(&x)).abs() < 1e-6);

        let h = 1e-2f32;
        for idx in (0..net.num_params()).step_by(7) {
            let mut plus = net.clone();
            plus.params_mut()[idx] += h;
            let mut minus = net.clone();
            minus.params_mut()[idx] -= h;
            let numeric = (plus.evaluate(&x) - minus.evaluate(&x)) / (2.0 * h);
            let analytic = grad[idx];
            assert!(
                (numeric - analytic).abs() < 2e-3 + 0.05 * analytic.abs(),
                "param {}: numeric {} vs analytic {}",
                idx,
                numeric,
                analytic
            );
        }
    }

    #[test]
    fn test_same_seed_same_network() {
        assert_eq!(small_net(), small_net());
        let other = ValueNet::new(Architecture::Custom { hidden1: 8, hidden2: 5 }, 6, 12);
        assert_ne!(small_net().params(), other.params());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = std::env::temp_dir().join(format!("nardi_td_net_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("net.bin");

        let net = small_net();
        net.save(&path).unwrap();
        let loaded = ValueNet::load(&path).unwrap();
        assert_eq!(net, loaded);

        let arch = Architecture::Custom { hidden1: 8, hidden2: 5 };
        let again = ValueNet::load_or_init(&path, arch, 6, 99).unwrap();
        assert_eq!(net, again);

        let wrong = ValueNet::load_or_init(&path, Architecture::Compact, 6, 99);
        assert!(matches!(wrong, Err(CheckpointError::ShapeMismatch(_))));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_or_empty_file_gives_fresh_network() {
        let dir = std::env::temp_dir().join(format!("nardi_td_fresh_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let arch = Architecture::Custom { hidden1: 8, hidden2: 5 };

        let missing = ValueNet::load_or_init(dir.join("absent.bin"), arch, 6, 11).unwrap();
        assert_eq!(missing, small_net());

        let empty = dir.join("empty.bin");
        fs::write(&empty, b"").unwrap();
        let from_empty = ValueNet::load_or_init(&empty, arch, 6, 11).unwrap();
        assert_eq!(from_empty, small_net());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_blobs_are_rejected() {
        assert!(matches!(ValueNet::from_bytes(b"NTDV"), Err(CheckpointError::Truncated)));
        let mut bytes = vec![0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(b"XXXX");
        assert!(matches!(ValueNet::from_bytes(&bytes), Err(CheckpointError::BadMagic)));
    }

    fn header(input: u32, hidden1: u32, hidden2: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        for v in [VERSION, input, hidden1, hidden2, NUM_OUTCOMES as u32] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_oversized_header_is_an_error_not_a_panic() {
        let huge = ValueNet::from_bytes(&header(u32::MAX, u32::MAX, u32::MAX));
        assert!(matches!(huge, Err(CheckpointError::ShapeMismatch(_))));

        let zero = ValueNet::from_bytes(&header(6, 0, 5));
        assert!(matches!(zero, Err(CheckpointError::ShapeMismatch(_))));

        // Plausible sizes but no body.
        let short = ValueNet::from_bytes(&header(6, 8, 5));
        assert!(matches!(short, Err(CheckpointError::Truncated)));
    }

    #[test]
    fn test_open_keeps_stored_hidden_sizes() {
        let dir = std::env::temp_dir().join(format!("nardi_td_open_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("wide.bin");
        let wide = ValueNet::new(Architecture::Wide, 6, 3);
        wide.save(&path).unwrap();

        let opened = ValueNet::open(&path, Architecture::Compact, 6, 0).unwrap();
        assert_eq!(opened.hidden_sizes(), Architecture::Wide.hidden_sizes());
        assert_eq!(opened, wide);

        let wrong_input = ValueNet::open(&path, Architecture::Compact, 7, 0);
        assert!(matches!(wrong_input, Err(CheckpointError::ShapeMismatch(_))));

        let fresh = ValueNet::open(dir.join("absent.bin"), Architecture::Compact, 6, 0).unwrap();
        assert_eq!(fresh.hidden_sizes(), Architecture::Compact.hidden_sizes());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_dropout_gradient() {
        let net = small_net();
        let x = sample_features(5);
        let mut plain = vec![0f32; net.num_params()];
        let mut dropped = vec![0f32; net.num_params()];

        // Zero rate is the plain gradient and draws nothing.
        let mut rng = StdRng::seed_from_u64(1);
        let v0 = net.evaluate_with_grad(&x, &mut plain);
        let v1 = net.evaluate_with_grad_dropout(&x, &mut dropped, 0.0, &mut rng);
        assert_eq!(v0, v1);
        assert_eq!(plain, dropped);
        assert_eq!(rng.gen::<u64>(), StdRng::seed_from_u64(1).gen::<u64>());

        // Same seed, same mask.
        let mut again = vec![0f32; net.num_params()];
        let a = net.evaluate_with_grad_dropout(&x, &mut dropped, 0.5, &mut StdRng::seed_from_u64(9));
        let b = net.evaluate_with_grad_dropout(&x, &mut again, 0.5, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
        assert_eq!(dropped, again);
        assert!((-2.0..=2.0).contains(&a));

        // Dropout never touches plain evaluation.
        assert_eq!(net.evaluate(&x), v0);
    }

    #[test]
    fn test_masked_gradient_matches_finite_differences() {
        let net = small_net();
        let x = sample_features(8);
        let m1: Vec<f32> = (0..8).map(|i| if i % 3 == 0 { 0.0 } else { 1.5 }).collect();
        let m2: Vec<f32> = (0..5).map(|j| if j == 2 { 0.0 } else { 1.5 }).collect();
        let masked = |n: &ValueNet| n.forward_scaled(&x, m1.clone(), m2.clone()).value;

        let mut grad = vec![0.0; net.num_params()];
        let act = net.forward_scaled(&x, m1.clone(), m2.clone());
        net.backward(&x, &act, &mut grad);

        let h = 1e-2f32;
        for idx in (0..net.num_params()).step_by(5) {
            let mut plus = net.clone();
            plus.params_mut()[idx] += h;
            let mut minus = net.clone();
            minus.params_mut()[idx] -= h;
            let numeric = (masked(&plus) - masked(&minus)) / (2.0 * h);
            assert!(
                (numeric - grad[idx]).abs() < 2e-3 + 0.05 * grad[idx].abs(),
                "param {}: numeric {} vs analytic {}",
                idx,
                numeric,
                grad[idx]
            );
        }

        // Weights into a dropped first-layer unit get no gradient.
        let l = net.layout();
        assert!(grad[l.w1..l.w1 + net.input].iter().all(|&g| g == 0.0));
    }
}
