use burn::module::Param;
use burn::nn::{Initializer, Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::{activation, Tensor};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::warn;

/// Maps an observation to one action per muscle.
pub trait PolicyController: Send {
    fn decide(&mut self, observation: &[f32]) -> Vec<f32>;
}

/// Independent uniform actions in `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    action_size: usize,
    rng: ChaCha8Rng,
}

impl RandomPolicy {
    pub fn new(action_size: usize, seed: u64) -> Self {
        Self {
            action_size,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl PolicyController for RandomPolicy {
    fn decide(&mut self, _observation: &[f32]) -> Vec<f32> {
        (0..self.action_size)
            .map(|_| self.rng.gen_range(-1.0..=1.0))
            .collect()
    }
}

/// Two-layer perceptron: observation -> hidden (ReLU) -> action (tanh).
///
/// The tensor backend and device are chosen by the caller; nothing in the
/// simulation depends on them.
#[derive(Debug)]
pub struct MlpPolicy<B: Backend> {
    input_hidden: Linear<B>,
    hidden_output: Linear<B>,
    device: B::Device,
    observation_size: usize,
    action_size: usize,
}

impl<B: Backend> MlpPolicy<B> {
    /// Xavier-uniform initialised network. `sparsity` is the probability
    /// that any single weight starts at zero.
    pub fn new(
        observation_size: usize,
        hidden_size: usize,
        action_size: usize,
        gain: f64,
        sparsity: f32,
        device: &B::Device,
    ) -> Self {
        let mut input_hidden = LinearConfig::new(observation_size, hidden_size)
            .with_initializer(Initializer::XavierUniform { gain })
            .init(device);
        let mut hidden_output = LinearConfig::new(hidden_size, action_size)
            .with_initializer(Initializer::XavierUniform { gain })
            .init(device);

        if sparsity > 0.0 {
            let mask = Self::random_mask([observation_size, hidden_size], sparsity, device);
            input_hidden.weight = Param::from_tensor(input_hidden.weight.val() * mask);
            let mask = Self::random_mask([hidden_size, action_size], sparsity, device);
            hidden_output.weight = Param::from_tensor(hidden_output.weight.val() * mask);
        }

        Self {
            input_hidden,
            hidden_output,
            device: device.clone(),
            observation_size,
            action_size,
        }
    }

    /// Mask of ones and zeros, each entry zero with probability `sparsity`.
    fn random_mask(shape: [usize; 2], sparsity: f32, device: &B::Device) -> Tensor<B, 2> {
        let mut rng = rand::thread_rng();
        let data: Vec<f32> = (0..shape[0] * shape[1])
            .map(|_| if rng.gen::<f32>() < sparsity { 0.0 } else { 1.0 })
            .collect();
        Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape(shape)
    }

    pub fn observation_size(&self) -> usize {
        self.observation_size
    }

    pub fn action_size(&self) -> usize {
        self.action_size
    }

    /// Total number of weights and biases.
    pub fn parameter_count(&self) -> usize {
        let hidden = self.input_hidden.weight.val().dims()[1];
        self.observation_size * hidden + hidden + hidden * self.action_size + self.action_size
    }

    pub fn forward(&self, observation: &[f32]) -> Vec<f32> {
        if observation.len() != self.observation_size {
            warn!(
                expected = self.observation_size,
                actual = observation.len(),
                "observation size mismatch; returning neutral actions"
            );
            return vec![0.0; self.action_size];
        }

        let input: Tensor<B, 2> = Tensor::<B, 1>::from_floats(observation, &self.device)
            .reshape([1, self.observation_size]);
        let hidden = activation::relu(self.input_hidden.forward(input));
        let output = self.hidden_output.forward(hidden).tanh();

        match output.into_data().to_vec::<f32>() {
            Ok(actions) => actions,
            Err(err) => {
                warn!(?err, "failed to read policy output; returning neutral actions");
                vec![0.0; self.action_size]
            }
        }
    }
}

impl<B: Backend> PolicyController for MlpPolicy<B> {
    fn decide(&mut self, observation: &[f32]) -> Vec<f32> {
        self.forward(observation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::{NdArray, NdArrayDevice};

    type B = NdArray;

    #[test]
    fn random_policy_stays_in_unit_range() {
        let mut policy = RandomPolicy::new(5, 3);
        for _ in 0..100 {
            let actions = policy.decide(&[]);
            assert_eq!(actions.len(), 5);
            assert!(actions.iter().all(|a| (-1.0..=1.0).contains(a)));
        }
    }

    #[test]
    fn random_policy_is_reproducible_from_seed() {
        let mut a = RandomPolicy::new(3, 11);
        let mut b = RandomPolicy::new(3, 11);
        assert_eq!(a.decide(&[]), b.decide(&[]));
    }

    #[test]
    fn mlp_outputs_bounded_actions() {
        let device = NdArrayDevice::Cpu;
        let mut policy = MlpPolicy::<B>::new(8, 16, 3, 4.0, 0.0, &device);
        let actions = policy.decide(&[0.5; 8]);
        assert_eq!(actions.len(), 3);
        for value in actions {
            assert!(value.is_finite());
            assert!((-1.0..=1.0).contains(&value));
        }
    }

    #[test]
    fn mlp_rejects_wrong_observation_size() {
        let device = NdArrayDevice::Cpu;
        let policy = MlpPolicy::<B>::new(8, 16, 3, 1.0, 0.0, &device);
        assert_eq!(policy.forward(&[0.0; 5]), vec![0.0; 3]);
    }

    #[test]
    fn mlp_parameter_count() {
        let device = NdArrayDevice::Cpu;
        let policy = MlpPolicy::<B>::new(20, 10, 4, 1.0, 0.5, &device);
        assert_eq!(policy.parameter_count(), 20 * 10 + 10 + 10 * 4 + 4);
    }
}
