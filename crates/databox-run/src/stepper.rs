//! Explicit Runge-Kutta stepping from a Butcher tableau.

/// Coefficients of an explicit Runge-Kutta method.
#[derive(Debug, Clone, PartialEq)]
pub struct ButcherTableau {
    /// Times of the substeps as fractions of the step, excluding the initial
    /// substep at 0.
    pub substep_times: Vec<f64>,
    /// Rows of the coefficient matrix, excluding the empty first row.
    pub substep_coefficients: Vec<Vec<f64>>,
    /// Weights of each substep's derivative in the final result.
    pub result_coefficients: Vec<f64>,
}

impl ButcherTableau {
    /// The classic fourth-order method.
    pub fn classic_rk4() -> Self {
        Self {
            substep_times: vec![0.5, 0.5, 1.0],
            substep_coefficients: vec![vec![0.5], vec![0.0, 0.5], vec![0.0, 0.0, 1.0]],
            result_coefficients: vec![1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0],
        }
    }

    /// Times of every substep, starting with 0.
    pub fn stage_times(&self) -> impl Iterator<Item = f64> + '_ {
        std::iter::once(0.0).chain(self.substep_times.iter().copied())
    }

    pub fn number_of_substeps(&self) -> usize {
        self.substep_times.len() + 1
    }

    /// Advance `state` by `dt`.
    ///
    /// `derivative` is called once per substep with the substep's time
    /// fraction and the intermediate state.
    pub fn step<const N: usize, F>(
        &self,
        state: &[f64; N],
        dt: f64,
        mut derivative: F,
    ) -> anyhow::Result<[f64; N]>
    where
        F: FnMut(f64, &[f64; N]) -> anyhow::Result<[f64; N]>,
    {
        let mut stages = Vec::with_capacity(self.number_of_substeps());
        stages.push(derivative(0.0, state)?);

        for (&time, row) in self.substep_times.iter().zip(&self.substep_coefficients) {
            let mut intermediate = *state;
            for (&a, k) in row.iter().zip(&stages) {
                for (y, dy) in intermediate.iter_mut().zip(k) {
                    *y += dt * a * dy;
                }
            }
            stages.push(derivative(time, &intermediate)?);
        }

        let mut result = *state;
        for (&b, k) in self.result_coefficients.iter().zip(&stages) {
            for (y, dy) in result.iter_mut().zip(k) {
                *y += dt * b * dy;
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_times_start_at_zero() {
        let tableau = ButcherTableau::classic_rk4();
        let times: Vec<f64> = tableau.stage_times().collect();
        assert_eq!(times, [0.0, 0.5, 0.5, 1.0]);
        assert_eq!(tableau.number_of_substeps(), 4);
    }

    #[test]
    fn test_rk4_exponential_decay() {
        // dy/dt = -y, y(0) = 1
        let tableau = ButcherTableau::classic_rk4();
        let mut y = [1.0];
        for _ in 0..10 {
            y = tableau.step(&y, 0.1, |_, y| Ok([-y[0]])).unwrap();
        }
        assert!((y[0] - (-1.0_f64).exp()).abs() < 1e-6);
    }

    #[test]
    fn test_rk4_is_exact_for_cubic() {
        // dy/dt = 3t^2 through the time argument, y(t) = t^3
        let tableau = ButcherTableau::classic_rk4();
        let dt = 0.5;
        let y = tableau
            .step(&[0.0], dt, |fraction, _| {
                let t = fraction * dt;
                Ok([3.0 * t * t])
            })
            .unwrap();
        assert!((y[0] - 0.125).abs() < 1e-14);
    }
}
