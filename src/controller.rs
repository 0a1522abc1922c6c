//! Adaptive step size control.

use crate::constants::{controller, real};

/// Used for adaptive step size control
pub(crate) struct Controller {
    alpha: f64,
    beta: f64,
    facc1: f64,
    facc2: f64,
    fac_old: f64,
    h_max: f64,
    reject: bool,
    safety_factor: f64,
    posneg: f64,
}

impl Controller {
    /// Creates a controller responsible for adaptive step size control.
    ///
    /// # Arguments
    ///
    /// * `alpha`   - &#945; coefficient of the PI controller
    /// * `beta`    - &#946; coefficient of the PI controller
    /// * `fac_max` - Maximum factor between two successive steps
    /// * `fac_min` - Minimum factor between two successive steps
    /// * `h_max`   - Maximum step size
    /// * `safety_factor`   - Safety factor of the PI controller
    /// * `posneg`  - Direction of integration
    ///
    pub(crate) fn new(
        alpha: f64,
        beta: f64,
        fac_max: f64,
        fac_min: f64,
        h_max: f64,
        safety_factor: f64,
        posneg: f64,
    ) -> Controller {
        Controller {
            alpha,
            beta,
            facc1: 1.0 / fac_min,
            facc2: 1.0 / fac_max,
            fac_old: controller::FAC_OLD_INIT,
            h_max: h_max.abs(),
            reject: false,
            safety_factor,
            posneg,
        }
    }

    /// Restores a controller for an error estimate of order `order` from the
    /// real scratch buffer. An unset maximum step size means no limit.
    pub(crate) fn load(rwork: &[f64], order: u32) -> Controller {
        let (alpha, beta) = if order >= 4 {
            (1.0 / (order as f64 + 1.0) - controller::BETA * 0.75, controller::BETA)
        } else {
            (1.0 / (order as f64 + 1.0), 0.0)
        };
        let h_max = if rwork[real::HMAX] > 0.0 {
            rwork[real::HMAX]
        } else {
            f64::INFINITY
        };
        let mut c = Controller::new(
            alpha,
            beta,
            controller::FAC_MAX,
            controller::FAC_MIN,
            h_max,
            controller::SAFETY_FACTOR,
            rwork[real::POSNEG],
        );
        if rwork[real::FAC_OLD] > 0.0 {
            c.fac_old = rwork[real::FAC_OLD];
        }
        c.reject = rwork[real::REJECT] != 0.0;
        c
    }

    /// Saves the controller memory so the next call resumes from it.
    pub(crate) fn store(&self, rwork: &mut [f64]) {
        rwork[real::FAC_OLD] = self.fac_old;
        rwork[real::REJECT] = if self.reject { 1.0 } else { 0.0 };
    }

    /// Determines if the step must be accepted or rejected and adapts the step size accordingly.
    pub(crate) fn accept(&mut self, err: f64, h: f64, h_new: &mut f64) -> bool {
        let fac11 = err.powf(self.alpha);
        let mut fac = fac11 * self.fac_old.powf(-self.beta);
        fac = (self.facc2).max((self.facc1).min(fac / self.safety_factor));
        *h_new = h / fac;

        if err <= 1.0 {
            // Accept step
            self.fac_old = err.max(1.0E-4);

            if h_new.abs() > self.h_max {
                *h_new = self.posneg * self.h_max;
            }
            if self.reject {
                *h_new = self.posneg * h_new.abs().min(h.abs());
            }

            self.reject = false;
            true
        } else {
            // Reject step
            *h_new = h / ((self.facc1).min(fac11 / self.safety_factor));
            self.reject = true;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rwork(posneg: f64) -> Vec<f64> {
        let mut r = vec![0.0; real::HEAD + 1];
        r[real::POSNEG] = posneg;
        r
    }

    #[test]
    fn small_errors_grow_the_step_up_to_the_limit() {
        let mut c = Controller::load(&rwork(1.0), 4);
        let mut h_new = 0.0;
        assert!(c.accept(1e-12, 0.1, &mut h_new));
        assert!((h_new - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rejected_steps_shrink_and_cap_the_next_step() {
        let mut c = Controller::load(&rwork(-1.0), 1);
        let mut h_new = 0.0;
        assert!(!c.accept(100.0, -0.1, &mut h_new));
        assert!(h_new < 0.0 && h_new > -0.1);
        // The step after a rejection may not grow.
        let h = h_new;
        let mut next = 0.0;
        assert!(c.accept(1e-8, h, &mut next));
        assert_eq!(next, h);
    }

    #[test]
    fn memory_survives_a_store_load_cycle() {
        let mut r = rwork(1.0);
        r[real::HMAX] = 0.5;
        let mut c = Controller::load(&r, 4);
        assert_eq!(c.h_max, 0.5);
        let mut h_new = 0.0;
        c.accept(2.0, 0.1, &mut h_new);
        c.store(&mut r);
        assert_eq!(r[real::REJECT], 1.0);
        let c = Controller::load(&r, 4);
        assert!(c.reject);
    }
}
