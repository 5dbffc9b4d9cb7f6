use edgeswarm_data::{
    Action, ControllerNetwork, Perception, CONTROLLER_HIDDEN, CONTROLLER_INPUTS,
    CONTROLLER_OUTPUTS,
};

/// Safety clip applied before any output reaches an actuator: non-finite
/// values become zero, everything else is clamped to `[-1, 1]`.
#[must_use]
pub fn safe_output(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Replaces non-finite inputs with zero. Returns the cleaned vector and the
/// number of replaced components.
#[must_use]
pub fn sanitize_perception(input: &Perception) -> (Perception, u32) {
    let mut faults = 0;
    let clean = input.map(|v| {
        if v.is_finite() {
            v
        } else {
            faults += 1;
            0.0
        }
    });
    (clean, faults)
}

/// `tanh` that maps NaN (from `inf - inf` on extreme inputs) to zero.
fn bounded_tanh(x: f64) -> f64 {
    let y = x.tanh();
    if y.is_nan() {
        0.0
    } else {
        y
    }
}

pub fn hidden_layer(network: &ControllerNetwork, input: &Perception) -> [f64; CONTROLLER_HIDDEN] {
    let w1 = network.w1();
    let b1 = network.b1();
    let mut hidden = [0.0; CONTROLLER_HIDDEN];
    for (j, h) in hidden.iter_mut().enumerate() {
        let mut acc = b1[j];
        for i in 0..CONTROLLER_INPUTS {
            acc += input[i] * w1[i][j];
        }
        *h = bounded_tanh(acc);
    }
    hidden
}

pub fn forward(network: &ControllerNetwork, input: &Perception) -> Action {
    let hidden = hidden_layer(network, input);
    let w2 = network.w2();
    let b2 = network.b2();
    let mut output = [0.0; CONTROLLER_OUTPUTS];
    for (k, o) in output.iter_mut().enumerate() {
        let mut acc = b2[k];
        for (j, h) in hidden.iter().enumerate() {
            acc += h * w2[j][k];
        }
        *o = safe_output(bounded_tanh(acc));
    }
    output
}
