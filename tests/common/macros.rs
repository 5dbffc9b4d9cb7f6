/// Asserts that every body in the engine has finite position and velocity.
#[macro_export]
macro_rules! assert_engine_finite {
    ($engine:expr) => {
        for body in $engine.objects() {
            assert!(
                body.position.is_finite() && body.velocity.is_finite(),
                "Body {} has non-finite state: {:?}",
                body.id,
                body
            );
        }
    };
}

/// Asserts that every component of a controller action lies in [-1, 1].
#[macro_export]
macro_rules! assert_unit_action {
    ($action:expr) => {
        for &a in $action.iter() {
            assert!((-1.0..=1.0).contains(&a), "Output {} outside [-1, 1]", a);
        }
    };
}
