//! End to end runs of the model variants from equilibrium.

use dmm::options::DEFAULT_AGES;
use dmm::{
    build_parameters, run_model, run_model_until_stable, DmmError, RunOptions, ScenarioOptions,
    StabilityConfig, StabilityOptions,
};
use dmm_core::parameters::ParameterValue;

fn scenario(model: &str) -> ScenarioOptions {
    ScenarioOptions {
        model: model.to_string(),
        age: vec![0.0, 1.0, 2.0, 5.0, 10.0, 20.0, 40.0, 60.0],
        het_brackets: 3,
        ..Default::default()
    }
}

mod single_run {
    use super::*;

    #[test]
    fn test_one_row_per_day_from_zero() {
        for model in ["base", "seasonal", "intervention"] {
            let output = run_model(&RunOptions::new(scenario(model), 100)).unwrap();
            assert_eq!(output.len(), 101);
            assert_eq!(output.time()[0], 0.0);
            assert_eq!(output.last_time(), Some(100.0));
            assert!(output.time().windows(2).into_iter().all(|w| w[1] > w[0]));
        }
    }

    #[test]
    fn test_zero_horizon() {
        let output = run_model(&RunOptions::new(scenario("base"), 0)).unwrap();
        assert_eq!(output.len(), 1);
        assert_eq!(output.time()[0], 0.0);
    }

    #[test]
    fn test_default_age_structure() {
        let options = RunOptions::new(ScenarioOptions::default(), 10);
        assert_eq!(options.scenario.age, DEFAULT_AGES.to_vec());
        let output = run_model(&options).unwrap();
        assert_eq!(output.len(), 11);
        for column in ["S", "T", "D", "A", "U", "P", "prev", "prev_2_10", "inc", "EIR"] {
            assert!(output.column(column).is_some(), "missing {}", column);
        }
    }

    #[test]
    fn test_unknown_model() {
        let err = run_model(&RunOptions::new(scenario("odin"), 10)).unwrap_err();
        assert!(matches!(err, DmmError::UnknownModel { name, .. } if name == "odin"));
    }

    #[test]
    fn test_inconsistent_equilibrium_inputs() {
        let mut scenario = scenario("base");
        scenario.init_eir = -5.0;
        let err = run_model(&RunOptions::new(scenario, 10)).unwrap_err();
        assert!(matches!(err, DmmError::EquilibriumSolve(_)));
    }

    #[test]
    fn test_higher_transmission_higher_prevalence() {
        let low = run_model(&RunOptions::new(scenario("base"), 10)).unwrap();
        let mut high_scenario = scenario("base");
        high_scenario.init_eir = 100.0;
        let high = run_model(&RunOptions::new(high_scenario, 10)).unwrap();
        assert!(high.column("prev").unwrap()[10] > low.column("prev").unwrap()[10]);
    }
}

mod parameters {
    use super::*;

    #[test]
    fn test_extra_parameter_named_like_a_standard_one() {
        let mut scenario = scenario("base");
        scenario
            .extra_params
            .insert("rho".to_string(), ParameterValue::Scalar(0.5));
        let err = build_parameters(&scenario).unwrap_err();
        assert!(matches!(err, DmmError::NameCollision { name } if name == "rho"));

        let err = run_model(&RunOptions::new(scenario, 10)).unwrap_err();
        assert!(matches!(err, DmmError::NameCollision { .. }));
    }

    #[test]
    fn test_extra_parameter_also_set_by_name() {
        let mut scenario = scenario("base");
        scenario.parameters.insert("irs_cov".to_string(), 0.2);
        scenario
            .extra_params
            .insert("irs_cov".to_string(), ParameterValue::Scalar(0.3));
        assert!(matches!(
            build_parameters(&scenario),
            Err(DmmError::NameCollision { .. })
        ));
    }

    #[test]
    fn test_disjoint_parameters_are_accepted() {
        let mut scenario = scenario("base");
        scenario.parameters.insert("rho".to_string(), 0.8);
        scenario
            .extra_params
            .insert("irs_cov".to_string(), ParameterValue::Scalar(0.3));
        let parameters = build_parameters(&scenario).unwrap();
        assert_eq!(parameters.scalar("rho").unwrap(), 0.8);
        assert_eq!(parameters.scalar("irs_cov").unwrap(), 0.3);
        assert!(run_model(&RunOptions::new(scenario, 5)).is_ok());
    }
}

mod stabilisation {
    use super::*;

    fn options(model: &str, tolerance: f64, max_horizon: f64) -> StabilityOptions {
        StabilityOptions::new(
            scenario(model),
            StabilityConfig {
                tolerance,
                max_horizon,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_equilibrium_is_stable_after_one_window() {
        let output = run_model_until_stable(&options("base", 1e-4, 36500.0)).unwrap();
        assert_eq!(output.len(), 365);
        assert_eq!(output.time()[0], 1.0);
        assert_eq!(output.last_time(), Some(365.0));
    }

    #[test]
    fn test_horizon_exceeded() {
        // A tolerance of zero can never be met
        let err = run_model_until_stable(&options("seasonal", 0.0, 730.0)).unwrap_err();
        match err {
            DmmError::HorizonExceeded { attempted_end, .. } => assert_eq!(attempted_end, 1095.0),
            other => panic!("expected HorizonExceeded, got {:?}", other),
        }
    }

    #[test]
    fn test_seasonal_model_stabilises() {
        let output = run_model_until_stable(&options("seasonal", 1e-4, 36500.0)).unwrap();
        assert!(!output.is_empty());
        assert_eq!(output.len() % 365, 0);
        assert_eq!(output.last_time(), Some(output.len() as f64));
    }

    #[test]
    fn test_observable_can_be_changed() {
        let mut options = options("base", 1e-4, 36500.0);
        options.stability.observable = "prev".to_string();
        assert_eq!(run_model_until_stable(&options).unwrap().len(), 365);

        options.stability.observable = "clinical".to_string();
        assert!(matches!(
            run_model_until_stable(&options),
            Err(DmmError::MissingOutput(_))
        ));
    }
}
