//! Structure of the assembled portfolio model.
//!
//! Checks row coefficients, right-hand sides and counts against the
//! scenario data rather than solving anything.

use robust_cvar::builder::{holding_name, WCVAR, WRET};
use robust_cvar::model::decision_name;
use robust_cvar::prelude::*;
use robust_cvar::solver::stuff_model;

const TOL: f64 = 1e-12;

/// Two instruments, branching [2, 2], two rival trees.
fn two_stage() -> ScenarioSet {
    ScenarioSet::from_json(
        r#"{
            "instruments": ["CASH", "RISK"],
            "branching": [2, 2],
            "trees": {
                "1": [
                    {"path": "0", "probability": 0.5, "returns": [1.0, 1.1]},
                    {"path": "1", "probability": 0.5, "returns": [1.0, 0.9]},
                    {"path": "0.0", "probability": 0.4, "returns": [1.0, 1.2]},
                    {"path": "0.1", "probability": 0.6, "returns": [1.0, 0.8]},
                    {"path": "1.0", "probability": 0.5, "returns": [1.0, 1.1]},
                    {"path": "1.1", "probability": 0.5, "returns": [1.0, 0.9]}
                ],
                "2": [
                    {"path": "0", "probability": 0.3, "returns": [1.0, 1.3]},
                    {"path": "1", "probability": 0.7, "returns": [1.0, 0.95]},
                    {"path": "0.0", "probability": 0.5, "returns": [1.0, 1.05]},
                    {"path": "0.1", "probability": 0.5, "returns": [1.0, 0.85]},
                    {"path": "1.0", "probability": 0.2, "returns": [1.0, 1.4]},
                    {"path": "1.1", "probability": 0.8, "returns": [1.0, 1.0]}
                ]
            }
        }"#,
    )
    .unwrap()
}

fn params() -> ModelParams {
    let mut params = ModelParams::equal_weighted(2);
    params.cost_to_buy = 0.01;
    params.cost_to_sell = 0.02;
    params.initial_portfolio = vec![0.3, 0.5];
    params
}

fn build(params: &ModelParams) -> (ScenarioSet, Model) {
    let scenarios = two_stage();
    let model = PortfolioModelBuilder::new(&scenarios, params).build().unwrap();
    (scenarios, model)
}

fn coeff(model: &Model, row: &str, var: &str) -> f64 {
    let c = model
        .constraint(row)
        .unwrap_or_else(|| panic!("missing row {}", row));
    c.coefficient(var)
        .unwrap_or_else(|| panic!("row {} has no term in {}", row, var))
}

#[test]
fn test_transaction_coefficients() {
    let params = params();
    let (scenarios, model) = build(&params);

    for tree in scenarios.trees() {
        let k = tree.id();
        for node in tree.internal_nodes() {
            let parent = node.path.parent().unwrap_or_default();
            for (i, inst) in scenarios.instruments().iter().enumerate() {
                let row = format!("trans_k{}_n{}_{}", k, node.path, inst);
                let c = model.constraint(&row).unwrap();
                assert_eq!(c.sense, Sense::Eq);
                assert_eq!(c.rhs, 0.0);
                assert_eq!(c.terms.len(), 4, "row {}", row);

                assert_eq!(coeff(&model, &row, &holding_name(k, &node.path, inst)), 1.0);
                assert_eq!(coeff(&model, &row, &holding_name(k, &parent, inst)), -node.returns[i]);
                let b = decision_name(VarCategory::Buy, Some(k), Some(&node.path), Some(inst));
                let s = decision_name(VarCategory::Sell, Some(k), Some(&node.path), Some(inst));
                assert!((coeff(&model, &row, &b) + (1.0 - params.cost_to_buy)).abs() < TOL);
                assert!((coeff(&model, &row, &s) - (1.0 + params.cost_to_sell)).abs() < TOL);
            }
        }
    }
}

#[test]
fn test_root_rows() {
    let params = params();
    let (scenarios, model) = build(&params);

    for (i, inst) in scenarios.instruments().iter().enumerate() {
        let row = model.constraint(&format!("trans_0_{}", inst)).unwrap();
        assert_eq!(row.rhs, params.initial_portfolio[i]);
        assert_eq!(row.coefficient(&format!("w_0_{}", inst)), Some(1.0));
    }

    let balance = model.constraint("balance_0").unwrap();
    assert!((balance.rhs - (1.0 - 0.8)).abs() < TOL);
    assert_eq!(balance.coefficient("b_0_CASH"), Some(1.0));
    assert_eq!(balance.coefficient("s_0_RISK"), Some(-1.0));

    // internal balance rows are self-financing
    assert_eq!(model.constraint("balance_k1_n0").unwrap().rhs, 0.0);
    assert_eq!(model.constraint("balance_k2_n1").unwrap().rhs, 0.0);
}

#[test]
fn test_cvar_rows() {
    let params = params();
    let (scenarios, model) = build(&params);
    let tail = 1.0 / (1.0 - params.beta);

    for tree in scenarios.trees() {
        let k = tree.id();
        let var = format!("var_k{}", k);
        let wcvar_row = format!("wcvar_k{}", k);
        assert_eq!(coeff(&model, &wcvar_row, WCVAR), 1.0);
        assert_eq!(coeff(&model, &wcvar_row, &var), -1.0);

        for leaf in tree.final_nodes() {
            let row = format!("cvar_k{}_n{}", k, leaf.path);
            let z = format!("z_k{}_n{}", k, leaf.path);
            let c = model.constraint(&row).unwrap();
            assert_eq!(c.sense, Sense::Ge);
            assert_eq!(c.rhs, params.initial_wealth);
            assert_eq!(coeff(&model, &row, &z), 1.0);
            assert_eq!(coeff(&model, &row, &var), 1.0);

            let parent = leaf.path.parent().unwrap();
            for (i, inst) in scenarios.instruments().iter().enumerate() {
                assert_eq!(coeff(&model, &row, &holding_name(k, &parent, inst)), leaf.returns[i]);
            }

            let expected = -tail * leaf.cumulative_probability;
            assert!((coeff(&model, &wcvar_row, &z) - expected).abs() < 1e-9);
        }
    }
}

#[test]
fn test_return_rows() {
    let params = params();
    let (scenarios, model) = build(&params);
    let tree = scenarios.tree("2").unwrap();
    let row = model.constraint("return_k2").unwrap();
    assert_eq!(row.sense, Sense::Ge);
    assert_eq!(row.rhs, 1.01);

    // coefficient on a parent holding sums p(l) r(l) over its children
    let parent: NodePath = "1".parse().unwrap();
    let expected: f64 = tree
        .final_nodes()
        .filter(|l| l.path.parent().as_ref() == Some(&parent))
        .map(|l| l.cumulative_probability * l.returns[1])
        .sum();
    let c = row.coefficient(&holding_name("2", &parent, "RISK")).unwrap();
    assert!((c - expected).abs() < TOL);
    assert!((expected - (0.7 * 0.2 * 1.4 + 0.7 * 0.8 * 1.0)).abs() < TOL);
}

#[test]
fn test_return_rows_by_mode() {
    let no_target = params().with_mode(Mode::MinimiseCvar {
        return_target: None,
    });
    let (_, model) = build(&no_target);
    assert!(model.constraint("return_k1").is_none());
    assert!(model.variable(WRET).is_none());
    assert_eq!(model.variable(WCVAR).unwrap().obj, 1.0);
    assert_eq!(model.sense(), ObjectiveSense::Minimize);

    let max_return = params().with_mode(Mode::MaximiseReturn);
    let (_, model) = build(&max_return);
    assert_eq!(model.sense(), ObjectiveSense::Maximize);
    assert_eq!(model.variable(WRET).unwrap().obj, 1.0);
    assert_eq!(coeff(&model, "return_k1", WRET), -1.0);
    assert_eq!(model.constraint("return_k2").unwrap().rhs, 0.0);
    // without a cap the CVaR rows would be unconstrained
    assert!(model.variable(WCVAR).is_none());
    assert!(model.constraint("wcvar_k1").is_none());
    assert_eq!(model.variables_of(VarCategory::Shortfall).count(), 0);

    let mut capped = max_return;
    capped.cvar_cap = Some(0.1);
    let (_, model) = build(&capped);
    let wcvar = model.variable(WCVAR).unwrap();
    assert_eq!((wcvar.obj, wcvar.upper), (0.0, 0.1));
    assert!(model.constraint("cvar_k2_n1.1").is_some());
}

#[test]
fn test_counts_and_bounds() {
    let params = params();
    let (scenarios, model) = build(&params);
    let n = scenarios.instruments().len();

    // root + 2 internal nodes per tree, three families each
    let decisions = 3 * n * (1 + 2 * 2);
    // 4 leaves and one VaR per tree, plus wcvar
    let risk = 2 * (4 + 1) + 1;
    assert_eq!(model.num_variables(), decisions + risk);

    // root transactions + balance, internal ones per tree, cvar, wcvar, return
    let rows = (n + 1) + 2 * (2 * (n + 1) + 4 + 1 + 1);
    assert_eq!(model.num_constraints(), rows);

    let columns = model.columns();
    assert_eq!(columns.names.len(), model.num_variables());
    assert_eq!(columns.lower.len(), columns.names.len());
    assert_eq!(columns.upper.len(), columns.names.len());
    assert_eq!(columns.obj.len(), columns.names.len());

    let b = model.variable("b_k1_n0_RISK").unwrap();
    assert_eq!((b.lower, b.upper), (0.0, 0.2));
    let var = model.variable("var_k2").unwrap();
    assert_eq!(var.lower, f64::NEG_INFINITY);
    assert_eq!(model.variables_of(VarCategory::Shortfall).count(), 8);
}

#[test]
fn test_cvar_cap_bounds_wcvar() {
    let mut params = params();
    params.cvar_cap = Some(0.05);
    let (_, model) = build(&params);
    assert_eq!(model.variable(WCVAR).unwrap().upper, 0.05);
}

#[test]
fn test_robust_rows() {
    let params = params();
    let scenarios = two_stage();
    let robustness = FirstStageRobustness {
        mean: vec![1.0, 1.05],
        covariance: vec![vec![0.0001, 0.0], vec![0.0, 0.01]],
        kappa: 2.0,
        min_return: 0.98,
    };
    let model = PortfolioModelBuilder::new(&scenarios, &params)
        .with_robustness(&robustness)
        .build()
        .unwrap();

    assert!(model.has_cones());
    let cone = &model.cones()[0];
    assert_eq!(cone.t, "rob_t");
    assert_eq!(cone.x, vec!["rob_u_0".to_string(), "rob_u_1".to_string()]);

    assert!((coeff(&model, "robust_u_1", "w_0_RISK") + 0.1).abs() < TOL);
    assert_eq!(coeff(&model, "robust_return", "rob_t"), -2.0);
    assert_eq!(coeff(&model, "robust_return", "w_0_RISK"), 1.05);

    let stuffed = stuff_model(&model);
    assert_eq!(stuffed.cone_dims.soc, vec![3]);
    assert_eq!(stuffed.b.len(), stuffed.cone_dims.total());
}

#[test]
fn test_invalid_params_rejected() {
    let scenarios = two_stage();
    let mut params = params();
    params.initial_portfolio = vec![1.0];
    let err = PortfolioModelBuilder::new(&scenarios, &params).build().unwrap_err();
    assert!(matches!(err, CvarError::InvalidParameter(_)));
}
