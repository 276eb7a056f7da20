//! End-to-end resolution scenarios on small deterministic fixtures.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use std::sync::Arc;

use approx::assert_relative_eq;
use nalgebra::{DVector, Point3, UnitQuaternion, Vector3};
use rod_physics::prelude::*;
use rod_physics::DragCoefficients;

const DT: f64 = 0.01;
const RES: f64 = 1e-6;

fn vertical_rod(gid: u64, x: f64, z: f64, length: f64, radius: f64) -> Rod {
    Rod::new(
        RodId::new(gid),
        Point3::new(x, 0.0, z),
        UnitQuaternion::identity(),
        length,
        radius,
    )
    .with_global_index(gid as usize)
}

/// Rods along +X, head to tail, each link stretched by `stretch`.
fn chain_along_x(
    first_gid: u64,
    n: usize,
    y: f64,
    stretch: impl Fn(usize) -> f64,
    config: &ResolveConfig,
) -> Vec<Rod> {
    let along_x = UnitQuaternion::rotation_between(&Vector3::z(), &Vector3::x()).unwrap();
    let length = 1.0;
    let radius = 0.25;
    let rest = 2.0 * radius * (1.0 + config.separation_buffer_linkages);

    let mut rods = Vec::with_capacity(n);
    let mut x = 0.0;
    for k in 0..n {
        let gid = first_gid + k as u64;
        let mut rod = Rod::new(
            RodId::new(gid),
            Point3::new(x, y, 0.0),
            along_x,
            length,
            radius,
        );
        if k + 1 < n {
            rod = rod.with_link_next(RodId::new(gid + 1));
            x += length + rest + stretch(k);
        }
        rods.push(rod);
    }
    rods
}

fn index_rods(rods: &mut [Rod]) {
    for (k, rod) in rods.iter_mut().enumerate() {
        rod.global_index = k;
    }
}

/// Total contact-point gap rate of a two-sided block under `v = v_nc + v_u + v_b`.
fn gap_rate(block: &ConstraintBlock, pipeline: &ConstraintPipeline, v_nc: &DVector<f64>) -> f64 {
    let body = |index: usize| {
        let (vu, wu) = pipeline.unilateral_velocity(index).unwrap();
        let (vb, wb) = pipeline.bilateral_velocity(index).unwrap();
        let v = Vector3::new(v_nc[6 * index], v_nc[6 * index + 1], v_nc[6 * index + 2]);
        let w = Vector3::new(
            v_nc[6 * index + 3],
            v_nc[6 * index + 4],
            v_nc[6 * index + 5],
        );
        (v + vu + vb, w + wu + wb)
    };
    let (v_i, w_i) = body(block.global_index_i);
    let (v_j, w_j) = body(block.global_index_j);
    let vp_i = v_i + w_i.cross(&block.pos_i);
    let vp_j = v_j + w_j.cross(&block.pos_j);
    block.norm_i.dot(&vp_i) + block.norm_j.dot(&vp_j)
}

#[test]
fn scenario_two_rods_no_contact() {
    let rods = vec![
        vertical_rod(0, 0.0, 0.0, 1.0, 0.5),
        vertical_rod(1, 10.0, 0.0, 1.0, 0.5),
    ];
    let mobility = Arc::new(RodDragMobility::new(&rods, 1.0));
    let mut pipeline = ConstraintPipeline::with_workers(
        ResolveConfig::default().with_solver_params(RES, 500),
        2,
    )
    .unwrap();

    let report = pipeline
        .resolve(&rods, mobility, &DVector::zeros(12), DT)
        .unwrap();

    assert_eq!(report.solve.n_uni, 0);
    assert_eq!(report.solve.n_bi, 0);
    assert_eq!(report.solve.residual, 0.0);
    assert!(report.solve.converged());
    assert_eq!(pipeline.contacts().count(), 0);
    assert_eq!(pipeline.solver().force_uni().unwrap().norm(), 0.0);
}

#[test]
fn scenario_head_to_head_contact() {
    let rods = vec![
        vertical_rod(0, 0.0, 0.0, 1.0, 0.5),
        vertical_rod(1, 0.9, 0.0, 1.0, 0.5),
    ];
    let mobility = Arc::new(RodDragMobility::new(&rods, 1.0));
    let mut pipeline = ConstraintPipeline::with_workers(
        ResolveConfig::default().with_solver_params(RES, 500),
        2,
    )
    .unwrap();

    // Pushed together at unit relative speed.
    let mut v_nc = DVector::zeros(12);
    v_nc[0] = 0.5;
    v_nc[6] = -0.5;

    let report = pipeline.resolve(&rods, mobility, &v_nc, DT).unwrap();
    assert!(report.solve.converged());
    assert_eq!(report.solve.n_uni, 1);

    let block = *pipeline.contacts().blocks().next().unwrap();
    assert_relative_eq!(block.delta0, -0.1, epsilon = 1e-12);
    assert!(block.gamma >= 0.0);

    // Non-penetration certificate: the end-of-step gap is restored to zero
    // within the solve tolerance.
    let post_gap = block.delta0 + DT * gap_rate(&block, &pipeline, &v_nc);
    assert!(post_gap >= -RES, "post-solve gap {post_gap}");
    assert!(post_gap.abs() <= 1e-6, "post-solve gap {post_gap}");
}

#[test]
fn scenario_rod_on_lower_wall() {
    // Touching the lower wall (tiny penetration to stay robust under
    // floating point), pushed down at unit speed.
    let rods = vec![vertical_rod(0, 0.0, 0.4 - 1e-9, 0.6, 0.1)];
    let mobility = Arc::new(RodDragMobility::new(&rods, 1.0));
    let config = ResolveConfig::default()
        .with_walls(0.0, 1.0)
        .with_solver_params(RES, 500);
    let mut pipeline = ConstraintPipeline::with_workers(config, 2).unwrap();

    let mut v_nc = DVector::zeros(6);
    v_nc[2] = -1.0;

    let report = pipeline.resolve(&rods, mobility, &v_nc, DT).unwrap();
    assert!(report.solve.converged());
    assert_eq!(report.solve.n_uni, 1);

    let block = pipeline.contacts().blocks().next().unwrap();
    assert!(block.one_side);
    assert_relative_eq!(block.norm_i, Vector3::z(), epsilon = 1e-14);
    assert!(block.gamma > 0.0);

    // The unilateral constraint velocity cancels the downward push.
    let (v, w) = pipeline.unilateral_velocity(0).unwrap();
    assert_relative_eq!(v.z, 1.0, epsilon = RES);
    assert_relative_eq!(w.norm(), 0.0, epsilon = 1e-9);
}

#[test]
fn scenario_chain_of_three_linked_rods() {
    let config = ResolveConfig::default().with_solver_params(RES, 500);
    let mut rods = chain_along_x(0, 3, 0.0, |_| 0.01, &config);
    index_rods(&mut rods);
    let mu = 10.0;
    let mobility = Arc::new(RodDragMobility::new(&rods, mu));
    let mut pipeline = ConstraintPipeline::with_workers(config, 2).unwrap();

    let report = pipeline
        .resolve(&rods, mobility, &DVector::zeros(18), DT)
        .unwrap();
    assert!(report.solve.converged());
    assert_eq!(report.solve.n_uni, 0);
    assert_eq!(report.solve.n_bi, 2);
    assert!(report.solve.iterations <= 30, "{}", report.solve.iterations);

    // Both links carry the same pull; the exact value follows from the
    // parallel drag and the spring compliance.
    let gamma = pipeline.solver().gamma_bi();
    assert_relative_eq!(gamma[0], gamma[1], epsilon = 1e-7);

    let kappa = pipeline.config().link_kappa;
    let zeta_para = DragCoefficients::slender_body(mu, 1.0, 0.25).para;
    let expected = -(0.01 / DT) / (1.0 / (DT * kappa) + 1.0 / zeta_para);
    assert_relative_eq!(gamma[0], expected, epsilon = 1e-4);

    // Close to the ideal stiff-spring force, and exactly on the
    // end-of-step Hookean law.
    assert!((gamma[0] + kappa * 0.01).abs() <= 0.02 * kappa * 0.01 * 2.0);
    let v_nc = DVector::zeros(18);
    for block in pipeline.linkages().blocks() {
        let post_gap = block.delta0 + DT * gap_rate(block, &pipeline, &v_nc);
        assert!(
            (block.gamma + kappa * post_gap).abs() <= RES * (1.0 + kappa),
            "spring law violated: gamma {} gap {post_gap}",
            block.gamma
        );
    }
}

#[test]
fn scenario_mixed_contacts_and_linkages() {
    let config = ResolveConfig::default().with_solver_params(RES, 500);

    // Contact pair at y = 0, linked chain at y = 10.
    let mut rods = vec![
        vertical_rod(0, 0.0, 0.0, 1.0, 0.5),
        vertical_rod(1, 0.9, 0.0, 1.0, 0.5),
    ];
    rods.extend(chain_along_x(2, 3, 10.0, |_| 0.01, &config));
    index_rods(&mut rods);

    let mobility = Arc::new(RodDragMobility::new(&rods, 10.0));
    let mut pipeline = ConstraintPipeline::with_workers(config, 2).unwrap();
    pipeline.set_track_history(true);

    let mut v_nc = DVector::zeros(30);
    v_nc[0] = 0.5;
    v_nc[6] = -0.5;

    let report = pipeline.resolve(&rods, mobility, &v_nc, DT).unwrap();
    assert!(report.solve.converged());
    assert_eq!(report.solve.n_uni, 1);
    assert_eq!(report.solve.n_bi, 2);

    // Unilateral multipliers stay feasible; linkage multipliers are free
    // and here negative (stretched springs pull).
    for &g in pipeline.solver().gamma_uni() {
        assert!(g >= 0.0);
    }
    for &g in pipeline.solver().gamma_bi() {
        assert!(g < 0.0);
    }

    // The BCQP objective decreases over the solve.
    let energy = report.solve.energy_history.as_ref().unwrap();
    assert!(energy.len() >= 2);
    assert!(energy.last().unwrap() <= energy.first().unwrap());
}

#[test]
fn scenario_nonconvergence_is_reported_and_written_back() {
    // A nearly rigid chain (huge kappa) with unequal stretches and a
    // tolerance far below what 5 iterations can reach.
    let config = ResolveConfig::default()
        .with_link_kappa(1e9)
        .with_solver_params(1e-14, 5);
    let mut rods = chain_along_x(0, 8, 0.0, |k| 0.01 * (1.0 + k as f64 / 10.0), &config);
    index_rods(&mut rods);
    let mobility = Arc::new(RodDragMobility::new(&rods, 1.0));
    let mut pipeline = ConstraintPipeline::with_workers(config, 2).unwrap();

    let report = pipeline
        .resolve(&rods, mobility, &DVector::zeros(48), DT)
        .unwrap();

    assert_eq!(report.solve.termination, Termination::MaxIterations);
    assert_eq!(report.solve.iterations, 5);
    assert!(report.solve.residual > 0.0);

    // The multipliers were written back to the blocks regardless.
    let solver_gamma = pipeline.solver().gamma_bi().to_vec();
    let block_gamma: Vec<f64> = pipeline.linkages().blocks().map(|b| b.gamma).collect();
    assert_eq!(solver_gamma, block_gamma);
    for g in block_gamma {
        assert!(g.is_finite());
    }
}
