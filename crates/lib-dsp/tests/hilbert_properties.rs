use lib_dsp::{relative_error, HilbertTransform, KramersKronig, Parity, TransformMethod};
use lib_types::FrequencyGrid;
use proptest::prelude::*;

fn vec_f64(len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-10.0..10.0, len)
}

fn grid() -> FrequencyGrid {
    FrequencyGrid::linspace(0.05, 4.0, 48).unwrap()
}

fn combine(a: f64, x: &[f64], b: f64, y: &[f64]) -> Vec<f64> {
    x.iter().zip(y).map(|(u, v)| a * u + b * v).collect()
}

fn norm(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum::<f64>().sqrt()
}

#[test]
fn transform_is_linear_for_every_method() {
    let grid = grid();
    let transforms: Vec<HilbertTransform> = TransformMethod::ALL
        .iter()
        .map(|&m| HilbertTransform::new(&grid, m).unwrap())
        .collect();

    proptest!(|(f in vec_f64(48), g in vec_f64(48), a in -5.0..5.0f64, b in -5.0..5.0f64)| {
        let combo = combine(a, &f, b, &g);
        for h in &transforms {
            for parity in [Parity::Odd, Parity::Even] {
                let lhs = h.apply(&combo, parity).unwrap();
                let rhs = combine(a, &h.apply(&f, parity).unwrap(), b, &h.apply(&g, parity).unwrap());
                let scale = norm(&rhs).max(norm(&lhs)).max(1.0);
                let diff: Vec<f64> = lhs.iter().zip(&rhs).map(|(x, y)| x - y).collect();
                prop_assert!(norm(&diff) / scale < 1e-9, "{} {:?}", h.method(), parity);
            }
        }
    });
}

#[test]
fn kk_relations_are_linear() {
    let grid = grid();
    let kk = KramersKronig::new(&grid, TransformMethod::OddFft).unwrap();

    proptest!(|(f in vec_f64(48), g in vec_f64(48), a in -5.0..5.0f64)| {
        let combo = combine(a, &f, 1.0, &g);
        let lhs = kk.forward(&combo).unwrap();
        let rhs = combine(a, &kk.forward(&f).unwrap(), 1.0, &kk.forward(&g).unwrap());
        let scale = norm(&rhs).max(1.0);
        let diff: Vec<f64> = lhs.iter().zip(&rhs).map(|(x, y)| x - y).collect();
        prop_assert!(norm(&diff) / scale < 1e-9);

        let lhs = kk.backward(&combo).unwrap();
        let rhs = combine(a, &kk.backward(&f).unwrap(), 1.0, &kk.backward(&g).unwrap());
        prop_assert!(relative_error(&lhs, &rhs) * norm(&rhs) / norm(&rhs).max(1.0) < 1e-9);
    });
}

#[test]
fn output_length_matches_grid() {
    let grid = grid();
    proptest!(|(f in vec_f64(48))| {
        for method in TransformMethod::ALL {
            let h = HilbertTransform::new(&grid, method).unwrap();
            prop_assert_eq!(h.transform(&f).unwrap().len(), 48);
            prop_assert_eq!(h.transform_even(&f).unwrap().len(), 48);
        }
    });
}
