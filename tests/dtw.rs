use std::fs;

use proptest::prelude::*;

use dualtree_dist::align::{dtw_alignment, load_series, parse_series};

#[test]
fn shifted_series_pay_only_for_the_shift() {
    let x = [0.0, 1.0, 2.0, 3.0, 2.0, 1.0, 0.0];
    let y = [0.0, 0.0, 1.0, 2.0, 3.0, 2.0, 1.0, 0.0];
    let alignment = dtw_alignment(&x, &y);

    assert_eq!(alignment.cost, 0.0);
    assert_eq!(alignment.path.first(), Some(&(0, 0)));
    assert_eq!(alignment.path.last(), Some(&(x.len() - 1, y.len() - 1)));
    assert_eq!(alignment.path.len(), y.len());
}

#[test]
fn ties_prefer_the_diagonal() {
    let alignment = dtw_alignment(&[5.0, 5.0], &[5.0, 5.0]);
    assert_eq!(alignment.path, vec![(0, 0), (1, 1)]);
}

#[test]
fn single_sample_against_series_sums_every_difference() {
    let alignment = dtw_alignment(&[1.0], &[0.0, 2.0, 4.0]);
    assert_eq!(alignment.cost, 1.0 + 1.0 + 3.0);
    assert_eq!(alignment.path, vec![(0, 0), (0, 1), (0, 2)]);
}

#[test]
fn series_load_from_disk() {
    let dir = std::env::temp_dir().join(format!("dualtree-dtw-{}", std::process::id()));
    fs::create_dir_all(&dir).expect("create temp dir");
    let path = dir.join("series.csv");
    fs::write(&path, "0.5,1.5, 2.5\n").expect("write series");

    let series = load_series(&path).expect("series parses");
    assert_eq!(series, vec![0.5, 1.5, 2.5]);

    fs::remove_dir_all(&dir).ok();
}

proptest! {
    #[test]
    fn path_is_monotone_and_cost_symmetric(
        x in proptest::collection::vec(-100.0f64..100.0, 1..30),
        y in proptest::collection::vec(-100.0f64..100.0, 1..30),
    ) {
        let forward = dtw_alignment(&x, &y);
        let backward = dtw_alignment(&y, &x);
        prop_assert!((forward.cost - backward.cost).abs() < 1e-9);

        prop_assert_eq!(forward.path.first(), Some(&(0, 0)));
        prop_assert_eq!(forward.path.last(), Some(&(x.len() - 1, y.len() - 1)));
        for pair in forward.path.windows(2) {
            let ((i0, j0), (i1, j1)) = (pair[0], pair[1]);
            prop_assert!(i1 - i0 <= 1 && j1 - j0 <= 1 && (i1, j1) != (i0, j0));
        }

        let along_path: f64 = forward.path.iter().map(|&(i, j)| (x[i] - y[j]).abs()).sum();
        prop_assert!((along_path - forward.cost).abs() < 1e-9);
    }

    #[test]
    fn parsed_series_round_trip_through_text(values in proptest::collection::vec(-1e6f64..1e6, 0..20)) {
        let text = values.iter().map(f64::to_string).collect::<Vec<_>>().join(", ");
        prop_assert_eq!(parse_series(&text).expect("parses"), values);
    }
}
