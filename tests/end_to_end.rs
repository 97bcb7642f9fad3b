// Exercises the public surface end to end: ingest a noisy row stream,
// factorize, reduce, query, persist.

use approx::assert_abs_diff_eq;
use svdrec::{Dimensions, FactorModel, Id, ModelError};

fn noisy_rows() -> Vec<Result<(i64, i64, f64), String>> {
    vec![
        Ok((100, 1, 4.0)),
        Ok((100, 2, 1.0)),
        Err("row 3: subject column is NULL".to_string()),
        Ok((200, 1, 5.0)),
        Ok((200, 3, 2.0)),
        Ok((300, 2, 3.0)),
        Err("row 7: value is not numeric".to_string()),
        Ok((300, 3, 4.0)),
        // Duplicate cell: the later value replaces the earlier one.
        Ok((100, 2, 2.0)),
    ]
}

#[test]
fn build_reduce_query_persist() {
    let mut model = FactorModel::build(noisy_rows()).expect("build");

    assert_eq!(
        model.dimensions(),
        Dimensions {
            m: 3,
            k: 3,
            n: 3,
            objects: 3,
            subjects: 3,
        }
    );

    // Full-rank reconstruction recovers the observed cells, including the
    // overwritten duplicate.
    assert_abs_diff_eq!(model.predict(Id(100), Id(2)), 2.0, epsilon = 1e-9);
    assert_abs_diff_eq!(model.predict(Id(200), Id(1)), 5.0, epsilon = 1e-9);

    // Lossless reduction never drops a positive singular value.
    let rank_before = model.rank();
    model.compact().expect("compact");
    assert!(model.rank() <= rank_before);
    assert!(model.sigma().iter().all(|&s| s > 0.0));

    // Keeping 99% of the spectral energy still serves every subject.
    model.compress(0.99).expect("compress");
    let ranked = model.top_subjects(Id(200));
    assert_eq!(ranked.len(), 3);
    for pair in ranked.windows(2) {
        assert!(pair[0].1 >= pair[1].1);
    }

    // The reduced model round-trips through the byte codec exactly.
    let bytes = model.to_bytes().expect("encode");
    let restored = FactorModel::from_bytes(&bytes).expect("decode");
    assert_eq!(restored, model);

    // A failed decode leaves no model behind and a live one untouched.
    assert!(matches!(
        FactorModel::from_bytes(&bytes[..10]),
        Err(ModelError::Decode(_))
    ));
    assert_eq!(restored.dimensions(), model.dimensions());
}

#[test]
fn reduction_arguments_are_validated() {
    let mut model = FactorModel::build(noisy_rows()).expect("build");
    let dims = model.dimensions();

    assert!(matches!(model.cut(0), Err(ModelError::InvalidRank { k: 0 })));
    assert!(matches!(
        model.compress(1.5),
        Err(ModelError::InvalidSavedPart { .. })
    ));
    assert_eq!(model.dimensions(), dims);
}
