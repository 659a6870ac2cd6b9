use animal_health_core::classifier::LogisticRegression;
use animal_health_core::{
    build_feature_vector, ArtifactBundle, ClassifierArtifact, ClassifierModel, FeatureSchema,
    Predictor, RawInputRecord, ScalerArtifact, TargetDecoder, VerdictPolicy, Vocabulary,
    VocabularyTable, TRAINED_FEATURE_ORDER,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn sample_predictor() -> Predictor {
    // Same shape as the bundled sample artifacts: five categorical columns
    // plus the symptom count, binary Critical/Normal target.
    let vocabularies: VocabularyTable = TRAINED_FEATURE_ORDER[..5]
        .iter()
        .map(|feature| {
            (
                feature.to_string(),
                Vocabulary::new(["normal", "mild", "moderate", "severe"]),
            )
        })
        .collect();

    let bundle = ArtifactBundle::complete(
        ClassifierArtifact::new(ClassifierModel::LogisticRegression(LogisticRegression {
            coef: vec![vec![-0.9, -0.7, -0.8, -1.0, -0.8, -1.6]],
            intercept: vec![0.4],
        })),
        vocabularies,
        ScalerArtifact::standard(
            vec![1.2, 1.1, 1.3, 1.0, 1.2, 2.4],
            vec![1.1, 1.0, 1.1, 1.0, 1.1, 1.5],
        ),
        TargetDecoder::new(["Critical", "Normal"]),
    );

    match Predictor::strict(FeatureSchema::animal_health(), bundle, VerdictPolicy::default()) {
        Ok(predictor) => predictor,
        Err(e) => panic!("benchmark bundle rejected: {e}"),
    }
}

fn sample_record() -> RawInputRecord {
    RawInputRecord::new()
        .with("BloodBrainDisease", "Normal")
        .with("AppearenceDisease", "mild")
        .with("GeneralDisease", " severe ")
        .with("LungDisease", "wheezing")
        .with("AbdominalDisease", "normal")
}

fn bench_encoding(c: &mut Criterion) {
    let predictor = sample_predictor();
    let record = sample_record();
    let vocabularies = predictor.artifacts().vocabularies.clone().unwrap_or_default();

    c.bench_function("feature_vector_build", |b| {
        b.iter(|| {
            let encoded = build_feature_vector(
                black_box(&record),
                predictor.schema(),
                &vocabularies,
            );
            black_box(encoded)
        });
    });
}

fn bench_prediction(c: &mut Criterion) {
    let predictor = sample_predictor();
    let record = sample_record();

    c.bench_function("health_verdict_predict", |b| {
        b.iter(|| {
            let prediction = predictor.predict(black_box(&record));
            black_box(prediction)
        });
    });
}

criterion_group!(health_benches, bench_encoding, bench_prediction);
criterion_main!(health_benches);
