//! Measurement engine and report throughput.
//!
//! ```bash
//! cargo bench --bench measurement_benchmark
//! cargo bench --bench measurement_benchmark --features parallel
//! ```

use std::hint::black_box;

use bms_project::{
    CaseImage, CurrentMask, HuRange, MaskUpdate, PixelSpacing, Project, ReportOptions,
    ValidationState, measure,
};
use criterion::{Criterion, criterion_group, criterion_main};
use ndarray::Array2;

fn synthetic_slice(size: usize, seed: u64) -> (Array2<f64>, Array2<bool>) {
    let mut rng = fastrand::Rng::with_seed(seed);
    let image = Array2::from_shape_fn((size, size), |_| f64::from(rng.i32(-1024..1200)));
    let center = size as f64 / 2.0;
    let mask = Array2::from_shape_fn((size, size), |(row, col)| {
        let (dy, dx) = (row as f64 - center, col as f64 - center);
        dx.hypot(dy) < center * 0.6
    });
    (image, mask)
}

fn bench_measure(c: &mut Criterion) {
    let (image, mask) = synthetic_slice(512, 42);
    let spacing = PixelSpacing::new(0.78, 0.78);

    c.bench_function("measure_512x512", |b| {
        b.iter(|| {
            measure(
                black_box(image.view()),
                black_box(&mask),
                spacing,
                HuRange::default(),
            )
            .unwrap()
        });
    });
}

fn bench_report(c: &mut Criterion) {
    let dir = tempfile::TempDir::new().unwrap();
    let project = Project::create(dir.path()).unwrap();
    for index in 0..32 {
        let (matrix, mask) = synthetic_slice(256, index);
        let element = project
            .add_case(
                &format!("{index}___slice"),
                &CaseImage::new(matrix, PixelSpacing::new(0.78, 0.78)),
            )
            .unwrap();
        element
            .update_mask(
                "muscle",
                MaskUpdate::predicted(mask.clone())
                    .with_current(CurrentMask::SameAsPredicted)
                    .with_validation(ValidationState::Validated {
                        validators: vec!["bench".into()],
                        mask,
                    }),
            )
            .unwrap();
    }

    c.bench_function("report_32_cases_256x256", |b| {
        b.iter(|| {
            project
                .measurement_report("muscle", &ReportOptions::default())
                .unwrap()
        });
    });
}

criterion_group!(benches, bench_measure, bench_report);
criterion_main!(benches);
