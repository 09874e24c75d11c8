use densemat_core::{Engine, GaussianStatistics, HybridEngine, PolynomialFit};

fn main() {
    let engine = HybridEngine::new();

    // Two correlated features: height in metres and weight in kilograms.
    let samples = [
        [1.62, 55.0],
        [1.70, 64.0],
        [1.75, 70.5],
        [1.80, 77.0],
        [1.68, 61.0],
        [1.91, 88.0],
    ];
    let mut stats = GaussianStatistics::new(2);
    for sample in &samples {
        stats.learn(sample).expect("two features");
    }

    let dist = stats
        .distribution(&engine, None, false)
        .expect("factorization")
        .expect("at least two samples");
    println!("mean        : {:?}", dist.mean());
    println!("rank / det  : {} / {:.6}", dist.rank(), dist.determinant());
    for probe in [[1.74, 68.0], [1.74, 95.0]] {
        println!(
            "density {:?}: {:.6}",
            probe,
            dist.density(&probe, false).expect("two features")
        );
    }

    // Weight as a quadratic in height.
    let t: Vec<f64> = samples.iter().map(|s| s[0]).collect();
    let y: Vec<f64> = samples.iter().map(|s| s[1]).collect();
    let mut fit = PolynomialFit::new(2);
    fit.fit(&engine, &t, &y).expect("least squares");
    println!("coefficients: {:?}", fit.coefficients());
    println!("at 1.85 m   : {:.2} kg", fit.evaluate(1.85));
    println!("engine      : {}", engine.name());
}
