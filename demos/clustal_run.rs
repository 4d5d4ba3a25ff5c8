use std::path::PathBuf;

use symbios_parsimony::config::RunConfig;

fn main() {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/data/primates.aln")));

    let config = RunConfig {
        alignment: Some(path),
        max_population_size: 60,
        terminator: "convergence:8".to_string(),
        printer: "max-fitness".to_string(),
        seed: 7,
        ..Default::default()
    };
    let source = config.alignment_source().unwrap();
    let mut env = config.build_environment(&source).unwrap();

    let stdout = std::io::stdout();
    env.run(&mut stdout.lock()).unwrap();
}
