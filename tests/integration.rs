use serde_value::Value;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    process::Command,
};

fn run_bin(args: &[&str]) -> bool {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_virogrow"));

    let output = Command::new(bin)
        .args(args)
        .output()
        .expect("failed to execute command");

    if !output.status.success() {
        let stdout_str = String::from_utf8_lossy(&output.stdout);
        let stderr_str = String::from_utf8_lossy(&output.stderr);
        eprintln!("failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n");
    }
    output.status.success()
}

fn read_results(file: &Path) -> BTreeMap<String, Value> {
    let bytes = fs::read(file).expect("failed to read results file");
    let value: Value = rmp_serde::from_slice(&bytes).expect("failed to decode results file");
    value
        .deserialize_into()
        .expect("results file is not a map with string keys")
}

fn field<T: serde::de::DeserializeOwned>(results: &BTreeMap<String, Value>, key: &str) -> T {
    results
        .get(key)
        .unwrap_or_else(|| panic!("missing field {key}"))
        .clone()
        .deserialize_into()
        .unwrap_or_else(|err| panic!("invalid field {key}: {err}"))
}

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    let config_contents = String::new()
        + "seed = 2024\n"
        + "\n"
        + "[virus]\n"
        + "max_birth_prob = 0.1\n"
        + "clear_prob = 0.05\n"
        + "mut_prob = 0.005\n"
        + "resistances = { guttagonol = false, srinol = true }\n"
        + "\n"
        + "[patient]\n"
        + "n_viruses = 100\n"
        + "max_pop = 1000\n"
        + "prescription = [ \"guttagonol\",]\n"
        + "\n"
        + "[trials]\n"
        + "n_trials = 20\n"
        + "n_steps = 100\n"
        + "n_steps_pre = 50\n"
        + "n_steps_post = 50\n";

    fs::write(&config_path, config_contents).expect("failed to write config file");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    assert!(run_bin(&["--sim-dir", test_dir_str, "simple"]));
    assert!(run_bin(&["--sim-dir", test_dir_str, "treated"]));

    let simple = read_results(&test_dir.join("run-0000").join("results.msgpack"));
    assert_eq!(field::<u64>(&simple, "seed"), 2024);
    assert_eq!(field::<usize>(&simple, "n_trials"), 20);
    assert_eq!(field::<Option<usize>>(&simple, "treatment_step"), None);
    let total: BTreeMap<String, Vec<f64>> = field(&simple, "total");
    assert_eq!(total["mean"].len(), 100);
    assert_eq!(total["std_dev"].len(), 100);
    assert!(field::<Option<BTreeMap<String, Vec<f64>>>>(&simple, "resistant").is_none());

    let treated = read_results(&test_dir.join("run-0001").join("results.msgpack"));
    assert_eq!(field::<Option<usize>>(&treated, "treatment_step"), Some(50));
    let total: BTreeMap<String, Vec<f64>> = field(&treated, "total");
    assert_eq!(total["mean"].len(), 100);
    let resistant: Option<BTreeMap<String, Vec<f64>>> = field(&treated, "resistant");
    let resistant = resistant.expect("treated run without resistant series");
    assert_eq!(resistant["mean"].len(), 100);
    assert!(
        resistant["mean"]
            .iter()
            .zip(&total["mean"])
            .all(|(res, tot)| res <= tot)
    );

    assert!(run_bin(&["--sim-dir", test_dir_str, "clean"]));
    assert!(!test_dir.join("run-0000").exists());
    assert!(!test_dir.join("run-0001").exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn invalid_config_is_rejected() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("invalid_config");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_contents = String::new()
        + "[virus]\n"
        + "max_birth_prob = 1.5\n"
        + "clear_prob = 0.05\n"
        + "\n"
        + "[patient]\n"
        + "n_viruses = 10\n"
        + "max_pop = 100\n";

    fs::write(test_dir.join("config.toml"), config_contents)
        .expect("failed to write config file");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    assert!(!run_bin(&["--sim-dir", test_dir_str, "simple"]));
    assert!(!test_dir.join("run-0000").exists());

    fs::remove_dir_all(&test_dir).ok();
}
