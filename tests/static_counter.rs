use std::{error::Error, path::Path};

use test_utils::{check_run, Expected};

const SRC_PATH: &str = "./fixtures/static_counter.c";
const EXPECTED: Expected = Expected {
    stdout: "1 2 3",
    exit_code: 0,
};

#[test]
fn static_local_survives_across_calls() -> Result<(), Box<dyn Error>> {
    check_run(Path::new(SRC_PATH), &[], EXPECTED)
}
