use std::{error::Error, path::Path};

use test_utils::{check_run, Expected};

const SRC_PATH: &str = "./fixtures/fib.c";
const EXPECTED: Expected = Expected {
    stdout: "55",
    exit_code: 0,
};

#[test]
fn interprets_recursive_fibonacci() -> Result<(), Box<dyn Error>> {
    check_run(Path::new(SRC_PATH), &[], EXPECTED)
}
