use std::{error::Error, path::Path};

use test_utils::{check_run, Expected};

const SRC_PATH: &str = "./fixtures/arrays.c";
const EXPECTED: Expected = Expected {
    stdout: "15",
    exit_code: 0,
};

#[test]
fn sums_an_array_filled_in_a_loop() -> Result<(), Box<dyn Error>> {
    check_run(Path::new(SRC_PATH), &[], EXPECTED)
}
