use std::{error::Error, path::Path};

use test_utils::{check_run, Expected};

const SRC_PATH: &str = "./fixtures/macro.c";
const EXPECTED: Expected = Expected {
    stdout: "49",
    exit_code: 0,
};

#[test]
fn expands_function_like_macro() -> Result<(), Box<dyn Error>> {
    check_run(Path::new(SRC_PATH), &[], EXPECTED)
}
