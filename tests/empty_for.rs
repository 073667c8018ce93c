use std::{error::Error, path::Path};

use test_utils::{check_run, Expected};

const SRC_PATH: &str = "./fixtures/empty_for.c";
const EXPECTED: Expected = Expected {
    stdout: "5",
    exit_code: 0,
};

#[test]
fn runs_empty_for_condition_until_break() -> Result<(), Box<dyn Error>> {
    check_run(Path::new(SRC_PATH), &[], EXPECTED)
}
