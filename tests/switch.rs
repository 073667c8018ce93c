use std::{error::Error, path::Path};

use test_utils::{check_run, Expected};

const SRC_PATH: &str = "./fixtures/switch.c";
const EXPECTED: Expected = Expected {
    stdout: "1",
    exit_code: 0,
};

#[test]
fn switch_falls_through_to_default() -> Result<(), Box<dyn Error>> {
    check_run(Path::new(SRC_PATH), &[], EXPECTED)
}
