use std::{error::Error, path::Path};

use test_utils::{check_run, Expected};

const SRC_PATH: &str = "./fixtures/goto_loop.c";
const EXPECTED: Expected = Expected {
    stdout: "3",
    exit_code: 0,
};

#[test]
fn goto_loops_back_to_a_label() -> Result<(), Box<dyn Error>> {
    check_run(Path::new(SRC_PATH), &[], EXPECTED)
}
