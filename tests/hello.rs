use std::{error::Error, path::Path};

use test_utils::{check_run, Expected};

const SRC_PATH: &str = "./fixtures/hello.c";
const EXPECTED: Expected = Expected {
    stdout: "hello, world",
    exit_code: 0,
};

#[test]
fn prints_a_string_literal() -> Result<(), Box<dyn Error>> {
    check_run(Path::new(SRC_PATH), &[], EXPECTED)
}
