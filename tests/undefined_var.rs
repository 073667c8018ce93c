use std::{error::Error, path::Path};

use test_utils::check_failing;

const SRC_PATH: &str = "./fixtures/undefined_var.c";

#[test]
fn reports_use_of_undeclared_identifier() -> Result<(), Box<dyn Error>> {
    check_failing(Path::new(SRC_PATH))
}
