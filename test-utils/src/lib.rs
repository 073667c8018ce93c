use std::{
    error::Error,
    io,
    path::Path,
    process::{Command, Output},
    str,
};

const PICOC_PATH: &str = "./target/debug/picoc";

pub struct Expected<'a> {
    pub stdout: &'a str,
    pub exit_code: i32,
}

impl<'a> Expected<'a> {
    fn assert_matches(self, output: &Output) -> Result<(), Box<dyn Error>> {
        assert_eq!(str::from_utf8(&output.stdout)?, self.stdout);
        assert_eq!(output.status.code(), Some(self.exit_code));
        Ok(())
    }
}

fn run_picoc(src_path: &Path, args: &[&str]) -> Result<Output, io::Error> {
    Command::new(PICOC_PATH).arg(src_path).args(args).output()
}

/// Runs a fixture file through the interpreter and checks its stdout and
/// exit status, the way a `main` that falls off the end or returns an
/// explicit status would be checked from the shell.
pub fn check_run(src_path: &Path, args: &[&str], expected: Expected) -> Result<(), Box<dyn Error>> {
    let output = run_picoc(src_path, args)?;
    let stderr = str::from_utf8(&output.stderr)?;
    println!("{stderr}");
    expected.assert_matches(&output)?;
    Ok(())
}

/// Runs a fixture expected to fail parsing or execution; only the exit
/// status is checked, not the diagnostic text on stderr.
pub fn check_failing(src_path: &Path) -> Result<(), Box<dyn Error>> {
    let output = run_picoc(src_path, &[])?;
    assert!(
        !output.status.success(),
        "picoc should have exited with a non-zero status for {src_path:?}"
    );
    Ok(())
}
