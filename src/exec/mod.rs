//! Payload Execution
//!
//! Rank 0 launches the user's command once the group has formed, with the
//! run metadata exported through the environment. The child inherits stdio;
//! its exit code becomes the group's exit code.

use std::path::Path;
use std::process::ExitStatus;

use anyhow::{Context as _, Result};
use tokio::process::{Child, Command};

/// Environment exported to the payload.
#[derive(Debug, Default, Clone)]
pub struct PayloadEnv {
    pub vars: Vec<(String, String)>,
}

impl PayloadEnv {
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.vars.push((key.to_owned(), value.into()));
    }
}

/// Spawns the payload command in `working_dir`.
///
/// `kill_on_drop` ties the child to the wrapper: if the wrapper is torn
/// down first, the payload does not outlive it.
pub fn launch(argv: &[String], working_dir: &Path, env: &PayloadEnv) -> Result<Child> {
    let (program, args) = argv
        .split_first()
        .context("empty payload command")?;
    tracing::info!("launching payload {} with {} args", program, args.len());
    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(working_dir)
        .kill_on_drop(true);
    for (key, value) in &env.vars {
        command.env(key, value);
    }
    command
        .spawn()
        .with_context(|| format!("spawning payload '{program}'"))
}

/// Maps the payload's exit status to the wrapper's exit code.
///
/// Signal deaths have no exit code; they are reported as 128 plus the
/// signal number, the shell convention.
pub fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(code) = status.code() {
        code
    } else if let Some(signal) = status.signal() {
        128 + signal
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn payload_exit_code_propagates() {
        let argv = vec!["sh".to_owned(), "-c".to_owned(), "exit 7".to_owned()];
        let mut child = launch(&argv, Path::new("/tmp"), &PayloadEnv::default()).unwrap();
        let status = child.wait().await.unwrap();
        assert_eq!(exit_code(status), 7);
    }

    #[tokio::test]
    async fn payload_sees_exported_environment() {
        let mut env = PayloadEnv::default();
        env.set("PARWRAP_TEST_VALUE", "42");
        let argv = vec![
            "sh".to_owned(),
            "-c".to_owned(),
            "test \"$PARWRAP_TEST_VALUE\" = 42".to_owned(),
        ];
        let mut child = launch(&argv, Path::new("/tmp"), &env).unwrap();
        let status = child.wait().await.unwrap();
        assert_eq!(exit_code(status), 0);
    }

    #[test]
    fn empty_payload_rejected() {
        assert!(launch(&[], Path::new("/tmp"), &PayloadEnv::default()).is_err());
    }
}
