//! Scripted command runner standing in for conda, python, pytest, codecov and anaconda

use async_trait::async_trait;
use release_pipeline::toolchain::{CommandError, CommandOutput, CommandRunner, CommandSpec};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Records every command and answers the way the real tools would
///
/// - `conda env list --json` lists the known environments under `conda_root`
/// - `conda create --name X` makes X known
/// - `conda build` writes `<package>-<PKG_VERSION>-py27_0.tar.bz2` into `build_dir`
/// - `conda build --output` prints that path
/// - sourcing a script prints the configured variables as an `env -0` dump
/// - the version read-back prints the value found in `version.py`
pub struct MockRunner {
    calls: Mutex<Vec<CommandSpec>>,
    known_envs: Mutex<Vec<String>>,
    conda_root: PathBuf,
    build_dir: PathBuf,
    package: String,
    sourced_vars: Vec<(String, String)>,
    failures: Vec<(Vec<String>, i32)>,
    version_reply: Option<String>,
    write_artifact: bool,
}

impl MockRunner {
    pub fn new(conda_root: &Path, build_dir: &Path) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            known_envs: Mutex::new(Vec::new()),
            conda_root: conda_root.to_path_buf(),
            build_dir: build_dir.to_path_buf(),
            package: "threeml".to_string(),
            sourced_vars: Vec::new(),
            failures: Vec::new(),
            version_reply: None,
            write_artifact: true,
        }
    }

    /// An environment that already exists before the run
    pub fn with_env(self, name: &str) -> Self {
        self.known_envs.lock().unwrap().push(name.to_string());
        self
    }

    /// A variable the platform configuration script exports
    pub fn with_sourced_var(mut self, key: &str, value: &str) -> Self {
        self.sourced_vars.push((key.to_string(), value.to_string()));
        self
    }

    /// Fail any command whose arguments contain `needle`
    pub fn fail_on(mut self, needle: &[&str], code: i32) -> Self {
        self.failures
            .push((needle.iter().map(|s| s.to_string()).collect(), code));
        self
    }

    /// Answer the version read-back with `reply` instead of the file contents
    pub fn with_version_reply(mut self, reply: &str) -> Self {
        self.version_reply = Some(reply.to_string());
        self
    }

    /// Let the build succeed without writing anything
    pub fn without_artifact(mut self) -> Self {
        self.write_artifact = false;
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Commands whose arguments contain `needle`
    pub fn calls_with(&self, needle: &[&str]) -> Vec<CommandSpec> {
        self.calls()
            .into_iter()
            .filter(|c| c.has_args(needle))
            .collect()
    }

    pub fn count(&self, needle: &[&str]) -> usize {
        self.calls_with(needle).len()
    }

    /// Index of the first command containing `needle`
    pub fn position(&self, needle: &[&str]) -> Option<usize> {
        self.calls().iter().position(|c| c.has_args(needle))
    }

    pub fn artifact_path(&self, version: &str) -> PathBuf {
        self.build_dir
            .join(format!("{}-{}-py27_0.tar.bz2", self.package, version))
    }

    fn respond(&self, spec: &CommandSpec) -> Result<String, String> {
        if spec.program == "bash" {
            return Ok(self
                .sourced_vars
                .iter()
                .map(|(k, v)| format!("{}={}\0", k, v))
                .collect());
        }

        if spec.program == "git" {
            return Ok("master\n".to_string());
        }

        if spec.args.iter().any(|a| a.contains("import version")) {
            if let Some(reply) = &self.version_reply {
                return Ok(reply.clone());
            }
            let dir = spec.cwd.clone().unwrap_or_default();
            let text = std::fs::read_to_string(dir.join("version.py")).map_err(|e| e.to_string())?;
            let value = text
                .split('\'')
                .nth(1)
                .ok_or_else(|| format!("no version in {:?}", text))?;
            return Ok(format!("{}\n", value));
        }

        if !spec.program.ends_with("conda") {
            return Ok(String::new());
        }

        match spec.args.first().map(String::as_str) {
            Some("env") if spec.has_args(&["list", "--json"]) => {
                let mut envs = vec![self.conda_root.clone()];
                envs.extend(
                    self.known_envs
                        .lock()
                        .unwrap()
                        .iter()
                        .map(|name| self.conda_root.join("envs").join(name)),
                );
                Ok(serde_json::json!({ "envs": envs }).to_string())
            }
            Some("create") => {
                if let Some(i) = spec.args.iter().position(|a| a == "--name") {
                    let name = spec.args[i + 1].clone();
                    self.known_envs.lock().unwrap().push(name);
                }
                Ok(String::new())
            }
            Some("build") => {
                let version = spec.env.get("PKG_VERSION").cloned().unwrap_or_default();
                let artifact = self.artifact_path(&version);
                if spec.has_args(&["--output"]) {
                    Ok(format!("{}\n", artifact.display()))
                } else {
                    if self.write_artifact {
                        std::fs::create_dir_all(&self.build_dir).map_err(|e| e.to_string())?;
                        std::fs::write(&artifact, b"bz2").map_err(|e| e.to_string())?;
                    }
                    Ok("BUILD START\nTEST END\n".to_string())
                }
            }
            _ => Ok(String::new()),
        }
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push(spec.clone());

        for (needle, code) in &self.failures {
            let needle: Vec<&str> = needle.iter().map(String::as_str).collect();
            if spec.program == needle[0] || spec.has_args(&needle) {
                return Err(CommandError::Failed {
                    command: spec.display(),
                    code: *code,
                    stderr: "simulated failure".to_string(),
                });
            }
        }

        match self.respond(spec) {
            Ok(stdout) => Ok(CommandOutput::new(stdout)),
            Err(reason) => Err(CommandError::UnexpectedOutput {
                command: spec.display(),
                reason,
            }),
        }
    }
}
