//! Commands for the tools that run inside the active environment:
//! the interpreter, pip, the test runner and the two upload clients

use crate::core::Secret;
use crate::toolchain::{ActiveEnvironment, CommandSpec, Conda};
use std::path::Path;

/// `python -c "import <module>"`
pub fn import_check(conda: &Conda, env: &ActiveEnvironment, module: &str) -> CommandSpec {
    conda.run_in(env, "python", ["-c".to_string(), format!("import {}", module)])
}

/// Reinstall `source` from source, compiled with the environment's own toolchain
///
/// Compiler and linker flags point at the environment prefix so the extension
/// links against the environment's numerical libraries rather than the system's.
pub fn native_rebuild(conda: &Conda, env: &ActiveEnvironment, source: &str) -> CommandSpec {
    let include = env.include_dir().to_string_lossy().into_owned();
    let lib = env.lib_dir().to_string_lossy().into_owned();
    let bin = env.bin_dir();

    conda
        .run_in(
            env,
            "pip",
            [
                "install",
                "--no-binary",
                ":all:",
                "--force-reinstall",
                "--no-deps",
                "--upgrade",
                source,
            ],
        )
        .env("CC", bin.join("gcc").to_string_lossy())
        .env("CXX", bin.join("g++").to_string_lossy())
        .env("CFLAGS", format!("-I{}", include))
        .env("CXXFLAGS", format!("-I{}", include))
        .env("LDFLAGS", format!("-L{} -Wl,-rpath,{}", lib, lib))
}

/// Parameters of one test-suite run
#[derive(Debug, Clone)]
pub struct TestInvocation<'a> {
    /// Directory holding the test modules (also the working directory)
    pub test_dir: &'a Path,
    /// Subdirectory excluded from discovery
    pub ignore: &'a str,
    /// Package namespace measured for coverage
    pub cov_package: &'a str,
    pub extra_args: &'a [String],
}

/// `python -m pytest -vv --ignore=<dir> --cov=<package>` from the test directory
///
/// `PYTHONPATH` is pinned to the test directory so distributed workers import
/// the same modules as the controller.
pub fn pytest(conda: &Conda, env: &ActiveEnvironment, invocation: &TestInvocation<'_>) -> CommandSpec {
    let mut args = vec![
        "-m".to_string(),
        "pytest".to_string(),
        "-vv".to_string(),
        format!("--ignore={}", invocation.ignore),
        format!("--cov={}", invocation.cov_package),
    ];
    args.extend(invocation.extra_args.iter().cloned());

    conda
        .run_in(env, "python", args)
        .current_dir(invocation.test_dir)
        .env("PYTHONPATH", invocation.test_dir.to_string_lossy())
}

/// `codecov -t <token> -f <report>` from the report's directory
pub fn codecov_upload(
    conda: &Conda,
    env: &ActiveEnvironment,
    token: &Secret,
    report: &Path,
) -> CommandSpec {
    let mut cmd = conda
        .run_in(env, "codecov", ["-t"])
        .secret_arg(token.expose())
        .args(["-f".to_string(), report.to_string_lossy().into_owned()]);
    if let Some(dir) = report.parent() {
        cmd = cmd.current_dir(dir);
    }
    cmd
}

/// `anaconda -t <token> upload -u <user> <file> --force`
pub fn anaconda_upload(
    conda: &Conda,
    env: &ActiveEnvironment,
    token: &Secret,
    user: &str,
    artifact: &Path,
) -> CommandSpec {
    conda
        .run_in(env, "anaconda", ["-t"])
        .secret_arg(token.expose())
        .args(["upload", "-u", user])
        .arg(artifact.to_string_lossy())
        .arg("--force")
}
