// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Locating the directory of a package given by import path.

use crate::error::ResolveError;

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::{debug, info};

fn run(program: &str, args: &[String]) -> Result<Output, ResolveError> {
    debug!("running {program} {}", args.join(" "));
    Command::new(program)
        .args(args)
        .output()
        .map_err(|source| ResolveError::Spawn {
            command: format!("{program} {}", args.join(" ")),
            source,
        })
}

fn go_list(pkg: &str) -> Result<PathBuf, ResolveError> {
    let args = ["list", "-f", "{{.Dir}}", pkg].map(str::to_string);
    let output = run("go", &args)?;
    let dir = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !output.status.success() || dir.is_empty() {
        return Err(ResolveError::NotFound {
            package: pkg.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(PathBuf::from(dir))
}

/// `go get` arguments: user flags, the build tags and the package.
pub fn get_args(pkg: &str, flags: &[String], tags: &[String]) -> Vec<String> {
    let mut args = vec!["get".to_string()];
    args.extend(flags.iter().filter(|f| !f.is_empty()).cloned());
    if !tags.is_empty() {
        args.push("-tags".to_string());
        args.push(tags.join(","));
    }
    args.push(pkg.to_string());
    args
}

/// Resolves `pkg` to a directory. Existing directories are taken as is;
/// anything else is looked up with `go list`. When `get` is set a missing
/// package is fetched once before giving up.
pub fn package_dir(
    pkg: &str,
    get: bool,
    get_flags: &[String],
    tags: &[String],
) -> Result<PathBuf, ResolveError> {
    let path = Path::new(pkg);
    if path.is_dir() {
        return Ok(path.to_path_buf());
    }
    match go_list(pkg) {
        Ok(dir) => Ok(dir),
        Err(ResolveError::NotFound { .. }) if get => {
            info!("fetching {pkg}");
            let output = run("go", &get_args(pkg, get_flags, tags))?;
            if !output.status.success() {
                return Err(ResolveError::Fetch {
                    package: pkg.to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
            go_list(pkg)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_resolve_to_themselves() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().to_str().unwrap();
        assert_eq!(package_dir(pkg, false, &[], &[]).unwrap(), dir.path());
    }

    #[test]
    fn fetch_arguments() {
        let args = get_args(
            "github.com/x/cmap",
            &["-u".to_string(), String::new()],
            &["genx".to_string(), "genx_kt_string".to_string()],
        );
        assert_eq!(
            args,
            ["get", "-u", "-tags", "genx,genx_kt_string", "github.com/x/cmap"]
        );
    }
}
