//! Build pipeline steps 2-3 (spec.md §4.6): materialize a build directory
//! for the wrapped source, invoke the native toolchain producing a cdylib,
//! place the artifact in the fingerprint-keyed cache.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use deployd_core::EngineError;

use crate::fingerprint::fingerprint;
use crate::wrap::{wrap_source, wrapped_manifest};

pub struct Builder {
    /// Root of the per-collection plugin cache directory.
    cache_dir: PathBuf,
    /// Path to the `deployd-plugin` crate, for the generated manifest's
    /// path dependency.
    deployd_plugin_path: PathBuf,
}

impl Builder {
    pub fn new(cache_dir: impl Into<PathBuf>, deployd_plugin_path: impl Into<PathBuf>) -> Self {
        Builder {
            cache_dir: cache_dir.into(),
            deployd_plugin_path: deployd_plugin_path.into(),
        }
    }

    fn artifact_path(&self, fp: &str) -> PathBuf {
        self.cache_dir.join(fp).join(cdylib_file_name(fp))
    }

    /// Returns the cached artifact path if one already exists for `source`'s
    /// fingerprint (spec.md §4.6 step 2).
    pub fn cached_artifact(&self, source: &str) -> Option<PathBuf> {
        let fp = fingerprint(source);
        let path = self.artifact_path(&fp);
        path.exists().then_some(path)
    }

    /// Builds `source` if no cached artifact exists, returning the artifact
    /// path either way.
    pub async fn build(&self, collection: &str, hook: &str, source: &str) -> Result<PathBuf, EngineError> {
        let fp = fingerprint(source);
        let artifact = self.artifact_path(&fp);
        if artifact.exists() {
            return Ok(artifact);
        }

        let build_dir = self.cache_dir.join(&fp).join("build");
        tokio::fs::create_dir_all(build_dir.join("src"))
            .await
            .map_err(|e| EngineError::Build(e.to_string()))?;

        let package_name = format!("hook_{collection}_{hook}_{}", &fp[..12]);
        let manifest = wrapped_manifest(&package_name, &self.deployd_plugin_path.to_string_lossy());
        tokio::fs::write(build_dir.join("Cargo.toml"), manifest)
            .await
            .map_err(|e| EngineError::Build(e.to_string()))?;
        tokio::fs::write(build_dir.join("src").join("lib.rs"), wrap_source(source))
            .await
            .map_err(|e| EngineError::Build(e.to_string()))?;

        let manifest_path = build_dir.join("Cargo.toml");
        let output = Command::new("cargo")
            .arg("build")
            .arg("--release")
            .arg("--manifest-path")
            .arg(&manifest_path)
            .arg("--target-dir")
            .arg(build_dir.join("target"))
            .output()
            .await
            .map_err(|e| EngineError::Build(format!("failed to spawn build toolchain: {e}")))?;

        if !output.status.success() {
            return Err(EngineError::Build(String::from_utf8_lossy(&output.stderr).into_owned()));
        }

        let built = build_dir
            .join("target")
            .join("release")
            .join(cdylib_file_name(&package_name));
        tokio::fs::create_dir_all(artifact.parent().unwrap())
            .await
            .map_err(|e| EngineError::Build(e.to_string()))?;
        tokio::fs::copy(&built, &artifact)
            .await
            .map_err(|e| EngineError::Build(format!("artifact missing after build: {e}")))?;

        Ok(artifact)
    }
}

fn cdylib_file_name(stem: &str) -> String {
    #[cfg(target_os = "macos")]
    {
        format!("lib{stem}.dylib")
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        format!("lib{stem}.so")
    }
    #[cfg(windows)]
    {
        format!("{stem}.dll")
    }
}

pub fn artifact_exists(path: &Path) -> bool {
    path.exists()
}
