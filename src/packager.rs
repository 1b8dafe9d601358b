use crate::{
    errors::PackageError,
    types::{Artifact, ModuleSource},
    utils::archive_key,
};
use async_trait::async_trait;
use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

/// Name of the entry point of custom runtimes. Packaged as executable.
const BOOTSTRAP_FILE_NAME: &str = "bootstrap";

/// Turns a module into a deployable archive.
#[async_trait]
pub trait Packager: Send + Sync {
    async fn create_package(
        &self,
        module: &ModuleSource,
        source_file: &Path,
    ) -> Result<Artifact, PackageError>;
}

/// Zips every non-hidden file under the module root into
/// `<output_dir>/<module-name>.zip`.
///
/// Two modules with the same name share an archive path, so they must not be
/// packaged at the same time.
#[derive(Debug, Clone)]
pub struct ZipPackager {
    output_dir: PathBuf,
}

impl ZipPackager {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl Packager for ZipPackager {
    async fn create_package(
        &self,
        module: &ModuleSource,
        source_file: &Path,
    ) -> Result<Artifact, PackageError> {
        let module = module.clone();
        let source_file = source_file.to_path_buf();
        let output_dir = self.output_dir.clone();

        tokio::task::spawn_blocking(move || package_module(&module, &source_file, &output_dir))
            .await?
    }
}

fn package_module(
    module: &ModuleSource,
    source_file: &Path,
    output_dir: &Path,
) -> Result<Artifact, PackageError> {
    if !module.root.is_dir() {
        return Err(PackageError::ModuleRoot(module.root.clone()));
    }
    let root = module.root.canonicalize()?;

    let source_file = if source_file.is_relative() {
        root.join(source_file)
    } else {
        source_file.to_path_buf()
    };
    if !source_file.is_file() {
        return Err(PackageError::SourceNotFound(source_file));
    }
    let source_file = source_file.canonicalize()?;
    if !source_file.starts_with(&root) {
        return Err(PackageError::SourceOutsideModule { source_file, root });
    }

    fs::create_dir_all(output_dir)?;
    let output_dir = output_dir.canonicalize()?;
    let location = output_dir.join(archive_key(&module.name));

    let mut files = Vec::new();
    collect_files(&root, &output_dir, &mut files)?;

    tracing::debug!(module = %module.name, files = files.len(), "Zipping module.");

    let mut zip = ZipWriter::new(File::create(&location)?);
    for file in &files {
        let Ok(relative) = file.strip_prefix(&root) else {
            continue;
        };
        let entry_name = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let permissions = if relative.file_name().and_then(|name| name.to_str())
            == Some(BOOTSTRAP_FILE_NAME)
        {
            0o755
        } else {
            0o644
        };
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(permissions);

        zip.start_file(entry_name, options)?;
        io::copy(&mut File::open(file)?, &mut zip)?;
    }
    zip.finish()?;

    tracing::info!(module = %module.name, location = %location.display(), "Module packaged.");

    Ok(Artifact { location })
}

/// Collects files depth-first in name order, skipping hidden entries, the
/// output directory and symlinked directories.
fn collect_files(dir: &Path, output_dir: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.path());

    for entry in entries {
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden || path == output_dir {
            continue;
        }

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&path, output_dir, files)?;
        } else if file_type.is_file() || (file_type.is_symlink() && path.is_file()) {
            files.push(path);
        } else if file_type.is_symlink() {
            tracing::debug!(path = %path.display(), "Skipping symlink.");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn entry_names(location: &Path) -> Vec<String> {
        let mut archive = ZipArchive::new(File::open(location).unwrap()).unwrap();
        (0..archive.len())
            .map(|index| archive.by_index(index).unwrap().name().to_string())
            .collect()
    }

    #[tokio::test]
    async fn packages_module_files_under_module_name() {
        let module_dir = tempfile::tempdir().unwrap();
        let output_dir = tempfile::tempdir().unwrap();
        write(module_dir.path(), "src/handler.py", "def go(event, ctx): pass");
        write(module_dir.path(), "lib/util.py", "X = 1");
        write(module_dir.path(), ".git/HEAD", "ref: refs/heads/main");

        let packager = ZipPackager::new(output_dir.path());
        let module = ModuleSource::new("fn1", module_dir.path());
        let artifact = packager
            .create_package(&module, Path::new("src/handler.py"))
            .await
            .unwrap();

        assert_eq!(artifact.location.file_name().unwrap(), "fn1.zip");
        assert_eq!(
            entry_names(&artifact.location),
            vec!["lib/util.py", "src/handler.py"]
        );

        let mut archive = ZipArchive::new(File::open(&artifact.location).unwrap()).unwrap();
        let mut contents = String::new();
        archive
            .by_name("lib/util.py")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "X = 1");
    }

    #[tokio::test]
    async fn bootstrap_is_executable() {
        let module_dir = tempfile::tempdir().unwrap();
        let output_dir = tempfile::tempdir().unwrap();
        write(module_dir.path(), "bootstrap", "#!/bin/sh");

        let packager = ZipPackager::new(output_dir.path());
        let module = ModuleSource::new("custom", module_dir.path());
        let artifact = packager
            .create_package(&module, Path::new("bootstrap"))
            .await
            .unwrap();

        let mut archive = ZipArchive::new(File::open(&artifact.location).unwrap()).unwrap();
        let mode = archive.by_name("bootstrap").unwrap().unix_mode().unwrap();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[tokio::test]
    async fn output_dir_inside_module_is_not_packaged() {
        let module_dir = tempfile::tempdir().unwrap();
        write(module_dir.path(), "handler.js", "exports.go = () => {}");
        let output_dir = module_dir.path().join("dist");

        let packager = ZipPackager::new(&output_dir);
        let module = ModuleSource::new("fn1", module_dir.path());
        packager
            .create_package(&module, Path::new("handler.js"))
            .await
            .unwrap();
        let artifact = packager
            .create_package(&module, Path::new("handler.js"))
            .await
            .unwrap();

        assert_eq!(entry_names(&artifact.location), vec!["handler.js"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_directories_are_not_followed() {
        let module_dir = tempfile::tempdir().unwrap();
        let output_dir = tempfile::tempdir().unwrap();
        write(module_dir.path(), "handler.py", "def go(event, ctx): pass");
        write(module_dir.path(), "shared/config.py", "X = 1");
        std::os::unix::fs::symlink(".", module_dir.path().join("loop")).unwrap();
        std::os::unix::fs::symlink("shared", module_dir.path().join("linked")).unwrap();
        std::os::unix::fs::symlink("handler.py", module_dir.path().join("alias.py")).unwrap();

        let packager = ZipPackager::new(output_dir.path());
        let module = ModuleSource::new("fn1", module_dir.path());
        let artifact = packager
            .create_package(&module, Path::new("handler.py"))
            .await
            .unwrap();

        assert_eq!(
            entry_names(&artifact.location),
            vec!["alias.py", "handler.py", "shared/config.py"]
        );
    }

    #[tokio::test]
    async fn missing_source_file_is_rejected() {
        let module_dir = tempfile::tempdir().unwrap();
        let output_dir = tempfile::tempdir().unwrap();

        let packager = ZipPackager::new(output_dir.path());
        let module = ModuleSource::new("fn1", module_dir.path());
        let error = packager
            .create_package(&module, Path::new("missing.py"))
            .await
            .unwrap_err();

        assert!(matches!(error, PackageError::SourceNotFound(_)));
    }

    #[tokio::test]
    async fn source_outside_module_is_rejected() {
        let module_dir = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        write(elsewhere.path(), "handler.py", "");

        let packager = ZipPackager::new(elsewhere.path().join("out"));
        let module = ModuleSource::new("fn1", module_dir.path());
        let error = packager
            .create_package(&module, &elsewhere.path().join("handler.py"))
            .await
            .unwrap_err();

        assert!(matches!(error, PackageError::SourceOutsideModule { .. }));
    }
}
