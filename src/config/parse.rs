//! Project file discovery, parsing and import flattening

use crate::config::types::{ProjectDefinition, ProjectFile, SourceElement};
use crate::error::{ConfigError, ConfigResult, RbuildError};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default project file names to search for
pub const PROJECT_FILE_NAMES: &[&str] = &["rbuild.yml", "rbuild.yaml"];

/// Find the project file by searching current and parent directories
pub fn find_project_file() -> ConfigResult<PathBuf> {
    find_project_file_from(env::current_dir().map_err(|e| {
        ConfigError::Invalid(format!("Failed to get current directory: {}", e))
    })?)
}

/// Find the project file starting from a specific directory
pub fn find_project_file_from(start_dir: PathBuf) -> ConfigResult<PathBuf> {
    let mut current_dir = start_dir;
    let mut searched_paths = Vec::new();

    loop {
        for file_name in PROJECT_FILE_NAMES {
            let project_path = current_dir.join(file_name);
            searched_paths.push(project_path.display().to_string());

            if project_path.is_file() {
                return Ok(project_path);
            }
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => return Err(ConfigError::NotFound(searched_paths.join(", "))),
        }
    }
}

/// Parse a project file from a path, resolving its imports
pub fn parse_project_file(path: &Path) -> Result<ProjectDefinition, RbuildError> {
    let full_path = absolute(path)?;
    let mut chain = Vec::new();
    let file = load_file(&full_path)?;

    let mut elements = Vec::new();
    flatten(&file, &full_path, &mut chain, &mut elements)?;

    Ok(ProjectDefinition {
        path: full_path,
        name: file.name,
        default_targets: file.default_targets,
        initial_targets: file.initial_targets,
        elements,
    })
}

/// Parse a project from a string; imports resolve relative to `project_path`
pub fn parse_project(yaml: &str, project_path: &Path) -> Result<ProjectDefinition, RbuildError> {
    let file: ProjectFile = serde_yaml::from_str(yaml)?;
    let full_path = absolute(project_path)?;

    let mut chain = Vec::new();
    let mut elements = Vec::new();
    flatten(&file, &full_path, &mut chain, &mut elements)?;

    Ok(ProjectDefinition {
        path: full_path,
        name: file.name,
        default_targets: file.default_targets,
        initial_targets: file.initial_targets,
        elements,
    })
}

/// Parse project with automatic file discovery
pub fn parse_project_auto() -> Result<ProjectDefinition, RbuildError> {
    let path = find_project_file()?;
    parse_project_file(&path)
}

fn absolute(path: &Path) -> Result<PathBuf, RbuildError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

fn load_file(path: &Path) -> Result<ProjectFile, RbuildError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Import {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    let file: ProjectFile = serde_yaml::from_str(&contents)?;
    Ok(file)
}

/// Splice imported elements (depth first) ahead of the file's own elements
fn flatten(
    file: &ProjectFile,
    path: &Path,
    chain: &mut Vec<PathBuf>,
    out: &mut Vec<SourceElement>,
) -> Result<(), RbuildError> {
    if chain.iter().any(|p| p == path) {
        let mut names: Vec<String> = chain.iter().map(|p| p.display().to_string()).collect();
        names.push(path.display().to_string());
        return Err(ConfigError::CircularImport(names.join(" -> ")).into());
    }
    chain.push(path.to_path_buf());

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    for import in &file.imports {
        let import_path = base_dir.join(import);
        let imported = load_file(&import_path).map_err(|e| match e {
            RbuildError::Yaml(err) => RbuildError::Config(ConfigError::Import {
                path: import_path.clone(),
                error: err.to_string(),
            }),
            other => other,
        })?;
        tracing::debug!(file = %import_path.display(), "importing project fragment");
        flatten(&imported, &import_path, chain, out)?;
    }

    out.extend(file.elements.iter().cloned().map(|element| SourceElement {
        element,
        file: path.to_path_buf(),
    }));

    chain.pop();
    Ok(())
}
