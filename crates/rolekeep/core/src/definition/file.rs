// Rolekeep
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Definition files
//!
//! Every `*.toml` file in a directory may declare `[[resource_roles]]` and
//! `[[row_level_roles]]` tables. Files are read in name order on every call,
//! so edits become visible on the next provider refresh. Parsed files are
//! kept keyed by their content, so the two role kinds share one parse.

use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::{ResourceRoleDefinition, RoleDefinitionSource, RowLevelRoleDefinition};
use crate::error::{RoleError, RoleResult};

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DefinitionFile {
    resource_roles: Vec<ResourceRoleDefinition>,
    row_level_roles: Vec<RowLevelRoleDefinition>,
}

/// Reads role definitions from a directory of TOML files
#[derive(Debug)]
pub struct DirectoryDefinitionSource {
    root: PathBuf,
    parsed: Mutex<HashMap<PathBuf, ParsedFile>>,
}

#[derive(Debug)]
struct ParsedFile {
    content: String,
    file: Arc<DefinitionFile>,
}

impl DirectoryDefinitionSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            parsed: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn definition_files(&self) -> RoleResult<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.root).map_err(|e| io_error(&self.root, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io_error(&self.root, e))?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn load(&self) -> RoleResult<Vec<(String, Arc<DefinitionFile>)>> {
        let files = self.definition_files()?;
        let mut parsed = self.parsed.lock();
        parsed.retain(|path, _| files.contains(path));

        let mut loaded = Vec::with_capacity(files.len());
        for path in files {
            let content = fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
            let cached = parsed.get(&path).filter(|cached| cached.content == content).map(|cached| cached.file.clone());
            let file = match cached {
                Some(file) => file,
                None => {
                    let file: Arc<DefinitionFile> = Arc::new(toml::from_str(&content).map_err(|e| RoleError::SourceParse {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    })?);
                    debug!(
                        "Parsed {} resource and {} row-level role definitions from {}",
                        file.resource_roles.len(),
                        file.row_level_roles.len(),
                        path.display()
                    );
                    parsed.insert(path.clone(), ParsedFile { content, file: file.clone() });
                    file
                }
            };
            loaded.push((path.display().to_string(), file));
        }
        Ok(loaded)
    }
}

impl RoleDefinitionSource for DirectoryDefinitionSource {
    fn resource_role_definitions(&self) -> RoleResult<Vec<ResourceRoleDefinition>> {
        Ok(self
            .load()?
            .into_iter()
            .flat_map(|(origin, file)| file.resource_roles.clone().into_iter().map(move |d| d.with_origin(origin.clone())))
            .collect())
    }

    fn row_level_role_definitions(&self) -> RoleResult<Vec<RowLevelRoleDefinition>> {
        Ok(self
            .load()?
            .into_iter()
            .flat_map(|(origin, file)| file.row_level_roles.clone().into_iter().map(move |d| d.with_origin(origin.clone())))
            .collect())
    }
}

fn io_error(path: &Path, error: std::io::Error) -> RoleError {
    RoleError::SourceIo {
        path: path.display().to_string(),
        reason: error.to_string(),
    }
}
