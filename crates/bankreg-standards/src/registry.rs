use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use bankreg_model::{SchemaModel, SchemaNode, VocabularyRegistry};
use tracing::info;

use crate::bindings::load_bindings;
use crate::error::StandardsError;
use crate::hash::sha256_hex;
use crate::manifest::{Manifest, ManifestFile};
use crate::vocabulary::load_vocabularies;
use crate::xsd::load_xsd;

const MANIFEST_SCHEMA: &str = "bankreg.standards-manifest";

const REQUIRED_ROLES: &[&str] = &["schema", "bindings"];

const OPTIONAL_ROLES: &[&str] = &["vocabularies", "rules"];

const ALLOWED_KINDS: &[&str] = &["xsd", "csv", "toml"];

#[derive(Debug, Clone, serde::Serialize)]
pub struct VerifySummary {
    pub standards_dir: PathBuf,
    pub file_count: usize,
    pub root_element: String,
    pub target_namespace: Option<String>,
    pub element_count: usize,
    pub section_count: usize,
    pub vocabulary_count: usize,
    pub batch_key: String,
    pub rules_file: Option<PathBuf>,
}

/// A verified standards directory: schema model with bindings, vocabularies
/// and the location of the rule set.
#[derive(Debug, Clone)]
pub struct StandardsRegistry {
    pub manifest: Manifest,
    pub standards_dir: PathBuf,
    pub schema_path: PathBuf,
    pub schema: SchemaModel,
    pub vocabularies: VocabularyRegistry,
    pub rules_path: Option<PathBuf>,
}

impl StandardsRegistry {
    pub fn verify_and_load(standards_dir: &Path) -> Result<(Self, VerifySummary), StandardsError> {
        let manifest = load_manifest(&standards_dir.join("manifest.toml"))?;

        validate_manifest(&manifest, standards_dir)?;

        let mut files = manifest.files.clone();
        files.sort_by(|a, b| a.path.cmp(&b.path));

        for file in &files {
            verify_file(standards_dir, file)?;
        }

        let schema_path = resolve_role_path(standards_dir, &files, "schema")?;
        let root = load_xsd(&schema_path)?;
        let bindings_path = resolve_role_path(standards_dir, &files, "bindings")?;
        let sections = load_bindings(&bindings_path)?;
        let schema = SchemaModel::new(root, sections).map_err(|source| StandardsError::Model {
            path: bindings_path.clone(),
            source,
        })?;

        let vocabularies = match find_role_path(standards_dir, &files, "vocabularies") {
            Some(path) => load_vocabularies(&path)?,
            None => VocabularyRegistry::new(),
        };
        let rules_path = find_role_path(standards_dir, &files, "rules");

        let summary = VerifySummary {
            standards_dir: standards_dir.to_path_buf(),
            file_count: files.len(),
            root_element: schema.root().name.clone(),
            target_namespace: schema.target_namespace().map(str::to_string),
            element_count: count_elements(schema.root()),
            section_count: schema.bindings().sections().len(),
            vocabulary_count: vocabularies.len(),
            batch_key: manifest.batch.key_field.clone(),
            rules_file: rules_path.clone(),
        };
        info!(
            standards_dir = %standards_dir.display(),
            elements = summary.element_count,
            sections = summary.section_count,
            vocabularies = summary.vocabulary_count,
            "standards loaded"
        );

        Ok((
            Self {
                manifest,
                standards_dir: standards_dir.to_path_buf(),
                schema_path,
                schema,
                vocabularies,
                rules_path,
            },
            summary,
        ))
    }

    /// Field that splits records into one report per entity.
    pub fn batch_key(&self) -> &str {
        &self.manifest.batch.key_field
    }
}

fn count_elements(node: &SchemaNode) -> usize {
    1 + node.children().iter().map(count_elements).sum::<usize>()
}

fn load_manifest(path: &Path) -> Result<Manifest, StandardsError> {
    let contents = std::fs::read_to_string(path).map_err(|e| StandardsError::io(path, e))?;
    toml::from_str(&contents).map_err(|e| StandardsError::Toml {
        path: path.to_path_buf(),
        source: e,
    })
}

fn validate_manifest(manifest: &Manifest, standards_dir: &Path) -> Result<(), StandardsError> {
    if manifest.manifest.schema != MANIFEST_SCHEMA {
        return Err(StandardsError::InvalidManifest {
            message: format!("unsupported schema: {}", manifest.manifest.schema),
        });
    }
    if manifest.manifest.schema_version != 1 {
        return Err(StandardsError::InvalidManifest {
            message: format!(
                "unsupported schema_version: {}",
                manifest.manifest.schema_version
            ),
        });
    }
    if manifest.batch.key_field.trim().is_empty() {
        return Err(StandardsError::InvalidManifest {
            message: "batch.key_field must not be empty".to_string(),
        });
    }

    let mut roles: BTreeSet<&str> = BTreeSet::new();
    let mut manifest_paths: BTreeSet<PathBuf> = BTreeSet::new();

    for file in &manifest.files {
        if !roles.insert(file.role.as_str()) {
            return Err(StandardsError::DuplicateRole {
                role: file.role.clone(),
            });
        }
        if !REQUIRED_ROLES.contains(&file.role.as_str())
            && !OPTIONAL_ROLES.contains(&file.role.as_str())
        {
            return Err(StandardsError::InvalidManifest {
                message: format!("unknown role '{}' for {}", file.role, file.path),
            });
        }
        if !ALLOWED_KINDS.contains(&file.kind.as_str()) {
            return Err(StandardsError::InvalidManifest {
                message: format!("unsupported kind '{}' for {}", file.kind, file.path),
            });
        }

        validate_sha(&file.sha256, &file.path)?;

        let path = validate_path(&file.path)?;
        manifest_paths.insert(normalize_path(&path));
    }

    for role in REQUIRED_ROLES {
        if !roles.contains(role) {
            return Err(StandardsError::MissingRole {
                role: role.to_string(),
            });
        }
    }

    for path in list_files_under(standards_dir)? {
        if path == Path::new("manifest.toml") {
            continue;
        }
        if !manifest_paths.contains(&normalize_path(&path)) {
            return Err(StandardsError::UnexpectedFile {
                path: standards_dir.join(path),
            });
        }
    }

    Ok(())
}

fn verify_file(standards_dir: &Path, file: &ManifestFile) -> Result<(), StandardsError> {
    let full_path = standards_dir.join(&file.path);
    let bytes = std::fs::read(&full_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StandardsError::MissingFile {
                path: full_path.clone(),
            }
        } else {
            StandardsError::io(full_path.clone(), e)
        }
    })?;

    let actual = sha256_hex(&bytes);
    let expected = file.sha256.to_ascii_lowercase();
    if actual != expected {
        return Err(StandardsError::Sha256Mismatch {
            path: full_path,
            expected,
            actual,
        });
    }
    Ok(())
}

fn find_role_path(standards_dir: &Path, files: &[ManifestFile], role: &str) -> Option<PathBuf> {
    files
        .iter()
        .find(|f| f.role == role)
        .map(|f| standards_dir.join(&f.path))
}

fn resolve_role_path(
    standards_dir: &Path,
    files: &[ManifestFile],
    role: &str,
) -> Result<PathBuf, StandardsError> {
    find_role_path(standards_dir, files, role).ok_or_else(|| StandardsError::MissingRole {
        role: role.to_string(),
    })
}

fn validate_sha(sha: &str, path: &str) -> Result<(), StandardsError> {
    if sha.len() != 64 || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(StandardsError::InvalidSha256 {
            path: PathBuf::from(path),
            message: "sha256 must be 64 hex characters".to_string(),
        });
    }
    Ok(())
}

fn validate_path(path: &str) -> Result<PathBuf, StandardsError> {
    if path.contains('\\') {
        return Err(StandardsError::InvalidPath {
            path: PathBuf::from(path),
            message: "manifest path must use '/' separators".to_string(),
        });
    }

    let p = PathBuf::from(path);
    if p.is_absolute() {
        return Err(StandardsError::InvalidPath {
            path: p,
            message: "manifest path must be relative".to_string(),
        });
    }

    if p.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(StandardsError::InvalidPath {
            path: p,
            message: "manifest path must not traverse out of standards/".to_string(),
        });
    }

    Ok(p)
}

fn list_files_under(root: &Path) -> Result<BTreeSet<PathBuf>, StandardsError> {
    let mut stack = vec![root.to_path_buf()];
    let mut files = BTreeSet::new();

    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).map_err(|e| StandardsError::io(&dir, e))? {
            let entry = entry.map_err(|e| StandardsError::io(&dir, e))?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.is_file() {
                let rel = path
                    .strip_prefix(root)
                    .map_err(|e| StandardsError::InvalidPath {
                        path: path.clone(),
                        message: format!("failed to relativize path: {e}"),
                    })?
                    .to_path_buf();
                files.insert(rel);
            }
        }
    }

    Ok(files)
}

fn normalize_path(p: &Path) -> PathBuf {
    p.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| c.as_os_str())
        .collect()
}
