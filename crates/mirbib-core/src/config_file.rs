use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{CoreError, PipelineOptions, TextField};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub reference: Option<ReferenceConfig>,
    pub extraction: Option<ExtractionConfig>,
    pub aggregation: Option<AggregationConfig>,
    pub ingest: Option<IngestConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceConfig {
    pub precursors_path: Option<String>,
    pub mature_path: Option<String>,
    /// Species marker; an empty string means every species.
    pub organism: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub policy: Option<String>,
    pub split: Option<String>,
    pub fields: Option<Vec<String>>,
    pub parallel: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    pub top_n: Option<usize>,
    pub min_authors: Option<usize>,
    pub top_authors: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Column naming of the corpus export: `scopus` or `bibliometrix`.
    pub preset: Option<String>,
}

/// Platform config directory path: `<config_dir>/mirbib/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mirbib").join("config.toml"))
}

/// Load config by cascading CWD `.mirbib.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".mirbib.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed; a parse failure is logged.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    match read_config(path) {
        Ok(config) => Some(config),
        Err(CoreError::ConfigRead { .. }) => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring config file");
            None
        }
    }
}

/// Read a config that the user pointed at explicitly; any failure is an error.
pub fn read_config(path: &Path) -> Result<ConfigFile, CoreError> {
    let content = std::fs::read_to_string(path).map_err(|source| CoreError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| CoreError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Overlay's value when present, otherwise base's.
fn pick<S, T>(overlay: Option<&S>, base: Option<&S>, field: impl Fn(&S) -> Option<T>) -> Option<T> {
    overlay.and_then(&field).or_else(|| base.and_then(&field))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let (br, or) = (base.reference.as_ref(), overlay.reference.as_ref());
    let (be, oe) = (base.extraction.as_ref(), overlay.extraction.as_ref());
    let (ba, oa) = (base.aggregation.as_ref(), overlay.aggregation.as_ref());
    let (bi, oi) = (base.ingest.as_ref(), overlay.ingest.as_ref());

    ConfigFile {
        reference: Some(ReferenceConfig {
            precursors_path: pick(or, br, |r| r.precursors_path.clone()),
            mature_path: pick(or, br, |r| r.mature_path.clone()),
            organism: pick(or, br, |r| r.organism.clone()),
        }),
        extraction: Some(ExtractionConfig {
            policy: pick(oe, be, |e| e.policy.clone()),
            split: pick(oe, be, |e| e.split.clone()),
            fields: pick(oe, be, |e| e.fields.clone()),
            parallel: pick(oe, be, |e| e.parallel),
        }),
        aggregation: Some(AggregationConfig {
            top_n: pick(oa, ba, |a| a.top_n),
            min_authors: pick(oa, ba, |a| a.min_authors),
            top_authors: pick(oa, ba, |a| a.top_authors),
        }),
        ingest: Some(IngestConfig {
            preset: pick(oi, bi, |i| i.preset.clone()),
        }),
    }
}

impl ConfigFile {
    /// Pipeline options from the `[extraction]` section, defaults for
    /// anything unset. Unknown values are rejected.
    pub fn pipeline_options(&self) -> Result<PipelineOptions, CoreError> {
        let mut options = PipelineOptions::default();
        let Some(extraction) = &self.extraction else {
            return Ok(options);
        };

        if let Some(policy) = &extraction.policy {
            options.policy = policy.parse()?;
        }
        if let Some(split) = &extraction.split {
            options.split = split.parse()?;
        }
        if let Some(fields) = &extraction.fields {
            options.fields = fields
                .iter()
                .map(|f| f.parse::<TextField>())
                .collect::<Result<_, _>>()?;
        }
        if let Some(parallel) = extraction.parallel {
            options.parallel = parallel;
        }
        Ok(options)
    }
}
