//! Directory-backed dataset.
//!
//! ```text
//! <root>/organisms.tsv                      id  name
//! <root>/<ns>/<org>/nodes.txt               one node id per line, row order
//! <root>/<ns>/<org>/networks.tsv            id  group_id  name  default  tags
//! <root>/<ns>/<org>/networks/<id>.txt       node_a  node_b  [weight]
//! <root>/<ns>/<org>/attribute_groups.tsv    id  name
//! <root>/<ns>/<org>/attributes/<id>.txt     node  attribute_id  [value]
//! ```
//!
//! Fields are tab separated. Blank lines and lines starting with `#` are
//! skipped. `default` is `1`/`0` or `true`/`false`; `tags` is a comma
//! separated list of `BP`, `MF`, `CC` or `-`.

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, warn};

use super::Dataset;
use crate::matrix::{network_kernel, AttributeMatrix, SymMatrix};
use crate::node_index::NodeIndex;
use crate::types::{
    AttributeGroupId, AttributeGroupInfo, FusionError, FusionResult, NetworkId, NetworkInfo,
    NodeId, OntologyBranch, OrganismId, OrganismInfo, OrganismRef,
};

/// One parsed line: 1-based line number and its tab separated fields
type Record = (usize, Vec<String>);

/// Dataset read from a directory tree of tab separated files.
#[derive(Debug, Clone)]
pub struct FileDataset {
    root: PathBuf,
}

impl FileDataset {
    /// Open a dataset rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::DataStore`] if `root` is not a directory.
    pub fn open<P: AsRef<Path>>(root: P) -> FusionResult<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(FusionError::DataStore(format!(
                "dataset root {} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn organism_dir(&self, organism: &OrganismRef) -> PathBuf {
        self.root
            .join(&organism.namespace)
            .join(organism.organism_id.to_string())
    }

    /// Every organism listed in `organisms.tsv`
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::DataStore`] or [`FusionError::Parse`] if the
    /// listing is missing or malformed.
    pub fn organisms(&self) -> FusionResult<Vec<OrganismInfo>> {
        let path = self.root.join("organisms.tsv");
        read_records(&path)?
            .into_iter()
            .map(|(line, fields)| {
                Ok(OrganismInfo {
                    id: parse_field(&path, line, &fields, 0)?,
                    name: fields.get(1).cloned().unwrap_or_default(),
                })
            })
            .collect()
    }
}

/// Read non-empty, non-comment lines split on tabs
fn read_records(path: &Path) -> FusionResult<Vec<Record>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => FusionError::DataStore(format!("missing {}", path.display())),
        _ => FusionError::Io(e),
    })?;

    let mut records = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields = trimmed.split('\t').map(|f| f.trim().to_string()).collect();
        records.push((number + 1, fields));
    }
    Ok(records)
}

fn parse_field<T: FromStr>(path: &Path, line: usize, fields: &[String], position: usize) -> FusionResult<T> {
    let raw = fields.get(position).ok_or_else(|| {
        FusionError::Parse(format!("{}:{line}: missing field {}", path.display(), position + 1))
    })?;
    raw.parse().map_err(|_| {
        FusionError::Parse(format!(
            "{}:{line}: cannot parse field {} ({raw:?})",
            path.display(),
            position + 1
        ))
    })
}

/// Optional numeric field, `1.0` when absent
fn parse_weight(path: &Path, line: usize, fields: &[String], position: usize) -> FusionResult<f64> {
    if fields.len() > position {
        parse_field(path, line, fields, position)
    } else {
        Ok(1.0)
    }
}

fn parse_flag(raw: Option<&String>) -> bool {
    matches!(
        raw.map(|s| s.to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "default")
    )
}

fn parse_tags(raw: Option<&String>) -> Vec<OntologyBranch> {
    raw.map(|tags| tags.split(',').filter_map(OntologyBranch::from_tag).collect())
        .unwrap_or_default()
}

impl Dataset for FileDataset {
    fn organism(&self, organism_id: OrganismId) -> FusionResult<OrganismInfo> {
        self.organisms()?
            .into_iter()
            .find(|organism| organism.id == organism_id)
            .ok_or_else(|| FusionError::DataStore(format!("unknown organism {organism_id}")))
    }

    fn node_ids(&self, organism: &OrganismRef) -> FusionResult<Vec<NodeId>> {
        let path = self.organism_dir(organism).join("nodes.txt");
        read_records(&path)?
            .iter()
            .map(|(line, fields)| parse_field(&path, *line, fields, 0))
            .collect()
    }

    fn networks(&self, organism: &OrganismRef) -> FusionResult<Vec<NetworkInfo>> {
        let path = self.organism_dir(organism).join("networks.tsv");
        read_records(&path)?
            .iter()
            .map(|(line, fields)| {
                Ok(NetworkInfo {
                    id: parse_field(&path, *line, fields, 0)?,
                    group_id: parse_field(&path, *line, fields, 1)?,
                    name: fields.get(2).cloned().unwrap_or_default(),
                    is_default: parse_flag(fields.get(3)),
                    tags: parse_tags(fields.get(4)),
                })
            })
            .collect()
    }

    fn attribute_groups(&self, organism: &OrganismRef) -> FusionResult<Vec<AttributeGroupInfo>> {
        let path = self.organism_dir(organism).join("attribute_groups.tsv");
        if !path.exists() && self.organism_dir(organism).is_dir() {
            return Ok(Vec::new());
        }
        read_records(&path)?
            .iter()
            .map(|(line, fields)| {
                Ok(AttributeGroupInfo {
                    id: parse_field(&path, *line, fields, 0)?,
                    name: fields.get(1).cloned().unwrap_or_default(),
                })
            })
            .collect()
    }

    fn kernel(
        &self,
        organism: &OrganismRef,
        network_id: NetworkId,
        nodes: &NodeIndex,
    ) -> FusionResult<SymMatrix> {
        let path = self
            .organism_dir(organism)
            .join("networks")
            .join(format!("{network_id}.txt"));
        let mut edges = Vec::new();
        let mut skipped = 0usize;
        for (line, fields) in read_records(&path)? {
            let a: NodeId = parse_field(&path, line, &fields, 0)?;
            let b: NodeId = parse_field(&path, line, &fields, 1)?;
            let weight = parse_weight(&path, line, &fields, 2)?;
            match (nodes.index_of(a), nodes.index_of(b)) {
                (Ok(row), Ok(column)) => edges.push((row, column, weight)),
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!(network = network_id, skipped, "interactions with unknown nodes ignored");
        }
        debug!(network = network_id, edges = edges.len(), "loaded network");
        network_kernel(nodes.len(), edges)
    }

    fn attributes(
        &self,
        organism: &OrganismRef,
        group_id: AttributeGroupId,
        nodes: &NodeIndex,
    ) -> FusionResult<AttributeMatrix> {
        let path = self
            .organism_dir(organism)
            .join("attributes")
            .join(format!("{group_id}.txt"));
        let mut assignments = Vec::new();
        for (line, fields) in read_records(&path)? {
            let node: NodeId = parse_field(&path, line, &fields, 0)?;
            let attribute = parse_field(&path, line, &fields, 1)?;
            let value = parse_weight(&path, line, &fields, 2)?;
            if let Ok(row) = nodes.index_of(node) {
                assignments.push((row, attribute, value));
            }
        }
        AttributeMatrix::from_assignments(nodes.len(), assignments)
    }
}
