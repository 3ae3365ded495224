//! Query file parsing.
//!
//! A query file holds one field per line, tab separated within the line:
//!
//! ```text
//! 1. organism id
//! 2. query gene ids
//! 3. networks: `default`, `all`, or `|` separated groups of `,` separated ids
//! 4. result limit
//! 5. combining method
//! 6. attribute group ids (optional)
//! 7. attribute limit (optional)
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use netfuse_core::constants::DEFAULT_ATTRIBUTE_LIMIT;
use netfuse_core::types::{AttributeGroupId, NetworkId, NodeId, OrganismId};
use netfuse_core::{CombiningMethod, FusionError, FusionResult, OrganismRef, Request};

/// Which networks a query asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkSpec {
    Default,
    All,
    Groups(Vec<Vec<NetworkId>>),
}

impl FromStr for NetworkSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "default" => return Ok(Self::Default),
            "all" => return Ok(Self::All),
            _ => {}
        }
        let groups = s
            .split('|')
            .map(|group| split_ids::<NetworkId>(group))
            .filter(|group| !matches!(group, Ok(ids) if ids.is_empty()))
            .collect::<Result<Vec<_>, _>>()?;
        if groups.is_empty() {
            return Err(format!("no network ids in '{s}'"));
        }
        Ok(Self::Groups(groups))
    }
}

/// A parsed query file.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFile {
    pub organism_id: OrganismId,
    pub genes: Vec<NodeId>,
    pub networks: NetworkSpec,
    pub result_limit: usize,
    pub combining_method: CombiningMethod,
    pub attribute_groups: Vec<AttributeGroupId>,
    pub attribute_limit: usize,
}

impl QueryFile {
    pub fn read(path: &Path) -> FusionResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text).map_err(|(line, message)| {
            FusionError::Parse(format!("{}:{line}: {message}", path.display()))
        })
    }

    /// Parse query text, reporting errors with their 1-based line number
    pub fn parse(text: &str) -> Result<Self, (usize, String)> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
            .filter(|(_, line)| !line.trim().is_empty() && !line.trim_start().starts_with('#'));
        let last_line = text.lines().count().max(1);

        let mut field = |name: &str| {
            lines
                .next()
                .ok_or_else(|| (last_line, format!("missing {name}")))
        };

        let (line, raw) = field("organism id")?;
        let organism_id = parse_one(raw).map_err(|e| (line, e))?;

        let (line, raw) = field("query genes")?;
        let genes = split_ids(raw).map_err(|e| (line, e))?;
        if genes.is_empty() {
            return Err((line, "no query genes".to_string()));
        }

        let (line, raw) = field("networks")?;
        let networks = raw.parse().map_err(|e| (line, e))?;

        let (line, raw) = field("result limit")?;
        let result_limit = parse_one(raw).map_err(|e| (line, e))?;

        let (line, raw) = field("combining method")?;
        let combining_method = raw.trim().parse().map_err(|e: FusionError| (line, e.to_string()))?;

        let attribute_groups = match lines.next() {
            Some((line, raw)) => split_ids(raw).map_err(|e| (line, e))?,
            None => Vec::new(),
        };
        let attribute_limit = match lines.next() {
            Some((line, raw)) => parse_one(raw).map_err(|e| (line, e))?,
            None => DEFAULT_ATTRIBUTE_LIMIT,
        };

        Ok(Self {
            organism_id,
            genes,
            networks,
            result_limit,
            combining_method,
            attribute_groups,
            attribute_limit,
        })
    }

    /// Engine request for this query; `all_networks` resolves
    /// [`NetworkSpec::All`].
    pub fn to_request(&self, all_networks: impl FnOnce() -> FusionResult<Vec<Vec<NetworkId>>>) -> FusionResult<Request> {
        let network_groups = match &self.networks {
            NetworkSpec::Default => Vec::new(),
            NetworkSpec::All => all_networks()?,
            NetworkSpec::Groups(groups) => groups.clone(),
        };
        Ok(Request::new(OrganismRef::core(self.organism_id), self.genes.clone())
            .with_combining_method(self.combining_method)
            .with_networks(network_groups)
            .with_attribute_groups(self.attribute_groups.clone(), self.attribute_limit)
            .with_result_limit(self.result_limit))
    }
}

fn parse_one<T: FromStr>(raw: &str) -> Result<T, String> {
    let value = raw.trim();
    value.parse().map_err(|_| format!("invalid value '{value}'"))
}

fn split_ids<T: FromStr>(raw: &str) -> Result<Vec<T>, String> {
    raw.split(['\t', ','])
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(parse_one)
        .collect()
}
