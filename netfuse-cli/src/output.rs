use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use netfuse_core::types::{NetworkInfo, NodeId};
use netfuse_core::{CombinedNetwork, QueryTask, ResultPolicy, Response};

/// Result file layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Ranked gene ids, one per line
    Genes,
    /// Every non-query gene with its score
    Scores,
    /// The full response as JSON
    Json,
    /// The fused network as `node_a  node_b  weight` lines
    CombinedNetwork,
}

impl OutputFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Genes => "genes.txt",
            Self::Scores => "scores.txt",
            Self::Json => "json",
            Self::CombinedNetwork => "combined-network.txt",
        }
    }

    pub const fn task(self) -> QueryTask {
        match self {
            Self::CombinedNetwork => QueryTask::CombineNetworks,
            Self::Genes | Self::Scores | Self::Json => QueryTask::RankGenes,
        }
    }

    pub const fn result_policy(self) -> ResultPolicy {
        match self {
            Self::Scores => ResultPolicy::AllScores,
            Self::Genes | Self::Json | Self::CombinedNetwork => ResultPolicy::TopScores,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "genes" => Ok(Self::Genes),
            "scores" => Ok(Self::Scores),
            "json" => Ok(Self::Json),
            "combined-network" => Ok(Self::CombinedNetwork),
            other => Err(format!("Invalid output format: {other}")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Genes => "genes",
            Self::Scores => "scores",
            Self::Json => "json",
            Self::CombinedNetwork => "combined-network",
        };
        f.write_str(name)
    }
}

pub fn write_response<W: Write>(writer: &mut W, response: &Response, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::CombinedNetwork => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "a ranking response has no combined network",
            ));
        }
        OutputFormat::Genes => {
            for node in &response.ranked_nodes {
                writeln!(writer, "{}", node.node_id)?;
            }
        }
        OutputFormat::Scores => {
            for node in &response.ranked_nodes {
                writeln!(writer, "{}\t{:.6}", node.node_id, node.score)?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, response)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

/// One line per gene pair with nonzero fused weight
pub fn write_combined_network<W: Write>(writer: &mut W, network: &CombinedNetwork) -> io::Result<()> {
    for edge in &network.interactions {
        writeln!(writer, "{}\t{}\t{}", edge.node_a, edge.node_b, edge.weight)?;
    }
    Ok(())
}

/// Gene ids, one per line
pub fn write_genes<W: Write>(writer: &mut W, genes: &[NodeId]) -> io::Result<()> {
    for gene in genes {
        writeln!(writer, "{gene}")?;
    }
    Ok(())
}

/// One line per network: id, group, name, default flag and ontology tags
pub fn write_networks<W: Write>(writer: &mut W, networks: &[NetworkInfo]) -> io::Result<()> {
    writeln!(writer, "id\tgroup\tname\tdefault\ttags")?;
    for network in networks {
        let tags = if network.tags.is_empty() {
            "-".to_string()
        } else {
            network
                .tags
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",")
        };
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}",
            network.id,
            network.group_id,
            network.name,
            u8::from(network.is_default),
            tags
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use netfuse_core::weights::FeatureWeightMap;
    use netfuse_core::{CombiningMethod, Interaction, RankedNode, ScoringMethod};

    fn response() -> Response {
        Response {
            ranked_nodes: vec![
                RankedNode { node_id: 7, score: 0.75 },
                RankedNode { node_id: 3, score: 0.5 },
            ],
            resolved_combining_method: CombiningMethod::Average,
            scoring_method: ScoringMethod::Discriminant,
            feature_weights: FeatureWeightMap::new(),
            discriminant: None,
        }
    }

    fn render(format: OutputFormat) -> String {
        let mut buffer = Vec::new();
        write_response(&mut buffer, &response(), format).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_text_formats() {
        assert_eq!(render(OutputFormat::Genes), "7\n3\n");
        assert_eq!(render(OutputFormat::Scores), "7\t0.750000\n3\t0.500000\n");
    }

    #[test]
    fn test_json_format() {
        let value: serde_json::Value = serde_json::from_str(&render(OutputFormat::Json)).unwrap();
        assert_eq!(value["ranked_nodes"][1]["node_id"], 3);
        assert_eq!(value["scoring_method"], "discriminant");
    }

    #[test]
    fn test_combined_network_lines() {
        let network = CombinedNetwork {
            resolved_combining_method: CombiningMethod::Average,
            feature_weights: FeatureWeightMap::new(),
            interactions: vec![
                Interaction { node_a: 1, node_b: 2, weight: 0.25 },
                Interaction { node_a: 1, node_b: 9, weight: 1.0 },
            ],
        };
        let mut buffer = Vec::new();
        write_combined_network(&mut buffer, &network).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "1\t2\t0.25\n1\t9\t1\n");

        let mut buffer = Vec::new();
        assert!(write_response(&mut buffer, &response(), OutputFormat::CombinedNetwork).is_err());
    }

    #[test]
    fn test_gene_listing() {
        let mut buffer = Vec::new();
        write_genes(&mut buffer, &[101, 102]).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "101\n102\n");
    }

    #[test]
    fn test_format_names() {
        assert_eq!("scores".parse::<OutputFormat>(), Ok(OutputFormat::Scores));
        assert_eq!("combined-network".parse::<OutputFormat>(), Ok(OutputFormat::CombinedNetwork));
        assert_eq!(OutputFormat::CombinedNetwork.task(), QueryTask::CombineNetworks);
        assert_eq!(OutputFormat::CombinedNetwork.extension(), "combined-network.txt");
        assert_eq!(OutputFormat::Scores.result_policy(), ResultPolicy::AllScores);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
