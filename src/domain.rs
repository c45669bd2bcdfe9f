use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::GeneFetchError;

/// Titles matching these phrases are excluded from every search.
pub const EXCLUDED_TITLES: [&str; 2] = ["complete genome", "unverified"];

static INVALID_FILE_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-zA-Z0-9\-_]+").expect("file name pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct SpeciesName(String);

impl SpeciesName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpeciesName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SpeciesName {
    type Err = GeneFetchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(GeneFetchError::InvalidSpecies(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for SpeciesName {
    type Error = GeneFetchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct GeneName(String);

impl GeneName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GeneName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GeneName {
    type Err = GeneFetchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(GeneFetchError::InvalidGene(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for GeneName {
    type Error = GeneFetchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One unit of work: a gene region for a single organism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub species: SpeciesName,
    pub gene: GeneName,
}

impl Query {
    pub fn new(species: SpeciesName, gene: GeneName) -> Self {
        Self { species, gene }
    }

    /// Entrez search term: organism and gene, minus complete genomes and
    /// unverified submissions.
    pub fn search_term(&self) -> String {
        let mut term = format!("{}[Organism] AND {}[Gene]", self.species, self.gene);
        for title in EXCLUDED_TITLES {
            term.push_str(&format!(" NOT {title}[Title]"));
        }
        term
    }

    pub fn output_file_name(&self) -> String {
        format!("{}_{}.txt", sanitize_file_name(self.species.as_str()), self.gene)
    }
}

/// Replaces every maximal run of characters outside `[A-Za-z0-9_-]` with a
/// single underscore. A trailing run is dropped instead, since the gene
/// separator already follows it; a name with no valid characters becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let kept = match INVALID_FILE_CHARS.find_iter(name).last() {
        Some(run) if run.end() == name.len() && run.start() > 0 => &name[..run.start()],
        _ => name,
    };
    INVALID_FILE_CHARS.replace_all(kept, "_").into_owned()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn query(species: &str, gene: &str) -> Query {
        Query::new(species.parse().unwrap(), gene.parse().unwrap())
    }

    #[test]
    fn species_is_trimmed() {
        let species: SpeciesName = "  Quercus robur \t".parse().unwrap();
        assert_eq!(species.as_str(), "Quercus robur");
    }

    #[test]
    fn blank_species_rejected() {
        let err = "   ".parse::<SpeciesName>().unwrap_err();
        assert_matches!(err, GeneFetchError::InvalidSpecies(_));
    }

    #[test]
    fn blank_gene_rejected() {
        let err = "".parse::<GeneName>().unwrap_err();
        assert_matches!(err, GeneFetchError::InvalidGene(_));
    }

    #[test]
    fn search_term_excludes_genomes_and_unverified() {
        let term = query("Quercus robur", "rbcL").search_term();
        assert_eq!(
            term,
            "Quercus robur[Organism] AND rbcL[Gene] NOT complete genome[Title] NOT unverified[Title]"
        );
    }

    #[test]
    fn sanitize_collapses_invalid_runs() {
        assert_eq!(sanitize_file_name("Panthera leo (lion)"), "Panthera_leo_lion");
        assert_eq!(sanitize_file_name("Abies alba"), "Abies_alba");
        assert_eq!(sanitize_file_name("x-y_z"), "x-y_z");
        assert_eq!(sanitize_file_name("a / b"), "a_b");
        assert_eq!(sanitize_file_name("_keep_"), "_keep_");
        assert_eq!(sanitize_file_name("Salix x fragilis 'Bullata'"), "Salix_x_fragilis_Bullata");
    }

    #[test]
    fn sanitize_keeps_leading_run_as_underscore() {
        assert_eq!(sanitize_file_name("(Abies) alba"), "_Abies_alba");
        assert_eq!(sanitize_file_name("  Abies"), "_Abies");
    }

    #[test]
    fn sanitize_all_invalid_name_is_single_underscore() {
        assert_eq!(sanitize_file_name("???"), "_");
        assert_eq!(sanitize_file_name("(!)"), "_");
        assert_eq!(query("(!)", "rbcL").output_file_name(), "__rbcL.txt");
    }

    #[test]
    fn deserialize_goes_through_validation() {
        let species: SpeciesName = serde_json::from_str(r#""  Abies alba ""#).unwrap();
        assert_eq!(species.as_str(), "Abies alba");
        assert!(serde_json::from_str::<SpeciesName>(r#""   ""#).is_err());
        assert!(serde_json::from_str::<GeneName>(r#""""#).is_err());
    }

    #[test]
    fn output_file_name_joins_species_and_gene() {
        assert_eq!(
            query("Panthera leo (lion)", "rbcL").output_file_name(),
            "Panthera_leo_lion_rbcL.txt"
        );
    }
}
