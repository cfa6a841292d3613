//! TOML reference-data parser and JSON response loading.
//!
//! A reference file holds at most one instrument plus any number of norm
//! tables. Norm tables in a file without `[instrument]` must name the
//! instrument version they belong to.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{
    Aggregation, ChoiceOption, Composite, CompositeComponent, CutPoint, Dimension, Instrument,
    InstrumentRef, Item, ItemLoading, Polarity, RawRange, ScoreBasis, Stratum, ValueDomain,
};
use crate::norms::{NormAnchor, NormTable};
use crate::response::ResponseSet;

/// Intermediate TOML structure for reference data files.
#[derive(Debug, Deserialize)]
struct TomlReferenceFile {
    #[serde(default)]
    instrument: Option<TomlInstrumentHeader>,
    #[serde(default)]
    dimensions: Vec<TomlDimension>,
    #[serde(default)]
    items: Vec<TomlItem>,
    #[serde(default)]
    composites: Vec<TomlComposite>,
    #[serde(default)]
    norm_tables: Vec<TomlNormTable>,
}

#[derive(Debug, Deserialize)]
struct TomlInstrumentHeader {
    id: String,
    version: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    default_stratum: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlDimension {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    raw_min: f64,
    raw_max: f64,
    #[serde(default)]
    aggregation: Aggregation,
    #[serde(default = "default_true")]
    mandatory: bool,
    #[serde(default)]
    band_basis: ScoreBasis,
    #[serde(default)]
    bands: Vec<CutPoint>,
}

#[derive(Debug, Deserialize)]
struct TomlItem {
    id: String,
    #[serde(default)]
    text: String,
    /// Shorthand for a single loading.
    #[serde(default)]
    dimension: Option<String>,
    #[serde(default)]
    weight: Option<f64>,
    #[serde(default)]
    loadings: Vec<ItemLoading>,
    #[serde(default)]
    scale: Option<[i32; 2]>,
    #[serde(default)]
    choices: Vec<ChoiceOption>,
    #[serde(default)]
    reverse: bool,
    #[serde(default = "default_true")]
    required: bool,
}

#[derive(Debug, Deserialize)]
struct TomlComposite {
    id: String,
    name: String,
    #[serde(default)]
    basis: ScoreBasis,
    components: Vec<CompositeComponent>,
    #[serde(default)]
    bands: Vec<CutPoint>,
}

#[derive(Debug, Deserialize)]
struct TomlNormTable {
    /// `id@version`; defaults to the file's instrument.
    #[serde(default)]
    instrument: Option<String>,
    dimension: String,
    #[serde(default)]
    stratum: Option<String>,
    #[serde(default)]
    population: Option<String>,
    #[serde(default)]
    age_band: Option<String>,
    /// `[raw, percentile, standard]` triples.
    anchors: Vec<[f64; 3]>,
}

fn default_true() -> bool {
    true
}

/// Contents of one or more reference files, not yet checked.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub instruments: Vec<Instrument>,
    pub norm_tables: Vec<NormTable>,
}

impl ReferenceData {
    pub fn extend(&mut self, other: ReferenceData) {
        self.instruments.extend(other.instruments);
        self.norm_tables.extend(other.norm_tables);
    }
}

/// Parse a single TOML reference file.
pub fn parse_reference_file(path: &Path) -> Result<ReferenceData> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read reference file: {}", path.display()))?;

    parse_reference_str(&content, path)
}

/// Parse a TOML string into reference data (useful for testing).
pub fn parse_reference_str(content: &str, source_path: &Path) -> Result<ReferenceData> {
    let parsed: TomlReferenceFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let file_instrument = parsed
        .instrument
        .as_ref()
        .map(|header| InstrumentRef::new(&header.id, &header.version));

    let mut data = ReferenceData::default();

    match parsed.instrument {
        Some(header) => {
            let items = parsed
                .items
                .into_iter()
                .map(convert_item)
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("invalid item in {}", source_path.display()))?;

            data.instruments.push(Instrument {
                id: header.id,
                version: header.version,
                name: header.name,
                description: header.description,
                default_stratum: header.default_stratum.map(Stratum::new),
                items,
                dimensions: parsed.dimensions.into_iter().map(convert_dimension).collect(),
                composites: parsed
                    .composites
                    .into_iter()
                    .map(|c| Composite {
                        id: c.id,
                        name: c.name,
                        basis: c.basis,
                        components: c.components,
                        bands: c.bands,
                    })
                    .collect(),
            });
        }
        None => {
            if !(parsed.items.is_empty() && parsed.dimensions.is_empty() && parsed.composites.is_empty()) {
                anyhow::bail!(
                    "{}: items, dimensions and composites require an [instrument] section",
                    source_path.display()
                );
            }
        }
    }

    for table in parsed.norm_tables {
        data.norm_tables.push(
            convert_norm_table(table, file_instrument.as_ref())
                .with_context(|| format!("invalid norm table in {}", source_path.display()))?,
        );
    }

    Ok(data)
}

fn convert_dimension(d: TomlDimension) -> Dimension {
    Dimension {
        id: d.id,
        name: d.name,
        description: d.description,
        raw_range: RawRange {
            min: d.raw_min,
            max: d.raw_max,
        },
        aggregation: d.aggregation,
        mandatory: d.mandatory,
        band_basis: d.band_basis,
        bands: d.bands,
    }
}

fn convert_item(item: TomlItem) -> Result<Item> {
    let domain = match (item.scale, item.choices.is_empty()) {
        (Some([min, max]), true) => ValueDomain::Scale { min, max },
        (None, false) => ValueDomain::Choice {
            options: item.choices,
        },
        (Some(_), false) => anyhow::bail!("item {} declares both scale and choices", item.id),
        (None, true) => anyhow::bail!("item {} declares neither scale nor choices", item.id),
    };

    let mut loadings = Vec::with_capacity(item.loadings.len() + 1);
    match (item.dimension, item.weight) {
        (Some(dimension), weight) => loadings.push(ItemLoading {
            dimension,
            weight: weight.unwrap_or(1.0),
        }),
        (None, Some(_)) => anyhow::bail!("item {} sets weight without dimension", item.id),
        (None, None) => {}
    }
    loadings.extend(item.loadings);

    Ok(Item {
        id: item.id,
        text: item.text,
        domain,
        loadings,
        polarity: if item.reverse {
            Polarity::Reverse
        } else {
            Polarity::Direct
        },
        required: item.required,
    })
}

fn convert_norm_table(table: TomlNormTable, file_instrument: Option<&InstrumentRef>) -> Result<NormTable> {
    let instrument = match (table.instrument, file_instrument) {
        (Some(reference), _) => reference
            .parse::<InstrumentRef>()
            .map_err(|e| anyhow::anyhow!("{}", e))?,
        (None, Some(reference)) => reference.clone(),
        (None, None) => anyhow::bail!(
            "norm table for {} names no instrument and the file has no [instrument] section",
            table.dimension
        ),
    };

    let stratum = match (table.stratum, table.population) {
        (Some(stratum), None) => Stratum::new(stratum),
        (None, Some(population)) => Stratum::compose(&population, table.age_band.as_deref()),
        (Some(_), Some(_)) => anyhow::bail!(
            "norm table for {} sets both stratum and population",
            table.dimension
        ),
        (None, None) => anyhow::bail!("norm table for {} has no stratum", table.dimension),
    };

    Ok(NormTable {
        instrument,
        dimension: table.dimension,
        stratum,
        anchors: table
            .anchors
            .into_iter()
            .map(|[raw, percentile, standard]| NormAnchor::new(raw, percentile, standard))
            .collect(),
    })
}

/// Recursively load every `.toml` reference file under `dir`.
///
/// Any unreadable or malformed file fails the whole load; partial reference
/// data is never returned.
pub fn load_reference_directory(dir: &Path) -> Result<ReferenceData> {
    let mut data = ReferenceData::default();

    for path in sorted_entries(dir)? {
        if path.is_dir() {
            data.extend(load_reference_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            data.extend(parse_reference_file(&path)?);
        }
    }

    Ok(data)
}

/// Parse a JSON response set.
pub fn parse_response_set(path: &Path) -> Result<ResponseSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read response file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse response set: {}", path.display()))
}

/// Load every `.json` response set directly under `dir`, in file name order.
pub fn load_response_directory(dir: &Path) -> Result<Vec<(PathBuf, ResponseSet)>> {
    let mut sets = Vec::new();
    for path in sorted_entries(dir)? {
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            let set = parse_response_set(&path)?;
            sets.push((path, set));
        }
    }
    Ok(sets)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        paths.push(entry?.path());
    }
    paths.sort();
    Ok(paths)
}
