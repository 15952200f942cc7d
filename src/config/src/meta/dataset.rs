// Copyright 2025 OpenObserve Inc.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Per-dataset declarative configuration.
//!
//! One record describes one dataset: where its files live, the columns they
//! share, and the knobs steering catalog maintenance and query planning.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::meta::{
    attr::{self, AttrMap},
    packing::Packing,
    value::ColumnType,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataFrom {
    #[serde(rename = "first")]
    First,
    #[default]
    #[serde(rename = "last")]
    Last,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnConfig {
    pub source_name: String,
    /// Name presented to queries. Defaults to `source_name`.
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
    /// Caller-supplied fill sentinel, substituted over whatever the file
    /// reports before schema checks and range computation.
    #[serde(default)]
    pub fill: Option<f64>,
    #[serde(default)]
    pub missing: Option<f64>,
    #[serde(default)]
    pub add_attributes: AttrMap,
}

impl ColumnConfig {
    /// The effective packing for this column given the attributes one file
    /// reported.
    pub fn packing(&self, source_attrs: &AttrMap) -> Packing {
        let mut packing = Packing::from_attrs(source_attrs);
        if self.fill.is_some() {
            packing.fill = self.fill;
        }
        if self.missing.is_some() {
            packing.missing = self.missing;
        }
        packing
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetConfig {
    pub dataset_id: String,
    pub file_dir: String,
    #[serde(default = "default_file_name_regex")]
    pub file_name_regex: String,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default = "default_true")]
    pub files_are_local: bool,
    #[serde(default)]
    pub metadata_from: MetadataFrom,
    #[serde(default)]
    pub pre_extract_regex: String,
    #[serde(default)]
    pub post_extract_regex: String,
    #[serde(default)]
    pub extract_regex: String,
    #[serde(default)]
    pub column_name_for_extract: String,
    #[serde(default)]
    pub sorted_column_source_name: String,
    /// Space-separated source names defining file visitation order, which
    /// fixes output row order for unsorted queries.
    #[serde(default)]
    pub sort_files_by_source_names: String,
    /// Text-format reader hints, passed through to the file reader.
    #[serde(default = "default_column_names_row")]
    pub column_names_row: usize,
    #[serde(default = "default_first_data_row")]
    pub first_data_row: usize,
    /// Expand numeric `=` constraints to tolerate float drift in the source.
    #[serde(rename = "sourceNeedsExpandedFP_EQ", default)]
    pub source_needs_expanded_fp_eq: bool,
    #[serde(default = "default_reload_minutes")]
    pub reload_every_n_minutes: u64,
    /// A failing file younger than this is skipped, not quarantined; it may
    /// still be mid-transfer.
    #[serde(default = "default_quarantine_min_age_minutes")]
    pub quarantine_min_age_minutes: u64,
    /// Files whose max timestamp is within this window of now are treated as
    /// still growing: their effective max becomes now + window for pruning.
    #[serde(default = "default_recent_file_window_minutes")]
    pub recent_file_window_minutes: u64,
    #[serde(default)]
    pub add_global_attributes: AttrMap,
    #[serde(rename = "dataVariable")]
    pub data_variables: Vec<ColumnConfig>,
}

fn default_file_name_regex() -> String {
    ".*".to_string()
}

fn default_true() -> bool {
    true
}

fn default_column_names_row() -> usize {
    1
}

fn default_first_data_row() -> usize {
    2
}

fn default_reload_minutes() -> u64 {
    10080
}

fn default_quarantine_min_age_minutes() -> u64 {
    30
}

fn default_recent_file_window_minutes() -> u64 {
    240
}

impl DatasetConfig {
    /// Fatal at construction: an invalid record never becomes a dataset.
    pub fn validate(&mut self) -> Result<(), anyhow::Error> {
        if self.dataset_id.is_empty()
            || !self
                .dataset_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            return Err(anyhow::anyhow!(
                "datasetId {:?} must be non-empty and filename-safe",
                self.dataset_id
            ));
        }
        if self.file_dir.is_empty() {
            return Err(anyhow::anyhow!("fileDir must not be empty"));
        }
        if self.data_variables.is_empty() {
            return Err(anyhow::anyhow!("at least one dataVariable is required"));
        }
        Regex::new(&self.file_name_regex)
            .map_err(|e| anyhow::anyhow!("invalid fileNameRegex: {e}"))?;
        for (label, re) in [
            ("preExtractRegex", &self.pre_extract_regex),
            ("postExtractRegex", &self.post_extract_regex),
            ("extractRegex", &self.extract_regex),
        ] {
            if !re.is_empty() {
                Regex::new(re).map_err(|e| anyhow::anyhow!("invalid {label}: {e}"))?;
            }
        }
        if self.first_data_row <= self.column_names_row {
            return Err(anyhow::anyhow!(
                "firstDataRow must be greater than columnNamesRow"
            ));
        }

        for v in self.data_variables.iter_mut() {
            if v.source_name.is_empty() {
                return Err(anyhow::anyhow!("dataVariable sourceName must not be empty"));
            }
            if v.name.is_empty() {
                v.name = v.source_name.clone();
            }
        }
        for i in 0..self.data_variables.len() {
            for j in (i + 1)..self.data_variables.len() {
                if self.data_variables[i].name == self.data_variables[j].name {
                    return Err(anyhow::anyhow!(
                        "duplicate column name {:?}",
                        self.data_variables[i].name
                    ));
                }
                if self.data_variables[i].source_name == self.data_variables[j].source_name {
                    return Err(anyhow::anyhow!(
                        "duplicate sourceName {:?}",
                        self.data_variables[i].source_name
                    ));
                }
            }
        }

        if !self.column_name_for_extract.is_empty() {
            let v = self
                .var_index_by_name(&self.column_name_for_extract)
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "columnNameForExtract {:?} is not a dataVariable",
                        self.column_name_for_extract
                    )
                })?;
            if self.data_variables[v].column_type != ColumnType::String {
                return Err(anyhow::anyhow!("columnNameForExtract must be a string column"));
            }
            if self.extract_regex.is_empty() {
                return Err(anyhow::anyhow!(
                    "columnNameForExtract requires an extractRegex"
                ));
            }
        }
        if !self.sorted_column_source_name.is_empty() {
            let v = self
                .var_index_by_source(&self.sorted_column_source_name)
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "sortedColumnSourceName {:?} is not a dataVariable",
                        self.sorted_column_source_name
                    )
                })?;
            if !self.data_variables[v].column_type.is_numeric() {
                return Err(anyhow::anyhow!("the sorted column must be numeric"));
            }
        }
        for name in self.sort_files_by_tokens() {
            if self.var_index_by_source(&name).is_none() {
                return Err(anyhow::anyhow!(
                    "sortFilesBySourceNames references unknown column {name:?}"
                ));
            }
        }

        // Lexicographic range comparison on textual time only works for
        // ISO-like encodings.
        for v in &self.data_variables {
            if v.column_type != ColumnType::String {
                continue;
            }
            if let Some(units) = v
                .add_attributes
                .get(attr::ATTR_UNITS)
                .and_then(|u| u.as_str())
            {
                if units.contains(" since ") {
                    return Err(anyhow::anyhow!(
                        "column {:?} is textual but has numeric time units {units:?}",
                        v.name
                    ));
                }
                if (units.contains("yyyy") || units.contains("YYYY"))
                    && !units.starts_with("yyyy-MM-dd")
                {
                    return Err(anyhow::anyhow!(
                        "column {:?} holds non-ISO textual time ({units:?}); only ISO-like \
                         encodings order correctly",
                        v.name
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn var_index_by_name(&self, name: &str) -> Option<usize> {
        self.data_variables.iter().position(|v| v.name == name)
    }

    pub fn var_index_by_source(&self, source_name: &str) -> Option<usize> {
        self.data_variables
            .iter()
            .position(|v| v.source_name == source_name)
    }

    pub fn id_var_index(&self) -> Option<usize> {
        if self.column_name_for_extract.is_empty() {
            None
        } else {
            self.var_index_by_name(&self.column_name_for_extract)
        }
    }

    pub fn sorted_var_index(&self) -> Option<usize> {
        if self.sorted_column_source_name.is_empty() {
            None
        } else {
            self.var_index_by_source(&self.sorted_column_source_name)
        }
    }

    pub fn sort_files_by_tokens(&self) -> Vec<String> {
        self.sort_files_by_source_names
            .split_whitespace()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn sort_files_var_indices(&self) -> Vec<usize> {
        self.sort_files_by_tokens()
            .iter()
            .filter_map(|name| self.var_index_by_source(name))
            .collect()
    }

    /// Source column names and types handed to the file reader: everything
    /// except the id column, which is synthesized from the file name.
    pub fn source_read_columns(&self) -> (Vec<String>, Vec<ColumnType>) {
        let id = self.id_var_index();
        let mut names = Vec::with_capacity(self.data_variables.len());
        let mut types = Vec::with_capacity(self.data_variables.len());
        for (i, v) in self.data_variables.iter().enumerate() {
            if Some(i) == id {
                continue;
            }
            names.push(v.source_name.clone());
            types.push(v.column_type);
        }
        (names, types)
    }
}

/// Three-stage id synthesis from a file name: strip the prefix match, strip
/// the suffix match, capture what the extract regex matches.
pub struct IdExtractor {
    pre: Option<Regex>,
    post: Option<Regex>,
    extract: Option<Regex>,
}

impl IdExtractor {
    pub fn new(cfg: &DatasetConfig) -> Result<IdExtractor, anyhow::Error> {
        let compile = |s: &str| -> Result<Option<Regex>, anyhow::Error> {
            if s.is_empty() {
                Ok(None)
            } else {
                Ok(Some(Regex::new(s)?))
            }
        };
        Ok(IdExtractor {
            pre: compile(&cfg.pre_extract_regex)?,
            post: compile(&cfg.post_extract_regex)?,
            extract: compile(&cfg.extract_regex)?,
        })
    }

    pub fn extract(&self, file_name: &str) -> String {
        let mut s = file_name.to_string();
        if let Some(re) = &self.pre {
            if let Some(range) = re.find(&s).map(|m| m.range()) {
                s.replace_range(range, "");
            }
        }
        if let Some(re) = &self.post {
            if let Some(range) = re.find(&s).map(|m| m.range()) {
                s.replace_range(range, "");
            }
        }
        match &self.extract {
            Some(re) => re.find(&s).map(|m| m.as_str().to_string()).unwrap_or_default(),
            None => s,
        }
    }
}
