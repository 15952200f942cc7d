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

//! Cross-file attribute consistency.
//!
//! The first file successfully scanned in an update pass fixes the expected
//! packing attributes per column; every later file must agree. A file that
//! simply omits an attribute conforms — many writers leave defaults out —
//! but a conflicting value quarantines the file.

use config::{
    meta::{
        attr::{self, AttrMap},
        dataset::DatasetConfig,
        table::Table,
    },
    utils::units::units_equivalent,
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColumnAttrs {
    pub scale: Option<f64>,
    pub offset: Option<f64>,
    pub fill: Option<f64>,
    pub missing: Option<f64>,
    pub units: Option<String>,
}

impl ColumnAttrs {
    fn from_attr_map(attrs: &AttrMap) -> ColumnAttrs {
        ColumnAttrs {
            scale: attrs.get(attr::ATTR_SCALE_FACTOR).and_then(|v| v.as_f64()),
            offset: attrs.get(attr::ATTR_ADD_OFFSET).and_then(|v| v.as_f64()),
            fill: attrs.get(attr::ATTR_FILL_VALUE).and_then(|v| v.as_f64()),
            missing: attrs.get(attr::ATTR_MISSING_VALUE).and_then(|v| v.as_f64()),
            units: attrs
                .get(attr::ATTR_UNITS)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
        }
    }
}

#[derive(Default)]
pub struct SchemaSentinel {
    expected: Option<Vec<ColumnAttrs>>,
}

impl SchemaSentinel {
    pub fn new() -> SchemaSentinel {
        SchemaSentinel::default()
    }

    pub fn expected(&self) -> Option<&[ColumnAttrs]> {
        self.expected.as_deref()
    }

    fn observe(cfg: &DatasetConfig, table: &Table) -> Vec<ColumnAttrs> {
        let id_var = cfg.id_var_index();
        cfg.data_variables
            .iter()
            .enumerate()
            .map(|(i, var)| {
                if Some(i) == id_var {
                    return ColumnAttrs::default();
                }
                let mut attrs = table
                    .column(&var.source_name)
                    .map(|c| ColumnAttrs::from_attr_map(&c.attrs))
                    .unwrap_or_default();
                // caller-supplied sentinels substitute before any check
                if var.fill.is_some() {
                    attrs.fill = var.fill;
                }
                if var.missing.is_some() {
                    attrs.missing = var.missing;
                }
                attrs
            })
            .collect()
    }

    /// Verify one file's attributes, capturing them if this is the first
    /// successful scan of the pass.
    pub fn check(&mut self, cfg: &DatasetConfig, table: &Table) -> Result<(), String> {
        let observed = Self::observe(cfg, table);
        let Some(expected) = &self.expected else {
            self.expected = Some(observed);
            return Ok(());
        };
        for (var, (exp, obs)) in cfg
            .data_variables
            .iter()
            .zip(expected.iter().zip(observed.iter()))
        {
            for (name, e, o) in [
                (attr::ATTR_SCALE_FACTOR, exp.scale, obs.scale),
                (attr::ATTR_ADD_OFFSET, exp.offset, obs.offset),
                (attr::ATTR_FILL_VALUE, exp.fill, obs.fill),
                (attr::ATTR_MISSING_VALUE, exp.missing, obs.missing),
            ] {
                match (e, o) {
                    (_, None) => {} // unspecified conforms
                    (None, Some(got)) => {
                        return Err(format!(
                            "column {} {name}: expected unset, file has {got}",
                            var.source_name
                        ));
                    }
                    (Some(want), Some(got)) => {
                        if want != got && !(want.is_nan() && got.is_nan()) {
                            return Err(format!(
                                "column {} {name}: expected {want}, file has {got}",
                                var.source_name
                            ));
                        }
                    }
                }
            }
            match (&exp.units, &obs.units) {
                (_, None) => {}
                (None, Some(got)) => {
                    return Err(format!(
                        "column {} units: expected unset, file has {got:?}",
                        var.source_name
                    ));
                }
                (Some(want), Some(got)) => {
                    if !units_equivalent(want, got) {
                        return Err(format!(
                            "column {} units: expected {want:?}, file has {got:?}",
                            var.source_name
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
