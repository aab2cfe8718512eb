//! Table-level join: BI table assets ⋈ warehouse table records
//!
//! Key: `(schema, table)` normalized under an [`IdentifierCase`] policy.

use super::normalize::{IdentifierCase, TableKey};
use super::{first_seen_index, MatchWarning};
use catalog_types::{TableAsset, TableRecord};
use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

/// One BI table asset joined to one warehouse table record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedTable {
    pub asset: TableAsset,
    pub record: TableRecord,
}

impl MatchedTable {
    pub fn catalog_table_id(&self) -> &str {
        &self.asset.catalog_table_id
    }

    /// `SCHEMA.TABLE` as spelled in the warehouse, for logs and outcome keys
    pub fn display_name(&self) -> String {
        format!("{}.{}", self.record.schema_name, self.record.table_name)
    }
}

/// Result of the table join, in BI listing order
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableMatch {
    pub matched: Vec<MatchedTable>,
    /// BI assets (within the schema filter) with no warehouse counterpart
    pub unmatched_assets: usize,
    /// Warehouse records that ended up in no pair
    pub unmatched_records: usize,
    /// BI assets excluded by the schema filter before matching
    pub filtered_out: usize,
    pub warnings: Vec<MatchWarning>,
}

/// Join BI table assets to warehouse table records.
///
/// `schema_filter`, when set, drops BI assets from other schemas before the
/// join (compared under the same case policy). Output order follows `assets`.
pub fn match_tables(
    assets: &[TableAsset],
    records: &[TableRecord],
    schema_filter: Option<&str>,
    case: IdentifierCase,
) -> TableMatch {
    let (lookup, duplicates) = first_seen_index(records, |r| {
        TableKey::new(case, &r.schema_name, &r.table_name)
    });

    let mut result = TableMatch::default();

    for (key, occurrences) in duplicates {
        warn!(table = %key, occurrences, "duplicate warehouse table name, keeping first-seen record");
        result.warnings.push(MatchWarning::DuplicateWarehouseTable {
            table: key.to_string(),
            occurrences,
        });
    }

    let filter_key = schema_filter.map(|s| case.key(s));
    let mut claimed: HashSet<usize> = HashSet::with_capacity(lookup.len());

    for asset in assets {
        if let Some(filter) = &filter_key {
            if case.key(&asset.schema_name) != *filter {
                result.filtered_out += 1;
                continue;
            }
        }

        let key = TableKey::new(case, &asset.schema_name, &asset.name);
        let Some(&record_idx) = lookup.get(&key) else {
            result.unmatched_assets += 1;
            continue;
        };

        if !claimed.insert(record_idx) {
            warn!(
                table = %key,
                catalog_table_id = %asset.catalog_table_id,
                "catalog table maps to an already matched warehouse table"
            );
            result.warnings.push(MatchWarning::DuplicateCatalogTable {
                table: key.to_string(),
                catalog_table_id: asset.catalog_table_id.clone(),
            });
            continue;
        }

        result.matched.push(MatchedTable {
            asset: asset.clone(),
            record: records[record_idx].clone(),
        });
    }

    result.unmatched_records = records.len() - result.matched.len();
    result
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_name() -> impl Strategy<Value = String> {
        prop_oneof![Just("A"), Just("B"), Just("C"), Just("D")].prop_map(String::from)
    }

    fn arb_assets() -> impl Strategy<Value = Vec<TableAsset>> {
        prop::collection::vec((arb_name(), arb_name()), 0..12).prop_map(|pairs| {
            pairs
                .into_iter()
                .enumerate()
                .map(|(i, (schema, name))| TableAsset::new(format!("t{i}"), name, schema))
                .collect()
        })
    }

    fn arb_records() -> impl Strategy<Value = Vec<TableRecord>> {
        prop::collection::vec((arb_name(), arb_name()), 0..12).prop_map(|pairs| {
            pairs
                .into_iter()
                .enumerate()
                .map(|(i, (schema, table))| TableRecord {
                    database: "DB".into(),
                    schema_name: schema,
                    table_name: table,
                    row_count: Some(i as u64),
                    comment: Some(format!("r{i}")),
                })
                .collect()
        })
    }

    proptest! {
        /// Every pair joins on equal keys, and neither side is reused.
        #[test]
        fn pairs_are_key_equal_and_unique(assets in arb_assets(), records in arb_records()) {
            let result = match_tables(&assets, &records, None, IdentifierCase::Exact);

            let mut seen_assets = HashSet::new();
            let mut seen_records = HashSet::new();
            for pair in &result.matched {
                prop_assert_eq!(&pair.asset.schema_name, &pair.record.schema_name);
                prop_assert_eq!(&pair.asset.name, &pair.record.table_name);
                prop_assert!(seen_assets.insert(pair.asset.catalog_table_id.clone()));
                prop_assert!(seen_records.insert(pair.record.comment.clone()));
            }
        }

        /// Every distinct key present on both sides produces exactly one pair.
        #[test]
        fn every_shared_key_is_matched(assets in arb_assets(), records in arb_records()) {
            let result = match_tables(&assets, &records, None, IdentifierCase::Exact);

            let asset_keys: HashSet<_> = assets.iter().map(|a| (a.schema_name.clone(), a.name.clone())).collect();
            let record_keys: HashSet<_> = records.iter().map(|r| (r.schema_name.clone(), r.table_name.clone())).collect();
            let shared = asset_keys.intersection(&record_keys).count();
            prop_assert_eq!(result.matched.len(), shared);
        }

        /// The kept record is always the first one in input order.
        #[test]
        fn kept_record_is_first_seen(assets in arb_assets(), records in arb_records()) {
            let result = match_tables(&assets, &records, None, IdentifierCase::Exact);
            for pair in &result.matched {
                let first = records
                    .iter()
                    .find(|r| r.schema_name == pair.record.schema_name && r.table_name == pair.record.table_name);
                prop_assert_eq!(Some(&pair.record), first);
            }
        }
    }
}
