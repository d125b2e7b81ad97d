//! Input dataset: aggregated susceptibility counts per hospital
//!
//! The analysis works on aggregate counts only. For every antibiotic the
//! dataset holds the number of susceptible (S), intermediate (I), and
//! resistant (R) isolates per hospital, and for the strain-typed subset the
//! number of isolates per sequence type per hospital.
//!
//! # Serialization
//!
//! ```json
//! {
//!   "hospitals": ["Milad", "Rasul Akram"],
//!   "antibiotics": [
//!     {
//!       "name": "Meropenem",
//!       "counts": {
//!         "Milad": { "S": 0, "I": 0, "R": 68 },
//!         "Rasul Akram": { "S": 0, "I": 0, "R": 50 }
//!       }
//!     }
//!   ],
//!   "sequence_types": {
//!     "Milad": { "ST218": 2, "ST451": 2 },
//!     "Rasul Akram": { "ST218": 1, "ST391": 1 }
//!   }
//! }
//! ```
//!
//! Counts are signed so that a negative count reaches validation and is
//! reported as such, rather than failing inside the JSON parser.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Isolate counts per sequence type, keyed by hospital and then by ST id.
pub type SequenceTypeCounts = BTreeMap<String, BTreeMap<String, i64>>;

/// Structural problems in a dataset, detected before any computation.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum DatasetError {
    #[display("dataset lists no hospitals")]
    NoHospitals,
    #[display("hospital '{name}' is listed more than once")]
    DuplicateHospital { name: String },
    #[display("antibiotic '{name}' is listed more than once")]
    DuplicateAntibiotic { name: String },
    #[display("antibiotic '{antibiotic}' has no counts for hospital '{hospital}'")]
    MissingHospital { antibiotic: String, hospital: String },
    #[display("{context} refers to unknown hospital '{hospital}'")]
    UnknownHospital { context: String, hospital: String },
}

/// Aggregated susceptibility data for one study.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Dataset {
    /// Hospitals in presentation order; these become table rows.
    pub hospitals: Vec<String>,
    /// Antibiotic panel in testing order.
    pub antibiotics: Vec<AntibioticCounts>,
    /// Sequence-type distribution per hospital.
    #[serde(default)]
    pub sequence_types: SequenceTypeCounts,
}

/// Susceptibility counts for one antibiotic, per hospital.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AntibioticCounts {
    pub name: String,
    pub counts: BTreeMap<String, SirCounts>,
}

/// Number of susceptible, intermediate, and resistant isolates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SirCounts {
    #[serde(rename = "S")]
    pub susceptible: i64,
    #[serde(rename = "I")]
    pub intermediate: i64,
    #[serde(rename = "R")]
    pub resistant: i64,
}

impl SirCounts {
    #[must_use]
    pub const fn new(susceptible: i64, intermediate: i64, resistant: i64) -> Self {
        Self {
            susceptible,
            intermediate,
            resistant,
        }
    }

    /// Counts in S, I, R order.
    #[must_use]
    pub const fn to_array(self) -> [i64; 3] {
        [self.susceptible, self.intermediate, self.resistant]
    }

    /// Resistant and non-resistant (S + I) counts.
    #[must_use]
    pub const fn resistant_split(self) -> [i64; 2] {
        [
            self.resistant,
            self.susceptible.saturating_add(self.intermediate),
        ]
    }
}

impl Dataset {
    /// Checks the structure of the dataset.
    ///
    /// Count values are not checked here; negative counts are rejected when
    /// the contingency tables are built.
    pub fn validate(&self) -> Result<(), DatasetError> {
        validate_parts(&self.hospitals, &self.antibiotics, &self.sequence_types)
    }

    /// Sequence type ids present in any hospital, sorted.
    #[must_use]
    pub fn sequence_type_ids(&self) -> Vec<String> {
        sequence_type_ids(&self.sequence_types)
    }

    /// Aggregated counts of 118 carbapenem-resistant *Acinetobacter baumannii*
    /// isolates from two intensive care units in Tehran.
    ///
    /// Milad contributed 68 isolates and Rasul Akram 50. The panel lists the
    /// drugs in testing order; colistin was tested separately by broth disk
    /// elution and is appended last.
    ///
    /// The published pooled profile lists Ceftazidime as 3 S / 1 I / 114 R,
    /// which disagrees with its per-hospital counts (2 S / 0 I / 66 R and
    /// 2 S / 0 I / 48 R). Only per-hospital counts are stored, so the pooled
    /// profile derived from them shows 4 S / 0 I / 114 R.
    #[must_use]
    pub fn study() -> Self {
        const MILAD: &str = "Milad";
        const RASUL_AKRAM: &str = "Rasul Akram";

        // (name, Milad S/I/R, Rasul Akram S/I/R)
        let panel = [
            ("Meropenem", [0, 0, 68], [0, 0, 50]),
            ("Imipenem", [0, 0, 68], [0, 0, 50]),
            ("Ceftriaxone", [0, 0, 68], [0, 0, 50]),
            ("Piperacillin-Tazobactam", [0, 0, 68], [0, 0, 50]),
            ("Ciprofloxacin", [0, 0, 68], [0, 0, 50]),
            ("Tobramycin", [0, 0, 68], [0, 0, 50]),
            ("Cefotaxime", [0, 2, 66], [0, 1, 49]),
            ("Gentamicin", [2, 0, 66], [1, 1, 48]),
            ("Ceftazidime", [2, 0, 66], [2, 0, 48]),
            ("Amikacin", [7, 1, 60], [3, 1, 46]),
            ("Cefepime", [10, 2, 56], [5, 2, 43]),
            ("TMP-SMX", [8, 3, 57], [6, 2, 42]),
            ("Doxycycline", [39, 4, 25], [28, 2, 20]),
            ("Colistin", [62, 5, 1], [46, 2, 2]),
        ];
        let antibiotics = panel
            .into_iter()
            .map(|(name, [s0, i0, r0], [s1, i1, r1])| AntibioticCounts {
                name: name.to_owned(),
                counts: BTreeMap::from([
                    (MILAD.to_owned(), SirCounts::new(s0, i0, r0)),
                    (RASUL_AKRAM.to_owned(), SirCounts::new(s1, i1, r1)),
                ]),
            })
            .collect();

        let st_ids = ["ST218", "ST451", "ST1417", "ST3374", "ST391", "ST1104", "ST_new"];
        let milad = [2, 2, 1, 1, 0, 0, 1];
        let rasul_akram = [1, 1, 0, 0, 1, 1, 0];
        let per_hospital = |counts: [i64; 7]| {
            st_ids
                .iter()
                .zip(counts)
                .filter(|(_, count)| *count > 0)
                .map(|(id, count)| ((*id).to_owned(), count))
                .collect::<BTreeMap<_, _>>()
        };
        let sequence_types = BTreeMap::from([
            (MILAD.to_owned(), per_hospital(milad)),
            (RASUL_AKRAM.to_owned(), per_hospital(rasul_akram)),
        ]);

        Self {
            hospitals: vec![MILAD.to_owned(), RASUL_AKRAM.to_owned()],
            antibiotics,
            sequence_types,
        }
    }
}

pub(crate) fn validate_parts(
    hospitals: &[String],
    antibiotics: &[AntibioticCounts],
    sequence_types: &SequenceTypeCounts,
) -> Result<(), DatasetError> {
    if hospitals.is_empty() {
        return Err(DatasetError::NoHospitals);
    }
    let mut known = BTreeSet::new();
    for name in hospitals {
        if !known.insert(name.as_str()) {
            return Err(DatasetError::DuplicateHospital { name: name.clone() });
        }
    }

    let mut seen = BTreeSet::new();
    for antibiotic in antibiotics {
        if !seen.insert(antibiotic.name.as_str()) {
            return Err(DatasetError::DuplicateAntibiotic {
                name: antibiotic.name.clone(),
            });
        }
        if let Some(hospital) = antibiotic
            .counts
            .keys()
            .find(|h| !known.contains(h.as_str()))
        {
            return Err(DatasetError::UnknownHospital {
                context: format!("antibiotic '{}'", antibiotic.name),
                hospital: hospital.clone(),
            });
        }
        if let Some(hospital) = hospitals
            .iter()
            .find(|h| !antibiotic.counts.contains_key(*h))
        {
            return Err(DatasetError::MissingHospital {
                antibiotic: antibiotic.name.clone(),
                hospital: hospital.clone(),
            });
        }
    }

    if let Some(hospital) = sequence_types
        .keys()
        .find(|h| !known.contains(h.as_str()))
    {
        return Err(DatasetError::UnknownHospital {
            context: "sequence type counts".to_owned(),
            hospital: hospital.clone(),
        });
    }
    Ok(())
}

pub(crate) fn sequence_type_ids(sequence_types: &SequenceTypeCounts) -> Vec<String> {
    sequence_types
        .values()
        .flat_map(BTreeMap::keys)
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_study_dataset_is_valid() {
        let dataset = Dataset::study();
        dataset.validate().unwrap();
        assert_eq!(dataset.antibiotics.len(), 14);
        for antibiotic in &dataset.antibiotics {
            assert_eq!(antibiotic.counts["Milad"].to_array().iter().sum::<i64>(), 68);
            assert_eq!(antibiotic.counts["Rasul Akram"].to_array().iter().sum::<i64>(), 50);
        }
    }

    #[test]
    fn test_study_sequence_types() {
        let dataset = Dataset::study();
        assert_eq!(dataset.sequence_type_ids().len(), 7);
        let total = dataset
            .sequence_types
            .values()
            .flat_map(BTreeMap::values)
            .sum::<i64>();
        assert_eq!(total, 11);
    }

    #[test]
    fn test_json_round_trip_uses_sir_keys() {
        let json = r#"{
            "hospitals": ["A", "B"],
            "antibiotics": [
                { "name": "X", "counts": { "A": {"S": 1, "I": 2, "R": 3}, "B": {"S": 4, "I": 5, "R": 6} } }
            ],
            "sequence_types": { "A": { "ST1": 2 } }
        }"#;
        let dataset: Dataset = serde_json::from_str(json).unwrap();
        dataset.validate().unwrap();
        assert_eq!(dataset.antibiotics[0].counts["B"], SirCounts::new(4, 5, 6));
        assert_eq!(dataset.sequence_type_ids(), ["ST1"]);
    }

    #[test]
    fn test_missing_hospital() {
        let mut dataset = Dataset::study();
        dataset.antibiotics[3].counts.remove("Milad");
        assert_eq!(
            dataset.validate(),
            Err(DatasetError::MissingHospital {
                antibiotic: "Piperacillin-Tazobactam".to_owned(),
                hospital: "Milad".to_owned(),
            })
        );
    }

    #[test]
    fn test_unknown_hospital_in_sequence_types() {
        let mut dataset = Dataset::study();
        dataset
            .sequence_types
            .insert("Elsewhere".to_owned(), BTreeMap::new());
        assert!(matches!(
            dataset.validate(),
            Err(DatasetError::UnknownHospital { hospital, .. }) if hospital == "Elsewhere"
        ));
    }

    #[test]
    fn test_duplicates() {
        let mut dataset = Dataset::study();
        dataset.hospitals.push("Milad".to_owned());
        assert!(matches!(
            dataset.validate(),
            Err(DatasetError::DuplicateHospital { .. })
        ));

        let mut dataset = Dataset::study();
        let first = dataset.antibiotics[0].clone();
        dataset.antibiotics.push(first);
        assert!(matches!(
            dataset.validate(),
            Err(DatasetError::DuplicateAntibiotic { .. })
        ));
    }
}
