//! Statistical tools for antimicrobial-susceptibility count data.
//!
//! This crate provides:
//!
//! - **Contingency tables**: immutable r×c count tables with margins and
//!   expected counts under independence
//! - **Association tests**: chi-square test of independence with an exact-test
//!   fallback when expected counts are small
//! - **Exact tests**: Fisher's exact test for 2×2 tables, Freeman-Halton
//!   enumeration for r×c tables, and a seeded Monte-Carlo estimate for tables
//!   too large to enumerate
//! - **Descriptive statistics**: mean, median, spread of a set of values
//!
//! # Modules
//!
//! - [`contingency`]: [`ContingencyTable`](contingency::ContingencyTable) and its construction errors
//! - [`association`]: test selection and execution
//! - [`exact`]: exact p-values conditional on the table margins
//! - [`descriptive`]: summary statistics of a dataset
//!
//! # Examples
//!
//! ## Testing a 2×2 table
//!
//! ```
//! use amrstat_stats::{
//!     association::{AssociationTest, TestKind},
//!     contingency::ContingencyTable,
//! };
//!
//! let table = ContingencyTable::new(
//!     ["Resistant", "Non-resistant"],
//!     ["Milad", "Rasul Akram"],
//!     vec![vec![40, 10], vec![8, 10]],
//! )
//! .unwrap();
//!
//! let result = AssociationTest::default().run(&table).unwrap();
//! assert_eq!(result.test, TestKind::ChiSquare);
//! assert_eq!(result.degrees_of_freedom, Some(1));
//! assert!(result.significant);
//! ```
//!
//! ## Small counts fall back to an exact test
//!
//! ```
//! use amrstat_stats::{
//!     association::{AssociationTest, TestKind},
//!     contingency::ContingencyTable,
//! };
//!
//! let table = ContingencyTable::new(["a", "b"], ["x", "y"], vec![vec![2, 0], vec![1, 3]]).unwrap();
//! let result = AssociationTest::default().run(&table).unwrap();
//! assert_eq!(result.test, TestKind::FisherExact);
//! assert_eq!(result.statistic, None);
//! assert!((0.0..=1.0).contains(&result.p_value));
//! ```

pub mod association;
pub mod contingency;
pub mod descriptive;
pub mod exact;
