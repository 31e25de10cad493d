//! # clockrep-xlsx
//!
//! Spreadsheet backends for clockrep.
//!
//! This crate provides:
//! - Worksheet extraction from upstream xlsx payloads (`calamine`)
//! - Multi-sheet workbook assembly and serialization (`rust_xlsxwriter`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use clockrep_xlsx::{extract_first_sheet, WorkbookAssembler};
//!
//! let summary = extract_first_sheet(&summary_payload)?;
//! let members = vec![extract_first_sheet(&ana_payload)?.with_name("Ana")];
//!
//! let xlsx_bytes = WorkbookAssembler::new().assemble(summary, members)?;
//! std::fs::write("report.xlsx", xlsx_bytes)?;
//! ```

pub mod assemble;
pub mod extract;

pub use assemble::WorkbookAssembler;
pub use extract::extract_first_sheet;
