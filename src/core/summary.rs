// compress a result set into a short digest for the answer prompt
// output size is bounded no matter how many rows come in

use super::record::Record;
use std::fmt::Write;

/// Records rendered in full; the rest are only counted.
pub const MAX_SECTIONS: usize = 5;

pub const NO_RECORDS: &str = "No records found.";

/// Fields worth spending tokens on, in render order.
pub const SUMMARY_FIELDS: [&str; 12] = [
    "nome",
    "score_credito",
    "classe_risco",
    "valor_solicitado",
    "valor_aprovado",
    "decisao",
    "status",
    "modalidade",
    "dias_atraso",
    "count",
    "avg",
    "sum",
];

pub fn summarize(records: &[Record]) -> String {
    if records.is_empty() {
        return NO_RECORDS.to_string();
    }

    let mut out = format!("Total records: {}\n\n", records.len());

    for (i, record) in records.iter().take(MAX_SECTIONS).enumerate() {
        // writing to a String can't fail
        let _ = writeln!(out, "Record {}:", i + 1);
        for field in SUMMARY_FIELDS {
            if let Some(value) = record.get(field) {
                let _ = writeln!(out, "  {field}: {value}");
            }
        }
        out.push('\n');
    }

    if records.len() > MAX_SECTIONS {
        let _ = writeln!(
            out,
            "... {} more records omitted",
            records.len() - MAX_SECTIONS
        );
    }

    out
}
