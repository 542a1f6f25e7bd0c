//! CSV output in the `tools::histo` text layout.
//!
//! A histogram file carries `#` header lines (class, title, axis, bin count)
//! and one line per bin with `entries,Sw,Sw2,Sxw0,Sx2w0`, underflow first and
//! overflow last. An n-tuple file carries one `#column double <name>` header
//! per column followed by comma separated rows.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow};

use crate::sim::analysis::{H1, Ntuple};

pub fn write_h1(path: &Path, h: &H1) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?;
    let mut w = BufWriter::new(file);

    writeln!(w, "#class tools::histo::h1d")?;
    writeln!(w, "#title {}", h.title)?;
    writeln!(w, "#dimension 1")?;
    writeln!(w, "#axis fixed {} {} {}", h.nbins(), h.min(), h.max())?;
    writeln!(w, "#bin_number {}", h.bins().len())?;
    writeln!(w, "entries,Sw,Sw2,Sxw0,Sx2w0")?;
    for b in h.bins() {
        writeln!(w, "{},{},{},{},{}", b.entries, b.sw, b.sw2, b.sxw, b.sx2w)?;
    }
    w.flush()
        .with_context(|| format!("Failed to write file: {}", path.display()))?;
    Ok(())
}

pub fn write_ntuple(path: &Path, nt: &Ntuple) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?;
    let mut w = BufWriter::new(file);

    writeln!(w, "#class tools::wcsv::ntuple")?;
    writeln!(w, "#title {}", nt.title)?;
    writeln!(w, "#separator 44")?;
    writeln!(w, "#vector_separator 59")?;
    for c in nt.columns() {
        writeln!(w, "#column double {c}")?;
    }
    for row in nt.rows() {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(w, "{}", line.join(","))?;
    }
    w.flush()
        .with_context(|| format!("Failed to write file: {}", path.display()))?;
    Ok(())
}

/// Reads an n-tuple written by [`write_ntuple`]. The name is taken from
/// the file stem.
pub fn read_ntuple(path: &Path) -> Result<Ntuple> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = BufReader::new(file);

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut nt = Ntuple::new(&name, "");
    let mut title = String::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read file: {}", path.display()))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix('#') {
            if let Some(col) = header.strip_prefix("column ") {
                let col_name = col
                    .split_whitespace()
                    .nth(1)
                    .ok_or_else(|| anyhow!("{}:{}: bad column header", path.display(), line_no + 1))?;
                nt.create_d_column(col_name)?;
            } else if let Some(t) = header.strip_prefix("title ") {
                title = t.to_string();
            }
            continue;
        }
        if !nt.is_finished() {
            nt.finish()
                .with_context(|| format!("{}: rows before column headers", path.display()))?;
        }
        for (i, field) in line.split(',').enumerate() {
            let value: f64 = field.trim().parse().with_context(|| {
                format!("{}:{}: invalid number '{field}'", path.display(), line_no + 1)
            })?;
            nt.fill_d_column(i, value)
                .with_context(|| format!("{}:{}: too many fields", path.display(), line_no + 1))?;
        }
        nt.add_row()?;
    }
    if !nt.is_finished() && !nt.columns().is_empty() {
        nt.finish()?;
    }
    nt.title = title;
    Ok(nt)
}
