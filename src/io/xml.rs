//! AIDA-style XML output.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::sim::analysis::{H1, Ntuple};

pub fn write_aida(path: &Path, histograms: &[H1], ntuple: Option<&Ntuple>) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?;
    let mut w = BufWriter::new(file);

    writeln!(w, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(w, r#"<aida version="3.2.1">"#)?;
    writeln!(
        w,
        r#"  <implementation package="{}" version="{}"/>"#,
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )?;
    for h in histograms {
        write_h1(&mut w, h)?;
    }
    if let Some(nt) = ntuple {
        write_tuple(&mut w, nt)?;
    }
    writeln!(w, "</aida>")?;
    w.flush()
        .with_context(|| format!("Failed to write file: {}", path.display()))?;
    Ok(())
}

fn write_h1(w: &mut impl Write, h: &H1) -> Result<()> {
    writeln!(
        w,
        r#"  <histogram1d path="/" name="{}" title="{}">"#,
        escape(&h.name),
        escape(&h.title)
    )?;
    writeln!(
        w,
        r#"    <axis direction="x" numberOfBins="{}" min="{}" max="{}"/>"#,
        h.nbins(),
        h.min(),
        h.max()
    )?;
    writeln!(w, r#"    <statistics entries="{}">"#, h.entries())?;
    writeln!(
        w,
        r#"      <statistic direction="x" mean="{}" rms="{}"/>"#,
        h.mean(),
        h.rms()
    )?;
    writeln!(w, "    </statistics>")?;
    writeln!(w, "    <data1d>")?;
    let last = h.bins().len() - 1;
    for (i, b) in h.bins().iter().enumerate() {
        if b.entries == 0 {
            continue;
        }
        let bin = match i {
            0 => "UNDERFLOW".to_string(),
            i if i == last => "OVERFLOW".to_string(),
            i => (i - 1).to_string(),
        };
        let mean = if b.sw != 0.0 { b.sxw / b.sw } else { 0.0 };
        writeln!(
            w,
            r#"      <bin1d binNum="{bin}" entries="{}" height="{}" error="{}" weightedMean="{mean}"/>"#,
            b.entries,
            b.sw,
            b.sw2.sqrt()
        )?;
    }
    writeln!(w, "    </data1d>")?;
    writeln!(w, "  </histogram1d>")?;
    Ok(())
}

fn write_tuple(w: &mut impl Write, nt: &Ntuple) -> Result<()> {
    writeln!(
        w,
        r#"  <tuple path="/" name="{}" title="{}">"#,
        escape(&nt.name),
        escape(&nt.title)
    )?;
    writeln!(w, "    <columns>")?;
    for c in nt.columns() {
        writeln!(w, r#"      <column name="{}" type="double"/>"#, escape(c))?;
    }
    writeln!(w, "    </columns>")?;
    writeln!(w, "    <rows>")?;
    for row in nt.rows() {
        write!(w, "      <row>")?;
        for v in row {
            write!(w, r#"<entry value="{v}"/>"#)?;
        }
        writeln!(w, "</row>")?;
    }
    writeln!(w, "    </rows>")?;
    writeln!(w, "  </tuple>")?;
    Ok(())
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_aida() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("B4.xml");
        let mut h = H1::new("Ediode", "Edep <diode>", 10, 0.0, 10.0).unwrap();
        h.fill(1.5);
        h.fill(-1.0);
        let mut nt = Ntuple::new("B4", "Edep and TrackL");
        nt.create_d_column("Ediode").unwrap();
        nt.finish().unwrap();
        nt.fill_d_column(0, 1.5).unwrap();
        nt.add_row().unwrap();
        write_aida(&path, &[h], Some(&nt)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains(r#"title="Edep &lt;diode&gt;""#));
        assert!(text.contains(r#"<bin1d binNum="1" entries="1""#));
        assert!(text.contains(r#"<bin1d binNum="UNDERFLOW" entries="1""#));
        assert!(text.contains(r#"<row><entry value="1.5"/></row>"#));
        assert!(text.trim_end().ends_with("</aida>"));
    }
}
