use anyhow::Context;

use crate::collect::ReporterRow;

/// Write a plain-text log for a completed run: a `key=value` header followed
/// by a CSV body of per-step population-wide totals.
pub fn write_run_log(
    out_dir: impl AsRef<std::path::Path>,
    run_id: &str,
    n_locations: usize,
    scale: u32,
    seed: u64,
    steps: &[ReporterRow],
) -> anyhow::Result<std::path::PathBuf> {
    use std::io::Write;

    std::fs::create_dir_all(out_dir.as_ref()).context("create logs dir failed")?;
    let path = out_dir.as_ref().join(format!("run_{}.txt", run_id));
    let mut f = std::fs::File::create(&path)
        .with_context(|| format!("create run log file failed (path={:?})", path))?;

    writeln!(f, "run_id={}", run_id)?;
    writeln!(f, "locations={}", n_locations)?;
    writeln!(f, "scale={}", scale)?;
    writeln!(f, "seed={}", seed)?;
    writeln!(f, "steps={}", steps.len())?;
    writeln!(f)?;
    writeln!(f, "step,susceptible,exposed,infected,deaths,recovered,vaccinated")?;

    for (step, row) in steps.iter().enumerate() {
        writeln!(
            f,
            "{},{},{},{},{},{},{}",
            step, row.susceptible, row.exposed, row.infected, row.deaths, row.recovered, row.vaccinated
        )?;
    }

    Ok(path)
}
