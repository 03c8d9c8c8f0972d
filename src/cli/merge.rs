use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::command::MergeArgs;
use crate::input::InputReader;
use dat::process::merge::Merger;

/// Stdin can feed at most one of the captures.
fn check_inputs(inputs: &[PathBuf]) -> Result<()> {
    let stdin_inputs = inputs
        .iter()
        .filter(|path| path.to_string_lossy() == "-")
        .count();
    if stdin_inputs > 1 {
        bail!("stdin (\"-\") given for {stdin_inputs} inputs; at most one capture can be piped");
    }
    Ok(())
}

pub fn cmd_merge(args: &MergeArgs, multi: Option<&MultiProgress>) -> Result<()> {
    check_inputs(&args.inputs)?;
    let [a, b, c] = [0, 1, 2].map(|i| &args.inputs[i]);
    log::info!(
        "Merging {}, {} and {}",
        a.display(),
        b.display(),
        c.display()
    );

    let inputs = [
        InputReader::new(a)?,
        InputReader::new(b)?,
        InputReader::new(c)?,
    ];

    let mut output: Box<dyn Write> = match args.output.as_deref() {
        Some(path) if path.to_string_lossy() != "-" => {
            let file =
                File::create(path).with_context(|| format!("Opening {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        _ => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let pb = match multi {
        Some(multi) => {
            let pb = multi.add(ProgressBar::new_spinner());
            pb.set_style(ProgressStyle::with_template(
                "{spinner:.green} {msg} | elapsed: {elapsed_precise}",
            )?);
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
            pb.set_message("merging");
            Some(pb)
        }
        None => None,
    };

    let mut merger = Merger::new(inputs);
    let result = merger.run(&mut output);

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let summary = merger.summary();
    if result.is_ok() {
        log::info!("Merge finished: {summary}");
    } else {
        log::error!("Merge stopped: {summary}");
    }

    result.map(|_| ()).context("Merging captures")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: [&str; 3]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn one_piped_capture_is_accepted() {
        assert!(check_inputs(&paths(["a.dat", "b.dat", "c.dat"])).is_ok());
        assert!(check_inputs(&paths(["a.dat", "-", "c.dat"])).is_ok());
    }

    #[test]
    fn several_piped_captures_are_rejected() {
        let err = check_inputs(&paths(["-", "b.dat", "-"])).unwrap_err();
        assert!(err.to_string().contains("2 inputs"));
        assert!(check_inputs(&paths(["-", "-", "-"])).is_err());
    }

    #[test]
    fn repeated_stdin_fails_before_opening_inputs() {
        let args = MergeArgs {
            inputs: paths(["-", "-", "missing-capture.dat"]),
            output: None,
        };
        let err = cmd_merge(&args, None).unwrap_err();
        assert!(err.to_string().contains("stdin"));
    }
}
